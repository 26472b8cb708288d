//! Vectors, choices, dictionaries, filters and alignment padding.

use bitweave::{
    align_pad, asciiz, be16, byte, le32, DictKey, DictionarySpec, ElementKey, Error, FilterSpec,
    Method, NodeId, Reference, Scalar, Selected, Str, StructureType, Template, Tree, VectorSpec,
};

fn ints(tree: &Tree, container: NodeId) -> Vec<u64> {
    let body = tree.children(container)[0];
    tree.children(body)
        .iter()
        .map(|&c| tree.int(c).expect("int"))
        .collect()
}

#[test]
fn test_vector_count_from_sibling() -> anyhow::Result<()> {
    let ty = StructureType::builder("List")
        .field("count", byte())
        .field(
            "items",
            Template::vector(VectorSpec::of(le32()).count(Reference::prev(Method::Value))),
        )
        .finish()?;
    let mut tree = Tree::new();
    let l = tree.create(&ty)?;
    let input = [3u8, 1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0, 0xee];
    let rest = tree.capture(l, &input)?;
    assert_eq!(rest, &[0xee]);

    let items = tree.field(l, "items")?;
    assert_eq!(ints(&tree, items), vec![1, 2, 3]);
    assert_eq!(tree.size(items)?, 12);
    match tree.node(items).kind() {
        bitweave::NodeKind::Vector(v) => assert_eq!(v.captured_count(), Some(3)),
        _ => panic!("not a vector"),
    }
    assert_eq!(tree.render(l)?, input[..13].to_vec());
    Ok(())
}

#[test]
fn test_vector_count_and_sizes_rendered_from_scratch() -> anyhow::Result<()> {
    let ty = StructureType::builder("List")
        .field(
            "count",
            Template::number(bitweave::Number::new(8).value(Reference::next(Method::Count))),
        )
        .field("items", Template::vector(VectorSpec::of(be16()).unlimited()))
        .finish()?;
    let mut tree = Tree::new();
    let l = tree.create(&ty)?;
    let items = tree.field(l, "items")?;
    for x in [0x0102u16, 0x0304] {
        let e = tree.push_element(items)?;
        tree.set_value(e, x)?;
    }
    assert_eq!(tree.render(l)?, vec![2, 1, 2, 3, 4]);
    Ok(())
}

#[test]
fn test_unlimited_vector_runs_to_end() {
    let mut tree = Tree::new();
    let v = tree
        .instantiate(&Template::vector(VectorSpec::of(asciiz()).unlimited()))
        .expect("instantiate");
    let rest = tree.capture(v, b"a\0bc\0d").expect("capture");
    assert!(rest.is_empty());
    let body = tree.children(v)[0];
    let words: Vec<&[u8]> = tree
        .children(body)
        .iter()
        .map(|&c| tree.bytes(c).expect("bytes"))
        .collect();
    assert_eq!(words, vec![&b"a"[..], &b"bc"[..], &b"d"[..]]);
}

#[test]
fn test_vector_without_count_is_schema_error() {
    let mut tree = Tree::new();
    let v = tree
        .instantiate(&Template::vector(VectorSpec::of(byte())))
        .expect("instantiate");
    assert!(matches!(tree.capture(v, b"\x01"), Err(Error::Schema(_))));
}

#[test]
fn test_vector_without_element_is_schema_error() {
    let mut tree = Tree::new();
    let err = tree
        .instantiate(&Template::vector(VectorSpec::default().unlimited()))
        .err()
        .expect("error");
    assert!(matches!(err, Error::Schema(_)));
}

#[test]
fn test_vector_count_unresolved() {
    let mut tree = Tree::new();
    let blob = tree
        .instantiate(&Template::blob(vec![
            Template::string(Str::new().size(1usize)),
            Template::vector(VectorSpec::of(byte()).count(Reference::prev(Method::Value))),
        ]))
        .expect("instantiate");
    let err = tree.capture(blob, b"xab").unwrap_err();
    assert!(matches!(err, Error::UnresolvedReference(_)), "{}", err);
}

#[test]
fn test_empty_vector_at_end_needs_no_input() {
    let mut tree = Tree::new();
    let blob = tree
        .instantiate(&Template::blob(vec![
            byte(),
            Template::vector(VectorSpec::of(byte()).count(0u64)),
        ]))
        .expect("instantiate");
    let rest = tree.capture(blob, b"\x09").expect("capture");
    assert!(rest.is_empty());
}

#[test]
fn test_count_resolving_to_zero_needs_no_input() -> anyhow::Result<()> {
    let ty = StructureType::builder("List")
        .field("count", byte())
        .field(
            "items",
            Template::vector(VectorSpec::of(byte()).count(Reference::prev(Method::Value))),
        )
        .finish()?;
    let mut tree = Tree::new();
    let l = tree.create(&ty)?;
    let rest = tree.capture(l, &[0u8])?;
    assert!(rest.is_empty());
    let items = tree.field(l, "items")?;
    assert!(ints(&tree, items).is_empty());
    assert_eq!(tree.render(l)?, vec![0]);

    // A nonzero count still reports the missing elements.
    let mut tree = Tree::new();
    let l = tree.create(&ty)?;
    assert!(matches!(tree.capture(l, &[2u8]), Err(Error::IncompleteCapture(_))));
    Ok(())
}

fn keyed_vector() -> Template {
    let key = ElementKey::peek(|_, _, rest| Ok(Scalar::from(rest[0])));
    Template::vector(
        VectorSpec::keyed(
            [
                (1u8, Template::blob(vec![byte(), byte()])),
                (2u8, Template::blob(vec![byte(), be16()])),
            ],
            key,
        )
        .unlimited(),
    )
}

#[test]
fn test_keyed_vector_peeks_element_type() {
    let mut tree = Tree::new();
    let v = tree.instantiate(&keyed_vector()).expect("instantiate");
    let rest = tree.capture(v, &[1, 0xaa, 2, 0x01, 0x02, 1, 0xbb]).expect("capture");
    assert!(rest.is_empty());
    let body = tree.children(v)[0];
    let sizes: Vec<usize> = tree
        .children(body)
        .iter()
        .map(|&c| tree.size(c).expect("size"))
        .collect();
    assert_eq!(sizes, vec![2, 3, 2]);
}

#[test]
fn test_keyed_vector_unknown_key_is_dispatch_error() {
    let mut tree = Tree::new();
    let v = tree.instantiate(&keyed_vector()).expect("instantiate");
    let err = tree.capture(v, &[7, 0]).unwrap_err();
    assert!(matches!(err, Error::Dispatch(_)), "{}", err);
    assert!(matches!(tree.push_keyed(v, 9u8), Err(Error::Dispatch(_))));
    let e = tree.push_keyed(v, 2u8).expect("push");
    assert_eq!(tree.size(e).expect("size"), 3);
}

#[test]
fn test_keyed_vector_by_field() -> anyhow::Result<()> {
    let ty = StructureType::builder("Tagged")
        .field("kind", byte())
        .field(
            "values",
            Template::vector(
                VectorSpec::keyed(
                    [(1u8, byte()), (2u8, be16())],
                    ElementKey::Field("kind".into()),
                )
                .unlimited(),
            ),
        )
        .finish()?;
    let mut tree = Tree::new();
    let t = tree.create(&ty)?;
    tree.capture(t, &[2, 0, 1, 0, 2])?;
    let values = tree.field(t, "values")?;
    assert_eq!(ints(&tree, values), vec![1, 2]);
    Ok(())
}

fn flavors(strict: bool) -> Template {
    let mut spec = DictionarySpec::new(DictKey::Tag("kind".into()))
        .entry(1u8, byte().named("small"))
        .entry(2u8, be16().named("large"));
    if strict {
        spec = spec.strict();
    }
    Template::blob(vec![byte().tagged("kind"), Template::dictionary(spec)])
}

#[test]
fn test_dictionary_selects_by_tagged_value() {
    let mut tree = Tree::new();
    let blob = tree.instantiate(&flavors(false)).expect("instantiate");
    let rest = tree.capture(blob, &[2, 0x01, 0x00, 0xff]).expect("capture");
    assert_eq!(rest, &[0xff]);
    let dict = tree.children(blob)[1];
    let chosen = tree.selected(dict).expect("selected");
    assert_eq!(tree.node(chosen).name(), Some("large"));
    assert_eq!(tree.int(chosen), Some(0x0100));
}

#[test]
fn test_dictionary_without_entry_leaves_input() {
    let mut tree = Tree::new();
    let blob = tree.instantiate(&flavors(false)).expect("instantiate");
    let rest = tree.capture(blob, &[5, 0xaa, 0xbb]).expect("capture");
    assert_eq!(rest, &[0xaa, 0xbb]);
    assert!(tree.selected(tree.children(blob)[1]).is_none());
}

#[test]
fn test_strict_dictionary_without_entry_fails() {
    let mut tree = Tree::new();
    let blob = tree.instantiate(&flavors(true)).expect("instantiate");
    let err = tree.capture(blob, &[5, 0xaa]).unwrap_err();
    assert!(matches!(err, Error::Dispatch(_)), "{}", err);
}

#[test]
fn test_dictionary_default_entry() {
    let spec = DictionarySpec::new(DictKey::Value(Scalar::from(99u8)))
        .entry(1u8, byte())
        .default(Template::string(Str::new()).named("raw"));
    let mut tree = Tree::new();
    let d = tree.instantiate(&Template::dictionary(spec)).expect("instantiate");
    let rest = tree.capture(d, b"anything").expect("capture");
    assert!(rest.is_empty());
    let chosen = tree.selected(d).expect("selected");
    assert_eq!(tree.node(chosen).name(), Some("raw"));
    assert_eq!(tree.bytes(chosen), Some(&b"anything"[..]));
}

/// `[type, length, value...]` records: the callback carves out `value`.
fn tlv() -> Template {
    let key = DictKey::callback(|_, _, buf| {
        let short = || Error::IncompleteCapture("record header".into());
        let (&kind, tail) = buf.split_first().ok_or_else(short)?;
        let (&len, tail) = tail.split_first().ok_or_else(short)?;
        let len = len as usize;
        if tail.len() < len {
            return Err(short());
        }
        Ok(Selected::split(kind, &tail[..len], &tail[len..]))
    });
    Template::dictionary(
        DictionarySpec::new(key)
            .entry(1u8, Template::string(Str::new()))
            .entry(2u8, byte()),
    )
}

#[test]
fn test_dictionary_split_consumes_sub_buffer() {
    let mut tree = Tree::new();
    let d = tree.instantiate(&tlv()).expect("instantiate");
    let rest = tree.capture(d, b"\x01\x03abcNEXT").expect("capture");
    assert_eq!(rest, b"NEXT");
    let chosen = tree.selected(d).expect("selected");
    assert_eq!(tree.bytes(chosen), Some(&b"abc"[..]));
}

#[test]
fn test_dictionary_split_not_fully_consumed_ends_capture() {
    let mut tree = Tree::new();
    let d = tree.instantiate(&tlv()).expect("instantiate");
    let rest = tree.capture(d, b"\x02\x02\x07\x08NEXT").expect("capture");
    assert!(rest.is_empty());
    let chosen = tree.selected(d).expect("selected");
    assert_eq!(tree.int(chosen), Some(7));
}

#[test]
fn test_choice_callback_fills_slot() {
    let choice = Template::choice(|tree, c, buf| {
        let t = if buf.first() == Some(&0) { byte() } else { be16() };
        let n = tree.select(c, &t)?;
        tree.capture(n, buf)
    });
    let mut tree = Tree::new();
    let a = tree.instantiate(&choice).expect("instantiate");
    let rest = tree.capture(a, &[0, 1]).expect("capture");
    assert_eq!(rest, &[1]);
    assert_eq!(tree.size(a).expect("size"), 1);

    let b = tree.instantiate(&choice).expect("instantiate");
    let rest = tree.capture(b, &[1, 1]).expect("capture");
    assert!(rest.is_empty());
    assert_eq!(tree.int(tree.selected(b).expect("selected")), Some(0x0101));
    assert_eq!(tree.render(b).expect("render"), vec![1, 1]);
}

fn xor(bytes: Vec<u8>) -> Vec<u8> {
    bytes.into_iter().map(|b| b ^ 0x20).collect()
}

#[test]
fn test_filter_transforms_and_inverts() {
    let template = Template::filter(
        Template::string(Str::new().size(3usize)),
        FilterSpec::new(xor).inverse(xor),
    );
    let mut tree = Tree::new();
    let f = tree.instantiate(&template).expect("instantiate");
    let inner = tree.children(f)[0];
    tree.set_value(inner, "abc").expect("set");
    assert_eq!(tree.render(f).expect("render"), b"ABC");
    assert_eq!(tree.size(f).expect("size"), 3);

    let g = tree.instantiate(&template).expect("instantiate");
    let rest = tree.capture(g, b"XYZrest").expect("capture");
    assert_eq!(rest, b"rest");
    assert_eq!(tree.bytes(tree.children(g)[0]), Some(&b"xyz"[..]));
}

#[test]
fn test_filter_without_inverse_captures_raw() {
    let template = Template::filter(byte(), FilterSpec::new(xor));
    let mut tree = Tree::new();
    let f = tree.instantiate(&template).expect("instantiate");
    tree.capture(f, &[0x41]).expect("capture");
    assert_eq!(tree.int(tree.children(f)[0]), Some(0x41));
}

#[test]
fn test_align_pad_to_multiple() {
    let template = Template::blob(vec![byte(), align_pad(4, None), byte(), byte()]);
    let mut tree = Tree::new();
    let src = tree.instantiate(&template).expect("instantiate");
    let c = tree.children(src).to_vec();
    tree.set_value(c[0], 1u8).expect("set");
    tree.set_value(c[2], 2u8).expect("set");
    tree.set_value(c[3], 3u8).expect("set");
    assert_eq!(tree.render(src).expect("render"), vec![1, 0, 0, 0, 2, 3]);

    let dst = tree.instantiate(&template).expect("instantiate");
    let rest = tree.capture(dst, &[1, 0, 0, 0, 2, 3]).expect("capture");
    assert!(rest.is_empty());
    let d = tree.children(dst).to_vec();
    assert_eq!(tree.int(d[2]), Some(2));
}

#[test]
fn test_align_pad_relative_to_tagged_base() {
    let template = Template::blob(vec![
        byte(),
        byte(),
        Template::blob(vec![byte().tagged("start"), align_pad(4, Some("start")), byte()]),
    ]);
    let mut tree = Tree::new();
    let b = tree.instantiate(&template).expect("instantiate");
    let bytes = tree.render(b).expect("render");
    assert_eq!(bytes.len(), 2 + 1 + 3 + 1);
}
