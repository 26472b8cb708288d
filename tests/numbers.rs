//! Integer fields: byte-aligned widths, odd-width spans, ASCII numerals.

use bitweave::{be32, decimal, hex_number, le16, Endianness, Error, Number, Template, Tree};

fn numbers(tree: &mut Tree, fields: Vec<Number>) -> bitweave::NodeId {
    let t = Template::blob(fields.into_iter().map(Template::number).collect());
    tree.instantiate(&t).expect("instantiate")
}

fn ints(tree: &Tree, blob: bitweave::NodeId) -> Vec<u64> {
    tree.children(blob)
        .iter()
        .map(|&c| tree.int(c).expect("int"))
        .collect()
}

#[test]
fn test_span_3_5_8_renders_two_bytes_and_round_trips() {
    let mut tree = Tree::new();
    let src = numbers(
        &mut tree,
        vec![
            Number::new(3).value(5u64),
            Number::new(5).value(17u64),
            Number::new(8).value(200u64),
        ],
    );
    let bytes = tree.render(src).expect("render");
    assert_eq!(bytes, vec![0b1011_0001, 200]);

    let dst = numbers(&mut tree, vec![Number::new(3), Number::new(5), Number::new(8)]);
    let rest = tree.capture(dst, &bytes).expect("capture");
    assert!(rest.is_empty());
    assert_eq!(ints(&tree, dst), vec![5, 17, 200]);
}

#[test]
fn test_span_big_endian_multi_byte() {
    let mut tree = Tree::new();
    let src = numbers(
        &mut tree,
        vec![
            Number::new(4).endian(Endianness::Big).value(0xau64),
            Number::new(12).value(0xbcdu64),
        ],
    );
    assert_eq!(tree.render(src).expect("render"), vec![0xab, 0xcd]);

    let dst = numbers(
        &mut tree,
        vec![Number::new(4).endian(Endianness::Big), Number::new(12)],
    );
    tree.capture(dst, &[0xab, 0xcd]).expect("capture");
    assert_eq!(ints(&tree, dst), vec![0xa, 0xbcd]);
}

#[test]
fn test_span_little_endian_reverses_bytes() {
    let mut tree = Tree::new();
    let src = numbers(
        &mut tree,
        vec![
            Number::new(4).endian(Endianness::Little).value(0xau64),
            Number::new(12).value(0xbcdu64),
        ],
    );
    let bytes = tree.render(src).expect("render");
    assert_eq!(bytes, vec![0xcd, 0xab]);

    let dst = numbers(&mut tree, vec![Number::new(4), Number::new(12)]);
    tree.capture(dst, &bytes).expect("capture");
    assert_eq!(ints(&tree, dst), vec![0xa, 0xbcd]);
}

#[test]
fn test_span_sizes_first_member_carries_span() {
    let mut tree = Tree::new();
    let blob = numbers(
        &mut tree,
        vec![Number::new(1), Number::new(7), Number::new(3), Number::new(16)],
    );
    let c = tree.children(blob).to_vec();
    assert_eq!(tree.size(c[0]).expect("size"), 2);
    assert_eq!(tree.size(c[1]).expect("size"), 0);
    assert_eq!(tree.size(c[2]).expect("size"), 0);
    assert_eq!(tree.size(c[3]).expect("size"), 2);
    assert_eq!(tree.size(blob).expect("size"), 4);
}

#[test]
fn test_fixed_width_byte_orders() {
    let mut tree = Tree::new();
    let blob = numbers(
        &mut tree,
        vec![
            Number::new(16).value(0x1234u64),
            Number::new(32).endian(Endianness::Big).value(0x0102_0304u64),
            Number::new(24).endian(Endianness::Big).value(0x0a0b0cu64),
        ],
    );
    assert_eq!(
        tree.render(blob).expect("render"),
        vec![0x34, 0x12, 1, 2, 3, 4, 0x0a, 0x0b, 0x0c]
    );
}

#[test]
fn test_native_matches_host_order() {
    let mut tree = Tree::new();
    let blob = numbers(&mut tree, vec![Number::new(16).endian(Endianness::Native).value(0x0102u64)]);
    assert_eq!(tree.render(blob).expect("render"), 0x0102u16.to_ne_bytes().to_vec());
}

#[test]
fn test_value_masked_to_width() {
    let mut tree = Tree::new();
    let blob = numbers(&mut tree, vec![Number::new(8).value(0x1ffu64)]);
    assert_eq!(tree.render(blob).expect("render"), vec![0xff]);
}

#[test]
fn test_fixed_capture_leaves_remainder() {
    let mut tree = Tree::new();
    let n = tree.instantiate(&le16()).expect("instantiate");
    let rest = tree.capture(n, &[0x34, 0x12, 0x99]).expect("capture");
    assert_eq!(rest, &[0x99]);
    assert_eq!(tree.int(n), Some(0x1234));
}

#[test]
fn test_short_input_is_incomplete() {
    let mut tree = Tree::new();
    let n = tree.instantiate(&be32()).expect("instantiate");
    let err = tree.capture(n, &[1, 2]).unwrap_err();
    assert!(matches!(err, Error::IncompleteCapture(_)), "{}", err);
}

#[test]
fn test_width_out_of_range_is_schema_error() {
    let mut tree = Tree::new();
    for width in [0, 65] {
        let err = tree
            .instantiate(&Template::number(Number::new(width)))
            .err()
            .expect("error");
        assert!(matches!(err, Error::Schema(_)), "{}", err);
    }
}

#[test]
fn test_bytes_assigned_to_number_is_invalid() {
    let mut tree = Tree::new();
    let n = tree.instantiate(&le16()).expect("instantiate");
    let err = tree.set_value(n, "abc").unwrap_err();
    assert!(matches!(err, Error::InvalidValue(_)));
}

#[test]
fn test_ascii_render() {
    let mut tree = Tree::new();
    let d = tree.instantiate(&decimal().with_value(42u64)).expect("decimal");
    assert_eq!(tree.render(d).expect("render"), b"42");

    let h = tree.instantiate(&hex_number().with_value(255u64)).expect("hex");
    assert_eq!(tree.render(h).expect("render"), b"ff");

    let padded = tree
        .instantiate(&Template::number(Number::new(32).ascii(10).pad(5usize).value(42u64)))
        .expect("padded");
    assert_eq!(tree.render(padded).expect("render"), b"00042");
    assert_eq!(tree.size(padded).expect("size"), 5);
}

#[test]
fn test_ascii_capture_greedy_digits() {
    let mut tree = Tree::new();
    let d = tree.instantiate(&decimal()).expect("decimal");
    let rest = tree.capture(d, b"123abc").expect("capture");
    assert_eq!(tree.int(d), Some(123));
    assert_eq!(rest, b"abc");
}

#[test]
fn test_ascii_capture_auto_detects_hex_prefix() {
    let mut tree = Tree::new();
    let n = tree
        .instantiate(&Template::number(Number::new(32).ascii(0)))
        .expect("auto");
    let rest = tree.capture(n, b"0x1fZ").expect("capture");
    assert_eq!(tree.int(n), Some(31));
    assert_eq!(rest, b"Z");

    let m = tree
        .instantiate(&Template::number(Number::new(32).ascii(0)))
        .expect("auto");
    tree.capture(m, b"77 ").expect("capture");
    assert_eq!(tree.int(m), Some(77));
}

#[test]
fn test_ascii_capture_without_digits_is_zero() {
    let mut tree = Tree::new();
    let d = tree.instantiate(&decimal().with_value(9u64)).expect("decimal");
    let rest = tree.capture(d, b"xyz").expect("capture");
    assert_eq!(tree.int(d), Some(0));
    assert_eq!(rest, b"xyz");
}
