//! Byte strings: bounds, padding, terminators, delimiters, UTF-16.

use bitweave::{
    asciiz, bounded, byte, len, unicode, unicodez, Error, Method, Reference, Str, Template, Tree,
};

fn string(tree: &mut Tree, s: Str) -> bitweave::NodeId {
    tree.instantiate(&Template::string(s)).expect("instantiate")
}

#[test]
fn test_min_pads_and_recapture_keeps_padding() {
    let mut tree = Tree::new();
    let s = string(&mut tree, Str::new().min(8usize).value("hi"));
    let bytes = tree.render(s).expect("render");
    assert_eq!(bytes, b"hi\0\0\0\0\0\0");

    let t = string(&mut tree, Str::new().min(8usize));
    let rest = tree.capture(t, &bytes).expect("capture");
    assert!(rest.is_empty());
    assert_eq!(tree.bytes(t), Some(&b"hi\0\0\0\0\0\0"[..]));
}

#[test]
fn test_custom_padding_byte() {
    let mut tree = Tree::new();
    let s = string(&mut tree, Str::new().min(4usize).padding(b' ').value("ab"));
    assert_eq!(tree.render(s).expect("render"), b"ab  ");
}

#[test]
fn test_exact_size_capture() {
    let mut tree = Tree::new();
    let s = string(&mut tree, Str::new().size(4usize));
    let rest = tree.capture(s, b"abcdef").expect("capture");
    assert_eq!(tree.bytes(s), Some(&b"abcd"[..]));
    assert_eq!(rest, b"ef");
}

#[test]
fn test_exact_size_short_input_is_incomplete() {
    let mut tree = Tree::new();
    let s = string(&mut tree, Str::new().size(4usize));
    let err = tree.capture(s, b"ab").unwrap_err();
    assert!(matches!(err, Error::IncompleteCapture(_)), "{}", err);
}

#[test]
fn test_empty_input_is_incomplete() {
    let mut tree = Tree::new();
    let s = string(&mut tree, Str::new());
    let err = tree.capture(s, b"").unwrap_err();
    assert!(matches!(err, Error::IncompleteCapture(_)));
}

#[test]
fn test_nul_terminated() {
    let mut tree = Tree::new();
    let s = tree.instantiate(&asciiz()).expect("asciiz");
    let rest = tree.capture(s, b"foo\0bar").expect("capture");
    assert_eq!(tree.bytes(s), Some(&b"foo"[..]));
    assert_eq!(rest, b"bar");

    assert_eq!(tree.render(s).expect("render"), b"foo\0");
    tree.set_value(s, "foo\0").expect("set");
    assert_eq!(tree.render(s).expect("render"), b"foo\0");
}

#[test]
fn test_nul_terminated_without_terminator_takes_rest() {
    let mut tree = Tree::new();
    let s = tree.instantiate(&asciiz()).expect("asciiz");
    let rest = tree.capture(s, b"abc").expect("capture");
    assert_eq!(tree.bytes(s), Some(&b"abc"[..]));
    assert!(rest.is_empty());
}

#[test]
fn test_delimiter() {
    let mut tree = Tree::new();
    let s = string(&mut tree, Str::new().delimiter("\r\n"));
    let rest = tree.capture(s, b"GET /\r\nHost").expect("capture");
    assert_eq!(tree.bytes(s), Some(&b"GET /"[..]));
    assert_eq!(rest, b"Host");
}

#[test]
fn test_max_truncates() {
    let mut tree = Tree::new();
    let s = string(&mut tree, Str::new().max(3usize).value("abcdef"));
    assert_eq!(tree.render(s).expect("render"), b"abc");

    let t = string(&mut tree, Str::new().max(3usize));
    let rest = tree.capture(t, b"abcdef").expect("capture");
    assert_eq!(tree.bytes(t), Some(&b"abc"[..]));
    assert_eq!(rest, b"def");
}

#[test]
fn test_pad_to_multiple() {
    let mut tree = Tree::new();
    let s = string(&mut tree, Str::new().pad_to(4usize).padding(b'.').value("abcde"));
    assert_eq!(tree.render(s).expect("render"), b"abcde...");
}

#[test]
fn test_unicode_render_and_capture() {
    let mut tree = Tree::new();
    let u = tree.instantiate(&unicode().with_value("hi")).expect("unicode");
    assert_eq!(tree.render(u).expect("render"), b"h\0i\0");

    let z = tree.instantiate(&unicodez().with_value("hi")).expect("unicodez");
    assert_eq!(tree.render(z).expect("render"), b"h\0i\0\0\0");

    let c = tree.instantiate(&unicodez()).expect("unicodez");
    let rest = tree.capture(c, b"h\0i\0\0\0rest").expect("capture");
    assert_eq!(tree.bytes(c), Some(&b"hi"[..]));
    assert_eq!(rest, b"rest");
}

#[test]
fn test_bounded_by_previous_value() {
    let mut tree = Tree::new();
    let blob = tree
        .instantiate(&Template::blob(vec![byte(), bounded()]))
        .expect("instantiate");
    let rest = tree.capture(blob, b"\x03abcXY").expect("capture");
    let s = tree.children(blob)[1];
    assert_eq!(tree.bytes(s), Some(&b"abc"[..]));
    assert_eq!(rest, b"XY");
}

#[test]
fn test_length_field_and_string_do_not_chase_each_other() {
    let template = Template::blob(vec![
        len(8),
        Template::string(Str::new().size(Reference::prev(Method::Value))),
    ]);
    let mut tree = Tree::new();
    let src = tree.instantiate(&template).expect("instantiate");
    let body = tree.children(src)[1];
    tree.set_value(body, "hello").expect("set");
    assert_eq!(tree.render(src).expect("render"), b"\x05hello");

    let dst = tree.instantiate(&template).expect("instantiate");
    let rest = tree.capture(dst, b"\x05helloEXTRA").expect("capture");
    assert_eq!(tree.bytes(tree.children(dst)[1]), Some(&b"hello"[..]));
    assert_eq!(rest, b"EXTRA");
}

#[test]
fn test_integer_assigned_to_string_is_invalid() {
    let mut tree = Tree::new();
    let s = string(&mut tree, Str::new());
    assert!(matches!(tree.set_value(s, 5u8), Err(Error::InvalidValue(_))));
}
