//! Capture fuzz target: feed arbitrary bytes to a schema mixing spans,
//! sized strings, counted vectors and a factory field.
//! Capture must not panic; it returns the remainder or an error.
//! Build with: cargo fuzz run capture_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use bitweave::{
    asciiz, be16, bit, bounded, byte, nibble, unicodez, Method, Number, Reference, StructureType,
    Template, Tree, VectorSpec,
};
#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fn packet() -> std::rc::Rc<StructureType> {
    let a = StructureType::builder("A")
        .field("kind", byte())
        .field("text", asciiz())
        .finish()
        .expect("a");
    let b = StructureType::builder("B")
        .field("kind", byte())
        .field("wide", unicodez())
        .finish()
        .expect("b");
    let any = StructureType::builder("Any")
        .field("kind", byte().decides([(1, a), (2, b)]))
        .finish()
        .expect("any");
    StructureType::builder("Packet")
        .field("version", nibble())
        .field("flag", bit())
        .field("spare", Template::number(Number::new(3)))
        .field("n", byte())
        .field("data", bounded())
        .field("count", byte())
        .field(
            "words",
            Template::vector(VectorSpec::of(be16()).count(Reference::prev(Method::Value))),
        )
        .field("msg", Template::structure(&any))
        .finish()
        .expect("packet")
}

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let ty = packet();
    let mut tree = Tree::new();
    let Ok(p) = tree.create(&ty) else { return };
    if tree.capture(p, data).is_ok() {
        let _ = tree.render(p);
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run capture_fuzz");
}
