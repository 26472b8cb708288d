//! # bitweave: declarative binary structures
//!
//! Describe a packet or message format as a tree of typed fields, then
//! **render** the tree to exact bytes or **capture** bytes back into the same
//! shape, including fields whose width, presence or type depends on values
//! only known once parsing reaches them.
//!
//! ## Building blocks
//!
//! - **Number**: integers of any width from 1 to 64 bits. Adjacent fields whose
//!   width is not a multiple of 8 share one packed bit span. ASCII numerals
//!   are supported too.
//! - **Str**: byte strings, exact-size, min/max bounded, padded, delimited,
//!   NUL-terminated or UTF-16.
//! - **Null**: zero-size marker.
//! - **Blob**: ordered container; **Structure**: a blob with a named schema.
//! - **Vector**: counted or unbounded repetition, homogeneous or keyed.
//! - **Choice / Dictionary**: one slot whose content is picked during capture.
//! - **Filter**: passes a node's rendered bytes through a transform.
//!
//! Attributes may be deferred [`Reference`]s ("the size of the next field",
//! "the value of field `count`"), resolved during render and capture.
//! [`Tree::query`] finds nodes with CSS-like selectors (`#hdr .len`).
//!
//! ## Example
//!
//! ```
//! use bitweave::{byte, len, StructureType, Str, Template, Tree};
//!
//! let packet = StructureType::builder("Packet")
//!     .field("kind", byte())
//!     .field("length", len(16))
//!     .field("body", Template::string(Str::new()))
//!     .finish()
//!     .unwrap();
//!
//! let mut tree = Tree::new();
//! let p = tree.create(&packet).unwrap();
//! tree.set(p, "kind", 7u8).unwrap();
//! tree.set(p, "body", "hello").unwrap();
//! assert_eq!(tree.render(p).unwrap(), b"\x07\x00\x05hello");
//!
//! let q = tree.create(&packet).unwrap();
//! tree.capture(q, b"\x07\x00\x05hello").unwrap();
//! assert_eq!(tree.bytes(tree.field(q, "body").unwrap()), Some(&b"hello"[..]));
//! ```

pub mod bits;
mod blob;
pub mod choice;
mod codec;
pub mod dump;
pub mod error;
pub mod filter;
pub mod node;
pub mod number;
pub mod resolve;
pub mod scalars;
pub mod selector;
pub mod string;
pub mod structure;
pub mod template;
pub mod value;
pub mod vector;

pub use choice::{DictKey, DictionarySpec, Selected};
pub use error::{Error, Result};
pub use filter::FilterSpec;
pub use node::{Mutate, Node, NodeId, NodeKind, RenderState, Tree};
pub use number::{Endianness, Number};
pub use resolve::{Attr, Method, Reference, Source};
pub use scalars::{enumeration, ipv4, mac_addr, time_t};
pub use selector::{parse_selector, Step};
pub use string::Str;
pub use structure::{StructureType, StructureTypeBuilder};
pub use template::{
    align_pad, asciiz, be16, be32, be64, bit, bounded, byte, decimal, hex_number, le16, le32,
    le64, len, mark, msg_len, nibble, unicode, unicodez, word_len, Template,
};
pub use value::Scalar;
pub use vector::{Count, ElementKey, VectorSpec};
