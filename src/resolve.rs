//! Deferred references: attributes whose value is computed from another node
//! at render/capture time instead of being stored.
//!
//! An [`Attr`] is either an immediate [`Scalar`] or a [`Reference`]. A
//! reference picks a **source** node relative to the node being resolved, applies
//! a **method** to it, and optionally passes the result through a
//! **transform**:
//!
//! | Source | Node queried |
//! |--------|--------------|
//! | `Relative(0)` / `this()` | the node itself |
//! | `Relative(1)` (default) | the next sibling |
//! | `Relative(-1)` | the previous sibling |
//! | `Tag(t)` | first node tagged `t` below the root |
//! | `Field(f)` | field `f` of the enclosing structure |
//! | `Rest` | every later sibling; the method results are summed |
//!
//! Resolution never happens at construction. `Method::Value` reads the raw
//! stored value and does not chase it: a source whose own value is still a
//! reference reads as `Nil`, which string bounds treat as "unbounded". That is
//! what keeps a length field and the string it measures from chasing each
//! other.

use crate::error::{Error, Result};
use crate::node::{NodeId, NodeKind, RenderState, Tree};
use crate::value::Scalar;
use std::cell::Cell;
use std::rc::Rc;

/// Callback computing a value from a source node.
pub type MethodFn = Rc<dyn Fn(&Tree, NodeId) -> Result<Scalar>>;
/// Post-processing applied to a resolved value.
pub type TransformFn = Rc<dyn Fn(Scalar) -> Scalar>;

/// An attribute: stored now, or computed later.
#[derive(Clone)]
pub enum Attr {
    Value(Scalar),
    Ref(Reference),
}

impl Attr {
    /// Shorthand for "call `method` on the next field".
    pub fn method(method: Method) -> Self {
        Attr::Ref(Reference::new(method))
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Attr::Ref(_))
    }
}

macro_rules! attr_from_scalar {
    ($($t:ty),*) => {
        $(impl From<$t> for Attr {
            fn from(v: $t) -> Self {
                Attr::Value(v.into())
            }
        })*
    };
}

attr_from_scalar!(Scalar, u64, u32, u16, u8, usize, i32, bool, &str, &[u8], Vec<u8>);

impl From<Reference> for Attr {
    fn from(r: Reference) -> Self {
        Attr::Ref(r)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// Offset among the parent container's children; 0 is the node itself.
    Relative(isize),
    Tag(String),
    Field(String),
    Rest,
}

#[derive(Clone)]
pub enum Method {
    /// Rendered size in bytes.
    Size,
    /// Raw stored value (not resolved further).
    Value,
    /// Number of children (element count for a vector).
    Count,
    /// Byte offset computed by the last render pass.
    Offset,
    /// Size of the structure enclosing the *resolving* node, guarded by that
    /// node's latch: while it is already being computed, a placeholder stands
    /// in. The size is recomputed with the last result as placeholder until
    /// the two agree, so text lengths whose own width varies come out right.
    EnclosingSize,
    Custom(MethodFn),
}

impl Method {
    /// Arbitrary computation on the source node.
    pub fn custom(f: impl Fn(&Tree, NodeId) -> Result<Scalar> + 'static) -> Self {
        Method::Custom(Rc::new(f))
    }

    fn label(&self) -> &'static str {
        match self {
            Method::Size => "size",
            Method::Value => "value",
            Method::Count => "count",
            Method::Offset => "offset",
            Method::EnclosingSize => "enclosing size",
            Method::Custom(_) => "custom",
        }
    }
}

/// Which node to query, what to ask it, and how to adjust the answer.
#[derive(Clone)]
pub struct Reference {
    pub source: Source,
    pub method: Method,
    pub transform: Option<TransformFn>,
}

impl Reference {
    /// `method` applied to the next sibling.
    pub fn new(method: Method) -> Self {
        Reference {
            source: Source::Relative(1),
            method,
            transform: None,
        }
    }

    pub fn this(method: Method) -> Self {
        Reference::new(method).from(Source::Relative(0))
    }

    pub fn prev(method: Method) -> Self {
        Reference::new(method).from(Source::Relative(-1))
    }

    pub fn next(method: Method) -> Self {
        Reference::new(method)
    }

    pub fn tag(tag: impl Into<String>, method: Method) -> Self {
        Reference::new(method).from(Source::Tag(tag.into()))
    }

    pub fn field(field: impl Into<String>, method: Method) -> Self {
        Reference::new(method).from(Source::Field(field.into()))
    }

    pub fn rest(method: Method) -> Self {
        Reference::new(method).from(Source::Rest)
    }

    pub fn from(mut self, source: Source) -> Self {
        self.source = source;
        self
    }

    pub fn transform(mut self, f: impl Fn(Scalar) -> Scalar + 'static) -> Self {
        self.transform = Some(Rc::new(f));
        self
    }
}

/// Upper bound on `EnclosingSize` recomputations before the last size is taken.
const MAX_SIZE_PASSES: usize = 8;

/// Resets a latch when dropped, so an error mid-computation cannot leave it held.
struct LatchGuard<'a>(&'a Cell<RenderState>);

impl Drop for LatchGuard<'_> {
    fn drop(&mut self) {
        self.0.set(RenderState::Idle);
    }
}

impl Tree {
    /// Evaluate `attr` on behalf of node `id`.
    pub fn resolve(&self, id: NodeId, attr: &Attr) -> Result<Scalar> {
        let r = match attr {
            Attr::Value(v) => return Ok(v.clone()),
            Attr::Ref(r) => r,
        };
        let out = match &r.source {
            Source::Rest => {
                let parent = self
                    .parent(id)
                    .ok_or_else(|| Error::unresolved(format!("{} is unparented", self.describe(id))))?;
                let place = self.place(id).unwrap_or(0);
                let mut sum = 0u64;
                for &sib in self.children(parent).iter().skip(place + 1) {
                    sum += self.apply(id, sib, &r.method)?.as_number().unwrap_or(0);
                }
                Scalar::Int(sum)
            }
            source => {
                let target = self.source_node(id, source)?;
                self.apply(id, target, &r.method)?
            }
        };
        Ok(match &r.transform {
            Some(f) => f(out),
            None => out,
        })
    }

    fn source_node(&self, id: NodeId, source: &Source) -> Result<NodeId> {
        match source {
            Source::Relative(0) => Ok(id),
            Source::Relative(delta) => {
                if self.parent(id).is_none() {
                    return Err(Error::unresolved(format!(
                        "{} is unparented",
                        self.describe(id)
                    )));
                }
                self.sibling(id, *delta).ok_or_else(|| {
                    Error::unresolved(format!(
                        "no sibling at offset {} from {}",
                        delta,
                        self.describe(id)
                    ))
                })
            }
            Source::Tag(t) => self
                .find_tag(self.root(id), t)
                .ok_or_else(|| Error::unresolved(format!("no node tagged \"{}\"", t))),
            Source::Field(f) => {
                if self.parent(id).is_none() {
                    return Err(Error::unresolved(format!(
                        "{} is unparented",
                        self.describe(id)
                    )));
                }
                let s = self.parent_structure(id);
                self.field(s, f)
            }
            Source::Rest => Err(Error::unresolved("rest has no single source node")),
        }
    }

    fn apply(&self, id: NodeId, target: NodeId, method: &Method) -> Result<Scalar> {
        tracing::trace!(node = id.index(), target = target.index(), method = method.label(), "resolve");
        match method {
            Method::Size => Ok(Scalar::Int(self.size(target)? as u64)),
            Method::Value => Ok(self.value(target)),
            Method::Count => Ok(Scalar::Int(match &self.node(target).kind {
                NodeKind::Vector(v) => self.children(v.body).len() as u64,
                _ => {
                    let body = self.body_of(target).unwrap_or(target);
                    self.children(body).len() as u64
                }
            })),
            Method::Offset => Ok(Scalar::Int(self.node(target).rendered_offset() as u64)),
            Method::EnclosingSize => {
                let node = self.node(id);
                match node.state.get() {
                    RenderState::Rendering => Ok(Scalar::Int(node.placeholder.get())),
                    RenderState::Idle => {
                        node.state.set(RenderState::Rendering);
                        let _guard = LatchGuard(&node.state);
                        let s = self.parent_structure(id);
                        let mut guess = self.placeholder_width(id) as u64;
                        for _ in 0..MAX_SIZE_PASSES {
                            node.placeholder.set(guess);
                            let size = self.size(s)? as u64;
                            if size == guess {
                                break;
                            }
                            guess = size;
                        }
                        Ok(Scalar::Int(guess))
                    }
                }
            }
            Method::Custom(f) => f(self, target),
        }
    }

    /// First placeholder: the node's own fixed byte width, or 4 for text.
    fn placeholder_width(&self, id: NodeId) -> usize {
        match &self.node(id).kind {
            NodeKind::Number(n) if !n.ascii => n.byte_width(),
            _ => 4,
        }
    }
}
