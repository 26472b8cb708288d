//! The node arena: ownership, parent links, identity and navigation.
//!
//! Every node of an assembled tree lives in one [`Tree`] and is addressed by a
//! [`NodeId`]. Containers own their children by listing their ids; the
//! `parent` link is a plain back-index. Nodes are never freed individually: a
//! node replaced during capture simply becomes unreachable, and everything is
//! dropped together with the tree.
//!
//! ## Identity
//!
//! - **tag**: intended-unique identifier, looked up with [`Tree::find_tag`]
//!   or the `#tag` selector step.
//! - **name**: classification, not unique (field names are names), matched
//!   by the `.name` selector step.
//! - **lineage**: the node's type and every type it specializes, most
//!   derived first, ending in `Node`. Matched by the bare `kind` step and by
//!   [`Tree::find_containing`].

use crate::choice::Choice;
use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::number::Number;
use crate::resolve::Attr;
use crate::selector::SelectorIndex;
use crate::string::Str;
use crate::structure::Structure;
use crate::value::Scalar;
use crate::vector::Vector;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Index of a node in its [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Per-node re-entrancy latch for self-referential size computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderState {
    #[default]
    Idle,
    Rendering,
}

/// What a node is. Leaves hold their configuration and value; containers hold
/// child ids.
pub enum NodeKind {
    Number(Number),
    Str(Str),
    /// Zero-size marker.
    Null,
    Blob(Vec<NodeId>),
    Structure(Structure),
    Vector(Vector),
    Choice(Choice),
    Filter(Filter),
}

/// Fuzzing hook: a leaf carrying a mutator gets a new value on every
/// [`Tree::permute`].
pub trait Mutate {
    /// Return the next value for the leaf, or `None` to leave it unchanged.
    fn permute(&mut self, current: &Scalar) -> Option<Scalar>;
}

pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) tag: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) lineage: Rc<[String]>,
    pub(crate) rendered_offset: Cell<usize>,
    pub(crate) state: Cell<RenderState>,
    /// Value handed out for `EnclosingSize` while `state` is held.
    pub(crate) placeholder: Cell<u64>,
    pub(crate) mutator: Option<Box<dyn Mutate>>,
}

impl Node {
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Most-derived type first, `Node` last.
    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    pub fn type_name(&self) -> &str {
        self.lineage.first().map(String::as_str).unwrap_or("Node")
    }

    /// True if `kind` is this node's type or any type it specializes.
    pub fn is_a(&self, kind: &str) -> bool {
        self.lineage.iter().any(|k| k == kind)
    }

    /// Byte offset computed by the last render pass.
    pub fn rendered_offset(&self) -> usize {
        self.rendered_offset.get()
    }

    pub fn render_state(&self) -> RenderState {
        self.state.get()
    }
}

/// Build a lineage list: the given type names followed by `Node`.
pub(crate) fn lineage(names: &[&str]) -> Rc<[String]> {
    names
        .iter()
        .map(|s| s.to_string())
        .chain(std::iter::once("Node".to_string()))
        .collect()
}

/// Arena holding every node of one or more trees.
#[derive(Default)]
pub struct Tree {
    nodes: Vec<Node>,
    generation: u64,
    pub(crate) selector_cache: RefCell<Option<Rc<SelectorIndex>>>,
}

impl Tree {
    pub fn new() -> Self {
        Tree::default()
    }

    pub(crate) fn alloc(&mut self, kind: NodeKind, lineage: Rc<[String]>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            parent: None,
            tag: None,
            name: None,
            lineage,
            rendered_offset: Cell::new(0),
            state: Cell::new(RenderState::Idle),
            placeholder: Cell::new(0),
            mutator: None,
        });
        self.touch();
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Number of nodes ever allocated, reachable or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Bumped on every structural mutation; used to invalidate the selector index.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn touch(&mut self) {
        self.generation += 1;
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Direct children. Structure, Vector and Choice own exactly one body
    /// blob; Filter owns the node it decorates.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.node(id).kind {
            NodeKind::Blob(v) => v,
            NodeKind::Structure(s) => std::slice::from_ref(&s.body),
            NodeKind::Vector(v) => std::slice::from_ref(&v.body),
            NodeKind::Choice(c) => std::slice::from_ref(&c.body),
            NodeKind::Filter(f) => std::slice::from_ref(&f.inner),
            NodeKind::Number(_) | NodeKind::Str(_) | NodeKind::Null => &[],
        }
    }

    /// The blob that receives appended children of `id`.
    pub(crate) fn body_of(&self, id: NodeId) -> Result<NodeId> {
        match &self.node(id).kind {
            NodeKind::Blob(_) => Ok(id),
            NodeKind::Structure(s) => Ok(s.body),
            NodeKind::Vector(v) => Ok(v.body),
            NodeKind::Choice(c) => Ok(c.body),
            _ => Err(Error::Schema(format!(
                "{} is not a container",
                self.describe(id)
            ))),
        }
    }

    /// Append `child` to a container, parenting it. This is the only way
    /// children are added.
    pub fn append(&mut self, container: NodeId, child: NodeId) -> Result<()> {
        let body = self.body_of(container)?;
        if let NodeKind::Blob(v) = &mut self.node_mut(body).kind {
            v.push(child);
        }
        self.node_mut(child).parent = Some(body);
        self.touch();
        Ok(())
    }

    /// Put `child` at `index` of a blob in place of whatever was there.
    pub(crate) fn replace_child(&mut self, blob: NodeId, index: usize, child: NodeId) {
        if let NodeKind::Blob(v) = &mut self.node_mut(blob).kind {
            if let Some(slot) = v.get_mut(index) {
                *slot = child;
            }
        }
        self.node_mut(child).parent = Some(blob);
        self.touch();
    }

    pub(crate) fn clear_children(&mut self, blob: NodeId) {
        if let NodeKind::Blob(v) = &mut self.node_mut(blob).kind {
            v.clear();
        }
        self.touch();
    }

    pub fn set_tag(&mut self, id: NodeId, tag: impl Into<String>) {
        self.node_mut(id).tag = Some(tag.into());
        self.touch();
    }

    pub fn set_name(&mut self, id: NodeId, name: impl Into<String>) {
        self.node_mut(id).name = Some(name.into());
        self.touch();
    }

    /// Short human description for error messages.
    pub(crate) fn describe(&self, id: NodeId) -> String {
        let n = self.node(id);
        match &n.name {
            Some(name) => format!("{} \"{}\"", n.type_name(), name),
            None => n.type_name().to_string(),
        }
    }

    // ---- navigation ----

    pub fn root(&self, id: NodeId) -> NodeId {
        let mut p = id;
        while let Some(up) = self.parent(p) {
            p = up;
        }
        p
    }

    /// Position of `id` among its parent's children.
    pub fn place(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|&c| c == id)
    }

    /// Sibling at `place + delta` in the parent container.
    pub fn sibling(&self, id: NodeId, delta: isize) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let at = self.place(id)? as isize + delta;
        if at < 0 {
            return None;
        }
        self.children(parent).get(at as usize).copied()
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.sibling(id, 1)
    }

    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.sibling(id, -1)
    }

    /// Nearest enclosing structure of `id` (not `id` itself). Falls back to
    /// the root when no structure encloses it.
    pub fn parent_structure(&self, id: NodeId) -> NodeId {
        let mut p = id;
        while let Some(up) = self.parent(p) {
            p = up;
            if matches!(self.node(p).kind, NodeKind::Structure(_)) {
                break;
            }
        }
        p
    }

    /// Depth-first search for a tag below (and including) `from`. Not indexed.
    pub fn find_tag(&self, from: NodeId, tag: &str) -> Option<NodeId> {
        if self.node(from).tag.as_deref() == Some(tag) {
            return Some(from);
        }
        self.children(from)
            .iter()
            .find_map(|&c| self.find_tag(c, tag))
    }

    /// Like [`Tree::find_tag`], but returns the structure enclosing the tagged
    /// node: tag the first field of a header, get the header.
    pub fn find_tag_container(&self, from: NodeId, tag: &str) -> Option<NodeId> {
        self.find_tag(from, tag).map(|t| self.parent_structure(t))
    }

    /// Walk up from `id` to the first ancestor whose lineage includes `kind`.
    pub fn find_containing(&self, id: NodeId, kind: &str) -> Option<NodeId> {
        let mut p = self.parent(id);
        while let Some(n) = p {
            if self.node(n).is_a(kind) {
                return Some(n);
            }
            p = self.parent(n);
        }
        None
    }

    /// Preorder walk reaching every node below (and including) `id` exactly once.
    pub fn visit(&self, id: NodeId, f: &mut impl FnMut(&Tree, NodeId)) {
        f(self, id);
        for &c in self.children(id) {
            self.visit(c, f);
        }
    }

    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.visit(id, &mut |_, n| out.push(n));
        out
    }

    // ---- values ----

    /// The node's stored value: an immediate integer or byte string, or
    /// `Nil` if the value is still a deferred reference (or the node has none).
    pub fn value(&self, id: NodeId) -> Scalar {
        match &self.node(id).kind {
            NodeKind::Number(n) => match &n.value {
                Attr::Value(s) => s.clone(),
                Attr::Ref(_) => Scalar::Nil,
            },
            NodeKind::Str(s) => match &s.value {
                Attr::Value(v) => v.clone(),
                Attr::Ref(_) => Scalar::Nil,
            },
            _ => Scalar::Nil,
        }
    }

    /// Immediate integer value of a number node.
    pub fn int(&self, id: NodeId) -> Option<u64> {
        match &self.node(id).kind {
            NodeKind::Number(n) => match &n.value {
                Attr::Value(s) => s.as_number(),
                Attr::Ref(_) => None,
            },
            _ => None,
        }
    }

    /// Immediate byte value of a string node.
    pub fn bytes(&self, id: NodeId) -> Option<&[u8]> {
        match &self.node(id).kind {
            NodeKind::Str(s) => match &s.value {
                Attr::Value(v) => v.as_bytes(),
                Attr::Ref(_) => None,
            },
            _ => None,
        }
    }

    /// Assign a plain value, coerced through the node's existing type.
    pub fn set_value(&mut self, id: NodeId, value: impl Into<Scalar>) -> Result<()> {
        let value = value.into();
        let what = self.describe(id);
        match &mut self.node_mut(id).kind {
            NodeKind::Number(n) => {
                let x = match value {
                    Scalar::Bytes(_) => {
                        return Err(Error::InvalidValue(format!("bytes assigned to {}", what)))
                    }
                    other => other.as_number().unwrap_or(0),
                };
                n.value = Attr::Value(Scalar::Int(x));
                Ok(())
            }
            NodeKind::Str(s) => {
                let b = match value {
                    Scalar::Bytes(b) => b,
                    Scalar::Nil => Vec::new(),
                    Scalar::Int(_) | Scalar::Bool(_) => {
                        return Err(Error::InvalidValue(format!("integer assigned to {}", what)))
                    }
                };
                s.value = Attr::Value(Scalar::Bytes(b));
                Ok(())
            }
            _ => Err(Error::InvalidValue(format!(
                "{} holds no scalar value",
                what
            ))),
        }
    }

    /// Bind the node's value to a deferred reference (or an immediate).
    pub fn set_attr(&mut self, id: NodeId, attr: Attr) -> Result<()> {
        let what = self.describe(id);
        match &mut self.node_mut(id).kind {
            NodeKind::Number(n) => n.value = attr,
            NodeKind::Str(s) => s.value = attr,
            _ => return Err(Error::InvalidValue(format!("{} holds no scalar value", what))),
        }
        Ok(())
    }

    // ---- fuzz hook ----

    pub fn set_mutator(&mut self, id: NodeId, mutator: Box<dyn Mutate>) {
        self.node_mut(id).mutator = Some(mutator);
    }

    /// Run every leaf mutator below `root` once. Returns how many leaves changed.
    pub fn permute(&mut self, root: NodeId) -> Result<usize> {
        let mut changed = 0;
        for id in self.descendants(root) {
            if !self.children(id).is_empty() {
                continue;
            }
            let Some(mut m) = self.node_mut(id).mutator.take() else {
                continue;
            };
            let current = self.value(id);
            let next = m.permute(&current);
            self.node_mut(id).mutator = Some(m);
            if let Some(v) = next {
                self.set_value(id, v)?;
                changed += 1;
            }
        }
        Ok(changed)
    }
}
