//! Single-slot dispatch: what fills the slot is decided during capture.
//!
//! A plain choice runs a callback that appends the chosen node into the
//! choice and captures it. A dictionary looks a key up in a table of
//! templates; the key is an immediate, the raw value of a tagged node, or the
//! result of a callback that may also carve out the sub-buffer the entry must
//! consume.

use crate::error::{Error, Result};
use crate::node::{NodeId, NodeKind, Tree};
use crate::template::Template;
use crate::value::Scalar;
use std::collections::HashMap;
use std::rc::Rc;

/// Fills a choice from the input and returns what is left.
pub type ChoiceFn = Rc<dyn for<'a> Fn(&mut Tree, NodeId, &'a [u8]) -> Result<&'a [u8]>>;

/// Picks a dictionary key from the input.
pub type SelectFn = Rc<dyn for<'a> Fn(&Tree, NodeId, &'a [u8]) -> Result<Selected<'a>>>;

/// A dictionary key, optionally with the bytes the chosen entry must consume
/// and the bytes that follow them.
pub struct Selected<'a> {
    pub key: Scalar,
    pub split: Option<(&'a [u8], &'a [u8])>,
}

impl<'a> Selected<'a> {
    pub fn key(key: impl Into<Scalar>) -> Self {
        Selected {
            key: key.into(),
            split: None,
        }
    }

    pub fn split(key: impl Into<Scalar>, sub: &'a [u8], rest: &'a [u8]) -> Self {
        Selected {
            key: key.into(),
            split: Some((sub, rest)),
        }
    }
}

#[derive(Clone)]
pub enum DictKey {
    Value(Scalar),
    /// Raw value of the node with this tag, searched from the root.
    Tag(String),
    Callback(SelectFn),
}

impl DictKey {
    pub fn callback(
        f: impl for<'a> Fn(&Tree, NodeId, &'a [u8]) -> Result<Selected<'a>> + 'static,
    ) -> Self {
        DictKey::Callback(Rc::new(f))
    }
}

pub struct DictionarySpec {
    key: DictKey,
    entries: HashMap<Scalar, Template>,
    default: Option<Template>,
    strict: bool,
}

impl DictionarySpec {
    pub fn new(key: DictKey) -> Self {
        DictionarySpec {
            key,
            entries: HashMap::new(),
            default: None,
            strict: false,
        }
    }

    pub fn entry(mut self, key: impl Into<Scalar>, template: Template) -> Self {
        self.entries.insert(key.into(), template);
        self
    }

    pub fn default(mut self, template: Template) -> Self {
        self.default = Some(template);
        self
    }

    /// Fail with a dispatch error, instead of leaving the slot empty, when no
    /// entry matches.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    fn lookup(&self, key: &Scalar) -> Option<&Template> {
        self.entries.get(key).or(self.default.as_ref())
    }
}

#[derive(Clone)]
pub(crate) enum Selection {
    Callback(ChoiceFn),
    Dictionary(Rc<DictionarySpec>),
}

pub struct Choice {
    pub(crate) body: NodeId,
    pub(crate) selection: Selection,
}

impl Tree {
    fn alloc_choice(&mut self, selection: Selection, lineage: Rc<[String]>) -> NodeId {
        let body = self.alloc_body();
        let id = self.alloc(NodeKind::Choice(Choice { body, selection }), lineage);
        self.node_mut(body).parent = Some(id);
        id
    }

    pub(crate) fn instantiate_choice(&mut self, f: ChoiceFn, lineage: Rc<[String]>) -> NodeId {
        self.alloc_choice(Selection::Callback(f), lineage)
    }

    pub(crate) fn instantiate_dictionary(
        &mut self,
        spec: Rc<DictionarySpec>,
        lineage: Rc<[String]>,
    ) -> NodeId {
        self.alloc_choice(Selection::Dictionary(spec), lineage)
    }

    /// Current content of a choice's slot.
    pub fn selected(&self, choice: NodeId) -> Option<NodeId> {
        match &self.node(choice).kind {
            NodeKind::Choice(c) => self.children(c.body).first().copied(),
            _ => None,
        }
    }

    /// Fill a choice's slot by hand (for rendering), replacing what was there.
    pub fn select(&mut self, choice: NodeId, template: &Template) -> Result<NodeId> {
        let body = match &self.node(choice).kind {
            NodeKind::Choice(c) => c.body,
            _ => {
                return Err(Error::InvalidValue(format!(
                    "{} is not a choice",
                    self.describe(choice)
                )))
            }
        };
        let node = self.instantiate(template)?;
        self.clear_children(body);
        self.append(choice, node)?;
        Ok(node)
    }

    pub(crate) fn capture_choice<'a>(&mut self, id: NodeId, buf: &'a [u8]) -> Result<&'a [u8]> {
        let (body, selection) = match &self.node(id).kind {
            NodeKind::Choice(c) => (c.body, c.selection.clone()),
            _ => return Ok(buf),
        };
        match selection {
            Selection::Callback(f) => {
                self.clear_children(body);
                f(self, id, buf)
            }
            Selection::Dictionary(d) => self.capture_dictionary(id, &d, buf),
        }
    }

    fn capture_dictionary<'a>(
        &mut self,
        id: NodeId,
        d: &DictionarySpec,
        buf: &'a [u8],
    ) -> Result<&'a [u8]> {
        let mut split = None;
        let key = match &d.key {
            DictKey::Value(v) => v.clone(),
            DictKey::Tag(t) => self
                .find_tag(self.root(id), t)
                .map(|n| self.value(n))
                .unwrap_or_default(),
            DictKey::Callback(f) => {
                let sel = f(self, id, buf)?;
                split = sel.split;
                sel.key
            }
        };

        let Some(template) = d.lookup(&key) else {
            if d.strict {
                return Err(Error::Dispatch(format!(
                    "no entry for key {:?} in {}",
                    key,
                    self.describe(id)
                )));
            }
            tracing::debug!(node = id.index(), ?key, "dictionary has no entry; slot left empty");
            return Ok(buf);
        };
        tracing::debug!(node = id.index(), ?key, "dictionary selected entry");

        let node = self.select(id, template)?;
        self.node(node)
            .rendered_offset
            .set(self.node(id).rendered_offset());
        match split {
            Some((sub, rest)) => {
                let left = self.capture_node(node, sub)?;
                if !left.is_empty() {
                    tracing::warn!(
                        node = id.index(),
                        left = left.len(),
                        "dictionary entry did not consume its sub-buffer"
                    );
                    return Ok(&[]);
                }
                Ok(rest)
            }
            None => self.capture_node(node, buf),
        }
    }
}
