//! Repeated elements, counted or running to the end of the input.
//!
//! Elements are all built from one template, or picked per element from a
//! keyed table: the key comes from a field of the enclosing structure or from
//! a callback peeking at the remaining input.

use crate::error::{Error, Result};
use crate::node::{NodeId, NodeKind, Tree};
use crate::resolve::Attr;
use crate::template::Template;
use crate::value::Scalar;
use std::collections::HashMap;
use std::rc::Rc;

/// Computes an element key from the remaining input.
pub type KeyFn = Rc<dyn Fn(&Tree, NodeId, &[u8]) -> Result<Scalar>>;

#[derive(Clone)]
pub enum ElementKey {
    /// Raw value of a field of the enclosing structure.
    Field(String),
    Peek(KeyFn),
}

impl ElementKey {
    pub fn peek(f: impl Fn(&Tree, NodeId, &[u8]) -> Result<Scalar> + 'static) -> Self {
        ElementKey::Peek(Rc::new(f))
    }
}

#[derive(Clone)]
pub(crate) enum Element {
    Homogeneous(Box<Template>),
    Keyed {
        types: Rc<HashMap<Scalar, Template>>,
        key: ElementKey,
    },
}

#[derive(Clone)]
pub enum Count {
    Fixed(Attr),
    /// Capture until the input runs out.
    Unlimited,
}

#[derive(Clone, Default)]
pub struct VectorSpec {
    pub(crate) element: Option<Element>,
    pub(crate) count: Option<Count>,
}

impl VectorSpec {
    pub fn of(element: Template) -> Self {
        VectorSpec {
            element: Some(Element::Homogeneous(Box::new(element))),
            count: None,
        }
    }

    pub fn keyed<I, K>(types: I, key: ElementKey) -> Self
    where
        I: IntoIterator<Item = (K, Template)>,
        K: Into<Scalar>,
    {
        VectorSpec {
            element: Some(Element::Keyed {
                types: Rc::new(types.into_iter().map(|(k, t)| (k.into(), t)).collect()),
                key,
            }),
            count: None,
        }
    }

    pub fn count(mut self, count: impl Into<Attr>) -> Self {
        self.count = Some(Count::Fixed(count.into()));
        self
    }

    pub fn unlimited(mut self) -> Self {
        self.count = Some(Count::Unlimited);
        self
    }
}

pub struct Vector {
    pub(crate) body: NodeId,
    pub(crate) spec: VectorSpec,
}

impl Vector {
    /// Count recorded by the last capture, if it is an immediate.
    ///
    /// Capture replaces the count attribute with the number of elements it
    /// read, so a count that referred to a sibling is gone afterwards. A
    /// captured tree is single-use for capture: capturing it again reuses
    /// the old count. Instantiate a fresh tree for each input.
    pub fn captured_count(&self) -> Option<u64> {
        match &self.spec.count {
            Some(Count::Fixed(Attr::Value(v))) => v.as_u64(),
            _ => None,
        }
    }
}

impl Tree {
    pub(crate) fn instantiate_vector(
        &mut self,
        spec: &VectorSpec,
        lineage: Rc<[String]>,
    ) -> Result<NodeId> {
        if spec.element.is_none() {
            return Err(Error::Schema("vector needs an element type".into()));
        }
        let body = self.alloc_body();
        let id = self.alloc(
            NodeKind::Vector(Vector {
                body,
                spec: spec.clone(),
            }),
            lineage,
        );
        self.node_mut(body).parent = Some(id);
        Ok(id)
    }

    fn vector(&self, id: NodeId) -> Result<&Vector> {
        match &self.node(id).kind {
            NodeKind::Vector(v) => Ok(v),
            _ => Err(Error::InvalidValue(format!(
                "{} is not a vector",
                self.describe(id)
            ))),
        }
    }

    /// Append a new element built from a homogeneous vector's template.
    pub fn push_element(&mut self, v: NodeId) -> Result<NodeId> {
        let template = match &self.vector(v)?.spec.element {
            Some(Element::Homogeneous(t)) => t.as_ref().clone(),
            _ => {
                return Err(Error::Schema(format!(
                    "{} is keyed; use push_keyed",
                    self.describe(v)
                )))
            }
        };
        let e = self.instantiate(&template)?;
        self.append(v, e)?;
        Ok(e)
    }

    /// Append a new element of the type registered under `key`.
    pub fn push_keyed(&mut self, v: NodeId, key: impl Into<Scalar>) -> Result<NodeId> {
        let key = key.into();
        let template = self.element_for_key(v, &key)?;
        let e = self.instantiate(&template)?;
        self.append(v, e)?;
        Ok(e)
    }

    fn element_for_key(&self, v: NodeId, key: &Scalar) -> Result<Template> {
        match &self.vector(v)?.spec.element {
            Some(Element::Keyed { types, .. }) => types.get(key).cloned().ok_or_else(|| {
                Error::Dispatch(format!("no type for key {:?} in {}", key, self.describe(v)))
            }),
            _ => Err(Error::Schema(format!("{} is not keyed", self.describe(v)))),
        }
    }

    fn next_element(&self, v: NodeId, rest: &[u8]) -> Result<Template> {
        match &self.vector(v)?.spec.element {
            Some(Element::Homogeneous(t)) => Ok(t.as_ref().clone()),
            Some(Element::Keyed { key, .. }) => {
                let k = match key {
                    ElementKey::Field(name) => {
                        let f = self.field(self.parent_structure(v), name)?;
                        self.value(f)
                    }
                    ElementKey::Peek(f) => f(self, v, rest)?,
                };
                self.element_for_key(v, &k)
            }
            None => Err(Error::Schema("vector needs an element type".into())),
        }
    }

    pub(crate) fn capture_vector<'a>(&mut self, id: NodeId, buf: &'a [u8]) -> Result<&'a [u8]> {
        let (body, count) = {
            let v = self.vector(id)?;
            (v.body, v.spec.count.clone())
        };
        let mut remaining = match count {
            None => {
                return Err(Error::Schema(format!(
                    "{} has no count and is not unlimited",
                    self.describe(id)
                )))
            }
            Some(Count::Unlimited) => None,
            Some(Count::Fixed(attr)) => match self.resolve(id, &attr)?.as_u64() {
                Some(n) => Some(n),
                None => {
                    return Err(Error::unresolved(format!(
                        "count of {} did not resolve",
                        self.describe(id)
                    )))
                }
            },
        };

        self.clear_children(body);
        let mut offset = self.node(id).rendered_offset();
        let mut rest = buf;
        while remaining != Some(0) && !rest.is_empty() {
            let template = self.next_element(id, rest)?;
            let e = self.instantiate(&template)?;
            self.append(id, e)?;
            self.node(e).rendered_offset.set(offset);
            let after = self.capture_node(e, rest)?;
            let used = rest.len() - after.len();
            rest = after;
            offset += used;
            remaining = remaining.map(|n| n - 1);
            if used == 0 {
                tracing::warn!(node = id.index(), "vector element consumed no input; stopping");
                break;
            }
        }

        let n = self.children(body).len();
        tracing::debug!(node = id.index(), count = n, "captured vector");
        if let NodeKind::Vector(v) = &mut self.node_mut(id).kind {
            v.spec.count = Some(Count::Fixed(Attr::Value(Scalar::Int(n as u64))));
        }
        Ok(rest)
    }

    /// A count that resolves to zero needs no input.
    pub(crate) fn vector_needs_input(&self, id: NodeId, v: &Vector) -> bool {
        !matches!(
            &v.spec.count,
            Some(Count::Fixed(attr)) if self.resolve(id, attr).ok().and_then(|c| c.as_u64()) == Some(0)
        )
    }
}
