//! Decorator passing a node's rendered bytes through a transform.

use crate::error::Result;
use crate::node::{NodeId, NodeKind, Tree};
use std::rc::Rc;

pub type BytesFn = Rc<dyn Fn(Vec<u8>) -> Vec<u8>>;

#[derive(Clone)]
pub struct FilterSpec {
    transform: BytesFn,
    inverse: Option<BytesFn>,
}

impl FilterSpec {
    pub fn new(transform: impl Fn(Vec<u8>) -> Vec<u8> + 'static) -> Self {
        FilterSpec {
            transform: Rc::new(transform),
            inverse: None,
        }
    }

    /// Undo the transform before the inner node captures. Without one, the
    /// inner node captures the raw input.
    pub fn inverse(mut self, inverse: impl Fn(Vec<u8>) -> Vec<u8> + 'static) -> Self {
        self.inverse = Some(Rc::new(inverse));
        self
    }
}

pub struct Filter {
    pub(crate) inner: NodeId,
    pub(crate) spec: FilterSpec,
}

impl Tree {
    pub(crate) fn instantiate_filter(
        &mut self,
        inner: NodeId,
        spec: &FilterSpec,
        lineage: Rc<[String]>,
    ) -> NodeId {
        let id = self.alloc(
            NodeKind::Filter(Filter {
                inner,
                spec: spec.clone(),
            }),
            lineage,
        );
        self.node_mut(inner).parent = Some(id);
        id
    }

    pub(crate) fn render_filter(&self, f: &Filter, offset: usize) -> Result<Vec<u8>> {
        let raw = self.render_node(f.inner, offset)?;
        Ok((f.spec.transform)(raw))
    }

    /// With an inverse, the inner node captures the decoded input and the
    /// filter consumes as many bytes as the node re-encodes to.
    pub(crate) fn capture_filter<'a>(&mut self, id: NodeId, buf: &'a [u8]) -> Result<&'a [u8]> {
        let (inner, spec) = match &self.node(id).kind {
            NodeKind::Filter(f) => (f.inner, f.spec.clone()),
            _ => return Ok(buf),
        };
        let offset = self.node(id).rendered_offset();
        self.node(inner).rendered_offset.set(offset);
        let Some(inverse) = &spec.inverse else {
            return self.capture_node(inner, buf);
        };
        let decoded = inverse(buf.to_vec());
        self.capture_node(inner, &decoded)?;
        let encoded = (spec.transform)(self.render_node(inner, offset)?);
        Ok(&buf[encoded.len().min(buf.len())..])
    }
}
