//! Render, capture and size: the per-kind dispatch every node goes through.
//!
//! Render walks the tree preorder, recording each node's byte offset as it
//! goes. Capture consumes input left to right, returning the unconsumed
//! remainder, and records the same offsets. Size is the rendered length
//! without allocating the whole output where a kind can say it directly.

use crate::error::Result;
use crate::node::{NodeId, NodeKind, Tree};

impl Tree {
    /// Render `id` to bytes, after running the `before_render` hooks of every
    /// structure below it.
    pub fn render(&mut self, id: NodeId) -> Result<Vec<u8>> {
        self.run_before_render(id)?;
        self.render_node(id, 0)
    }

    /// Render `id` as if it started at `offset`; returns the bytes and the
    /// offset just past them. Hooks are not run.
    pub fn render_at(&self, id: NodeId, offset: usize) -> Result<(Vec<u8>, usize)> {
        let bytes = self.render_node(id, offset)?;
        let next = offset + bytes.len();
        Ok((bytes, next))
    }

    pub(crate) fn render_node(&self, id: NodeId, offset: usize) -> Result<Vec<u8>> {
        let node = self.node(id);
        node.rendered_offset.set(offset);
        tracing::trace!(node = id.index(), kind = node.type_name(), offset, "render");
        match &node.kind {
            NodeKind::Number(n) => self.render_number(id, n),
            NodeKind::Str(s) => self.render_str(id, s),
            NodeKind::Null => Ok(Vec::new()),
            NodeKind::Blob(_) => self.render_blob(id, offset),
            NodeKind::Structure(s) => self.render_node(s.body, offset),
            NodeKind::Vector(v) => self.render_node(v.body, offset),
            NodeKind::Choice(c) => self.render_node(c.body, offset),
            NodeKind::Filter(f) => self.render_filter(f, offset),
        }
    }

    /// Parse `buf` into `id` and everything below it; returns the bytes left
    /// over.
    pub fn capture<'a>(&mut self, id: NodeId, buf: &'a [u8]) -> Result<&'a [u8]> {
        self.capture_node(id, buf)
    }

    pub(crate) fn capture_node<'a>(&mut self, id: NodeId, buf: &'a [u8]) -> Result<&'a [u8]> {
        let node = self.node(id);
        tracing::trace!(node = id.index(), kind = node.type_name(), left = buf.len(), "capture");
        let body = match &node.kind {
            NodeKind::Number(_) => return self.capture_number(id, buf),
            NodeKind::Str(_) => return self.capture_str(id, buf),
            NodeKind::Null => return Ok(buf),
            NodeKind::Blob(_) => return self.capture_blob(id, buf),
            NodeKind::Vector(_) => return self.capture_vector(id, buf),
            NodeKind::Choice(_) => return self.capture_choice(id, buf),
            NodeKind::Filter(_) => return self.capture_filter(id, buf),
            NodeKind::Structure(s) => s.body,
        };
        let offset = self.node(id).rendered_offset();
        self.node(body).rendered_offset.set(offset);
        self.capture_blob(body, buf)
    }

    /// Rendered length of `id` in bytes.
    pub fn size(&self, id: NodeId) -> Result<usize> {
        match &self.node(id).kind {
            NodeKind::Number(n) => self.number_size(id, n),
            NodeKind::Str(s) => Ok(self.render_str(id, s)?.len()),
            NodeKind::Null => Ok(0),
            NodeKind::Blob(_) => self.blob_size(id),
            NodeKind::Structure(s) => self.blob_size(s.body),
            NodeKind::Vector(v) => self.blob_size(v.body),
            NodeKind::Choice(c) => self.blob_size(c.body),
            NodeKind::Filter(f) => {
                let offset = self.node(id).rendered_offset();
                Ok(self.render_filter(f, offset)?.len())
            }
        }
    }
}
