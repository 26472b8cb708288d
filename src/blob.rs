//! Ordered containers: render, capture and size of a blob's children, and
//! factory substitution during capture.

use crate::error::{Error, Result};
use crate::node::{NodeId, NodeKind, Tree};

impl Tree {
    pub(crate) fn render_blob(&self, blob: NodeId, offset: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut at = offset;
        for &child in self.children(blob) {
            let bytes = self.render_node(child, at)?;
            at += bytes.len();
            out.extend_from_slice(&bytes);
        }
        Ok(out)
    }

    pub(crate) fn blob_size(&self, blob: NodeId) -> Result<usize> {
        self.children(blob)
            .iter()
            .try_fold(0, |acc, &c| Ok(acc + self.size(c)?))
    }

    /// `at item N named "x" in struct "T"`
    fn item_context(&self, index: usize, child: NodeId) -> String {
        let mut at = format!("at item {}", index);
        if let Some(name) = self.node(child).name() {
            at.push_str(&format!(" named \"{}\"", name));
        }
        if let Some(s) = self.find_containing(child, "Structure") {
            at.push_str(&format!(" in struct \"{}\"", self.node(s).type_name()));
        }
        at
    }

    /// False for children that take no bytes of their own: markers, trailing
    /// span members, empty vectors and zero-size strings.
    pub(crate) fn needs_input(&self, id: NodeId) -> bool {
        match &self.node(id).kind {
            NodeKind::Null => false,
            NodeKind::Number(_) => self.number_needs_input(id),
            NodeKind::Str(s) => self.str_needs_input(id, s),
            NodeKind::Vector(v) => self.vector_needs_input(id, v),
            NodeKind::Blob(children) => children.iter().any(|&c| self.needs_input(c)),
            NodeKind::Structure(s) => self.needs_input(s.body),
            NodeKind::Filter(f) => self.needs_input(f.inner),
            NodeKind::Choice(_) => true,
        }
    }

    pub(crate) fn capture_blob<'a>(&mut self, blob: NodeId, buf: &'a [u8]) -> Result<&'a [u8]> {
        let base = self.node(blob).rendered_offset();
        let mut rest = buf;
        let count = self.children(blob).len();
        for i in 0..count {
            let child = self.children(blob)[i];
            if rest.is_empty() && self.needs_input(child) {
                return Err(Error::incomplete(self.item_context(i, child)));
            }
            self.node(child)
                .rendered_offset
                .set(base + (buf.len() - rest.len()));
            let factory = self.structure_type(child).is_some_and(|t| t.is_factory());
            rest = if factory {
                self.capture_factory(blob, i, child, rest)
            } else {
                self.capture_node(child, rest)
            }
            .map_err(|e| e.context(&self.item_context(i, child)))?;
        }
        Ok(rest)
    }

    /// Capture with the declared (probe) type, read the deciding field, and
    /// if it names a concrete type, re-capture the same bytes as that type in
    /// the probe's place. With no match the probe stays.
    fn capture_factory<'a>(
        &mut self,
        blob: NodeId,
        index: usize,
        probe: NodeId,
        buf: &'a [u8],
    ) -> Result<&'a [u8]> {
        let after_probe = self.capture_node(probe, buf)?;
        let Some((field_index, table)) = self
            .structure_type(probe)
            .and_then(|t| t.decider().cloned())
        else {
            return Ok(after_probe);
        };
        let key = self.field_at(probe, field_index).and_then(|f| self.int(f));
        let Some(concrete) = key.and_then(|k| table.get(&k)).cloned() else {
            tracing::debug!(node = probe.index(), ?key, "factory kept probe type");
            return Ok(after_probe);
        };
        tracing::debug!(node = probe.index(), ?key, ty = concrete.name(), "factory resolved");

        let real = self.create(&concrete)?;
        let (name, tag) = {
            let p = self.node(probe);
            (p.name.clone(), p.tag.clone())
        };
        let n = self.node_mut(real);
        n.name = name;
        n.tag = tag;
        self.replace_child(blob, index, real);
        self.node(real)
            .rendered_offset
            .set(self.node(probe).rendered_offset());
        self.capture_node(real, buf)
    }
}
