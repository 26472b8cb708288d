//! CSS-like queries over an assembled tree.
//!
//! A selector is a list of whitespace-separated descendant steps, each
//! `kind`, `.name` and `#tag` (in that order, all optional, at least one
//! present):
//!
//! ```text
//! Header            every node whose lineage includes Header
//! .len              every node named len
//! #hdr .len         nodes named len below the node tagged hdr
//! Packet Str.body   Str nodes named body inside a Packet
//! ```
//!
//! Candidates for the last step come from an index (tag, name, lineage)
//! built over the queried subtree in one walk; the remaining steps must then
//! be matched, last to first, by proper ancestors on the way to the root.
//! Results come back in document order. The index is cached on the tree and
//! rebuilt whenever the tree has changed since it was built.

use crate::error::{Error, Result};
use crate::node::{Node, NodeId, Tree};
use pest::Parser;
use pest_derive::Parser as PestParser;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(PestParser)]
#[grammar = "selector.pest"]
struct SelectorParser;

/// One descendant step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Step {
    pub kind: Option<String>,
    pub name: Option<String>,
    pub tag: Option<String>,
}

impl Step {
    pub fn matches(&self, node: &Node) -> bool {
        self.tag.as_deref().map_or(true, |t| node.tag() == Some(t))
            && self.name.as_deref().map_or(true, |n| node.name() == Some(n))
            && self.kind.as_deref().map_or(true, |k| node.is_a(k))
    }
}

fn inner_ident(pair: pest::iterators::Pair<Rule>) -> String {
    pair.into_inner()
        .next()
        .map(|p| p.as_str().to_string())
        .unwrap_or_default()
}

/// Parse a selector expression into its steps.
pub fn parse_selector(text: &str) -> Result<Vec<Step>> {
    let pairs = SelectorParser::parse(Rule::selector, text)
        .map_err(|e| Error::InvalidSelector(format!("{}", e)))?;
    let mut steps = Vec::new();
    for pair in pairs.flatten().filter(|p| p.as_rule() == Rule::step) {
        let mut step = Step::default();
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::kind => step.kind = Some(part.as_str().to_string()),
                Rule::name => step.name = Some(inner_ident(part)),
                Rule::tag => step.tag = Some(inner_ident(part)),
                _ => {}
            }
        }
        steps.push(step);
    }
    Ok(steps)
}

fn lookup<'a>(map: &'a HashMap<String, Vec<NodeId>>, key: &Option<String>) -> Option<&'a [NodeId]> {
    key.as_ref()
        .map(|k| map.get(k).map(Vec::as_slice).unwrap_or(&[]))
}

/// Tag, name and lineage index over one subtree.
pub struct SelectorIndex {
    root: NodeId,
    generation: u64,
    tags: HashMap<String, Vec<NodeId>>,
    names: HashMap<String, Vec<NodeId>>,
    kinds: HashMap<String, Vec<NodeId>>,
}

impl SelectorIndex {
    fn build(tree: &Tree, root: NodeId) -> Self {
        let mut index = SelectorIndex {
            root,
            generation: tree.generation(),
            tags: HashMap::new(),
            names: HashMap::new(),
            kinds: HashMap::new(),
        };
        tree.visit(root, &mut |t, id| {
            let n = t.node(id);
            for k in n.lineage() {
                index.kinds.entry(k.clone()).or_default().push(id);
            }
            if let Some(tag) = n.tag() {
                index.tags.entry(tag.to_string()).or_default().push(id);
            }
            if let Some(name) = n.name() {
                index.names.entry(name.to_string()).or_default().push(id);
            }
        });
        index
    }

    /// Nodes matching one step, in document order.
    fn pool(&self, tree: &Tree, step: &Step) -> Vec<NodeId> {
        let smallest = [
            lookup(&self.tags, &step.tag),
            lookup(&self.names, &step.name),
            lookup(&self.kinds, &step.kind),
        ]
        .into_iter()
        .flatten()
        .min_by_key(|pool| pool.len())
        .unwrap_or(&[]);
        smallest
            .iter()
            .copied()
            .filter(|&id| step.matches(tree.node(id)))
            .collect()
    }
}

impl Tree {
    fn selector_index(&self, root: NodeId) -> Rc<SelectorIndex> {
        let mut cache = self.selector_cache.borrow_mut();
        match cache.as_ref() {
            Some(index) if index.root == root && index.generation == self.generation() => {
                Rc::clone(index)
            }
            _ => {
                tracing::trace!(root = root.index(), "building selector index");
                let index = Rc::new(SelectorIndex::build(self, root));
                *cache = Some(Rc::clone(&index));
                index
            }
        }
    }

    /// Every node below (and including) `root` matching `selector`.
    pub fn query(&self, root: NodeId, selector: &str) -> Result<Vec<NodeId>> {
        let mut steps = parse_selector(selector)?;
        let Some(last) = steps.pop() else {
            return Ok(Vec::new());
        };
        let index = self.selector_index(root);
        Ok(index
            .pool(self, &last)
            .into_iter()
            .filter(|&id| self.ancestors_match(id, &steps))
            .collect())
    }

    pub fn query_first(&self, root: NodeId, selector: &str) -> Result<Option<NodeId>> {
        Ok(self.query(root, selector)?.into_iter().next())
    }

    /// Consume `steps` from the end while walking up from `id`'s parent.
    fn ancestors_match(&self, id: NodeId, steps: &[Step]) -> bool {
        let mut pending = steps.iter().rev().peekable();
        let mut up = self.parent(id);
        while let (Some(step), Some(a)) = (pending.peek(), up) {
            if step.matches(self.node(a)) {
                pending.next();
            }
            up = self.parent(a);
        }
        pending.peek().is_none()
    }
}
