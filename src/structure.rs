//! Named-field containers and their schema.
//!
//! A [`StructureType`] is an ordered list of `(field name, template)` entries
//! plus two hook lists: `at_create` hooks run once after the fields exist,
//! `before_render` hooks run before every [`Tree::render`]. Types are built
//! with [`StructureType::builder`] and may extend a base type: base fields come
//! first, and a field redeclared with the same name replaces the base field in
//! place.
//!
//! ```ignore
//! let header = StructureType::builder("Header")
//!     .field("kind", byte())
//!     .field("len", len(16))
//!     .field("body", Template::string(Str::new()))
//!     .finish()?;
//! ```

use crate::error::{Error, Result};
use crate::node::{NodeId, NodeKind, Tree};
use crate::resolve::{Attr, Method, Reference};
use crate::template::{Decides, Template};
use crate::value::Scalar;
use std::cell::OnceCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Callback run against a structure instance.
pub type Hook = Rc<dyn Fn(&mut Tree, NodeId) -> Result<()>>;

const RESERVED: &[&str] = &["value", "name", "size"];

pub struct StructureType {
    name: String,
    lineage: Rc<[String]>,
    fields: Vec<(String, Template)>,
    at_create: Vec<Hook>,
    before_render: Vec<Hook>,
    index: OnceCell<HashMap<String, usize>>,
    decider: Option<(usize, Decides)>,
}

impl StructureType {
    pub fn builder(name: impl Into<String>) -> StructureTypeBuilder {
        StructureTypeBuilder {
            name: name.into(),
            base: None,
            fields: Vec::new(),
            at_create: Vec::new(),
            before_render: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lineage(&self) -> Rc<[String]> {
        Rc::clone(&self.lineage)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Position of a field. The map is built on first use and kept for the
    /// type's lifetime.
    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.index
            .get_or_init(|| {
                self.fields
                    .iter()
                    .enumerate()
                    .map(|(i, (n, _))| (n.clone(), i))
                    .collect()
            })
            .get(field)
            .copied()
    }

    /// True if a field declares `decides`: the real type is picked from
    /// captured data.
    pub fn is_factory(&self) -> bool {
        self.decider.is_some()
    }

    pub(crate) fn decider(&self) -> Option<&(usize, Decides)> {
        self.decider.as_ref()
    }
}

pub struct StructureTypeBuilder {
    name: String,
    base: Option<Rc<[String]>>,
    fields: Vec<(String, Template)>,
    at_create: Vec<Hook>,
    before_render: Vec<Hook>,
}

impl StructureTypeBuilder {
    /// Inherit fields and hooks from `base`.
    pub fn extends(mut self, base: &Rc<StructureType>) -> Self {
        self.base = Some(base.lineage());
        self.fields = base.fields.clone();
        self.at_create = base.at_create.clone();
        self.before_render = base.before_render.clone();
        self
    }

    pub fn field(mut self, name: impl Into<String>, template: Template) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = template,
            None => self.fields.push((name, template)),
        }
        self
    }

    pub fn at_create(mut self, hook: impl Fn(&mut Tree, NodeId) -> Result<()> + 'static) -> Self {
        self.at_create.push(Rc::new(hook));
        self
    }

    pub fn before_render(
        mut self,
        hook: impl Fn(&mut Tree, NodeId) -> Result<()> + 'static,
    ) -> Self {
        self.before_render.push(Rc::new(hook));
        self
    }

    /// Set a field's value once the structure is created.
    pub fn override_value(self, field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        let field = field.into();
        let value = value.into();
        self.at_create(move |tree, s| tree.set(s, &field, value.clone()))
    }

    /// Bind `field`'s value to `method` applied to sibling field `to`.
    pub fn relate_value(
        self,
        field: impl Into<String>,
        to: impl Into<String>,
        method: Method,
    ) -> Self {
        let field = field.into();
        let to = to.into();
        self.at_create(move |tree, s| {
            let f = tree.field(s, &field)?;
            tree.set_attr(f, Attr::Ref(Reference::field(to.clone(), method.clone())))
        })
    }

    /// Bind string field `field`'s exact size to `method` applied to field `to`.
    pub fn relate_size(
        self,
        field: impl Into<String>,
        to: impl Into<String>,
        method: Method,
    ) -> Self {
        let field = field.into();
        let to = to.into();
        self.at_create(move |tree, s| {
            let f = tree.field(s, &field)?;
            let what = tree.describe(f);
            match &mut tree.node_mut(f).kind {
                NodeKind::Str(st) => {
                    st.size = Some(Attr::Ref(Reference::field(to.clone(), method.clone())));
                    Ok(())
                }
                _ => Err(Error::Schema(format!("{} has no size to relate", what))),
            }
        })
    }

    pub fn finish(self) -> Result<Rc<StructureType>> {
        for (n, _) in &self.fields {
            if RESERVED.contains(&n.as_str()) || n.starts_with("relate_") {
                return Err(Error::Schema(format!(
                    "field name \"{}\" is reserved (in struct \"{}\")",
                    n, self.name
                )));
            }
        }
        let mut lineage = vec![self.name.clone()];
        match &self.base {
            Some(base) => lineage.extend(base.iter().cloned()),
            None => lineage.extend(["Structure".to_string(), "Node".to_string()]),
        }
        let decider = self
            .fields
            .iter()
            .enumerate()
            .find_map(|(i, (_, t))| t.decides.clone().map(|d| (i, d)));
        Ok(Rc::new(StructureType {
            name: self.name,
            lineage: lineage.into(),
            fields: self.fields,
            at_create: self.at_create,
            before_render: self.before_render,
            index: OnceCell::new(),
            decider,
        }))
    }
}

/// A structure instance: its type and the blob holding its fields.
pub struct Structure {
    pub(crate) body: NodeId,
    pub(crate) ty: Rc<StructureType>,
}

impl Structure {
    pub fn ty(&self) -> &Rc<StructureType> {
        &self.ty
    }
}

impl Tree {
    pub(crate) fn instantiate_structure(
        &mut self,
        ty: &Rc<StructureType>,
        lineage: Rc<[String]>,
    ) -> Result<NodeId> {
        let body = self.alloc_body();
        let id = self.alloc(
            NodeKind::Structure(Structure {
                body,
                ty: Rc::clone(ty),
            }),
            lineage,
        );
        self.node_mut(body).parent = Some(id);
        for (name, template) in &ty.fields {
            let f = self.instantiate(template)?;
            self.node_mut(f).name = Some(name.clone());
            self.append(id, f)?;
        }
        for hook in &ty.at_create {
            hook(self, id)?;
        }
        Ok(id)
    }

    /// Build a fresh instance of a structure type.
    pub fn create(&mut self, ty: &Rc<StructureType>) -> Result<NodeId> {
        self.instantiate(&Template::structure(ty))
    }

    pub fn structure_type(&self, id: NodeId) -> Option<&Rc<StructureType>> {
        match &self.node(id).kind {
            NodeKind::Structure(s) => Some(&s.ty),
            _ => None,
        }
    }

    /// Field `name` of structure `s`.
    pub fn field(&self, s: NodeId, name: &str) -> Result<NodeId> {
        let NodeKind::Structure(st) = &self.node(s).kind else {
            return Err(Error::unresolved(format!(
                "field \"{}\" looked up on {}, which is not a structure",
                name,
                self.describe(s)
            )));
        };
        st.ty
            .index_of(name)
            .and_then(|i| self.children(st.body).get(i).copied())
            .ok_or_else(|| {
                Error::unresolved(format!("no field \"{}\" in struct \"{}\"", name, st.ty.name))
            })
    }

    /// Field at position `index` of structure `s`.
    pub fn field_at(&self, s: NodeId, index: usize) -> Option<NodeId> {
        let body = self.body_of(s).ok()?;
        self.children(body).get(index).copied()
    }

    /// Resolved value of a scalar field.
    pub fn get(&self, s: NodeId, name: &str) -> Result<Scalar> {
        let f = self.field(s, name)?;
        match &self.node(f).kind {
            NodeKind::Number(n) => self.resolve(f, &n.value),
            NodeKind::Str(st) => self.resolve(f, &st.value),
            _ => Ok(Scalar::Nil),
        }
    }

    /// Assign a plain value to a field, coerced through the field's type.
    pub fn set(&mut self, s: NodeId, name: &str, value: impl Into<Scalar>) -> Result<()> {
        let f = self.field(s, name)?;
        self.set_value(f, value)
    }

    /// Run the `before_render` hooks of every structure below `root`, outermost
    /// first.
    pub(crate) fn run_before_render(&mut self, root: NodeId) -> Result<()> {
        let pending: Vec<(NodeId, Rc<StructureType>)> = self
            .descendants(root)
            .into_iter()
            .filter_map(|id| self.structure_type(id).map(|t| (id, Rc::clone(t))))
            .filter(|(_, t)| !t.before_render.is_empty())
            .collect();
        for (id, ty) in pending {
            for hook in &ty.before_render {
                hook(self, id)?;
            }
        }
        Ok(())
    }
}
