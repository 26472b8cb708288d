//! Templates: a node kind plus its options, instantiated into a [`Tree`].
//!
//! A structure type is a list of named templates; vectors and dictionaries
//! keep templates around and instantiate them during capture. Templates are
//! cheap to clone (containers share their nested types behind `Rc`).

use crate::choice::{ChoiceFn, DictionarySpec};
use crate::error::Result;
use crate::filter::FilterSpec;
use crate::node::{self, NodeId, NodeKind, Tree};
use crate::number::{Endianness, Number};
use crate::resolve::{Attr, Method, Reference};
use crate::string::Str;
use crate::structure::StructureType;
use crate::value::Scalar;
use crate::vector::VectorSpec;
use std::collections::HashMap;
use std::rc::Rc;

/// Value → concrete structure type, declared on the field that decides a
/// factory structure's real type.
pub type Decides = Rc<HashMap<u64, Rc<StructureType>>>;

#[derive(Clone)]
pub(crate) enum TemplateKind {
    Number(Number),
    Str(Str),
    Null,
    Blob(Vec<Template>),
    Structure(Rc<StructureType>),
    Vector(VectorSpec),
    Choice(ChoiceFn),
    Dictionary(Rc<DictionarySpec>),
    Filter(Box<Template>, FilterSpec),
}

#[derive(Clone)]
pub struct Template {
    pub(crate) kind: TemplateKind,
    pub(crate) name: Option<String>,
    pub(crate) tag: Option<String>,
    pub(crate) lineage: Option<Rc<[String]>>,
    pub(crate) decides: Option<Decides>,
}

impl Template {
    fn of(kind: TemplateKind) -> Self {
        Template {
            kind,
            name: None,
            tag: None,
            lineage: None,
            decides: None,
        }
    }

    pub fn number(n: Number) -> Self {
        Template::of(TemplateKind::Number(n))
    }

    pub fn string(s: Str) -> Self {
        Template::of(TemplateKind::Str(s))
    }

    pub fn null() -> Self {
        Template::of(TemplateKind::Null)
    }

    pub fn blob(children: Vec<Template>) -> Self {
        Template::of(TemplateKind::Blob(children))
    }

    pub fn structure(ty: &Rc<StructureType>) -> Self {
        Template::of(TemplateKind::Structure(Rc::clone(ty)))
    }

    pub fn vector(spec: VectorSpec) -> Self {
        Template::of(TemplateKind::Vector(spec))
    }

    /// A single slot filled at capture time by `select`, which must append the
    /// chosen node into the choice and capture it.
    pub fn choice(
        select: impl for<'a> Fn(&mut Tree, NodeId, &'a [u8]) -> Result<&'a [u8]> + 'static,
    ) -> Self {
        Template::of(TemplateKind::Choice(Rc::new(select)))
    }

    pub fn dictionary(spec: DictionarySpec) -> Self {
        Template::of(TemplateKind::Dictionary(Rc::new(spec)))
    }

    pub fn filter(inner: Template, spec: FilterSpec) -> Self {
        Template::of(TemplateKind::Filter(Box::new(inner), spec))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Make this field decide the concrete type of its enclosing structure.
    pub fn decides<I>(mut self, table: I) -> Self
    where
        I: IntoIterator<Item = (u64, Rc<StructureType>)>,
    {
        self.decides = Some(Rc::new(table.into_iter().collect()));
        self
    }

    /// Initial value for a number or string field; ignored on containers.
    pub fn with_value(mut self, value: impl Into<Attr>) -> Self {
        match &mut self.kind {
            TemplateKind::Number(n) => n.value = value.into(),
            TemplateKind::Str(s) => s.value = value.into(),
            _ => {}
        }
        self
    }

    pub(crate) fn with_lineage(mut self, names: &[&str]) -> Self {
        self.lineage = Some(node::lineage(names));
        self
    }

    pub fn lineage(&self) -> Rc<[String]> {
        if let Some(l) = &self.lineage {
            return Rc::clone(l);
        }
        match &self.kind {
            TemplateKind::Number(_) => node::lineage(&["Number"]),
            TemplateKind::Str(_) => node::lineage(&["Str"]),
            TemplateKind::Null => node::lineage(&["Null"]),
            TemplateKind::Blob(_) => node::lineage(&["Blob"]),
            TemplateKind::Structure(ty) => ty.lineage(),
            TemplateKind::Vector(_) => node::lineage(&["Vector"]),
            TemplateKind::Choice(_) => node::lineage(&["Choice"]),
            TemplateKind::Dictionary(_) => node::lineage(&["Dictionary", "Choice"]),
            TemplateKind::Filter(..) => node::lineage(&["Filter"]),
        }
    }
}

impl Tree {
    /// Build a node (and, for containers, everything below it) from a template.
    pub fn instantiate(&mut self, t: &Template) -> Result<NodeId> {
        let lineage = t.lineage();
        let id = match &t.kind {
            TemplateKind::Number(n) => {
                n.validate()?;
                self.alloc(NodeKind::Number(n.clone()), lineage)
            }
            TemplateKind::Str(s) => self.alloc(NodeKind::Str(s.clone()), lineage),
            TemplateKind::Null => self.alloc(NodeKind::Null, lineage),
            TemplateKind::Blob(children) => {
                let id = self.alloc(NodeKind::Blob(Vec::new()), lineage);
                for c in children {
                    let child = self.instantiate(c)?;
                    self.append(id, child)?;
                }
                id
            }
            TemplateKind::Structure(ty) => self.instantiate_structure(ty, lineage)?,
            TemplateKind::Vector(spec) => self.instantiate_vector(spec, lineage)?,
            TemplateKind::Choice(f) => self.instantiate_choice(Rc::clone(f), lineage),
            TemplateKind::Dictionary(d) => self.instantiate_dictionary(Rc::clone(d), lineage),
            TemplateKind::Filter(inner, spec) => {
                let inner = self.instantiate(inner)?;
                self.instantiate_filter(inner, spec, lineage)
            }
        };
        let n = self.node_mut(id);
        if let Some(name) = &t.name {
            n.name = Some(name.clone());
        }
        if let Some(tag) = &t.tag {
            n.tag = Some(tag.clone());
        }
        self.touch();
        Ok(id)
    }

    /// Empty blob to serve as a container's body; the caller parents it.
    pub(crate) fn alloc_body(&mut self) -> NodeId {
        self.alloc(NodeKind::Blob(Vec::new()), node::lineage(&["Blob"]))
    }
}

// ---- shortcuts ----

pub fn byte() -> Template {
    Template::number(Number::new(8))
}

pub fn le16() -> Template {
    Template::number(Number::new(16))
}

pub fn be16() -> Template {
    Template::number(Number::new(16).endian(Endianness::Big))
}

pub fn le32() -> Template {
    Template::number(Number::new(32))
}

pub fn be32() -> Template {
    Template::number(Number::new(32).endian(Endianness::Big))
}

pub fn le64() -> Template {
    Template::number(Number::new(64))
}

pub fn be64() -> Template {
    Template::number(Number::new(64).endian(Endianness::Big))
}

pub fn bit() -> Template {
    Template::number(Number::new(1))
}

pub fn nibble() -> Template {
    Template::number(Number::new(4))
}

/// Big-endian `width`-bit field holding the size of the next field.
pub fn len(width: u32) -> Template {
    Template::number(
        Number::new(width)
            .endian(Endianness::Big)
            .value(Reference::next(Method::Size)),
    )
}

/// Like [`len`], counting 16-bit words.
pub fn word_len(width: u32) -> Template {
    Template::number(
        Number::new(width)
            .endian(Endianness::Big)
            .value(Reference::next(Method::Size).transform(|s| {
                Scalar::Int(s.as_number().unwrap_or(0) / 2)
            })),
    )
}

/// Big-endian `width`-bit field holding the size of the structure it sits in,
/// itself included.
pub fn msg_len(width: u32) -> Template {
    Template::number(
        Number::new(width)
            .endian(Endianness::Big)
            .value(Reference::this(Method::EnclosingSize)),
    )
}

/// ASCII decimal numeral.
pub fn decimal() -> Template {
    Template::number(Number::new(64).ascii(10)).with_lineage(&["Decimal", "Number"])
}

/// ASCII hexadecimal numeral.
pub fn hex_number() -> Template {
    Template::number(Number::new(64).ascii(16)).with_lineage(&["HexNumber", "Number"])
}

/// String whose length is the previous field's value.
pub fn bounded() -> Template {
    Template::string(Str::new().size(Reference::prev(Method::Value)))
}

pub fn asciiz() -> Template {
    Template::string(Str::new().nul_terminated()).with_lineage(&["Asciiz", "Str"])
}

pub fn unicode() -> Template {
    Template::string(Str::new().unicode()).with_lineage(&["Unicode", "Str"])
}

pub fn unicodez() -> Template {
    Template::string(Str::new().unicode().nul_terminated())
        .with_lineage(&["Unicodez", "Unicode", "Str"])
}

/// Zero-size marker, typically tagged.
pub fn mark() -> Template {
    Template::null()
}

/// Zero bytes padding the rendered offset up to a multiple of `multiple`,
/// counted from the node tagged `base` (or from the root).
pub fn align_pad(multiple: usize, base: Option<&str>) -> Template {
    let base = base.map(str::to_string);
    let width = Method::custom(move |tree: &Tree, id: NodeId| {
        let anchor = match &base {
            Some(tag) => tree
                .find_tag(tree.root(id), tag)
                .map(|b| tree.node(b).rendered_offset())
                .unwrap_or(0),
            None => 0,
        };
        if multiple == 0 {
            return Ok(Scalar::Int(0));
        }
        let at = tree.node(id).rendered_offset().saturating_sub(anchor);
        Ok(Scalar::Int(((multiple - at % multiple) % multiple) as u64))
    });
    Template::string(Str::new().size(Reference::this(width))).with_lineage(&["AlignPad", "Str"])
}
