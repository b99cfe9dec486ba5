//! Attribute metadata
//!
//! Every entity kind declares a closed table of attribute names, each
//! classified as simple (a scalar), object (one nested entity) or collection
//! (a map of nested entities). Generic consumers such as the diff engine walk
//! these tables instead of knowing each entity's fields.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use super::entity::{Concept, Edge, Node, Property, Tag, Tags, Term, ValueSet};
use super::Model;
use crate::error::{MdfError, Result};

/// How an attribute is compared and rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Simple,
    Object,
    Collection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Node,
    Edge,
    Property,
    Term,
    Concept,
    ValueSet,
    Tag,
}

const NODE_ATTRS: &[(&str, AttrKind)] = &[
    ("handle", AttrKind::Simple),
    ("model", AttrKind::Simple),
    ("nanoid", AttrKind::Simple),
    ("desc", AttrKind::Simple),
    ("concept", AttrKind::Object),
    ("props", AttrKind::Collection),
    ("tags", AttrKind::Collection),
];

const EDGE_ATTRS: &[(&str, AttrKind)] = &[
    ("handle", AttrKind::Simple),
    ("model", AttrKind::Simple),
    ("multiplicity", AttrKind::Simple),
    ("is_required", AttrKind::Simple),
    ("nanoid", AttrKind::Simple),
    ("desc", AttrKind::Simple),
    ("src", AttrKind::Object),
    ("dst", AttrKind::Object),
    ("concept", AttrKind::Object),
    ("props", AttrKind::Collection),
    ("tags", AttrKind::Collection),
];

const PROPERTY_ATTRS: &[(&str, AttrKind)] = &[
    ("handle", AttrKind::Simple),
    ("model", AttrKind::Simple),
    ("value_domain", AttrKind::Simple),
    ("item_domain", AttrKind::Simple),
    ("pattern", AttrKind::Simple),
    ("units", AttrKind::Simple),
    ("is_required", AttrKind::Simple),
    ("is_key", AttrKind::Simple),
    ("is_nullable", AttrKind::Simple),
    ("is_strict", AttrKind::Simple),
    ("is_deprecated", AttrKind::Simple),
    ("nanoid", AttrKind::Simple),
    ("desc", AttrKind::Simple),
    ("concept", AttrKind::Object),
    ("value_set", AttrKind::Object),
    ("tags", AttrKind::Collection),
];

const TERM_ATTRS: &[(&str, AttrKind)] = &[
    ("handle", AttrKind::Simple),
    ("value", AttrKind::Simple),
    ("origin_name", AttrKind::Simple),
    ("origin_id", AttrKind::Simple),
    ("origin_version", AttrKind::Simple),
    ("origin_definition", AttrKind::Simple),
    ("nanoid", AttrKind::Simple),
    ("desc", AttrKind::Simple),
    ("concept", AttrKind::Object),
    ("tags", AttrKind::Collection),
];

const CONCEPT_ATTRS: &[(&str, AttrKind)] = &[("terms", AttrKind::Collection)];

const VALUE_SET_ATTRS: &[(&str, AttrKind)] = &[
    ("handle", AttrKind::Simple),
    ("url", AttrKind::Simple),
    ("path", AttrKind::Simple),
    ("terms", AttrKind::Collection),
];

const TAG_ATTRS: &[(&str, AttrKind)] = &[("key", AttrKind::Simple), ("value", AttrKind::Simple)];

impl EntityKind {
    /// The attribute table for this kind
    pub fn attrs(self) -> &'static [(&'static str, AttrKind)] {
        match self {
            Self::Node => NODE_ATTRS,
            Self::Edge => EDGE_ATTRS,
            Self::Property => PROPERTY_ATTRS,
            Self::Term => TERM_ATTRS,
            Self::Concept => CONCEPT_ATTRS,
            Self::ValueSet => VALUE_SET_ATTRS,
            Self::Tag => TAG_ATTRS,
        }
    }

    /// Names of this kind's attributes of one classification
    pub fn attrs_of(self, kind: AttrKind) -> impl Iterator<Item = &'static str> {
        self.attrs()
            .iter()
            .filter(move |(_, k)| *k == kind)
            .map(|(name, _)| *name)
    }

    pub fn attr_kind(self, name: &str) -> Option<AttrKind> {
        self.attrs()
            .iter()
            .find(|(attr, _)| *attr == name)
            .map(|(_, kind)| *kind)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Edge => "edge",
            Self::Property => "property",
            Self::Term => "term",
            Self::Concept => "concept",
            Self::ValueSet => "value_set",
            Self::Tag => "tag",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Borrowed view of any entity
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'m> {
    Node(&'m Node),
    Edge(&'m Edge),
    Property(&'m Property),
    Term(&'m Term),
    Concept(&'m Concept),
    ValueSet(&'m ValueSet),
    Tag(&'m Tag),
}

/// Value of one attribute
#[derive(Debug, Clone)]
pub enum AttrValue<'m> {
    Simple(Value),
    Object(Option<EntityRef<'m>>),
    Collection(BTreeMap<String, EntityRef<'m>>),
}

fn text(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}

fn flag(value: Option<bool>) -> Value {
    value.map(Value::Bool).unwrap_or(Value::Null)
}

fn unknown(kind: EntityKind, name: &str) -> MdfError {
    MdfError::invariant(format!("{} has no attribute '{}'", kind, name))
}

impl<'m> EntityRef<'m> {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Node(_) => EntityKind::Node,
            Self::Edge(_) => EntityKind::Edge,
            Self::Property(_) => EntityKind::Property,
            Self::Term(_) => EntityKind::Term,
            Self::Concept(_) => EntityKind::Concept,
            Self::ValueSet(_) => EntityKind::ValueSet,
            Self::Tag(_) => EntityKind::Tag,
        }
    }

    /// The entity's handle, for kinds that have one
    pub fn handle(&self) -> Option<&'m str> {
        match self {
            Self::Node(n) => Some(&n.handle),
            Self::Edge(e) => Some(&e.handle),
            Self::Property(p) => Some(&p.handle),
            Self::Term(t) => Some(&t.handle),
            Self::ValueSet(vs) => vs.handle.as_deref(),
            Self::Tag(t) => Some(&t.key),
            Self::Concept(_) => None,
        }
    }

    /// Value of a simple attribute; `Null` when unset
    pub fn simple_attr(&self, name: &str) -> Result<Value> {
        let value = match (self, name) {
            (Self::Node(n), "handle") => Value::String(n.handle.clone()),
            (Self::Node(n), "model") => Value::String(n.model.clone()),
            (Self::Node(n), "nanoid") => text(&n.nanoid),
            (Self::Node(n), "desc") => text(&n.desc),

            (Self::Edge(e), "handle") => Value::String(e.handle.clone()),
            (Self::Edge(e), "model") => Value::String(e.model.clone()),
            (Self::Edge(e), "multiplicity") => Value::String(e.multiplicity.clone()),
            (Self::Edge(e), "is_required") => flag(e.is_required),
            (Self::Edge(e), "nanoid") => text(&e.nanoid),
            (Self::Edge(e), "desc") => text(&e.desc),

            (Self::Property(p), "handle") => Value::String(p.handle.clone()),
            (Self::Property(p), "model") => Value::String(p.model.clone()),
            (Self::Property(p), "value_domain") => Value::String(p.value_domain.clone()),
            (Self::Property(p), "item_domain") => text(&p.item_domain),
            (Self::Property(p), "pattern") => text(&p.pattern),
            (Self::Property(p), "units") => text(&p.units),
            (Self::Property(p), "is_required") => Value::Bool(p.is_required),
            (Self::Property(p), "is_key") => Value::Bool(p.is_key),
            (Self::Property(p), "is_nullable") => Value::Bool(p.is_nullable),
            (Self::Property(p), "is_strict") => Value::Bool(p.is_strict),
            (Self::Property(p), "is_deprecated") => flag(p.is_deprecated),
            (Self::Property(p), "nanoid") => text(&p.nanoid),
            (Self::Property(p), "desc") => text(&p.desc),

            (Self::Term(t), "handle") => Value::String(t.handle.clone()),
            (Self::Term(t), "value") => Value::String(t.value.clone()),
            (Self::Term(t), "origin_name") => text(&t.origin_name),
            (Self::Term(t), "origin_id") => text(&t.origin_id),
            (Self::Term(t), "origin_version") => text(&t.origin_version),
            (Self::Term(t), "origin_definition") => text(&t.origin_definition),
            (Self::Term(t), "nanoid") => text(&t.nanoid),
            (Self::Term(t), "desc") => text(&t.desc),

            (Self::ValueSet(vs), "handle") => text(&vs.handle),
            (Self::ValueSet(vs), "url") => text(&vs.url),
            (Self::ValueSet(vs), "path") => text(&vs.path),

            (Self::Tag(t), "key") => Value::String(t.key.clone()),
            (Self::Tag(t), "value") => Value::String(t.value.clone()),

            _ => return Err(unknown(self.kind(), name)),
        };
        Ok(value)
    }

    /// The entity flattened to its set simple attributes
    pub fn attr_dict(&self) -> Map<String, Value> {
        self.kind()
            .attrs_of(AttrKind::Simple)
            .filter_map(|name| match self.simple_attr(name) {
                Ok(Value::Null) | Err(_) => None,
                Ok(value) => Some((name.to_string(), value)),
            })
            .collect()
    }
}

fn tag_refs(tags: &Tags) -> BTreeMap<String, EntityRef<'_>> {
    tags.iter()
        .map(|(key, tag)| (key.clone(), EntityRef::Tag(tag)))
        .collect()
}

impl Model {
    /// Look up any attribute of an entity of this model
    pub fn attr<'m>(&'m self, entity: EntityRef<'m>, name: &str) -> Result<AttrValue<'m>> {
        let kind = entity
            .kind()
            .attr_kind(name)
            .ok_or_else(|| unknown(entity.kind(), name))?;

        match kind {
            AttrKind::Simple => entity.simple_attr(name).map(AttrValue::Simple),
            AttrKind::Object => self.object_attr(entity, name).map(AttrValue::Object),
            AttrKind::Collection => self.collection_attr(entity, name).map(AttrValue::Collection),
        }
    }

    fn object_attr<'m>(&'m self, entity: EntityRef<'m>, name: &str) -> Result<Option<EntityRef<'m>>> {
        let concept = |id: Option<super::ConceptId>| id.map(|c| EntityRef::Concept(self.concept(c)));
        let value = match (entity, name) {
            (EntityRef::Node(n), "concept") => concept(n.concept),
            (EntityRef::Edge(e), "src") => Some(EntityRef::Node(self.node(e.src))),
            (EntityRef::Edge(e), "dst") => Some(EntityRef::Node(self.node(e.dst))),
            (EntityRef::Edge(e), "concept") => concept(e.concept),
            (EntityRef::Property(p), "concept") => concept(p.concept),
            (EntityRef::Property(p), "value_set") => {
                p.value_set.map(|vs| EntityRef::ValueSet(self.value_set(vs)))
            }
            (EntityRef::Term(t), "concept") => concept(t.concept),
            _ => return Err(unknown(entity.kind(), name)),
        };
        Ok(value)
    }

    fn collection_attr<'m>(
        &'m self,
        entity: EntityRef<'m>,
        name: &str,
    ) -> Result<BTreeMap<String, EntityRef<'m>>> {
        let props = |props: &BTreeMap<String, super::PropId>| -> BTreeMap<String, EntityRef<'m>> {
            props
                .iter()
                .map(|(handle, id)| (handle.clone(), EntityRef::Property(self.prop(*id))))
                .collect()
        };
        let value = match (entity, name) {
            (EntityRef::Node(n), "props") => props(&n.props),
            (EntityRef::Node(n), "tags") => tag_refs(&n.tags),
            (EntityRef::Edge(e), "props") => props(&e.props),
            (EntityRef::Edge(e), "tags") => tag_refs(&e.tags),
            (EntityRef::Property(p), "tags") => tag_refs(&p.tags),
            (EntityRef::Term(t), "tags") => tag_refs(&t.tags),
            (EntityRef::Concept(c), "terms") => c
                .terms
                .iter()
                .map(|(key, id)| (key.to_string(), EntityRef::Term(self.term(*id))))
                .collect(),
            (EntityRef::ValueSet(vs), "terms") => vs
                .terms
                .iter()
                .map(|(handle, id)| (handle.clone(), EntityRef::Term(self.term(*id))))
                .collect(),
            _ => return Err(unknown(entity.kind(), name)),
        };
        Ok(value)
    }
}
