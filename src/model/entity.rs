//! Model entities and the keys that identify them
//!
//! Entities live in arenas owned by [`Model`](super::Model) and point at each
//! other through typed ids, so one property can belong to many owners and a
//! term can annotate the very concept that holds it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Edge multiplicities accepted without a warning
pub const STANDARD_MULTIPLICITIES: [&str; 4] =
    ["one_to_one", "one_to_many", "many_to_one", "many_to_many"];

/// Multiplicity given to an edge that declares none
pub const DEFAULT_MULTIPLICITY: &str = "many_to_one";

/// Value domain given to a property whose type cannot be interpreted
pub const DEFAULT_VALUE_DOMAIN: &str = "string";

macro_rules! arena_id {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub(crate) usize);

            impl $name {
                pub fn index(self) -> usize {
                    self.0
                }
            }
        )*
    };
}

arena_id!(
    /// Index of a [`Node`] in its model
    NodeId,
    /// Index of an [`Edge`] in its model
    EdgeId,
    /// Index of a [`Property`] in its model
    PropId,
    /// Index of a [`Term`] in its model
    TermId,
    /// Index of a [`Concept`] in its model
    ConceptId,
    /// Index of a [`ValueSet`] in its model
    ValueSetId,
);

/// Any entity that can carry properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Owner {
    Node(NodeId),
    Edge(EdgeId),
}

/// Any entity that can be annotated with terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityId {
    Node(NodeId),
    Edge(EdgeId),
    Property(PropId),
    Term(TermId),
}

impl From<Owner> for EntityId {
    fn from(owner: Owner) -> Self {
        match owner {
            Owner::Node(id) => Self::Node(id),
            Owner::Edge(id) => Self::Edge(id),
        }
    }
}

// =============================================================================
// Keys
// =============================================================================

/// Identity of an edge: its handle plus the handles of both endpoints
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triplet {
    pub handle: String,
    pub src: String,
    pub dst: String,
}

impl Triplet {
    pub fn new(handle: impl Into<String>, src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            src: src.into(),
            dst: dst.into(),
        }
    }
}

impl fmt::Display for Triplet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.handle, self.src, self.dst)
    }
}

/// Handle-level identity of a property owner
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OwnerKey {
    Node(String),
    Edge(Triplet),
}

impl OwnerKey {
    /// The node or edge handle alone
    pub fn handle(&self) -> &str {
        match self {
            Self::Node(handle) => handle,
            Self::Edge(triplet) => &triplet.handle,
        }
    }
}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(handle) => write!(f, "{}", handle),
            Self::Edge(triplet) => write!(f, "{}", triplet),
        }
    }
}

/// Identity of a property within a model: (owner, property handle)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropKey {
    pub owner: OwnerKey,
    pub handle: String,
}

impl PropKey {
    pub fn new(owner: OwnerKey, handle: impl Into<String>) -> Self {
        Self {
            owner,
            handle: handle.into(),
        }
    }

    pub fn of_node(node: impl Into<String>, handle: impl Into<String>) -> Self {
        Self::new(OwnerKey::Node(node.into()), handle)
    }
}

impl fmt::Display for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner, self.handle)
    }
}

/// Which term fields make two terms "the same"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermIdentity {
    /// (value, origin_name)
    ValueOrigin,
    /// (handle, origin_name)
    HandleOrigin,
    /// (handle, origin_name, origin_id, origin_version)
    #[default]
    Full,
}

impl TermIdentity {
    pub fn key(self, term: &Term) -> TermKey {
        let origin = term.origin_name.clone().unwrap_or_default();
        match self {
            Self::ValueOrigin => TermKey {
                name: term.value.clone(),
                origin,
                origin_id: None,
                origin_version: None,
            },
            Self::HandleOrigin => TermKey {
                name: term.handle.clone(),
                origin,
                origin_id: None,
                origin_version: None,
            },
            Self::Full => TermKey {
                name: term.handle.clone(),
                origin,
                origin_id: term.origin_id.clone(),
                origin_version: term.origin_version.clone(),
            },
        }
    }
}

/// Identity of a term under some [`TermIdentity`]
///
/// `name` is the term handle, or its value under [`TermIdentity::ValueOrigin`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TermKey {
    pub name: String,
    pub origin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_version: Option<String>,
}

impl fmt::Display for TermKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.origin, self.name)?;
        if let Some(id) = &self.origin_id {
            write!(f, "#{}", id)?;
        }
        if let Some(version) = &self.origin_version {
            write!(f, "@{}", version)?;
        }
        Ok(())
    }
}

// =============================================================================
// Entities
// =============================================================================

/// Key/value annotation attached to any entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

pub type Tags = BTreeMap<String, Tag>;

#[derive(Debug, Clone, Default)]
pub struct Node {
    pub handle: String,
    pub model: String,
    pub desc: Option<String>,
    pub nanoid: Option<String>,
    pub tags: Tags,
    pub concept: Option<ConceptId>,
    pub props: BTreeMap<String, PropId>,
    /// Composite key as declared (`[node.]prop` strings)
    pub composite_key: Vec<String>,
    /// Composite key once resolved: (owning node, property) pairs
    pub composite_key_props: Vec<(NodeId, PropId)>,
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub handle: String,
    pub model: String,
    pub src: NodeId,
    pub dst: NodeId,
    pub multiplicity: String,
    pub desc: Option<String>,
    pub nanoid: Option<String>,
    pub is_required: Option<bool>,
    pub tags: Tags,
    pub concept: Option<ConceptId>,
    pub props: BTreeMap<String, PropId>,
}

#[derive(Debug, Clone)]
pub struct Property {
    pub handle: String,
    pub model: String,
    pub desc: Option<String>,
    pub nanoid: Option<String>,
    pub value_domain: String,
    pub item_domain: Option<String>,
    pub pattern: Option<String>,
    pub units: Option<String>,
    pub value_set: Option<ValueSetId>,
    pub is_key: bool,
    pub is_required: bool,
    pub is_nullable: bool,
    pub is_strict: bool,
    pub is_deprecated: Option<bool>,
    pub tags: Tags,
    pub concept: Option<ConceptId>,
    pub belongs: Vec<Owner>,
}

impl Property {
    pub fn new(handle: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            model: model.into(),
            desc: None,
            nanoid: None,
            value_domain: DEFAULT_VALUE_DOMAIN.to_string(),
            item_domain: None,
            pattern: None,
            units: None,
            value_set: None,
            is_key: false,
            is_required: false,
            is_nullable: false,
            is_strict: true,
            is_deprecated: None,
            tags: Tags::new(),
            concept: None,
            belongs: Vec::new(),
        }
    }

    /// True when the property's values (or list items) come from a value set
    pub fn takes_terms(&self) -> bool {
        self.value_domain == "value_set" || self.item_domain.as_deref() == Some("value_set")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Term {
    pub handle: String,
    pub value: String,
    pub origin_name: Option<String>,
    pub origin_id: Option<String>,
    pub origin_version: Option<String>,
    pub origin_definition: Option<String>,
    pub nanoid: Option<String>,
    pub desc: Option<String>,
    pub tags: Tags,
    pub concept: Option<ConceptId>,
}

/// Groups terms that denote the same thing
#[derive(Debug, Clone, Default)]
pub struct Concept {
    pub terms: BTreeMap<TermKey, TermId>,
}

/// Acceptable values of a property, or a reference to where they are defined
#[derive(Debug, Clone, Default)]
pub struct ValueSet {
    pub handle: Option<String>,
    pub url: Option<String>,
    pub path: Option<String>,
    /// Terms by term handle
    pub terms: BTreeMap<String, TermId>,
}

impl ValueSet {
    /// The external reference, if the value set was declared by one
    pub fn reference(&self) -> Option<&str> {
        self.url.as_deref().or(self.path.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(handle: &str, value: &str, origin: &str, code: Option<&str>) -> Term {
        Term {
            handle: handle.to_string(),
            value: value.to_string(),
            origin_name: Some(origin.to_string()),
            origin_id: code.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_full_identity_separates_codes() {
        let a = term("primary", "Primary", "NCIt", Some("C8509"));
        let b = term("primary", "Primary", "NCIt", Some("C14165"));
        assert_ne!(TermIdentity::Full.key(&a), TermIdentity::Full.key(&b));
        assert_eq!(
            TermIdentity::HandleOrigin.key(&a),
            TermIdentity::HandleOrigin.key(&b)
        );
    }

    #[test]
    fn test_value_origin_identity_ignores_handle() {
        let a = term("tumor", "Tumor", "caDSR", None);
        let b = term("tumour", "Tumor", "caDSR", None);
        assert_eq!(
            TermIdentity::ValueOrigin.key(&a),
            TermIdentity::ValueOrigin.key(&b)
        );
    }

    #[test]
    fn test_key_display() {
        let key = TermIdentity::Full.key(&term("primary", "Primary", "NCIt", Some("C8509")));
        assert_eq!(key.to_string(), "NCIt:primary#C8509");
        let prop = PropKey::new(OwnerKey::Edge(Triplet::new("of_case", "sample", "case")), "days");
        assert_eq!(prop.to_string(), "of_case:sample:case.days");
    }

    #[test]
    fn test_property_defaults() {
        let prop = Property::new("sample_type", "test");
        assert_eq!(prop.value_domain, "string");
        assert!(prop.is_strict);
        assert!(!prop.is_key && !prop.is_required && !prop.is_nullable);
        assert!(!prop.takes_terms());
    }
}
