//! Diff result types
//!
//! A [`ModelDiff`] holds one [`KindDiff`] per entity kind. Each kind lists
//! whole entities removed or added, and for entities present in both models
//! the attributes that changed. Empty parts are `None`, never empty maps.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::model::{EntityRef, PropKey, TermKey, Triplet};

/// An entity in a diff: borrowed from its model, or flattened to attributes
#[derive(Debug, Clone)]
pub enum Rendered<'a> {
    Entity(EntityRef<'a>),
    Attrs(Map<String, Value>),
}

impl<'a> Rendered<'a> {
    pub fn new(entity: EntityRef<'a>, as_dict: bool) -> Self {
        if as_dict {
            Self::Attrs(entity.attr_dict())
        } else {
            Self::Entity(entity)
        }
    }

    /// The entity itself, when not flattened
    pub fn entity(&self) -> Option<EntityRef<'a>> {
        match self {
            Self::Entity(e) => Some(*e),
            Self::Attrs(_) => None,
        }
    }

    /// Set simple attributes of the entity
    pub fn attrs(&self) -> Map<String, Value> {
        match self {
            Self::Entity(e) => e.attr_dict(),
            Self::Attrs(attrs) => attrs.clone(),
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.attrs())
    }
}

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attrs = self.attrs();
        match (attrs.get("handle"), attrs.get("key"), attrs.get("value")) {
            (Some(Value::String(handle)), _, _) => write!(f, "{}", handle),
            (None, Some(Value::String(key)), Some(Value::String(value))) => {
                write!(f, "{}: {}", key, value)
            }
            _ => write!(f, "{}", Value::Object(attrs)),
        }
    }
}

/// One side of an attribute change
#[derive(Debug, Clone)]
pub enum DiffValue<'a> {
    Scalar(Value),
    Entity(Rendered<'a>),
    Entities(BTreeMap<String, Rendered<'a>>),
}

impl DiffValue<'_> {
    fn is_empty(&self) -> bool {
        match self {
            Self::Scalar(v) => v.is_null(),
            Self::Entity(_) => false,
            Self::Entities(items) => items.is_empty(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Scalar(v) => v.clone(),
            Self::Entity(e) => e.to_json(),
            Self::Entities(items) => Value::Object(
                items
                    .iter()
                    .map(|(k, e)| (k.clone(), e.to_json()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for DiffValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(Value::String(s)) => write!(f, "{}", s),
            Self::Scalar(v) => write!(f, "{}", v),
            Self::Entity(e) => write!(f, "{}", e),
            Self::Entities(items) => {
                let names: Vec<String> = items.values().map(|e| e.to_string()).collect();
                write!(f, "[{}]", names.join(", "))
            }
        }
    }
}

/// Old and new value of one attribute
#[derive(Debug, Clone, Default)]
pub struct AttrChange<'a> {
    pub removed: Option<DiffValue<'a>>,
    pub added: Option<DiffValue<'a>>,
}

impl<'a> AttrChange<'a> {
    /// Empty values (null, no entities) are stored as `None`
    pub fn new(removed: DiffValue<'a>, added: DiffValue<'a>) -> Self {
        let keep = |v: DiffValue<'a>| if v.is_empty() { None } else { Some(v) };
        Self {
            removed: keep(removed),
            added: keep(added),
        }
    }

    pub fn to_json(&self) -> Value {
        let side = |v: &Option<DiffValue<'_>>| v.as_ref().map_or(Value::Null, DiffValue::to_json);
        let mut map = Map::new();
        map.insert("removed".to_string(), side(&self.removed));
        map.insert("added".to_string(), side(&self.added));
        Value::Object(map)
    }
}

impl fmt::Display for AttrChange<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |v: &Option<DiffValue<'_>>| v.as_ref().map_or("None".to_string(), |v| v.to_string());
        write!(f, "'{}' to '{}'", side(&self.removed), side(&self.added))
    }
}

/// Changed attributes of one entity, by attribute name
pub type Changes<'a> = BTreeMap<String, AttrChange<'a>>;

/// Differences for one entity kind, keyed by entity key
#[derive(Debug, Clone)]
pub struct KindDiff<'a, K: Ord> {
    pub removed: Option<BTreeMap<K, Rendered<'a>>>,
    pub added: Option<BTreeMap<K, Rendered<'a>>>,
    pub changed: Option<BTreeMap<K, Changes<'a>>>,
}

impl<'a, K: Ord> Default for KindDiff<'a, K> {
    fn default() -> Self {
        Self {
            removed: None,
            added: None,
            changed: None,
        }
    }
}

impl<'a, K: Ord + fmt::Display> KindDiff<'a, K> {
    pub fn is_empty(&self) -> bool {
        self.removed.is_none() && self.added.is_none() && self.changed.is_none()
    }

    pub fn to_json(&self) -> Value {
        fn entities<K: fmt::Display>(items: &Option<BTreeMap<K, Rendered<'_>>>) -> Value {
            match items {
                Some(items) => Value::Object(
                    items
                        .iter()
                        .map(|(k, e)| (k.to_string(), e.to_json()))
                        .collect(),
                ),
                None => Value::Null,
            }
        }

        let mut map = Map::new();
        map.insert("removed".to_string(), entities(&self.removed));
        map.insert("added".to_string(), entities(&self.added));
        let changed = match &self.changed {
            Some(changed) => Value::Object(
                changed
                    .iter()
                    .map(|(k, attrs)| {
                        let attrs: Map<String, Value> = attrs
                            .iter()
                            .map(|(name, change)| (name.clone(), change.to_json()))
                            .collect();
                        (k.to_string(), Value::Object(attrs))
                    })
                    .collect(),
            ),
            None => Value::Null,
        };
        map.insert("changed".to_string(), changed);
        Value::Object(map)
    }
}

/// Entity whose annotations changed
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum AnnotatedKey {
    Node(String),
    Edge(Triplet),
    Prop(PropKey),
    Term(TermKey),
}

/// Annotation terms on each side, recorded for entities in both models
#[derive(Debug, Clone, Default)]
pub struct AnnotationChange {
    /// Terms annotating the entity in the old model
    pub removed: BTreeSet<TermKey>,
    /// Terms annotating the entity in the new model
    pub added: BTreeSet<TermKey>,
}

pub type AnnotationTable = BTreeMap<AnnotatedKey, AnnotationChange>;

/// Differences between two models
#[derive(Debug, Clone, Default)]
pub struct ModelDiff<'a> {
    pub nodes: Option<KindDiff<'a, String>>,
    pub edges: Option<KindDiff<'a, Triplet>>,
    pub props: Option<KindDiff<'a, PropKey>>,
    pub terms: Option<KindDiff<'a, TermKey>>,
    pub summary: Option<String>,
    pub(crate) annotations: AnnotationTable,
}

impl<'a> ModelDiff<'a> {
    /// True when the models have no differences
    pub fn is_empty(&self) -> bool {
        self.nodes.is_none() && self.edges.is_none() && self.props.is_none() && self.terms.is_none()
    }

    /// Annotation changes seen while comparing entities present in both models
    pub fn annotations(&self) -> &AnnotationTable {
        &self.annotations
    }

    /// The diff as JSON; entities appear as attribute objects
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        if let Some(nodes) = &self.nodes {
            map.insert("nodes".to_string(), nodes.to_json());
        }
        if let Some(edges) = &self.edges {
            map.insert("edges".to_string(), edges.to_json());
        }
        if let Some(props) = &self.props {
            map.insert("props".to_string(), props.to_json());
        }
        if let Some(terms) = &self.terms {
            map.insert("terms".to_string(), terms.to_json());
        }
        if let Some(summary) = &self.summary {
            map.insert("summary".to_string(), Value::String(summary.clone()));
        }
        Value::Object(map)
    }
}
