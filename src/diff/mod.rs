//! Model Diff
//!
//! Compares two models kind by kind (nodes, edges, properties, terms). Keys
//! present in only one model are reported as removed or added. Entities
//! present in both are compared attribute by attribute using each kind's
//! attribute table:
//!
//! - simple attributes by value
//! - object attributes (concept, value set) by the term keys they hold;
//!   other objects by handle
//! - collection attributes (props, tags, terms) by key set, and tags also by
//!   value

pub mod result;
mod summary;

pub use result::{
    AnnotatedKey, AnnotationChange, AnnotationTable, AttrChange, Changes, DiffValue, KindDiff,
    ModelDiff, Rendered,
};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{MdfError, Result};
use crate::model::{AttrKind, AttrValue, EntityRef, Model};

/// What a diff returns
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffOptions {
    /// Flatten entities to attribute maps instead of borrowing them
    pub objects_as_dicts: bool,
    /// Produce a plain-language summary
    pub include_summary: bool,
}

/// Keys of two maps split into removed (first only), added (second only) and
/// common (both)
#[derive(Debug, Clone)]
pub struct EntitySets<K, V> {
    pub removed: BTreeMap<K, V>,
    pub added: BTreeMap<K, V>,
    pub common: BTreeMap<K, (V, V)>,
}

pub fn partition<K: Ord + Clone, V: Copy>(a: &BTreeMap<K, V>, b: &BTreeMap<K, V>) -> EntitySets<K, V> {
    let mut sets = EntitySets {
        removed: BTreeMap::new(),
        added: BTreeMap::new(),
        common: BTreeMap::new(),
    };
    for (key, va) in a {
        match b.get(key) {
            Some(vb) => {
                sets.common.insert(key.clone(), (*va, *vb));
            }
            None => {
                sets.removed.insert(key.clone(), *va);
            }
        }
    }
    for (key, vb) in b {
        if !a.contains_key(key) {
            sets.added.insert(key.clone(), *vb);
        }
    }
    sets
}

/// Compare model `a` (old) with model `b` (new)
pub fn diff_models<'a>(a: &'a Model, b: &'a Model, options: &DiffOptions) -> Result<ModelDiff<'a>> {
    tracing::debug!(old = %a.handle, new = %b.handle, "diffing models");
    let mut differ = Differ {
        a,
        b,
        as_dicts: options.objects_as_dicts,
        annotations: AnnotationTable::new(),
    };

    let nodes = differ.diff_kind(
        a.nodes(),
        b.nodes(),
        |m, id| EntityRef::Node(m.node(id)),
        AnnotatedKey::Node,
    )?;
    let edges = differ.diff_kind(
        a.edges(),
        b.edges(),
        |m, id| EntityRef::Edge(m.edge(id)),
        AnnotatedKey::Edge,
    )?;
    let props = differ.diff_kind(
        a.props(),
        b.props(),
        |m, id| EntityRef::Property(m.prop(id)),
        AnnotatedKey::Prop,
    )?;
    let terms = differ.diff_kind(
        a.terms(),
        b.terms(),
        |m, id| EntityRef::Term(m.term(id)),
        AnnotatedKey::Term,
    )?;

    let mut diff = ModelDiff {
        nodes,
        edges,
        props,
        terms,
        summary: None,
        annotations: differ.annotations,
    };
    if options.include_summary {
        diff.summary = summary::summarize(&diff, a, b);
    }
    Ok(diff)
}

struct Differ<'a> {
    a: &'a Model,
    b: &'a Model,
    as_dicts: bool,
    annotations: AnnotationTable,
}

impl<'a> Differ<'a> {
    fn diff_kind<K, V, G, N>(
        &mut self,
        a_map: &BTreeMap<K, V>,
        b_map: &BTreeMap<K, V>,
        get: G,
        annotated: N,
    ) -> Result<Option<KindDiff<'a, K>>>
    where
        K: Ord + Clone,
        V: Copy,
        G: Fn(&'a Model, V) -> EntityRef<'a>,
        N: Fn(K) -> AnnotatedKey,
    {
        let sets = partition(a_map, b_map);
        let render = |model: &'a Model, items: BTreeMap<K, V>| -> Option<BTreeMap<K, Rendered<'a>>> {
            if items.is_empty() {
                return None;
            }
            Some(
                items
                    .into_iter()
                    .map(|(k, v)| (k, Rendered::new(get(model, v), self.as_dicts)))
                    .collect(),
            )
        };
        let removed = render(self.a, sets.removed);
        let added = render(self.b, sets.added);

        let mut changed = BTreeMap::new();
        for (key, (va, vb)) in sets.common {
            let changes = self.diff_entity(get(self.a, va), get(self.b, vb), || annotated(key.clone()))?;
            if !changes.is_empty() {
                changed.insert(key, changes);
            }
        }

        let kind = KindDiff {
            removed,
            added,
            changed: if changed.is_empty() { None } else { Some(changed) },
        };
        Ok(if kind.removed.is_none() && kind.added.is_none() && kind.changed.is_none() {
            None
        } else {
            Some(kind)
        })
    }

    fn diff_entity<N>(&mut self, ea: EntityRef<'a>, eb: EntityRef<'a>, annotated: N) -> Result<Changes<'a>>
    where
        N: Fn() -> AnnotatedKey,
    {
        let mut changes = Changes::new();
        for (name, kind) in ea.kind().attrs() {
            match kind {
                AttrKind::Simple => {
                    let x = ea.simple_attr(name)?;
                    let y = eb.simple_attr(name)?;
                    if x != y {
                        changes.insert(
                            name.to_string(),
                            AttrChange::new(DiffValue::Scalar(x), DiffValue::Scalar(y)),
                        );
                    }
                }
                AttrKind::Object => self.diff_object(ea, eb, name, &annotated, &mut changes)?,
                AttrKind::Collection => self.diff_collection(ea, eb, name, &mut changes)?,
            }
        }
        Ok(changes)
    }

    fn diff_object<N>(
        &mut self,
        ea: EntityRef<'a>,
        eb: EntityRef<'a>,
        name: &str,
        annotated: &N,
        changes: &mut Changes<'a>,
    ) -> Result<()>
    where
        N: Fn() -> AnnotatedKey,
    {
        let x = object(self.a.attr(ea, name)?, name)?;
        let y = object(self.b.attr(eb, name)?, name)?;
        if x.is_none() && y.is_none() {
            return Ok(());
        }

        if name == "concept" {
            let keys = |c: Option<EntityRef<'a>>| match c {
                Some(EntityRef::Concept(c)) => c.terms.keys().cloned().collect(),
                _ => BTreeSet::new(),
            };
            self.annotations.insert(
                annotated(),
                AnnotationChange {
                    removed: keys(x),
                    added: keys(y),
                },
            );
        }

        match (x, y) {
            (None, Some(c @ (EntityRef::Concept(_) | EntityRef::ValueSet(_)))) => {
                let added = self.b.attr(c, "terms")?;
                self.diff_terms(name, BTreeMap::new(), collection(added, name)?, changes);
            }
            (Some(c @ (EntityRef::Concept(_) | EntityRef::ValueSet(_))), None) => {
                let removed = self.a.attr(c, "terms")?;
                self.diff_terms(name, collection(removed, name)?, BTreeMap::new(), changes);
            }
            (Some(ca @ EntityRef::Concept(_)), Some(cb @ EntityRef::Concept(_)))
            | (Some(ca @ EntityRef::ValueSet(_)), Some(cb @ EntityRef::ValueSet(_))) => {
                let ta = collection(self.a.attr(ca, "terms")?, name)?;
                let tb = collection(self.b.attr(cb, "terms")?, name)?;
                if !ta.keys().eq(tb.keys()) {
                    self.diff_terms(name, ta, tb, changes);
                }
            }
            (Some(xa), Some(yb)) if xa.handle().is_some() => {
                if xa.handle() != yb.handle() {
                    changes.insert(
                        name.to_string(),
                        AttrChange::new(
                            DiffValue::Entity(Rendered::new(xa, self.as_dicts)),
                            DiffValue::Entity(Rendered::new(yb, self.as_dicts)),
                        ),
                    );
                }
            }
            (xa, yb) => {
                return Err(MdfError::invariant(format!(
                    "cannot compare attribute '{}' holding {:?} and {:?}",
                    name,
                    xa.map(|e| e.kind()),
                    yb.map(|e| e.kind())
                )))
            }
        }
        Ok(())
    }

    /// Record terms held by only one side of a concept or value set
    fn diff_terms(
        &self,
        name: &str,
        a_terms: BTreeMap<String, EntityRef<'a>>,
        b_terms: BTreeMap<String, EntityRef<'a>>,
        changes: &mut Changes<'a>,
    ) {
        let (removed, added) = self.split(&a_terms, &b_terms);
        changes.insert(
            name.to_string(),
            AttrChange::new(DiffValue::Entities(removed), DiffValue::Entities(added)),
        );
    }

    fn diff_collection(
        &self,
        ea: EntityRef<'a>,
        eb: EntityRef<'a>,
        name: &str,
        changes: &mut Changes<'a>,
    ) -> Result<()> {
        let ca = collection(self.a.attr(ea, name)?, name)?;
        let cb = collection(self.b.attr(eb, name)?, name)?;

        if ca.keys().eq(cb.keys()) {
            if name == "tags" {
                let mut removed = BTreeMap::new();
                let mut added = BTreeMap::new();
                for (key, ta) in &ca {
                    let tb = cb[key];
                    if ta.simple_attr("value")? != tb.simple_attr("value")? {
                        removed.insert(key.clone(), Rendered::new(*ta, self.as_dicts));
                        added.insert(key.clone(), Rendered::new(tb, self.as_dicts));
                    }
                }
                if !removed.is_empty() {
                    changes.insert(
                        name.to_string(),
                        AttrChange::new(DiffValue::Entities(removed), DiffValue::Entities(added)),
                    );
                }
            }
            return Ok(());
        }

        let (removed, added) = self.split(&ca, &cb);
        changes.insert(
            name.to_string(),
            AttrChange::new(DiffValue::Entities(removed), DiffValue::Entities(added)),
        );
        Ok(())
    }

    /// Members only in `a`, members only in `b`
    fn split(
        &self,
        a: &BTreeMap<String, EntityRef<'a>>,
        b: &BTreeMap<String, EntityRef<'a>>,
    ) -> (BTreeMap<String, Rendered<'a>>, BTreeMap<String, Rendered<'a>>) {
        let only = |x: &BTreeMap<String, EntityRef<'a>>, y: &BTreeMap<String, EntityRef<'a>>| {
            x.iter()
                .filter(|(k, _)| !y.contains_key(*k))
                .map(|(k, e)| (k.clone(), Rendered::new(*e, self.as_dicts)))
                .collect::<BTreeMap<_, _>>()
        };
        (only(a, b), only(b, a))
    }
}

fn object<'a>(value: AttrValue<'a>, name: &str) -> Result<Option<EntityRef<'a>>> {
    match value {
        AttrValue::Object(entity) => Ok(entity),
        other => Err(MdfError::invariant(format!(
            "attribute '{}' is not an object: {:?}",
            name, other
        ))),
    }
}

fn collection<'a>(value: AttrValue<'a>, name: &str) -> Result<BTreeMap<String, EntityRef<'a>>> {
    match value {
        AttrValue::Collection(items) => Ok(items),
        other => Err(MdfError::invariant(format!(
            "attribute '{}' is not a collection: {:?}",
            name, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MdfSource;
    use crate::mdf::{MdfReader, ReaderOptions};

    fn build(yaml: &str) -> Model {
        let mut reader = MdfReader::new(ReaderOptions::default());
        reader.load(&[MdfSource::text("test.yml", yaml)]).unwrap();
        reader.create_model().unwrap();
        reader.into_model().unwrap()
    }

    const OLD: &str = "\
Handle: test
Nodes:
  case:
    Desc: A case
    Props: [case_id]
    Tags:
      Category: clinical
  sample:
    Props: [sample_type]
Relationships:
  of_case:
    Mul: many_to_one
    Ends:
      - Src: sample
        Dst: case
PropDefinitions:
  case_id:
    Type: string
  sample_type:
    Enum: [normal, tumor]
";

    #[test]
    fn test_partition_is_exact() {
        let a: BTreeMap<&str, u8> = [("x", 1), ("y", 2)].into_iter().collect();
        let b: BTreeMap<&str, u8> = [("y", 3), ("z", 4)].into_iter().collect();
        let sets = partition(&a, &b);
        assert_eq!(sets.removed.keys().collect::<Vec<_>>(), vec![&"x"]);
        assert_eq!(sets.added.keys().collect::<Vec<_>>(), vec![&"z"]);
        assert_eq!(sets.common.get("y"), Some(&(2, 3)));
    }

    #[test]
    fn test_identical_models_have_no_diff() {
        let a = build(OLD);
        let b = build(OLD);
        let diff = diff_models(
            &a,
            &b,
            &DiffOptions {
                include_summary: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(diff.is_empty());
        assert!(diff.summary.is_none());
        assert_eq!(diff.to_json(), serde_json::json!({}));
    }

    #[test]
    fn test_simple_and_tag_changes() {
        let a = build(OLD);
        let b = build(&OLD.replace("Desc: A case", "Desc: A patient").replace("clinical", "admin"));
        let diff = diff_models(&a, &b, &DiffOptions::default()).unwrap();
        let changed = diff.nodes.as_ref().unwrap().changed.as_ref().unwrap();
        let case = &changed["case"];
        assert_eq!(case["desc"].to_string(), "'A case' to 'A patient'");
        assert_eq!(case["tags"].to_string(), "'[Category: clinical]' to '[Category: admin]'");
        assert!(diff.edges.is_none());
    }

    #[test]
    fn test_value_set_terms_compared_by_key() {
        let a = build(OLD);
        let b = build(&OLD.replace("[normal, tumor]", "[normal, tumor, metastatic]"));
        let diff = diff_models(&a, &b, &DiffOptions::default()).unwrap();

        let props = diff.props.as_ref().unwrap();
        let change = &props.changed.as_ref().unwrap()[&crate::model::PropKey::of_node("sample", "sample_type")];
        let vs = &change["value_set"];
        assert!(vs.removed.is_none());
        match &vs.added {
            Some(DiffValue::Entities(items)) => {
                assert_eq!(items.keys().collect::<Vec<_>>(), vec!["metastatic"])
            }
            other => panic!("expected added terms, got {:?}", other),
        }
        let terms = diff.terms.as_ref().unwrap();
        assert_eq!(terms.added.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_concept_added_recorded_as_annotation() {
        let a = build(OLD);
        let b = build(&OLD.replace(
            "    Desc: A case\n",
            "    Desc: A case\n    Term:\n      - Value: Case\n        Origin: caDSR\n",
        ));
        let diff = diff_models(&a, &b, &DiffOptions::default()).unwrap();
        let changed = diff.nodes.as_ref().unwrap().changed.as_ref().unwrap();
        assert!(changed["case"].contains_key("concept"));

        let anno = &diff.annotations()[&AnnotatedKey::Node("case".into())];
        assert!(anno.removed.is_empty());
        assert_eq!(anno.added.len(), 1);
    }
}
