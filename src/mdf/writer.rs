//! MDF Writer
//!
//! Renders a [`Model`] back into MDF. Edges sharing a handle become the Ends
//! of one relationship; attributes common to every End are written once at
//! the relationship level and the rest per End, which is exactly what the
//! reader's End-overrides rule undoes.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use crate::error::{MdfError, Result};
use crate::model::{EdgeId, EntityId, Model, NodeId, PropId, Property, Tags, Term, TermId};

/// Output policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Write attributes shared by all Ends of a relationship at relationship level
    pub hoist_end_attributes: bool,
    /// Emit a `Terms` section for every term the model uses
    pub emit_terms_section: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            hoist_end_attributes: true,
            emit_terms_section: true,
        }
    }
}

/// End-level keys that may be hoisted (besides `Mul` and `Props`)
const HOISTABLE: [&str; 5] = ["Desc", "NanoID", "Req", "Tags", "Term"];

fn key(s: &str) -> Value {
    Value::String(s.to_string())
}

fn put(map: &mut Mapping, k: &str, value: Value) {
    map.insert(key(k), value);
}

fn put_text(map: &mut Mapping, k: &str, value: &Option<String>) {
    if let Some(v) = value {
        put(map, k, Value::String(v.clone()));
    }
}

fn string_seq<I, S>(items: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Value::Sequence(items.into_iter().map(|s| Value::String(s.into())).collect())
}

fn tags_value(tags: &Tags) -> Option<Value> {
    if tags.is_empty() {
        return None;
    }
    let map: Mapping = tags
        .values()
        .map(|tag| (key(&tag.key), Value::String(tag.value.clone())))
        .collect();
    Some(Value::Mapping(map))
}

/// MDF spec of one term
pub fn term_spec(term: &Term) -> Mapping {
    let mut spec = Mapping::new();
    put(&mut spec, "Value", Value::String(term.value.clone()));
    put_text(&mut spec, "Origin", &term.origin_name);
    put_text(&mut spec, "Definition", &term.origin_definition);
    put_text(&mut spec, "Code", &term.origin_id);
    put_text(&mut spec, "Version", &term.origin_version);
    put(&mut spec, "Handle", Value::String(term.handle.clone()));
    put_text(&mut spec, "NanoID", &term.nanoid);
    put_text(&mut spec, "Desc", &term.desc);
    if let Some(tags) = tags_value(&term.tags) {
        put(&mut spec, "Tags", tags);
    }
    spec
}

/// Writes a model as MDF
pub struct MdfWriter<'m> {
    model: &'m Model,
    config: WriterConfig,
}

impl<'m> MdfWriter<'m> {
    pub fn new(model: &'m Model) -> Self {
        Self {
            model,
            config: WriterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: WriterConfig) -> Self {
        self.config = config;
        self
    }

    /// The model as an MDF mapping
    pub fn to_mdf(&self) -> Result<Mapping> {
        let model = self.model;
        let mut mdf = Mapping::new();
        put(&mut mdf, "Handle", Value::String(model.handle.clone()));
        put_text(&mut mdf, "Version", &model.version);
        put_text(&mut mdf, "URI", &model.uri);
        put(&mut mdf, "Nodes", Value::Mapping(self.nodes()));
        put(&mut mdf, "Relationships", Value::Mapping(self.relationships()));
        put(&mut mdf, "PropDefinitions", Value::Mapping(self.prop_definitions()?));
        if self.config.emit_terms_section {
            let terms = self.terms_section();
            if !terms.is_empty() {
                put(&mut mdf, "Terms", Value::Mapping(terms));
            }
        }
        tracing::debug!(handle = %model.handle, "rendered model as MDF");
        Ok(mdf)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&Value::Mapping(self.to_mdf()?))?)
    }

    pub fn write_file(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_yaml_string()?)?;
        tracing::info!(path = %path.display(), "wrote MDF");
        Ok(())
    }

    fn annotation_specs(&self, entity: EntityId) -> Option<Value> {
        let terms = self.model.annotations(entity);
        if terms.is_empty() {
            return None;
        }
        Some(Value::Sequence(
            terms
                .into_iter()
                .map(|t| Value::Mapping(term_spec(self.model.term(t))))
                .collect(),
        ))
    }

    // ========== Nodes ==========

    fn nodes(&self) -> Mapping {
        let mut nodes = Mapping::new();
        for (handle, id) in self.model.nodes() {
            nodes.insert(key(handle), Value::Mapping(self.node_spec(*id)));
        }
        nodes
    }

    fn node_spec(&self, id: NodeId) -> Mapping {
        let node = self.model.node(id);
        let mut spec = Mapping::new();
        put_text(&mut spec, "Desc", &node.desc);
        put_text(&mut spec, "NanoID", &node.nanoid);
        if let Some(tags) = tags_value(&node.tags) {
            put(&mut spec, "Tags", tags);
        }
        if let Some(terms) = self.annotation_specs(EntityId::Node(id)) {
            put(&mut spec, "Term", terms);
        }
        let props = if node.props.is_empty() {
            Value::Null
        } else {
            string_seq(node.props.keys().cloned())
        };
        put(&mut spec, "Props", props);
        if !node.composite_key_props.is_empty() {
            let entries = node.composite_key_props.iter().map(|(owner, prop)| {
                let prop = &self.model.prop(*prop).handle;
                if *owner == id {
                    prop.clone()
                } else {
                    format!("{}.{}", self.model.node(*owner).handle, prop)
                }
            });
            put(&mut spec, "CompKey", string_seq(entries));
        }
        spec
    }

    // ========== Relationships ==========

    fn relationships(&self) -> Mapping {
        let mut groups: BTreeMap<&str, Vec<EdgeId>> = BTreeMap::new();
        for (triplet, id) in self.model.edges() {
            groups.entry(triplet.handle.as_str()).or_default().push(*id);
        }
        let mut relationships = Mapping::new();
        for (handle, ids) in groups {
            relationships.insert(key(handle), Value::Mapping(self.relationship_spec(&ids)));
        }
        relationships
    }

    /// One End-level key rendered for one edge
    fn end_value(&self, id: EdgeId, k: &str) -> Option<Value> {
        let edge = self.model.edge(id);
        match k {
            "Desc" => edge.desc.clone().map(Value::String),
            "NanoID" => edge.nanoid.clone().map(Value::String),
            "Req" => edge.is_required.map(Value::Bool),
            "Tags" => tags_value(&edge.tags),
            "Term" => self.annotation_specs(EntityId::Edge(id)),
            _ => None,
        }
    }

    fn relationship_spec(&self, ids: &[EdgeId]) -> Mapping {
        let model = self.model;
        let hoist = self.config.hoist_end_attributes;
        let mut spec = Mapping::new();
        let mut ends: Vec<Mapping> = ids
            .iter()
            .map(|id| {
                let edge = model.edge(*id);
                let mut end = Mapping::new();
                put(&mut end, "Src", Value::String(model.node(edge.src).handle.clone()));
                put(&mut end, "Dst", Value::String(model.node(edge.dst).handle.clone()));
                end
            })
            .collect();

        // multiplicity: most common value, ties to the first End
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for id in ids {
            let mul = model.edge(*id).multiplicity.as_str();
            match counts.iter_mut().find(|(m, _)| *m == mul) {
                Some((_, n)) => *n += 1,
                None => counts.push((mul, 1)),
            }
        }
        let mut majority: Option<(&str, usize)> = None;
        for (mul, n) in &counts {
            if majority.map_or(true, |(_, best)| *n > best) {
                majority = Some((*mul, *n));
            }
        }
        let default_mul = if hoist { majority.map(|(m, _)| m) } else { None };
        if let Some(mul) = default_mul {
            put(&mut spec, "Mul", key(mul));
        }
        for (end, id) in ends.iter_mut().zip(ids) {
            let mul = model.edge(*id).multiplicity.as_str();
            if default_mul != Some(mul) {
                put(end, "Mul", key(mul));
            }
        }

        for k in HOISTABLE {
            let values: Vec<Option<Value>> = ids.iter().map(|id| self.end_value(*id, k)).collect();
            let uniform = values.windows(2).all(|w| w[0] == w[1]);
            if hoist && uniform {
                if let Some(Some(value)) = values.into_iter().next() {
                    put(&mut spec, k, value);
                }
            } else {
                for (end, value) in ends.iter_mut().zip(values) {
                    if let Some(value) = value {
                        put(end, k, value);
                    }
                }
            }
        }

        let prop_sets: Vec<BTreeSet<&str>> = ids
            .iter()
            .map(|id| model.edge(*id).props.keys().map(String::as_str).collect())
            .collect();
        let uniform = prop_sets.windows(2).all(|w| w[0] == w[1]);
        if hoist && uniform {
            if let Some(props) = prop_sets.first().filter(|p| !p.is_empty()) {
                put(&mut spec, "Props", string_seq(props.iter().copied()));
            }
        } else if hoist {
            let union: BTreeSet<&str> = prop_sets.iter().flatten().copied().collect();
            put(&mut spec, "Props", string_seq(union.iter().copied()));
            for (end, props) in ends.iter_mut().zip(&prop_sets) {
                if *props != union {
                    put(end, "Props", string_seq(props.iter().copied()));
                }
            }
        } else {
            for (end, props) in ends.iter_mut().zip(&prop_sets) {
                if !props.is_empty() {
                    put(end, "Props", string_seq(props.iter().copied()));
                }
            }
        }

        put(
            &mut spec,
            "Ends",
            Value::Sequence(ends.into_iter().map(Value::Mapping).collect()),
        );
        spec
    }

    // ========== Properties ==========

    fn prop_definitions(&self) -> Result<Mapping> {
        let model = self.model;
        let mut by_handle: BTreeMap<&str, Vec<PropId>> = BTreeMap::new();
        for (id, prop) in model.distinct_props() {
            if !prop.belongs.is_empty() {
                by_handle.entry(prop.handle.as_str()).or_default().push(id);
            }
        }

        let mut defs = Mapping::new();
        for (handle, ids) in by_handle {
            // the property with the most owners gets the bare name
            let mut primary = ids[0];
            for id in &ids[1..] {
                if model.prop(*id).belongs.len() > model.prop(primary).belongs.len() {
                    primary = *id;
                }
            }
            for id in ids {
                let prop = model.prop(id);
                let spec = Value::Mapping(self.prop_spec(id, prop)?);
                if id == primary {
                    defs.insert(key(handle), spec);
                    continue;
                }
                for owner in &prop.belongs {
                    let qualified = format!("{}.{}", model.owner_handle(*owner), handle);
                    if !defs.contains_key(qualified.as_str()) {
                        defs.insert(Value::String(qualified), spec.clone());
                    }
                }
            }
        }
        Ok(defs)
    }

    fn prop_spec(&self, id: PropId, prop: &Property) -> Result<Mapping> {
        let mut spec = Mapping::new();
        put_text(&mut spec, "Desc", &prop.desc);
        put_text(&mut spec, "NanoID", &prop.nanoid);
        if let Some(tags) = tags_value(&prop.tags) {
            put(&mut spec, "Tags", tags);
        }

        match prop.value_domain.as_str() {
            "regexp" => {
                let mut ty = Mapping::new();
                put(&mut ty, "pattern", Value::String(prop.pattern.clone().unwrap_or_default()));
                put(&mut spec, "Type", Value::Mapping(ty));
            }
            "value_set" => put(&mut spec, "Enum", self.enum_values(id)?),
            "list" => {
                let mut ty = Mapping::new();
                put(&mut ty, "value_type", key("list"));
                match prop.item_domain.as_deref() {
                    Some("value_set") => put(&mut ty, "Enum", self.enum_values(id)?),
                    Some("regexp") => {
                        let mut item = Mapping::new();
                        put(&mut item, "pattern", Value::String(prop.pattern.clone().unwrap_or_default()));
                        put(&mut ty, "item_type", Value::Mapping(item));
                    }
                    item => {
                        let item = item.unwrap_or(crate::model::DEFAULT_VALUE_DOMAIN);
                        let item_type = match units_type(item, prop) {
                            Some(units) => units,
                            None => key(item),
                        };
                        put(&mut ty, "item_type", item_type);
                    }
                }
                put(&mut spec, "Type", Value::Mapping(ty));
            }
            domain => {
                let ty = units_type(domain, prop).unwrap_or_else(|| key(domain));
                put(&mut spec, "Type", ty);
            }
        }

        if prop.is_required {
            put(&mut spec, "Req", Value::Bool(true));
        }
        if prop.is_key {
            put(&mut spec, "Key", Value::Bool(true));
        }
        if prop.is_nullable {
            put(&mut spec, "Nul", Value::Bool(true));
        }
        if !prop.is_strict {
            put(&mut spec, "Strict", Value::Bool(false));
        }
        if let Some(deprecated) = prop.is_deprecated {
            put(&mut spec, "Deprecated", Value::Bool(deprecated));
        }
        if let Some(terms) = self.annotation_specs(EntityId::Property(id)) {
            put(&mut spec, "Term", terms);
        }
        Ok(spec)
    }

    /// `Enum` list: the reference, or the term handles in order
    fn enum_values(&self, id: PropId) -> Result<Value> {
        let prop = self.model.prop(id);
        let value_set = prop.value_set.map(|vs| self.model.value_set(vs));
        match value_set {
            Some(vs) => match vs.reference() {
                Some(reference) => Ok(string_seq([reference])),
                None if !vs.terms.is_empty() => Ok(string_seq(vs.terms.keys().cloned())),
                None => Err(empty_value_set(prop)),
            },
            None => Err(empty_value_set(prop)),
        }
    }

    // ========== Terms ==========

    fn terms_section(&self) -> Mapping {
        let model = self.model;
        let mut seen: BTreeSet<TermId> = BTreeSet::new();
        let mut ordered: Vec<TermId> = Vec::new();

        for (id, prop) in model.distinct_props() {
            if !prop.belongs.is_empty() {
                ordered.extend(model.prop_terms(id));
            }
        }
        let annotated = model
            .nodes()
            .values()
            .map(|id| EntityId::Node(*id))
            .chain(model.edges().values().map(|id| EntityId::Edge(*id)))
            .chain(model.distinct_props().map(|(id, _)| EntityId::Property(id)));
        for entity in annotated {
            ordered.extend(model.annotations(entity));
        }

        let mut terms = Mapping::new();
        for id in ordered {
            if !seen.insert(id) {
                continue;
            }
            let term = model.term(id);
            if !terms.contains_key(term.handle.as_str()) {
                terms.insert(key(&term.handle), Value::Mapping(term_spec(term)));
            }
        }
        terms
    }
}

fn empty_value_set(prop: &Property) -> MdfError {
    MdfError::invariant(format!(
        "value set for property '{}' has neither terms nor a reference",
        prop.handle
    ))
}

/// `{value_type, units: [{pattern}?, unit...]}` when the property carries units
fn units_type(value_type: &str, prop: &Property) -> Option<Value> {
    let units = prop.units.as_ref()?;
    let mut list = Vec::new();
    if let Some(pattern) = &prop.pattern {
        let mut p = Mapping::new();
        put(&mut p, "pattern", Value::String(pattern.clone()));
        list.push(Value::Mapping(p));
    }
    list.extend(
        units
            .split(';')
            .filter(|u| !u.is_empty())
            .map(|u| Value::String(u.to_string())),
    );
    let mut ty = Mapping::new();
    put(&mut ty, "value_type", key(value_type));
    put(&mut ty, "units", Value::Sequence(list));
    Some(Value::Mapping(ty))
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

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    const MODEL: &str = "\
Handle: test
Nodes:
  case:
    Props: [case_id]
  sample:
    Props: [weight, site]
  file:
    Props: null
Relationships:
  of_case:
    Ends:
      - Src: sample
        Dst: case
        Mul: many_to_one
      - Src: file
        Dst: case
        Mul: one_to_one
      - Src: file
        Dst: sample
        Mul: many_to_one
        Desc: file of a sample
PropDefinitions:
  case_id:
    Type:
      pattern: '^C[0-9]+$'
    Key: true
  weight:
    Type:
      value_type: number
      units: [g, mg]
    Strict: false
  site:
    Type:
      value_type: list
      Enum: [lung, liver]
";

    #[test]
    fn test_mul_majority_and_per_end_desc() {
        let model = build(MODEL);
        let mdf = MdfWriter::new(&model).to_mdf().unwrap();
        let rel = &mdf["Relationships"]["of_case"];
        assert_eq!(rel["Mul"], yaml("many_to_one"));
        assert!(rel.get("Desc").is_none());

        let ends = rel["Ends"].as_sequence().unwrap();
        let one_to_one: Vec<_> = ends.iter().filter(|e| e.get("Mul").is_some()).collect();
        assert_eq!(one_to_one.len(), 1);
        assert_eq!(one_to_one[0]["Mul"], yaml("one_to_one"));
        assert_eq!(ends.iter().filter(|e| e.get("Desc").is_some()).count(), 1);
    }

    #[test]
    fn test_type_rendering() {
        let model = build(MODEL);
        let mdf = MdfWriter::new(&model).to_mdf().unwrap();
        let defs = &mdf["PropDefinitions"];
        assert_eq!(defs["case_id"]["Type"], yaml("pattern: '^C[0-9]+$'"));
        assert_eq!(defs["case_id"]["Key"], Value::Bool(true));
        assert_eq!(defs["weight"]["Type"], yaml("{value_type: number, units: [g, mg]}"));
        assert_eq!(defs["weight"]["Strict"], Value::Bool(false));
        assert_eq!(defs["site"]["Type"], yaml("{value_type: list, Enum: [liver, lung]}"));
    }

    #[test]
    fn test_nodes_props_sorted_or_null() {
        let model = build(MODEL);
        let mdf = MdfWriter::new(&model).to_mdf().unwrap();
        assert_eq!(mdf["Nodes"]["sample"]["Props"], yaml("[site, weight]"));
        assert_eq!(mdf["Nodes"]["file"]["Props"], Value::Null);
    }

    #[test]
    fn test_no_hoisting_writes_every_end() {
        let model = build(MODEL);
        let config = WriterConfig {
            hoist_end_attributes: false,
            emit_terms_section: false,
        };
        let mdf = MdfWriter::new(&model).with_config(config).to_mdf().unwrap();
        let rel = &mdf["Relationships"]["of_case"];
        assert!(rel.get("Mul").is_none());
        let ends = rel["Ends"].as_sequence().unwrap();
        assert!(ends.iter().all(|e| e.get("Mul").is_some()));
        assert!(mdf.get("Terms").is_none());
    }

    #[test]
    fn test_terms_section_keyed_by_handle() {
        let model = build(MODEL);
        let mdf = MdfWriter::new(&model).to_mdf().unwrap();
        let terms = mdf["Terms"].as_mapping().unwrap();
        assert_eq!(terms.len(), 2);
        assert_eq!(mdf["Terms"]["lung"]["Origin"], yaml("test"));
    }
}
