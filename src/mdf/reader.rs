//! MDF Reader
//!
//! Builds a [`Model`] from loaded MDF in fixed passes: terms, nodes, edges,
//! properties, then composite keys. Later passes refer to entities made by
//! earlier ones, so the order is not negotiable.
//!
//! Problems that still leave a usable model are recorded as diagnostics and
//! the build continues. Only structural problems (a missing top-level
//! section, malformed YAML, schema violations) abort the build outright. With
//! `strict` set, a build that recorded any error-severity diagnostic returns
//! [`MdfError::Build`] once every pass has run.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::OnceLock;

use super::convert::{model_init, scalar_string, string_list, translate, EdgeSpec, Init};
use super::domain::ValueSetSource;
use super::enum_ref::load_enum_terms;
use super::props::{lookup_definition, PropertyTable};
use crate::checksum::SourceDigest;
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::error::{MdfError, Result};
use crate::loader::{MdfLoader, MdfSource};
use crate::model::{
    Edge, EdgeId, EntityId, Model, Node, NodeId, Owner, PropId, Property, Term, TermIdentity,
    Triplet, ValueSet, DEFAULT_MULTIPLICITY, STANDARD_MULTIPLICITIES,
};
use crate::validator::MdfValidator;

/// Top-level sections every MDF must have
const REQUIRED_SECTIONS: [&str; 3] = ["Nodes", "Relationships", "PropDefinitions"];

/// End-level keys that replace the relationship-level value when present
const END_OVERRIDES: [&str; 7] = ["Mul", "Desc", "NanoID", "Req", "Tags", "Term", "Props"];

/// Options for building a model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Model handle; overrides the MDF's `Handle`
    pub handle: Option<String>,
    /// Fail the build when any error-severity diagnostic was recorded
    pub strict: bool,
    /// Leave URL/path enum references unloaded
    pub ignore_enum_by_reference: bool,
    /// Check loaded MDF against the MDF schema before building
    pub validate: bool,
    /// Schema to validate against instead of the bundled one
    pub schema_path: Option<PathBuf>,
    pub term_identity: TermIdentity,
    /// Directory `/path` enum references are resolved under
    pub enum_base_dir: Option<PathBuf>,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            handle: None,
            strict: false,
            ignore_enum_by_reference: false,
            validate: true,
            schema_path: None,
            term_identity: TermIdentity::default(),
            enum_base_dir: None,
        }
    }
}

/// Last build pass that completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuildStage {
    Start,
    HandleResolved,
    TermsCreated,
    NodesCreated,
    EdgesCreated,
    PropsResolved,
    CompositeKeysResolved,
}

/// Reads MDF and builds a model from it
pub struct MdfReader {
    options: ReaderOptions,
    loader: MdfLoader,
    mdf: Mapping,
    digests: Vec<SourceDigest>,
    model: Option<Model>,
    props: PropertyTable,
    diagnostics: Diagnostics,
    stage: BuildStage,
}

impl MdfReader {
    pub fn new(options: ReaderOptions) -> Self {
        Self {
            options,
            loader: MdfLoader::default(),
            mdf: Mapping::new(),
            digests: Vec::new(),
            model: None,
            props: PropertyTable::new(),
            diagnostics: Diagnostics::new(),
            stage: BuildStage::Start,
        }
    }

    /// Use a configured loader (duplicate checks, URL fetcher)
    pub fn with_loader(mut self, loader: MdfLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Load, validate and build in one call
    pub fn from_sources(sources: &[MdfSource], options: ReaderOptions) -> Result<Self> {
        let mut reader = Self::new(options);
        reader.load(sources)?;
        reader.create_model()?;
        Ok(reader)
    }

    /// Load and merge sources, then validate the result
    pub fn load(&mut self, sources: &[MdfSource]) -> Result<()> {
        let loaded = self.loader.load(sources)?;
        self.digests = loaded.digests;
        self.load_mapping(loaded.mdf)
    }

    /// Use an already parsed MDF document
    pub fn load_mapping(&mut self, mdf: Mapping) -> Result<()> {
        if self.options.validate && !mdf.is_empty() {
            let validator = match &self.options.schema_path {
                Some(path) => MdfValidator::from_file(path)?,
                None => MdfValidator::embedded()?,
            };
            validator.validate_yaml(&Value::Mapping(mdf.clone()))?;
        }
        self.mdf = mdf;
        self.model = None;
        self.stage = BuildStage::Start;
        Ok(())
    }

    /// Build the model from the loaded MDF
    ///
    /// Without a handle (from the options or the MDF `Handle`) no model can
    /// exist, so that case returns `MdfError::Build` whether or not `strict`
    /// is set. Every other build problem is only fatal under `strict`.
    pub fn create_model(&mut self) -> Result<&Model> {
        if self.mdf.is_empty() {
            return Err(MdfError::NoModel("no MDF has been loaded".to_string()));
        }
        for section in REQUIRED_SECTIONS {
            if !self.mdf.contains_key(section) {
                return Err(MdfError::MissingSection(section));
            }
        }

        self.diagnostics = Diagnostics::new();
        self.stage = BuildStage::Start;
        self.model = None;

        let handle = self
            .options
            .handle
            .clone()
            .or_else(|| self.mdf.get("Handle").and_then(scalar_string));
        let Some(handle) = handle else {
            self.diagnostics.report(
                "Handle",
                DiagnosticCode::MissingHandle,
                "no model handle given and MDF has no 'Handle'",
            );
            return Err(MdfError::Build(self.diagnostics.clone()));
        };

        let mut model = Model::new(handle).with_term_identity(self.options.term_identity);
        model.version = self.mdf.get("Version").and_then(scalar_string);
        model.uri = self.mdf.get("URI").and_then(scalar_string);
        self.stage = BuildStage::HandleResolved;
        tracing::debug!(handle = %model.handle, "building model");

        let builder = ModelBuilder {
            mdf: &self.mdf,
            options: &self.options,
            loader: &self.loader,
            diagnostics: &mut self.diagnostics,
            stage: &mut self.stage,
            model,
            term_table: BTreeMap::new(),
            node_props: Vec::new(),
            edge_props: Vec::new(),
        };
        let (model, props) = builder.build()?;
        self.model = Some(model);
        self.props = props;

        if self.options.strict && !self.diagnostics.is_success() {
            return Err(MdfError::Build(self.diagnostics.clone()));
        }
        self.model()
    }

    /// The built model
    pub fn model(&self) -> Result<&Model> {
        self.model
            .as_ref()
            .ok_or_else(|| MdfError::NoModel("create_model has not produced a model".to_string()))
    }

    pub fn into_model(self) -> Result<Model> {
        self.model
            .ok_or_else(|| MdfError::NoModel("create_model has not produced a model".to_string()))
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// True when a model was built without error-severity diagnostics
    pub fn success(&self) -> bool {
        self.model.is_some() && self.diagnostics.is_success()
    }

    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    /// Checksums of the loaded sources, in load order
    pub fn digests(&self) -> &[SourceDigest] {
        &self.digests
    }

    /// The merged MDF document
    pub fn mdf(&self) -> &Mapping {
        &self.mdf
    }

    pub fn version(&self) -> Option<&str> {
        self.model.as_ref().and_then(|m| m.version.as_deref())
    }

    pub fn uri(&self) -> Option<&str> {
        self.model.as_ref().and_then(|m| m.uri.as_deref())
    }

    /// Shared properties of the last build, by name
    pub fn shared_props(&self) -> &PropertyTable {
        &self.props
    }
}

fn composite_key_pattern() -> &'static Regex {
    static KEY: OnceLock<Regex> = OnceLock::new();
    KEY.get_or_init(|| Regex::new(r"^(?:([^.]*)[.])?([^.]*)").expect("static regex"))
}

/// State of one build
struct ModelBuilder<'r> {
    mdf: &'r Mapping,
    options: &'r ReaderOptions,
    loader: &'r MdfLoader,
    diagnostics: &'r mut Diagnostics,
    stage: &'r mut BuildStage,
    model: Model,
    /// `Terms` entries by handle; interned only when something uses them
    term_table: BTreeMap<String, Term>,
    /// Declared property names per owner, in declaration order
    node_props: Vec<(NodeId, Vec<String>)>,
    edge_props: Vec<(EdgeId, Vec<String>)>,
}

impl<'r> ModelBuilder<'r> {
    fn build(mut self) -> Result<(Model, PropertyTable)> {
        self.create_terms()?;
        self.advance(BuildStage::TermsCreated);
        self.create_nodes()?;
        self.advance(BuildStage::NodesCreated);
        self.create_edges()?;
        self.advance(BuildStage::EdgesCreated);
        let props = self.create_props()?;
        self.advance(BuildStage::PropsResolved);
        self.resolve_composite_keys();
        self.advance(BuildStage::CompositeKeysResolved);
        Ok((self.model, props))
    }

    fn advance(&mut self, stage: BuildStage) {
        tracing::debug!(?stage, model = %self.model.handle, "build pass complete");
        *self.stage = stage;
    }

    fn section(&self, name: &str) -> Option<&'r Mapping> {
        self.mdf.get(name).and_then(Value::as_mapping)
    }

    fn create_terms(&mut self) -> Result<()> {
        let Some(terms) = self.section("Terms") else {
            return Ok(());
        };
        for (key, spec) in terms {
            let Some(key) = scalar_string(key) else { continue };
            let empty = Mapping::new();
            let spec = spec.as_mapping().unwrap_or(&empty);
            if let Some(term) = self.term_from_spec(&format!("Terms.{}", key), spec, Some(&key))? {
                self.term_table.insert(term.handle.clone(), term);
            }
        }
        Ok(())
    }

    fn create_nodes(&mut self) -> Result<()> {
        let Some(nodes) = self.section("Nodes") else {
            return Ok(());
        };
        for (key, spec) in nodes {
            let Some(handle) = scalar_string(key) else { continue };
            let empty = Mapping::new();
            let spec = spec.as_mapping().unwrap_or(&empty);

            let node = translate::<Node>(Some(&handle), spec, model_init(&self.model.handle))?;
            let id = self.model.add_node(node)?;
            self.annotate(EntityId::Node(id), &handle, spec.get("Term"))?;
            self.node_props.push((id, string_list(spec.get("Props"))));
        }
        Ok(())
    }

    fn create_edges(&mut self) -> Result<()> {
        let Some(relationships) = self.section("Relationships") else {
            return Ok(());
        };
        for (key, spec) in relationships {
            let Some(handle) = scalar_string(key) else { continue };
            let empty = Mapping::new();
            let spec = spec.as_mapping().unwrap_or(&empty);
            let Some(ends) = spec.get("Ends").and_then(Value::as_sequence) else {
                tracing::debug!(relationship = %handle, "relationship has no Ends");
                continue;
            };

            let base: Mapping = spec
                .iter()
                .filter(|(k, _)| k.as_str() != Some("Ends"))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();

            for end in ends {
                let Some(end) = end.as_mapping() else { continue };
                self.create_edge(&handle, &base, end)?;
            }
        }
        Ok(())
    }

    /// Build the edge for one `Ends` entry
    fn create_edge(&mut self, handle: &str, base: &Mapping, end: &Mapping) -> Result<()> {
        let src = end.get("Src").and_then(scalar_string).unwrap_or_default();
        let dst = end.get("Dst").and_then(scalar_string).unwrap_or_default();
        let (src_id, dst_id) = match (self.model.node_id(&src), self.model.node_id(&dst)) {
            (Some(s), Some(d)) => (s, d),
            (s, _) => {
                let missing = if s.is_none() { &src } else { &dst };
                self.diagnostics.report(
                    handle,
                    DiagnosticCode::UndefinedEndpoint,
                    format!(
                        "Ends entry {} -> {} names node '{}', which is not in Nodes; skipped",
                        src, dst, missing
                    ),
                );
                return Ok(());
            }
        };

        let triplet = Triplet::new(handle, src.as_str(), dst.as_str());
        if self.model.edge_id(&triplet).is_some() {
            self.diagnostics.report(
                triplet.to_string(),
                DiagnosticCode::DuplicateEnds,
                format!("relationship '{}' already has an end {} -> {}; skipped", handle, src, dst),
            );
            return Ok(());
        }

        let mut effective = base.clone();
        for key in END_OVERRIDES {
            if let Some(value) = end.get(key).filter(|v| !v.is_null()) {
                effective.insert(Value::String(key.to_string()), value.clone());
            }
        }

        let draft = translate::<EdgeSpec>(Some(handle), &effective, model_init(&self.model.handle))?;
        let multiplicity = match draft.multiplicity {
            Some(mul) => mul,
            None => {
                self.diagnostics.report(
                    triplet.to_string(),
                    DiagnosticCode::MissingMultiplicity,
                    format!("no Mul given; using '{}'", DEFAULT_MULTIPLICITY),
                );
                DEFAULT_MULTIPLICITY.to_string()
            }
        };
        if !STANDARD_MULTIPLICITIES.contains(&multiplicity.as_str()) {
            self.diagnostics.report(
                triplet.to_string(),
                DiagnosticCode::NonStandardMultiplicity,
                format!("multiplicity '{}' is not a standard value", multiplicity),
            );
        }

        let id = self.model.add_edge(Edge {
            handle: handle.to_string(),
            model: draft.model,
            src: src_id,
            dst: dst_id,
            multiplicity,
            desc: draft.desc,
            nanoid: draft.nanoid,
            is_required: draft.is_required,
            tags: draft.tags,
            concept: None,
            props: BTreeMap::new(),
        })?;
        self.annotate(EntityId::Edge(id), &triplet.to_string(), effective.get("Term"))?;
        self.edge_props.push((id, string_list(effective.get("Props"))));
        Ok(())
    }

    fn create_props(&mut self) -> Result<PropertyTable> {
        let empty = Mapping::new();
        let defs = self.section("PropDefinitions").unwrap_or(&empty);
        let universal_node = self.universal("UniversalNodeProperties");
        let universal_edge = self.universal("UniversalRelationshipProperties");

        let owners: Vec<(Owner, Vec<String>)> = self
            .node_props
            .iter()
            .map(|(id, names)| (Owner::Node(*id), with_universal(names, &universal_node)))
            .chain(
                self.edge_props
                    .iter()
                    .map(|(id, names)| (Owner::Edge(*id), with_universal(names, &universal_edge))),
            )
            .collect();

        let mut table = PropertyTable::new();
        for (owner, names) in owners {
            let owner_handle = self.model.owner_handle(owner).to_string();
            for name in names {
                let Some(def) = lookup_definition(defs, &owner_handle, &name) else {
                    self.diagnostics.report(
                        self.model.owner_key(owner).to_string(),
                        DiagnosticCode::MissingPropDefinition,
                        format!("property '{}' has no definition; skipped", name),
                    );
                    continue;
                };
                let prop = table.obtain(&def, &name, || self.create_prop(&name, def.spec))?;
                self.model.attach_prop(owner, prop)?;
            }
        }

        let unused = table.unclaimed(defs);
        if !unused.is_empty() {
            self.diagnostics.unused_prop_definitions(&unused);
        }
        Ok(table)
    }

    /// `mayHave` plus `mustHave` names of a universal-properties section
    fn universal(&self, section: &str) -> Vec<String> {
        let Some(spec) = self.section(section) else {
            return Vec::new();
        };
        let mut names = string_list(spec.get("mayHave"));
        names.extend(string_list(spec.get("mustHave")));
        names
    }

    fn create_prop(&mut self, name: &str, spec: &Value) -> Result<PropId> {
        let empty = Mapping::new();
        let spec = spec.as_mapping().unwrap_or(&empty);
        let draft = translate::<Property>(Some(name), spec, model_init(&self.model.handle))?;
        for warning in &draft.warnings {
            self.diagnostics
                .report(name, DiagnosticCode::DefaultDomain, warning.clone());
        }

        let prop = self.model.new_prop(draft.prop);
        match draft.pending {
            None => {}
            Some(ValueSetSource::Terms(inits)) => {
                let mut terms = Vec::with_capacity(inits.len());
                for init in inits {
                    let term = self.term_table.get(&init.handle).cloned().unwrap_or_else(|| Term {
                        handle: init.handle,
                        value: init.value,
                        origin_name: Some(self.model.handle.clone()),
                        ..Default::default()
                    });
                    terms.push(self.model.intern_term(term));
                }
                self.model.add_terms(prop, terms);
            }
            Some(source @ ValueSetSource::Url(_)) | Some(source @ ValueSetSource::Path(_)) => {
                self.reference_value_set(prop, name, &source);
            }
        }

        self.annotate(EntityId::Property(prop), name, spec.get("Term"))?;
        Ok(prop)
    }

    /// Give a property a value set defined by reference, loading its terms
    /// unless references are ignored
    fn reference_value_set(&mut self, prop: PropId, name: &str, source: &ValueSetSource) {
        let (url, path) = match source {
            ValueSetSource::Url(url) => (Some(url.clone()), None),
            ValueSetSource::Path(path) => (None, Some(path.clone())),
            ValueSetSource::Terms(_) => (None, None),
        };
        let value_set = ValueSet {
            handle: Some(name.to_string()),
            url,
            path,
            terms: BTreeMap::new(),
        };
        let reference = value_set.reference().unwrap_or_default().to_string();
        self.model.add_value_set(prop, value_set);
        if self.options.ignore_enum_by_reference {
            return;
        }

        let loaded = load_enum_terms(
            self.loader,
            source,
            name,
            &self.model.handle,
            self.options.enum_base_dir.as_deref(),
        );
        match loaded {
            Err(err) => self.diagnostics.report(
                name,
                DiagnosticCode::EnumReference,
                format!("could not load enum reference '{}': {}", reference, err),
            ),
            Ok(terms) if terms.is_empty() => self.diagnostics.report(
                name,
                DiagnosticCode::EnumReference,
                format!("enum reference '{}' defines no values for this property", reference),
            ),
            Ok(terms) => {
                let ids: Vec<_> = terms
                    .into_iter()
                    .map(|term| {
                        let term = self.term_table.get(&term.handle).cloned().unwrap_or(term);
                        self.model.intern_term(term)
                    })
                    .collect();
                self.model.add_terms(prop, ids);
            }
        }
    }

    /// Annotate an entity with the terms of a `Term` list
    fn annotate(&mut self, entity: EntityId, subject: &str, specs: Option<&Value>) -> Result<()> {
        let Some(specs) = specs.and_then(Value::as_sequence) else {
            return Ok(());
        };
        for spec in specs {
            let Some(spec) = spec.as_mapping() else { continue };
            if let Some(term) = self.term_from_spec(subject, spec, None)? {
                let term = self.model.intern_term(term);
                self.model.annotate(entity, term);
            }
        }
        Ok(())
    }

    /// A term from its spec; `None` (with an error recorded) when it has no `Value`
    fn term_from_spec(&mut self, subject: &str, spec: &Mapping, handle: Option<&str>) -> Result<Option<Term>> {
        if spec.get("Value").map_or(true, Value::is_null) {
            self.diagnostics.report(
                subject,
                DiagnosticCode::MissingTermValue,
                "term spec has no Value",
            );
            return Ok(None);
        }
        let mut term = translate::<Term>(handle, spec, Init::new())?;
        if term.origin_name.is_none() {
            self.diagnostics.report(
                subject,
                DiagnosticCode::MissingTermOrigin,
                format!("term '{}' has no Origin; using '{}'", term.value, self.model.handle),
            );
            term.origin_name = Some(self.model.handle.clone());
        }
        Ok(Some(term))
    }

    fn resolve_composite_keys(&mut self) {
        let nodes: Vec<NodeId> = self.model.nodes().values().copied().collect();
        for id in nodes {
            let declared = self.model.node(id).composite_key.clone();
            if declared.is_empty() {
                continue;
            }
            let mut resolved = Vec::with_capacity(declared.len());
            for entry in &declared {
                match self.resolve_key_entry(id, entry) {
                    Some(pair) => resolved.push(pair),
                    None => {
                        let node = self.model.node(id).handle.clone();
                        self.diagnostics.report(
                            node,
                            DiagnosticCode::UnresolvedCompositeKey,
                            format!("composite key entry '{}' does not name a node property", entry),
                        );
                    }
                }
            }
            self.model.node_mut(id).composite_key_props = resolved;
        }
    }

    /// `prop` resolves on the declaring node, `node.prop` on the named node
    fn resolve_key_entry(&self, declaring: NodeId, entry: &str) -> Option<(NodeId, PropId)> {
        let caps = composite_key_pattern().captures(entry)?;
        let owner = match caps.get(1) {
            Some(node) => self.model.node_id(node.as_str())?,
            None => declaring,
        };
        let prop = caps.get(2)?.as_str();
        self.model.node(owner).props.get(prop).map(|p| (owner, *p))
    }
}

/// An owner's own property names followed by the universal ones, without repeats
fn with_universal(names: &[String], universal: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    names
        .iter()
        .chain(universal)
        .filter(|n| seen.insert(n.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OwnerKey, PropKey};

    fn reader_for(yaml: &str) -> MdfReader {
        let mut reader = MdfReader::new(ReaderOptions::default());
        reader.load(&[MdfSource::text("test.yml", yaml)]).unwrap();
        reader
    }

    const BASE: &str = "\
Handle: test
Version: 1.2.0
Nodes:
  case:
    Props: [case_id]
  sample:
    Props: [sample_type]
  diagnosis: {}
Relationships:
  of_case:
    Mul: many_to_one
    Ends:
      - Src: sample
        Dst: case
      - Src: diagnosis
        Dst: case
PropDefinitions:
  case_id:
    Type: string
    Key: true
  sample_type:
    Enum: [normal, tumor]
";

    #[test]
    fn test_build_runs_every_pass() {
        let mut reader = reader_for(BASE);
        let model = reader.create_model().unwrap();
        assert_eq!(model.handle, "test");
        assert_eq!(model.version.as_deref(), Some("1.2.0"));
        assert_eq!(model.nodes().len(), 3);
        assert_eq!(model.edges().len(), 2);
        assert!(reader.success());
        assert_eq!(reader.stage(), BuildStage::CompositeKeysResolved);
    }

    #[test]
    fn test_explicit_handle_overrides_mdf() {
        let mut reader = MdfReader::new(ReaderOptions {
            handle: Some("other".into()),
            ..Default::default()
        });
        reader.load(&[MdfSource::text("test.yml", BASE)]).unwrap();
        assert_eq!(reader.create_model().unwrap().handle, "other");
    }

    #[test]
    fn test_missing_handle_is_build_error() {
        let mut reader = reader_for(&BASE.replace("Handle: test\n", ""));
        assert!(!reader.options.strict);
        match reader.create_model() {
            Err(MdfError::Build(diags)) => {
                assert_eq!(diags.with_code(DiagnosticCode::MissingHandle).count(), 1)
            }
            other => panic!("expected build error, got {:?}", other.map(|m| m.handle.clone())),
        }
        assert!(!reader.success());
        assert!(matches!(reader.model(), Err(MdfError::NoModel(_))));
    }

    #[test]
    fn test_missing_section_is_fatal() {
        let mut reader = MdfReader::new(ReaderOptions {
            validate: false,
            ..Default::default()
        });
        let mdf = "Handle: test\nNodes: {}\nRelationships: {}\n";
        reader.load(&[MdfSource::text("test.yml", mdf)]).unwrap();
        assert!(matches!(
            reader.create_model(),
            Err(MdfError::MissingSection("PropDefinitions"))
        ));
    }

    #[test]
    fn test_nothing_loaded() {
        let mut reader = MdfReader::new(ReaderOptions::default());
        assert!(matches!(reader.create_model(), Err(MdfError::NoModel(_))));
    }

    #[test]
    fn test_terms_table_supplies_enum_terms() {
        let mdf = format!(
            "{}Terms:\n  tumor:\n    Value: tumor\n    Origin: NCIt\n    Code: C18009\n",
            BASE
        );
        let mut reader = reader_for(&mdf);
        let model = reader.create_model().unwrap();
        let prop = model.prop_id(&PropKey::of_node("sample", "sample_type")).unwrap();
        let origins: Vec<_> = model
            .prop_terms(prop)
            .into_iter()
            .map(|t| model.term(t).origin_name.clone().unwrap_or_default())
            .collect();
        assert_eq!(origins, vec!["test".to_string(), "NCIt".to_string()]);
    }

    #[test]
    fn test_term_without_value_or_origin() {
        let mdf = BASE.replace(
            "  diagnosis: {}\n",
            "  diagnosis:\n    Term:\n      - Value: Diagnosis\n      - Origin: NCIt\n",
        );
        let mut reader = reader_for(&mdf);
        let model = reader.create_model().unwrap();
        let diagnosis = model.node_id("diagnosis").unwrap();
        let terms = model.annotations(EntityId::Node(diagnosis));
        assert_eq!(terms.len(), 1);
        assert_eq!(model.term(terms[0]).origin_name.as_deref(), Some("test"));

        let diags = reader.diagnostics();
        assert_eq!(diags.with_code(DiagnosticCode::MissingTermOrigin).count(), 1);
        assert_eq!(diags.with_code(DiagnosticCode::MissingTermValue).count(), 1);
        assert!(!reader.success());
    }

    #[test]
    fn test_duplicate_ends_skipped() {
        let mdf = BASE.replace(
            "      - Src: diagnosis\n",
            "      - Src: sample\n        Dst: case\n      - Src: diagnosis\n",
        );
        let mut reader = MdfReader::new(ReaderOptions::default()).with_loader(MdfLoader::new(
            crate::loader::LoaderConfig {
                reject_duplicate_elements: false,
            },
        ));
        reader.load(&[MdfSource::text("test.yml", mdf)]).unwrap();
        let model = reader.create_model().unwrap();
        assert_eq!(model.edges().len(), 2);
        assert_eq!(
            reader.diagnostics().with_code(DiagnosticCode::DuplicateEnds).count(),
            1
        );
    }

    #[test]
    fn test_universal_props_attach_everywhere() {
        let mdf = format!(
            "{}  crdc_id:\n    Type: string\nUniversalNodeProperties:\n  mayHave: [crdc_id]\n",
            BASE
        );
        let mut reader = reader_for(&mdf);
        let model = reader.create_model().unwrap();
        let on_case = model.prop_id(&PropKey::of_node("case", "crdc_id")).unwrap();
        let on_sample = model.prop_id(&PropKey::of_node("sample", "crdc_id")).unwrap();
        assert_eq!(on_case, on_sample);
        assert_eq!(model.prop(on_case).belongs.len(), 3);
        assert_eq!(reader.shared_props().shared("crdc_id"), Some(on_case));
    }

    #[test]
    fn test_missing_and_unused_definitions_warn() {
        let mdf = BASE.replace("Props: [case_id]", "Props: [case_id, stage]")
            + "  orphan:\n    Type: integer\n";
        let mut reader = reader_for(&mdf);
        let model = reader.create_model().unwrap();
        assert!(model.prop_id(&PropKey::of_node("case", "stage")).is_none());

        let diags = reader.diagnostics();
        assert_eq!(diags.with_code(DiagnosticCode::MissingPropDefinition).count(), 1);
        let unused: Vec<_> = diags.with_code(DiagnosticCode::UnusedPropDefinitions).collect();
        assert_eq!(unused.len(), 1);
        assert_eq!(unused[0].context, vec!["orphan".to_string()]);
        assert!(reader.success());
    }

    #[test]
    fn test_composite_keys() {
        let mdf = BASE.replace(
            "  sample:\n    Props: [sample_type]\n",
            "  sample:\n    Props: [sample_type]\n    CompKey: [sample_type, case.case_id, case.nope]\n",
        );
        let mut reader = reader_for(&mdf);
        let model = reader.create_model().unwrap();
        let sample = model.node_by_handle("sample").unwrap();
        let case = model.node_id("case").unwrap();
        assert_eq!(sample.composite_key_props.len(), 2);
        assert_eq!(sample.composite_key_props[1].0, case);
        assert_eq!(
            reader
                .diagnostics()
                .with_code(DiagnosticCode::UnresolvedCompositeKey)
                .count(),
            1
        );
    }

    #[test]
    fn test_edge_props_keyed_by_triplet() {
        let mdf = BASE.replace("    Mul: many_to_one\n", "    Mul: many_to_one\n    Props: [case_id]\n");
        let mut reader = reader_for(&mdf);
        let model = reader.create_model().unwrap();
        let key = PropKey::new(
            OwnerKey::Edge(Triplet::new("of_case", "sample", "case")),
            "case_id",
        );
        assert!(model.prop_id(&key).is_some());
    }

    #[test]
    fn test_referenced_enum_left_unloaded_when_ignored() {
        let mdf = BASE.replace("Enum: [normal, tumor]", "Enum: ['/enums/sample_type.yml']");
        let mut reader = MdfReader::new(ReaderOptions {
            ignore_enum_by_reference: true,
            ..Default::default()
        });
        reader.load(&[MdfSource::text("test.yml", mdf)]).unwrap();
        let model = reader.create_model().unwrap();
        let prop = model.prop_id(&PropKey::of_node("sample", "sample_type")).unwrap();
        let vs = model.value_set(model.prop(prop).value_set.unwrap());
        assert_eq!(vs.path.as_deref(), Some("/enums/sample_type.yml"));
        assert!(vs.terms.is_empty());
        assert!(reader.success());
    }

    #[test]
    fn test_unloadable_enum_reference_is_error() {
        let mdf = BASE.replace("Enum: [normal, tumor]", "Enum: ['/no/such/enum.yml']");
        let mut reader = reader_for(&mdf);
        reader.create_model().unwrap();
        assert_eq!(
            reader.diagnostics().with_code(DiagnosticCode::EnumReference).count(),
            1
        );
        assert!(!reader.success());
    }
}
