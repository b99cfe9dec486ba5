//! Model construction from MDF fixtures
//!
//! Builds models from the YAML under tests/fixtures and checks the resulting
//! graph, properties and vocabulary.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use bento_mdf::diagnostics::DiagnosticCode;
use bento_mdf::model::{PropKey, Triplet};
use bento_mdf::{MdfError, MdfReader, MdfSource, ReaderOptions};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn model_a_sources() -> Vec<MdfSource> {
    vec![
        MdfSource::from(fixture("model-a.yml").as_path()),
        MdfSource::from(fixture("model-props.yml").as_path()),
    ]
}

fn read_text(yaml: &str, options: ReaderOptions) -> MdfReader {
    let mut reader = MdfReader::new(options);
    reader.load(&[MdfSource::text("inline.yml", yaml)]).unwrap();
    reader
}

// =============================================================================
// Whole-model builds
// =============================================================================

#[test]
fn test_multi_file_model_builds() {
    let reader = MdfReader::from_sources(&model_a_sources(), ReaderOptions::default()).unwrap();
    let model = reader.model().unwrap();

    assert_eq!(model.handle, "test");
    assert_eq!(model.version.as_deref(), Some("1.0.0"));
    assert_eq!(
        model.nodes().keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["case", "diagnosis", "sample"]
    );
    assert_eq!(model.edges().len(), 4);
    assert_eq!(reader.digests().len(), 2);
    assert!(reader.success(), "{}", reader.diagnostics());
}

#[test]
fn test_enum_property_takes_value_set() {
    let yaml = "\
Handle: test
Nodes:
  case:
    Props: [case_id]
  sample:
    Props: [sample_type]
Relationships: {}
PropDefinitions:
  case_id:
    Type: string
  sample_type:
    Enum: [normal, tumor]
";
    let mut reader = read_text(yaml, ReaderOptions::default());
    let model = reader.create_model().unwrap();

    let sample = model.node_by_handle("sample").unwrap();
    let prop = model.prop(sample.props["sample_type"]);
    assert_eq!(prop.value_domain, "value_set");

    let values: BTreeSet<String> = model
        .prop_terms(sample.props["sample_type"])
        .into_iter()
        .map(|t| model.term(t).value.clone())
        .collect();
    assert_eq!(
        values,
        ["normal", "tumor"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>()
    );
}

#[test]
fn test_terms_section_supplies_definitions() {
    let reader = MdfReader::from_sources(&model_a_sources(), ReaderOptions::default()).unwrap();
    let model = reader.model().unwrap();

    let prop = model.prop_id(&PropKey::of_node("sample", "sample_type")).unwrap();
    let tumor = model
        .prop_terms(prop)
        .into_iter()
        .map(|t| model.term(t))
        .find(|t| t.value == "tumor")
        .unwrap();
    assert_eq!(tumor.origin_name.as_deref(), Some("NCIt"));
    assert_eq!(tumor.origin_id.as_deref(), Some("C18009"));
    assert_eq!(tumor.origin_definition.as_deref(), Some("A neoplasm"));

    let normal = model
        .prop_terms(prop)
        .into_iter()
        .map(|t| model.term(t))
        .find(|t| t.value == "normal")
        .unwrap();
    assert_eq!(normal.origin_name.as_deref(), Some("test"));
}

#[test]
fn test_units_and_annotations() {
    let reader = MdfReader::from_sources(&model_a_sources(), ReaderOptions::default()).unwrap();
    let model = reader.model().unwrap();

    let amount = model.prop(model.prop_id(&PropKey::of_node("sample", "amount")).unwrap());
    assert_eq!(amount.value_domain, "number");
    assert_eq!(amount.units.as_deref(), Some("mg;ug"));

    let sample = model.node_id("sample").unwrap();
    let annotations = model.annotations(bento_mdf::model::EntityId::Node(sample));
    assert_eq!(annotations.len(), 1);
    let term = model.term(annotations[0]);
    assert_eq!(term.value, "Specimen");
    assert_eq!(term.handle, "specimen");
}

#[test]
fn test_composite_key_resolves_across_nodes() {
    let reader = MdfReader::from_sources(&model_a_sources(), ReaderOptions::default()).unwrap();
    let model = reader.model().unwrap();

    let diagnosis = model.node_by_handle("diagnosis").unwrap();
    let resolved: Vec<(String, String)> = diagnosis
        .composite_key_props
        .iter()
        .map(|(node, prop)| (model.node(*node).handle.clone(), model.prop(*prop).handle.clone()))
        .collect();
    assert_eq!(
        resolved,
        vec![
            ("diagnosis".to_string(), "disease".to_string()),
            ("case".to_string(), "case_id".to_string())
        ]
    );
}

// =============================================================================
// Relationship Ends
// =============================================================================

#[test]
fn test_end_multiplicity_overrides_relationship() {
    let reader = MdfReader::from_sources(&model_a_sources(), ReaderOptions::default()).unwrap();
    let model = reader.model().unwrap();

    let edge = |h: &str, s: &str, d: &str| model.edge(model.edge_id(&Triplet::new(h, s, d)).unwrap());
    assert_eq!(edge("of_case", "sample", "case").multiplicity, "many_to_one");
    assert_eq!(edge("of_case", "diagnosis", "case").multiplicity, "one_to_one");
    assert_eq!(edge("of_case", "diagnosis", "case").is_required, Some(true));
}

#[test]
fn test_end_props_replace_relationship_props() {
    let reader = MdfReader::from_sources(&model_a_sources(), ReaderOptions::default()).unwrap();
    let model = reader.model().unwrap();

    let self_edge = model
        .edge(model.edge_id(&Triplet::new("derived_from", "sample", "sample")).unwrap());
    assert_eq!(self_edge.props.keys().collect::<Vec<_>>(), vec!["collected_on"]);

    let overridden = model
        .edge(model.edge_id(&Triplet::new("derived_from", "diagnosis", "sample")).unwrap());
    assert!(overridden.props.is_empty());
}

#[test]
fn test_undefined_endpoint_skipped() {
    let sources = [MdfSource::from(fixture("undefined-endpoint.yml").as_path())];
    let mut reader = MdfReader::new(ReaderOptions::default());
    reader.load(&sources).unwrap();
    let model = reader.create_model().unwrap();

    assert_eq!(model.edges().len(), 1);
    assert!(model.edge_id(&Triplet::new("of_case", "sample", "case")).is_some());
    assert!(!reader.success());
    assert_eq!(
        reader.diagnostics().with_code(DiagnosticCode::UndefinedEndpoint).count(),
        1
    );
}

#[test]
fn test_undefined_endpoint_fails_strict_build() {
    let sources = [MdfSource::from(fixture("undefined-endpoint.yml").as_path())];
    let options = ReaderOptions {
        strict: true,
        ..Default::default()
    };
    let mut reader = MdfReader::new(options);
    reader.load(&sources).unwrap();

    match reader.create_model() {
        Err(MdfError::Build(diagnostics)) => assert_eq!(diagnostics.error_count(), 1),
        other => panic!("expected a build error, got {:?}", other.map(|m| m.handle.clone())),
    }
}

// =============================================================================
// Property sharing and vocabulary
// =============================================================================

#[test]
fn test_qualified_definition_makes_private_property() {
    let yaml = "\
Handle: test
Nodes:
  case:
    Props: [id]
  sample:
    Props: [id]
  study:
    Props: [id]
Relationships: {}
PropDefinitions:
  id:
    Type: string
  case.id:
    Type: integer
";
    let mut reader = read_text(yaml, ReaderOptions::default());
    reader.create_model().unwrap();
    let model = reader.model().unwrap();

    let case = model.prop_id(&PropKey::of_node("case", "id")).unwrap();
    let sample = model.prop_id(&PropKey::of_node("sample", "id")).unwrap();
    let study = model.prop_id(&PropKey::of_node("study", "id")).unwrap();
    assert_ne!(case, sample);
    assert_eq!(sample, study);
    assert_eq!(model.prop(case).value_domain, "integer");
    assert_eq!(model.prop(sample).value_domain, "string");
    assert_eq!(model.prop(sample).belongs.len(), 2);

    let table = reader.shared_props();
    assert_eq!(table.shared("id"), Some(sample));
    assert!(!table.contains(case));
}

#[test]
fn test_multiplicity_falls_back_to_relationship_then_default() {
    let yaml = "\
Handle: test
Nodes:
  case: {}
  sample: {}
Relationships:
  of_case:
    Mul: one_to_many
    Ends:
      - Src: sample
        Dst: case
  related_to:
    Ends:
      - Src: sample
        Dst: sample
PropDefinitions: {}
";
    let mut reader = read_text(yaml, ReaderOptions::default());
    reader.create_model().unwrap();
    let model = reader.model().unwrap();

    let mul = |h: &str, s: &str, d: &str| {
        model
            .edge(model.edge_id(&Triplet::new(h, s, d)).unwrap())
            .multiplicity
            .clone()
    };
    assert_eq!(mul("of_case", "sample", "case"), "one_to_many");
    assert_eq!(mul("related_to", "sample", "sample"), "many_to_one");
    assert_eq!(
        reader.diagnostics().with_code(DiagnosticCode::MissingMultiplicity).count(),
        1
    );
    assert!(reader.success());
}

#[test]
fn test_same_value_in_two_enums_is_one_term() {
    let yaml = "\
Handle: test
Nodes:
  sample:
    Props: [sample_type, tissue_type]
Relationships: {}
PropDefinitions:
  sample_type:
    Enum: [normal, tumor]
  tissue_type:
    Enum: [normal, fibroblast]
";
    let mut reader = read_text(yaml, ReaderOptions::default());
    let model = reader.create_model().unwrap();

    let normal = |prop: &str| {
        let id = model.prop_id(&PropKey::of_node("sample", prop)).unwrap();
        model
            .prop_terms(id)
            .into_iter()
            .find(|t| model.term(*t).value == "normal")
            .unwrap()
    };
    assert_eq!(normal("sample_type"), normal("tissue_type"));
    assert_eq!(model.terms().len(), 3);
}

#[test]
fn test_enum_by_path_reference() {
    let options = ReaderOptions {
        enum_base_dir: Some(PathBuf::from(env!("CARGO_MANIFEST_DIR"))),
        ..Default::default()
    };
    let reader =
        MdfReader::from_sources(&[MdfSource::from(fixture("enum-by-path.yml").as_path())], options).unwrap();
    let model = reader.model().unwrap();

    let id = model.prop_id(&PropKey::of_node("sample", "sample_type")).unwrap();
    let prop = model.prop(id);
    assert_eq!(prop.value_domain, "value_set");
    let vs = model.value_set(prop.value_set.unwrap());
    assert_eq!(vs.path.as_deref(), Some("/tests/fixtures/sample-types.yml"));

    let terms: Vec<_> = model.prop_terms(id).into_iter().map(|t| model.term(t)).collect();
    assert_eq!(terms.len(), 3);
    let metastatic = terms.iter().find(|t| t.value == "metastatic").unwrap();
    assert_eq!(metastatic.origin_id.as_deref(), Some("C14174"));
    let normal = terms.iter().find(|t| t.value == "normal").unwrap();
    assert_eq!(normal.origin_name.as_deref(), Some("refs"));
}

#[test]
fn test_ignored_enum_reference_keeps_empty_value_set() {
    let options = ReaderOptions {
        ignore_enum_by_reference: true,
        ..Default::default()
    };
    let reader =
        MdfReader::from_sources(&[MdfSource::from(fixture("enum-by-path.yml").as_path())], options).unwrap();
    let model = reader.model().unwrap();

    let id = model.prop_id(&PropKey::of_node("sample", "sample_type")).unwrap();
    assert!(model.prop_terms(id).is_empty());
    assert!(reader.success());
}

// =============================================================================
// Structural failures
// =============================================================================

#[test]
fn test_schema_violation_is_fatal() {
    let yaml = "\
Handle: test
Nodes:
  case: {}
Relationships:
  of_case:
    Mul: many_to_one
PropDefinitions: {}
";
    let mut reader = MdfReader::new(ReaderOptions::default());
    let err = reader.load(&[MdfSource::text("bad.yml", yaml)]).unwrap_err();
    assert!(matches!(err, MdfError::Validation(_)), "{}", err);
}

#[test]
fn test_missing_section_is_fatal() {
    let yaml = "Handle: test\nNodes:\n  case: {}\nRelationships: {}\n";
    let mut reader = read_text(yaml, ReaderOptions::default());
    assert!(matches!(
        reader.create_model(),
        Err(MdfError::MissingSection("PropDefinitions"))
    ));
}
