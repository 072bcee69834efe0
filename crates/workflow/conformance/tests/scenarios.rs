//! End-to-end scenarios: ontology + catalog in, report out

use capability_ontology::{CoercionRegistry, Ontology, OntologyLoader};
use workflow_conformance::{ConformanceChecker, ConformanceConfig, Verdict, VersionPolicy};
use workflow_dsl::WorkflowLoader;
use workflow_types::{ErrorCode, Level, NO_REMEDIATION};

fn ontology(detect_source: &str) -> Ontology {
    ontology_with(detect_source, OBJECTS)
}

fn ontology_with(detect_source: &str, transform_result: &str) -> Ontology {
    let text = format!(
        r#"
version: "1.0.0"
nodes:
  - id: search
    layer: perceive
    output_schema:
      type: object
      properties:
        files: {{type: array, items: {{type: string}}}}
  - id: detect
    layer: understand
    input_schema:
      type: object
      required: [source]
      properties:
        source: {detect_source}
    output_schema:
      type: object
      properties:
        anomalies: {{type: array, items: {{type: object}}}}
  - id: transform
    layer: synthesize
    input_schema:
      type: object
      properties:
        source: {{type: any}}
        mapping_ref: {{type: string}}
    output_schema:
      type: object
      properties:
        result: {transform_result}
  - id: checkpoint
    layer: execute
  - id: send
    layer: coordinate
edges:
  - {{from: detect, to: search, type: requires}}
"#
    );
    OntologyLoader::new().load_str(&text).unwrap()
}

const PIPELINE: &str = r#"
find_anomalies:
  steps:
    - capability: search
      store_as: search_out
    - capability: detect
      store_as: detect_out
      input_bindings:
        source: ${search_out.files}
"#;

const REGISTRY: &str = r#"
coercions:
  - from: "array<string>"
    to: "array<object>"
    capability: transform
    params:
      mapping_ref: mappings/path_to_record.yaml
"#;

const STRINGS: &str = "{type: array, items: {type: string}}";
const OBJECTS: &str = "{type: array, items: {type: object}}";

#[test]
fn test_matching_pipeline_passes() {
    let ontology = ontology(STRINGS);
    let config = ConformanceConfig::default();
    let workflows = WorkflowLoader::new().load_str(PIPELINE, "catalog").unwrap();
    let report = ConformanceChecker::new(&ontology, &config).check_all(&workflows);

    assert_eq!(report.workflows.len(), 1);
    assert_eq!(report.workflows[0].verdict, Verdict::Pass);
    assert!(report.workflows[0].findings.is_empty());
    assert!(!report.has_errors());
}

#[test]
fn test_mismatch_without_coercion() {
    let ontology = ontology(OBJECTS);
    let config = ConformanceConfig::default();
    let registry = CoercionRegistry::new();
    let workflows = WorkflowLoader::new().load_str(PIPELINE, "catalog").unwrap();
    let report = ConformanceChecker::new(&ontology, &config)
        .with_registry(&registry)
        .check_all(&workflows);

    let workflow = &report.workflows[0];
    assert_eq!(workflow.findings.len(), 1);
    let finding = &workflow.findings[0];
    assert_eq!(finding.code, ErrorCode::TypeMismatch);
    let types = finding.types.as_ref().unwrap();
    assert_eq!(types.found, "array<string>");
    assert_eq!(types.expected, "array<object>");
    assert_eq!(finding.suggestion_text(), NO_REMEDIATION);
    assert!(workflow.patches.is_empty());
    assert_eq!(report.patch_file(), "");
}

#[test]
fn test_undefined_producer_single_finding() {
    let ontology = ontology(STRINGS);
    let config = ConformanceConfig::default();
    let workflows = WorkflowLoader::new()
        .load_str(
            r#"
broken:
  steps:
    - capability: search
      store_as: search_out
    - capability: detect
      store_as: detect_out
      input_bindings:
        source: ${undefined_step.field}
"#,
            "catalog",
        )
        .unwrap();
    let report = ConformanceChecker::new(&ontology, &config).check_all(&workflows);
    let codes: Vec<_> = report.workflows[0]
        .findings
        .iter()
        .map(|f| f.code)
        .collect();
    assert_eq!(codes, vec![ErrorCode::BadReferencePath]);
}

#[test]
fn test_coercion_round_trip() {
    let ontology = ontology(OBJECTS);
    let config = ConformanceConfig::default();
    let registry = CoercionRegistry::from_yaml_str(REGISTRY).unwrap();
    registry.validate_against(&ontology).unwrap();
    let loader = WorkflowLoader::new();
    let workflows = loader.load_str(PIPELINE, "catalog").unwrap();
    let checker = ConformanceChecker::new(&ontology, &config).with_registry(&registry);

    let report = checker.check(&workflows[0]);
    assert_eq!(report.patches.len(), 1);
    let patch = &report.patches[0];
    assert!(report.findings[0].suggestion_text().contains("transform"));
    assert!(patch.diff.contains("+  capability: transform") || patch.diff.contains("+- capability: transform"));

    let mut document = workflows[0].document.clone().unwrap();
    patch.apply(&mut document).unwrap();
    let patched = loader.load_document("find_anomalies", document);
    assert!(patched.is_structurally_valid(), "{:?}", patched.findings);

    let rechecked = checker.check(&patched);
    assert!(
        rechecked
            .findings
            .iter()
            .all(|f| f.code != ErrorCode::TypeMismatch),
        "{:?}",
        rechecked.findings
    );
    assert_eq!(rechecked.verdict, Verdict::Pass);
}

#[test]
fn test_coercion_round_trip_with_untyped_result() {
    let ontology = ontology_with(OBJECTS, "{type: any}");
    let config = ConformanceConfig::default();
    let registry = CoercionRegistry::from_yaml_str(REGISTRY).unwrap();
    registry.validate_against(&ontology).unwrap();
    let loader = WorkflowLoader::new();
    let workflows = loader.load_str(PIPELINE, "catalog").unwrap();
    let checker = ConformanceChecker::new(&ontology, &config).with_registry(&registry);

    let report = checker.check(&workflows[0]);
    assert_eq!(report.patches.len(), 1);
    let mut document = workflows[0].document.clone().unwrap();
    report.patches[0].apply(&mut document).unwrap();
    let patched = loader.load_document("find_anomalies", document);

    let rechecked = checker.check(&patched);
    assert!(rechecked.findings.is_empty(), "{:?}", rechecked.findings);
    assert_eq!(rechecked.verdict, Verdict::Pass);
}

#[test]
fn test_registry_rejects_coercion_that_cannot_fit() {
    let ontology = ontology_with(OBJECTS, "{type: object}");
    let registry = CoercionRegistry::from_yaml_str(REGISTRY).unwrap();
    assert!(registry.validate_against(&ontology).is_err());
}

#[test]
fn test_l1_error_halts_workflow() {
    let ontology = ontology(STRINGS);
    let config = ConformanceConfig::default();
    let workflows = WorkflowLoader::new()
        .load_str(
            r#"
halted:
  steps:
    - capability: Search
      store_as: search_out
    - capability: send
      store_as: out
      input_bindings:
        body: ${nowhere.x}
"#,
            "catalog",
        )
        .unwrap();
    let report = ConformanceChecker::new(&ontology, &config).check_all(&workflows);
    let workflow = &report.workflows[0];
    assert_eq!(workflow.verdict, Verdict::Fail);
    assert!(workflow.findings.iter().all(|f| f.level == Level::L1));
}

#[test]
fn test_version_policies() {
    let catalog = r#"
old:
  ontology_version: "0.9.0"
  steps:
    - capability: search
      store_as: search_out
"#;
    let ontology = ontology(STRINGS);
    let workflows = WorkflowLoader::new().load_str(catalog, "catalog").unwrap();

    let refuse = ConformanceConfig::default();
    let report = ConformanceChecker::new(&ontology, &refuse).check_all(&workflows);
    assert!(report.has_errors());

    let warn = ConformanceConfig::default().with_version_policy(VersionPolicy::Warn);
    let report = ConformanceChecker::new(&ontology, &warn).check_all(&workflows);
    assert!(!report.has_errors());
    assert_eq!(report.workflows[0].verdict, Verdict::PassWithWarnings);
}

#[test]
fn test_semantic_warnings_do_not_fail() {
    let ontology = ontology(STRINGS);
    let config = ConformanceConfig::default();
    let workflows = WorkflowLoader::new()
        .load_str(
            r#"
notify:
  steps:
    - capability: send
      store_as: out
"#,
            "catalog",
        )
        .unwrap();
    let report = ConformanceChecker::new(&ontology, &config).check_all(&workflows);
    let workflow = &report.workflows[0];
    assert_eq!(workflow.verdict, Verdict::PassWithWarnings);
    assert_eq!(workflow.findings[0].code, ErrorCode::SendWithoutSafeguard);
    assert!(!report.has_errors());
}

#[test]
fn test_catalog_report_is_deterministic() {
    let catalog = r#"
zeta:
  steps:
    - {capability: send, store_as: out}
alpha:
  steps:
    - {capability: search, store_as: s}
    - {capability: detect, store_as: d, input_bindings: {source: "${s.files}"}}
mid:
  steps:
    - {capability: detect, store_as: d, input_bindings: {source: "${ghost.x}"}}
"#;
    let ontology = ontology(OBJECTS);
    let config = ConformanceConfig::default();
    let registry = CoercionRegistry::from_yaml_str(REGISTRY).unwrap();
    let render = || {
        let workflows = WorkflowLoader::new().load_str(catalog, "catalog").unwrap();
        let report = ConformanceChecker::new(&ontology, &config)
            .with_registry(&registry)
            .check_all(&workflows);
        (report.to_json().unwrap(), report.patch_file())
    };
    let first = render();
    assert_eq!(first, render());

    let names: Vec<_> = {
        let workflows = WorkflowLoader::new().load_str(catalog, "catalog").unwrap();
        ConformanceChecker::new(&ontology, &config)
            .check_all(&workflows)
            .workflows
            .into_iter()
            .map(|w| w.workflow)
            .collect()
    };
    assert_eq!(names, vec!["alpha", "mid", "zeta"]);
}
