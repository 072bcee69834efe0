//! Property tests over generated workflows

use capability_ontology::{Ontology, OntologyLoader};
use proptest::prelude::*;
use workflow_conformance::{ConformanceChecker, ConformanceConfig};
use workflow_dsl::WorkflowLoader;
use workflow_types::{ErrorCode, Level};

const ONTOLOGY: &str = r#"
version: "1.0.0"
nodes:
  - id: search
    layer: perceive
    output_schema:
      type: object
      properties:
        files: {type: array, items: {type: string}}
        summary: {oneOf: [{type: string}, {type: integer}]}
        blob: {type: unknown}
  - id: detect
    layer: understand
    input_schema:
      type: object
      properties:
        source: {type: array, items: {type: string}}
        label: {type: string}
  - id: checkpoint
    layer: execute
  - id: send
    layer: coordinate
edges:
  - {from: detect, to: search, type: requires}
"#;

fn ontology() -> Ontology {
    OntologyLoader::new().load_str(ONTOLOGY).unwrap()
}

fn capability() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["search", "detect", "checkpoint", "send", "teleport", "Bad Id"])
}

fn reference() -> impl Strategy<Value = String> {
    (
        prop::sample::select(vec!["s0", "s1", "s2", "s3", "ghost", "input"]),
        prop::sample::select(vec!["files", "summary", "blob", "missing"]),
        prop::option::of(prop::sample::select(vec!["string", "integer", "array<string>"])),
    )
        .prop_map(|(producer, field, annotation)| match annotation {
            Some(ty) => format!("${{{}.{}:{}}}", producer, field, ty),
            None => format!("${{{}.{}}}", producer, field),
        })
}

fn step() -> impl Strategy<Value = (&'static str, Option<String>, Option<String>)> {
    (
        capability(),
        prop::option::of(reference()),
        prop::option::of(reference()),
    )
}

/// Render a workflow as YAML; steps are aliased `s0`, `s1`, ...
fn render(steps: &[(&'static str, Option<String>, Option<String>)]) -> String {
    let mut out = String::from("generated:\n  steps:\n");
    for (i, (capability, source, label)) in steps.iter().enumerate() {
        out.push_str(&format!(
            "    - capability: \"{}\"\n      store_as: s{}\n",
            capability, i
        ));
        if source.is_some() || label.is_some() {
            out.push_str("      input_bindings:\n");
        }
        if let Some(source) = source {
            out.push_str(&format!("        source: \"{}\"\n", source));
        }
        if let Some(label) = label {
            out.push_str(&format!("        label: \"{}\"\n", label));
        }
    }
    out
}

proptest! {
    #[test]
    fn prop_report_is_deterministic(steps in prop::collection::vec(step(), 1..5)) {
        let ontology = ontology();
        let config = ConformanceConfig::default();
        let yaml = render(&steps);
        let first = {
            let loaded = WorkflowLoader::new().load_str(&yaml, "catalog").unwrap();
            ConformanceChecker::new(&ontology, &config).check_all(&loaded).to_json().unwrap()
        };
        let second = {
            let loaded = WorkflowLoader::new().load_str(&yaml, "catalog").unwrap();
            ConformanceChecker::new(&ontology, &config).check_all(&loaded).to_json().unwrap()
        };
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_l1_errors_halt(steps in prop::collection::vec(step(), 1..5)) {
        let ontology = ontology();
        let config = ConformanceConfig::default();
        let loaded = WorkflowLoader::new().load_str(&render(&steps), "catalog").unwrap();
        let report = ConformanceChecker::new(&ontology, &config).check_all(&loaded);
        for workflow in &report.workflows {
            let halted = workflow
                .findings
                .iter()
                .any(|f| f.level == Level::L1 && f.is_error());
            if halted {
                prop_assert!(workflow.findings.iter().all(|f| f.level == Level::L1));
            }
        }
    }

    #[test]
    fn prop_ambiguity_needs_annotation(steps in prop::collection::vec(step(), 1..5)) {
        let ontology = ontology();
        let config = ConformanceConfig::default();
        let loaded = WorkflowLoader::new().load_str(&render(&steps), "catalog").unwrap();
        let report = ConformanceChecker::new(&ontology, &config).check_all(&loaded);
        for finding in report.workflows.iter().flat_map(|w| &w.findings) {
            if finding.code != ErrorCode::AmbiguousType {
                continue;
            }
            // Only unannotated reads of the union or unknown fields are ambiguous
            let index = finding.location.step_index.unwrap();
            let field = finding.location.field.as_deref().unwrap();
            let (_, source, label) = &steps[index];
            let binding = if field == "source" { source } else { label };
            let binding = binding.as_deref().unwrap();
            prop_assert!(!binding.contains(':'));
            prop_assert!(binding.contains(".summary") || binding.contains(".blob"));
        }
    }

    #[test]
    fn prop_ambiguous_read_outcome(
        field in prop::sample::select(vec!["summary", "blob"]),
        annotation in prop::option::of(prop::sample::select(vec!["string", "integer", "array<string>"])),
        target in prop::sample::select(vec!["source", "label"]),
    ) {
        let binding = match annotation {
            Some(ty) => format!("${{s0.{}:{}}}", field, ty),
            None => format!("${{s0.{}}}", field),
        };
        let yaml = format!(
            "generated:\n  steps:\n    - {{capability: search, store_as: s0}}\n    - {{capability: detect, store_as: s1, input_bindings: {{{}: \"{}\"}}}}\n",
            target, binding
        );
        let ontology = ontology();
        let config = ConformanceConfig::default();
        let loaded = WorkflowLoader::new().load_str(&yaml, "catalog").unwrap();
        let report = ConformanceChecker::new(&ontology, &config).check_all(&loaded);
        let codes: Vec<ErrorCode> = report.workflows[0]
            .findings
            .iter()
            .filter(|f| f.location.step_index == Some(1) && f.location.field.as_deref() == Some(target))
            .map(|f| f.code)
            .collect();

        // summary is string|integer, blob is unknown
        let expected = match (annotation, field, target) {
            (None, _, _) => Some(ErrorCode::AmbiguousType),
            (Some("array<string>"), "summary", _) => Some(ErrorCode::AnnotationMismatch),
            (Some("string"), _, "label") | (Some("array<string>"), "blob", "source") => None,
            _ => Some(ErrorCode::TypeMismatch),
        };
        prop_assert_eq!(codes, expected.into_iter().collect::<Vec<_>>());
    }
}
