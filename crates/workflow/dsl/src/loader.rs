//! Workflow Loader: catalog documents into step graphs
//!
//! The loader performs structural checks only. Every problem it finds is
//! an L1 finding; a workflow with any of them gets no step graph, so no
//! later level runs for it.

use crate::errors::{DslError, DslResult};
use crate::parser::{parse_binding, parse_expression};
use capability_types::CapabilityId;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use workflow_types::{
    ErrorCode, FailureMode, Finding, Gate, JoinStrategy, Location, Step, StepDocument, Workflow,
    WorkflowDocument,
};

/// Default upper bound accepted for `max_loops`
pub const DEFAULT_MAX_LOOPS_CAP: u32 = 10;

/// A workflow as loaded from a catalog
#[derive(Clone, Debug)]
pub struct LoadedWorkflow {
    pub name: String,
    /// The parsed document; `None` when the body is malformed
    pub document: Option<WorkflowDocument>,
    /// The step graph; `None` when any structural error was found
    pub workflow: Option<Workflow>,
    /// Structural findings
    pub findings: Vec<Finding>,
}

impl LoadedWorkflow {
    pub fn is_structurally_valid(&self) -> bool {
        self.workflow.is_some()
    }
}

/// Parses workflow catalogs into step graphs
#[derive(Clone, Debug)]
pub struct WorkflowLoader {
    max_loops_cap: u32,
}

impl WorkflowLoader {
    pub fn new() -> Self {
        Self {
            max_loops_cap: DEFAULT_MAX_LOOPS_CAP,
        }
    }

    pub fn with_max_loops_cap(mut self, cap: u32) -> Self {
        self.max_loops_cap = cap;
        self
    }

    /// Load every workflow in a catalog file
    pub fn load_path(&self, path: impl AsRef<Path>) -> DslResult<Vec<LoadedWorkflow>> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DslError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let fallback = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "workflow".into());
        self.load_str(&text, &fallback)
    }

    /// Load every workflow in catalog text.
    ///
    /// Accepted shapes: a single workflow (a mapping with `steps`), a
    /// mapping with a `workflows` key, or a mapping of names to bodies.
    /// `fallback_name` names a single workflow that has no `name`.
    pub fn load_str(&self, text: &str, fallback_name: &str) -> DslResult<Vec<LoadedWorkflow>> {
        let root: Value = serde_yaml::from_str(text)?;
        self.load_catalog(root, fallback_name)
    }

    /// Load every workflow in an already parsed catalog
    pub fn load_catalog(&self, root: Value, fallback_name: &str) -> DslResult<Vec<LoadedWorkflow>> {
        let Value::Object(mut map) = root else {
            return Err(DslError::NotACatalog);
        };

        if map.contains_key("steps") {
            let name = map
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or(fallback_name)
                .to_string();
            return Ok(vec![self.load_value(&name, Value::Object(map))]);
        }

        let entries: Vec<(String, Value)> = match map.remove("workflows") {
            Some(Value::Object(workflows)) => workflows.into_iter().collect(),
            Some(Value::Array(workflows)) => workflows
                .into_iter()
                .enumerate()
                .map(|(i, body)| {
                    let name = body
                        .get("name")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("{}[{}]", fallback_name, i));
                    (name, body)
                })
                .collect(),
            Some(_) => return Err(DslError::NotACatalog),
            None => map.into_iter().collect(),
        };

        let mut loaded = Vec::with_capacity(entries.len());
        for (name, body) in entries {
            if matches!(body, Value::String(_) | Value::Number(_) | Value::Bool(_)) {
                tracing::debug!(key = %name, "Skipping catalog metadata key");
                continue;
            }
            loaded.push(self.load_value(&name, body));
        }
        Ok(loaded)
    }

    /// Load one workflow body
    pub fn load_value(&self, name: &str, body: Value) -> LoadedWorkflow {
        match serde_json::from_value::<WorkflowDocument>(body) {
            Ok(document) => self.load_document(name, document),
            Err(e) => LoadedWorkflow {
                name: name.to_string(),
                document: None,
                workflow: None,
                findings: vec![Finding::new(
                    ErrorCode::MalformedWorkflow,
                    Location::workflow(name),
                    format!("Workflow body is malformed: {}", e),
                )],
            },
        }
    }

    /// Build the step graph for a parsed document
    pub fn load_document(&self, name: &str, document: WorkflowDocument) -> LoadedWorkflow {
        let mut check = StructureCheck {
            name,
            findings: Vec::new(),
        };

        let parallel_groups = check.parallel_groups(&document);
        if document.steps.is_empty() {
            check.report(
                ErrorCode::MissingRequiredField,
                Location::workflow(name),
                "Workflow declares no steps",
            );
        }

        let mut aliases: HashMap<&str, usize> = HashMap::new();
        for (index, step) in document.steps.iter().enumerate() {
            if let Some(alias) = step.store_as.as_deref() {
                if let Some(first) = aliases.get(alias) {
                    check.report(
                        ErrorCode::DuplicateStoreAs,
                        Location::workflow(name).with_step(index, alias),
                        format!("store_as '{}' is already used by step {}", alias, first),
                    );
                } else {
                    aliases.insert(alias, index);
                }
            }
        }

        let mut steps = Vec::with_capacity(document.steps.len());
        for (index, step) in document.steps.iter().enumerate() {
            if let Some(step) = check.step(index, step, &parallel_groups, &aliases, self.max_loops_cap) {
                steps.push(step);
            }
        }

        let mut findings = check.findings;
        findings.sort_by(|a, b| a.report_order(b));
        let workflow = if findings.is_empty() {
            build_workflow(name, &document, steps, parallel_groups)
        } else {
            None
        };

        tracing::debug!(
            workflow = %name,
            steps = document.steps.len(),
            structural_findings = findings.len(),
            "Workflow loaded"
        );

        LoadedWorkflow {
            name: name.to_string(),
            document: Some(document),
            workflow,
            findings,
        }
    }
}

impl Default for WorkflowLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn build_workflow(
    name: &str,
    document: &WorkflowDocument,
    steps: Vec<Step>,
    parallel_groups: IndexMap<String, JoinStrategy>,
) -> Option<Workflow> {
    // Aliases are unique once no structural finding was reported
    let mut workflow = Workflow::new(name, steps).ok()?;
    workflow.version = document.version.clone();
    workflow.ontology_version = document.ontology_version.clone();
    workflow.risk = document.risk;
    workflow.inputs = document.inputs.clone();
    workflow.parallel_groups = parallel_groups;
    Some(workflow)
}

// ── Structural checks ────────────────────────────────────────────────

struct StructureCheck<'a> {
    name: &'a str,
    findings: Vec<Finding>,
}

impl StructureCheck<'_> {
    fn report(&mut self, code: ErrorCode, location: Location, message: impl Into<String>) {
        self.findings.push(Finding::new(code, location, message));
    }

    /// Declared groups with a usable join strategy
    fn parallel_groups(&mut self, document: &WorkflowDocument) -> IndexMap<String, JoinStrategy> {
        let mut groups = IndexMap::new();
        for (group, declaration) in &document.parallel_groups {
            match declaration.join.as_deref().map(JoinStrategy::parse) {
                Some(Some(join)) => {
                    groups.insert(group.clone(), join);
                }
                Some(None) => self.report(
                    ErrorCode::ParallelGroupWithoutJoin,
                    Location::workflow(self.name),
                    format!(
                        "Parallel group '{}' has unknown join strategy '{}'; expected all, any, first or merge",
                        group,
                        declaration.join.as_deref().unwrap_or_default()
                    ),
                ),
                None => self.report(
                    ErrorCode::ParallelGroupWithoutJoin,
                    Location::workflow(self.name),
                    format!("Parallel group '{}' declares no join strategy", group),
                ),
            }
        }
        groups
    }

    fn step(
        &mut self,
        index: usize,
        document: &StepDocument,
        groups: &IndexMap<String, JoinStrategy>,
        aliases: &HashMap<&str, usize>,
        max_loops_cap: u32,
    ) -> Option<Step> {
        let location = match document.store_as.as_deref() {
            Some(alias) => Location::workflow(self.name).with_step(index, alias),
            None => Location::workflow(self.name).with_step_index(index),
        };
        let before = self.findings.len();

        match document.capability.as_deref() {
            None => self.report(
                ErrorCode::MissingRequiredField,
                location.clone().with_field("capability"),
                "Step has no capability",
            ),
            Some(id) if !CapabilityId::is_well_formed(id) => self.report(
                ErrorCode::MalformedCapabilityId,
                location.clone().with_field("capability"),
                format!("Capability id '{}' is not of the form [a-z][a-z0-9_-]*", id),
            ),
            Some(_) => {}
        }
        if document.store_as.is_none() {
            self.report(
                ErrorCode::MissingRequiredField,
                location.clone().with_field("store_as"),
                "Step has no store_as alias",
            );
        }

        let mut input_bindings = IndexMap::new();
        for (field, value) in &document.input_bindings {
            match parse_binding(value) {
                Ok(binding) => {
                    input_bindings.insert(field.clone(), binding);
                }
                Err(e) => self.report(
                    ErrorCode::BindingSyntaxError,
                    location.clone().with_field(field.clone()),
                    format!("Binding for '{}' does not parse: {}", field, e),
                ),
            }
        }

        let condition = match document.condition.as_deref().map(parse_expression) {
            Some(Ok(expression)) => Some(expression),
            Some(Err(e)) => {
                self.report(
                    ErrorCode::BindingSyntaxError,
                    location.clone().with_field("condition"),
                    format!("Condition does not parse: {}", e),
                );
                None
            }
            None => None,
        };

        let mut gates = Vec::with_capacity(document.gates.len());
        for (i, gate) in document.gates.iter().enumerate() {
            match parse_expression(&gate.when) {
                Ok(when) => gates.push(Gate {
                    when,
                    action: gate.action.clone(),
                    message: gate.message.clone(),
                }),
                Err(e) => self.report(
                    ErrorCode::BindingSyntaxError,
                    location.clone().with_field(format!("gates[{}]", i)),
                    format!("Gate condition does not parse: {}", e),
                ),
            }
        }

        if let Some(group) = document.parallel_group.as_deref() {
            if !groups.contains_key(group) {
                self.report(
                    ErrorCode::ParallelGroupWithoutJoin,
                    location.clone().with_field("parallel_group"),
                    format!("Parallel group '{}' has no declared join strategy", group),
                );
            }
        }

        let mut failure_modes = Vec::with_capacity(document.failure_modes.len());
        for (i, mode) in document.failure_modes.iter().enumerate() {
            let field = format!("failure_modes[{}]", i);
            if let Some(target) = mode.goto_step.as_deref() {
                if !aliases.contains_key(target) {
                    self.report(
                        ErrorCode::UnknownGotoTarget,
                        location.clone().with_field(field.clone()),
                        format!("goto_step '{}' names no step in this workflow", target),
                    );
                }
                match mode.max_loops {
                    None => self.report(
                        ErrorCode::UnboundedRecoveryLoop,
                        location.clone().with_field(field.clone()),
                        format!("Recovery loop to '{}' declares no max_loops", target),
                    ),
                    Some(0) => self.report(
                        ErrorCode::UnboundedRecoveryLoop,
                        location.clone().with_field(field.clone()),
                        format!("Recovery loop to '{}' has max_loops 0", target),
                    ),
                    Some(n) if n > max_loops_cap => self.report(
                        ErrorCode::UnboundedRecoveryLoop,
                        location.clone().with_field(field.clone()),
                        format!(
                            "Recovery loop to '{}' allows {} iterations; the cap is {}",
                            target, n, max_loops_cap
                        ),
                    ),
                    Some(_) => {}
                }
            }
            failure_modes.push(FailureMode {
                condition: mode.condition.clone(),
                action: mode.action.clone(),
                recovery: mode.recovery.clone(),
                goto_step: mode.goto_step.clone(),
                max_loops: mode.max_loops,
            });
        }

        if self.findings.len() > before {
            return None;
        }

        let mut step = Step::new(
            index,
            document.capability.clone().unwrap_or_default(),
            document.store_as.clone().unwrap_or_default(),
        );
        step.input_bindings = input_bindings;
        step.condition = condition;
        step.parallel_group = document.parallel_group.clone();
        step.gates = gates;
        step.failure_modes = failure_modes;
        Some(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use workflow_types::{Binding, Level};

    const CATALOG: &str = r#"
version: "1.0"
find_anomalies:
  goal: Find anomalies in logs
  steps:
    - capability: search
      store_as: search_out
      input_bindings:
        query: ${input.query}
    - capability: detect
      store_as: detect_out
      input_bindings:
        source: ${search_out.files}
        note: "Scanning ${search_out.count} files"
      condition: ${search_out.count} > 0
broken:
  steps:
    - capability: Search
      store_as: a
    - store_as: a
      input_bindings:
        source: ${a.files
"#;

    fn codes(loaded: &LoadedWorkflow) -> Vec<&'static str> {
        loaded.findings.iter().map(|f| f.code.code()).collect()
    }

    #[test]
    fn test_load_catalog_mapping() {
        let loaded = WorkflowLoader::new().load_str(CATALOG, "catalog").unwrap();
        assert_eq!(loaded.len(), 2);

        let good = &loaded[0];
        assert_eq!(good.name, "find_anomalies");
        assert!(good.findings.is_empty());
        let workflow = good.workflow.as_ref().unwrap();
        assert_eq!(workflow.steps.len(), 2);
        let detect = &workflow.steps[1];
        assert!(matches!(detect.input_bindings["source"], Binding::Reference(_)));
        assert!(matches!(detect.input_bindings["note"], Binding::Template { .. }));
        assert_eq!(detect.condition.as_ref().unwrap().references.len(), 1);
    }

    #[test]
    fn test_structural_findings_collected() {
        let loaded = WorkflowLoader::new().load_str(CATALOG, "catalog").unwrap();
        let broken = &loaded[1];
        assert!(broken.workflow.is_none());
        assert_eq!(codes(broken), vec!["V104", "V103", "V102", "V105"]);
        assert!(broken.findings.iter().all(|f| f.level == Level::L1));
    }

    #[test]
    fn test_single_workflow_document() {
        let text = "name: solo\nsteps:\n  - {capability: search, store_as: s}\n";
        let loaded = WorkflowLoader::new().load_str(text, "file").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "solo");
        assert!(loaded[0].is_structurally_valid());

        let unnamed = "steps:\n  - {capability: search, store_as: s}\n";
        let loaded = WorkflowLoader::new().load_str(unnamed, "file").unwrap();
        assert_eq!(loaded[0].name, "file");
    }

    #[test]
    fn test_workflows_key() {
        let text = r#"
workflows:
  - name: one
    steps: [{capability: search, store_as: s}]
  - steps: [{capability: search, store_as: s}]
"#;
        let loaded = WorkflowLoader::new().load_str(text, "cat").unwrap();
        assert_eq!(loaded[0].name, "one");
        assert_eq!(loaded[1].name, "cat[1]");
    }

    #[test]
    fn test_malformed_body() {
        let text = "bad:\n  steps: 3\n";
        let loaded = WorkflowLoader::new().load_str(text, "cat").unwrap();
        assert_eq!(codes(&loaded[0]), vec!["V100"]);
        assert!(loaded[0].document.is_none());
    }

    #[test]
    fn test_empty_workflow() {
        let loaded = WorkflowLoader::new()
            .load_str("empty:\n  steps: []\n", "cat")
            .unwrap();
        assert_eq!(codes(&loaded[0]), vec!["V102"]);
    }

    #[test]
    fn test_parallel_groups() {
        let text = r#"
steps:
  - {capability: search, store_as: a, parallel_group: gather}
  - {capability: search, store_as: b, parallel_group: scatter}
parallel_groups:
  gather: {join: all}
  scatter: {join: sometimes}
"#;
        let loaded = WorkflowLoader::new().load_str(text, "p").unwrap();
        assert_eq!(codes(&loaded[0]), vec!["V106", "V106"]);

        let fixed = text.replace("sometimes", "merge");
        let loaded = WorkflowLoader::new().load_str(&fixed, "p").unwrap();
        let workflow = loaded[0].workflow.as_ref().unwrap();
        assert_eq!(workflow.parallel_groups["scatter"], JoinStrategy::Merge);
    }

    #[test]
    fn test_recovery_loops() {
        let text = r#"
steps:
  - capability: search
    store_as: a
  - capability: detect
    store_as: b
    failure_modes:
      - {condition: empty, action: retry, goto_step: a, max_loops: 3}
      - {condition: timeout, action: retry, goto_step: nowhere, max_loops: 1}
      - {condition: other, action: retry, goto_step: a}
      - {condition: again, action: retry, goto_step: a, max_loops: 50}
"#;
        let loaded = WorkflowLoader::new().load_str(text, "r").unwrap();
        assert_eq!(codes(&loaded[0]), vec!["V107", "V108", "V108"]);

        let loaded = WorkflowLoader::new()
            .with_max_loops_cap(100)
            .load_str(text, "r")
            .unwrap();
        assert_eq!(codes(&loaded[0]), vec!["V107", "V108"]);
    }

    #[test]
    fn test_gate_syntax() {
        let text = r#"
steps:
  - capability: search
    store_as: a
    gates:
      - {when: "${a.count", action: stop}
"#;
        let loaded = WorkflowLoader::new().load_str(text, "g").unwrap();
        assert_eq!(codes(&loaded[0]), vec!["V105"]);
        assert_eq!(loaded[0].findings[0].location.field.as_deref(), Some("gates[0]"));
    }

    #[test]
    fn test_load_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"steps:\n  - {capability: search, store_as: s}\n")
            .unwrap();
        let loaded = WorkflowLoader::new().load_path(file.path()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].is_structurally_valid());
    }

    #[test]
    fn test_not_a_catalog() {
        assert!(matches!(
            WorkflowLoader::new().load_str("- a\n- b\n", "x"),
            Err(DslError::NotACatalog)
        ));
    }
}
