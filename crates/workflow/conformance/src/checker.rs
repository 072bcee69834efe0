//! Conformance Checker: four ordered levels per workflow
//!
//! L1 structural errors halt the whole workflow. From L2 on, a step with
//! an error at one level drops out of the later levels while the other
//! steps keep going. Warnings never halt anything.

use crate::binding::BindingResolver;
use crate::config::{ConformanceConfig, VersionPolicy};
use crate::patch::{Patch, PatchSynthesizer};
use crate::report::{CatalogReport, WorkflowReport};
use capability_ontology::{CoercionRegistry, Ontology, SchemaResolver};
use capability_types::{CapabilityId, EdgeKind, SchemaNode};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use workflow_dsl::LoadedWorkflow;
use workflow_types::{ErrorCode, Finding, Level, Location, Severity, Step, Workflow};

/// Keys that mark an `inputs` mapping as a schema rather than a field list
const SCHEMA_KEYWORDS: [&str; 9] = [
    "type", "properties", "$ref", "oneOf", "anyOf", "allOf", "items", "enum", "const",
];

/// Checks loaded workflows against one ontology
pub struct ConformanceChecker<'a> {
    ontology: &'a Ontology,
    config: &'a ConformanceConfig,
    registry: Option<&'a CoercionRegistry>,
}

impl<'a> ConformanceChecker<'a> {
    pub fn new(ontology: &'a Ontology, config: &'a ConformanceConfig) -> Self {
        Self {
            ontology,
            config,
            registry: None,
        }
    }

    /// Enable patch synthesis for type mismatches
    pub fn with_registry(mut self, registry: &'a CoercionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Check every workflow of a catalog
    pub fn check_all(&self, workflows: &[LoadedWorkflow]) -> CatalogReport {
        CatalogReport::new(workflows.iter().map(|w| self.check(w)).collect())
    }

    /// Check one workflow through all levels
    pub fn check(&self, loaded: &LoadedWorkflow) -> WorkflowReport {
        let mut findings = loaded.findings.clone();
        findings.extend(self.check_capabilities(loaded));
        findings.extend(self.check_version(loaded));

        let halted = findings
            .iter()
            .any(|f| f.level == Level::L1 && f.is_error());
        let workflow = match &loaded.workflow {
            Some(workflow) if !halted => workflow,
            _ => {
                tracing::debug!(workflow = %loaded.name, "Structural errors, later levels skipped");
                return self.finish(&loaded.name, findings, Vec::new());
            }
        };

        let mut excluded = BTreeSet::new();

        let edge_findings = self.check_edges(workflow);
        exclude_failed(&mut excluded, &edge_findings);
        findings.extend(edge_findings);

        let contract_findings = self.check_contracts(workflow, &excluded);
        exclude_failed(&mut excluded, &contract_findings);
        findings.extend(contract_findings);

        findings.extend(self.check_semantics(workflow, &excluded));

        let patches = self.synthesize_patches(loaded, workflow, &mut findings);
        self.finish(&loaded.name, findings, patches)
    }

    fn finish(&self, name: &str, findings: Vec<Finding>, patches: Vec<Patch>) -> WorkflowReport {
        let report = WorkflowReport::new(name, findings, patches);
        tracing::info!(
            workflow = %report.workflow,
            verdict = %report.verdict,
            errors = report.errors(),
            warnings = report.warnings(),
            patches = report.patches.len(),
            "Workflow checked"
        );
        report
    }

    // ── L1 ───────────────────────────────────────────────────────────

    /// `V101` for well-formed capability ids the ontology does not know
    fn check_capabilities(&self, loaded: &LoadedWorkflow) -> Vec<Finding> {
        let Some(document) = &loaded.document else {
            return Vec::new();
        };
        let mut findings = Vec::new();
        for (index, step) in document.steps.iter().enumerate() {
            let Some(id) = step.capability.as_deref() else {
                continue;
            };
            if !CapabilityId::is_well_formed(id) || self.ontology.contains(id) {
                continue;
            }
            let location = match &step.store_as {
                Some(alias) => Location::workflow(&loaded.name).with_step(index, alias),
                None => Location::workflow(&loaded.name).with_step_index(index),
            };
            findings.push(Finding::new(
                ErrorCode::UnknownCapability,
                location.with_field("capability"),
                format!("Capability '{}' is not in the ontology", id),
            ));
        }
        findings
    }

    /// `V109` when the workflow targets another ontology major version
    fn check_version(&self, loaded: &LoadedWorkflow) -> Option<Finding> {
        let declared = loaded.document.as_ref()?.ontology_version.as_deref()?;
        let message = match self.ontology.is_compatible_with(declared) {
            Ok(true) => return None,
            Ok(false) => format!(
                "Workflow targets ontology {} but the loaded ontology is {}",
                declared,
                self.ontology.version()
            ),
            Err(e) => format!("Ontology version '{}' is not a version: {}", declared, e),
        };
        let severity = match self.config.version_policy {
            VersionPolicy::Refuse => Severity::Error,
            VersionPolicy::Warn => Severity::Warning,
        };
        Some(
            Finding::new(
                ErrorCode::IncompatibleOntologyVersion,
                Location::workflow(&loaded.name).with_field("ontology_version"),
                message,
            )
            .with_severity(severity),
        )
    }

    // ── L2 ───────────────────────────────────────────────────────────

    fn check_edges(&self, workflow: &Workflow) -> Vec<Finding> {
        let mut findings = Vec::new();

        for step in &workflow.steps {
            let id = step.capability_id.as_str();
            let Some(capability) = self.ontology.get(id) else {
                continue;
            };

            for required in self.ontology.neighbors(id, EdgeKind::Requires) {
                if !self.satisfied_before(workflow, step, required) {
                    findings.push(Finding::new(
                        ErrorCode::RequiresUnsatisfied,
                        step_location(workflow, step),
                        format!(
                            "Capability '{}' requires '{}'{}, which does not run earlier",
                            id,
                            required,
                            self.alternatives_note(required)
                        ),
                    ));
                }
            }
            for wanted in self.ontology.neighbors(id, EdgeKind::SoftRequires) {
                if !self.satisfied_before(workflow, step, wanted) {
                    findings.push(Finding::new(
                        ErrorCode::SoftRequiresUnsatisfied,
                        step_location(workflow, step),
                        format!(
                            "Capability '{}' works best after '{}', which does not run earlier",
                            id, wanted
                        ),
                    ));
                }
            }

            if capability.mutation
                && !runs_earlier(workflow, step, |c| self.config.is_checkpoint(c))
            {
                let severity = if self.config.strict_checkpoints {
                    Severity::Error
                } else {
                    ErrorCode::MutationWithoutCheckpoint.default_severity()
                };
                findings.push(
                    Finding::new(
                        ErrorCode::MutationWithoutCheckpoint,
                        step_location(workflow, step),
                        format!("Mutating capability '{}' runs without an earlier checkpoint", id),
                    )
                    .with_severity(severity)
                    .with_suggestion(format!(
                        "Insert a '{}' step before '{}'",
                        self.config
                            .checkpoint_capabilities
                            .first()
                            .map(String::as_str)
                            .unwrap_or("checkpoint"),
                        step.store_as
                    )),
                );
            }
        }

        for (j, later) in workflow.steps.iter().enumerate() {
            for earlier in &workflow.steps[..j] {
                if self
                    .ontology
                    .conflicts(earlier.capability_id.as_str(), later.capability_id.as_str())
                {
                    findings.push(Finding::new(
                        ErrorCode::ConflictingCapabilities,
                        step_location(workflow, later),
                        format!(
                            "Capability '{}' conflicts with '{}' used by step '{}'",
                            later.capability_id, earlier.capability_id, earlier.store_as
                        ),
                    ));
                }
            }
        }

        for (first, then) in self.ontology.ordering_constraints() {
            for a in workflow.steps.iter().filter(|s| &s.capability_id == first) {
                for b in workflow.steps.iter().filter(|s| &s.capability_id == then) {
                    if a.index == b.index {
                        continue;
                    }
                    let concurrent = a.is_parallel_sibling(b);
                    if b.index > a.index && !concurrent {
                        continue;
                    }
                    let at = if a.index > b.index { a } else { b };
                    let relation = if concurrent {
                        "runs concurrently with"
                    } else {
                        "runs after"
                    };
                    findings.push(Finding::new(
                        ErrorCode::OrderingViolation,
                        step_location(workflow, at),
                        format!(
                            "'{}' must precede '{}', but step '{}' {} step '{}'",
                            first, then, a.store_as, relation, b.store_as
                        ),
                    ));
                }
            }
        }

        findings
    }

    /// Whether `required`, or a direct alternative to it, runs before `step`
    fn satisfied_before(&self, workflow: &Workflow, step: &Step, required: &CapabilityId) -> bool {
        let alternatives = self.ontology.alternatives(required.as_str());
        runs_earlier(workflow, step, |c| {
            c == required.as_str() || alternatives.iter().any(|a| a.as_str() == c)
        })
    }

    fn alternatives_note(&self, required: &CapabilityId) -> String {
        let alternatives = self.ontology.alternatives(required.as_str());
        if alternatives.is_empty() {
            return String::new();
        }
        let names: Vec<&str> = alternatives.iter().map(CapabilityId::as_str).collect();
        format!(" (or {})", names.join(", "))
    }

    // ── L3 ───────────────────────────────────────────────────────────

    fn check_contracts(&self, workflow: &Workflow, excluded: &BTreeSet<usize>) -> Vec<Finding> {
        let mut findings = Vec::new();
        let input_schema = match self.input_schema(workflow) {
            Ok(schema) => schema,
            Err(finding) => {
                findings.push(finding);
                SchemaNode::Any
            }
        };

        let resolver = BindingResolver::new(self.ontology, workflow, self.config, input_schema);
        for step in workflow.steps.iter().filter(|s| !excluded.contains(&s.index)) {
            findings.extend(resolver.check_step(step));
        }
        findings
    }

    /// Schema of the input namespace; a bare field mapping is read as
    /// the properties of an object
    fn input_schema(&self, workflow: &Workflow) -> Result<SchemaNode, Finding> {
        let raw = match &workflow.inputs {
            None | Some(Value::Null) => return Ok(SchemaNode::Any),
            Some(Value::Object(map)) if !SCHEMA_KEYWORDS.iter().any(|k| map.contains_key(*k)) => {
                json!({"type": "object", "properties": map})
            }
            Some(other) => other.clone(),
        };
        SchemaResolver::new(raw.clone())
            .with_max_depth(self.config.max_ref_depth)
            .resolve(&raw)
            .map_err(|e| {
                Finding::new(
                    ErrorCode::UnresolvedSchemaRef,
                    Location::workflow(&workflow.name).with_field("inputs"),
                    format!("Workflow inputs schema does not resolve: {}", e),
                )
            })
    }

    // ── L4 ───────────────────────────────────────────────────────────

    fn check_semantics(&self, workflow: &Workflow, excluded: &BTreeSet<usize>) -> Vec<Finding> {
        let mut findings = Vec::new();
        let active = || workflow.steps.iter().filter(|s| !excluded.contains(&s.index));

        for step in active() {
            let id = step.capability_id.as_str();
            let Some(capability) = self.ontology.get(id) else {
                continue;
            };
            if self.config.is_send(id) && !runs_earlier(workflow, step, |c| self.config.is_safeguard(c))
            {
                findings.push(
                    Finding::new(
                        ErrorCode::SendWithoutSafeguard,
                        step_location(workflow, step),
                        format!(
                            "Step '{}' sends data without an earlier {} step",
                            step.store_as,
                            self.config.safeguard_capabilities.join(" or ")
                        ),
                    )
                    .with_suggestion(format!(
                        "Add a {} step before '{}'",
                        self.config.safeguard_capabilities.join(" or "),
                        step.store_as
                    )),
                );
            }
            if capability.requires_approval && step.gates.is_empty() {
                findings.push(Finding::new(
                    ErrorCode::ApprovalWithoutGate,
                    step_location(workflow, step),
                    format!(
                        "Capability '{}' requires approval but step '{}' declares no gate",
                        id, step.store_as
                    ),
                ));
            }
        }

        if let Some(declared) = workflow.risk {
            let risk_of = |s: &Step| self.ontology.get(s.capability_id.as_str()).map(|c| c.risk);
            let highest = active().filter_map(risk_of).max();
            let first = active().find(|&s| risk_of(s).is_some_and(|r| r > declared));
            if let (Some(highest), Some(step)) = (highest, first) {
                findings.push(
                    Finding::new(
                        ErrorCode::UnderstatedRisk,
                        step_location(workflow, step),
                        format!(
                            "Workflow declares risk {} but step '{}' runs a {}-risk capability",
                            declared,
                            step.store_as,
                            risk_of(step).unwrap_or(highest)
                        ),
                    )
                    .with_suggestion(format!("Declare the workflow risk as {}", highest)),
                );
            }
        }

        findings
    }

    // ── Patches ──────────────────────────────────────────────────────

    fn synthesize_patches(
        &self,
        loaded: &LoadedWorkflow,
        workflow: &Workflow,
        findings: &mut [Finding],
    ) -> Vec<Patch> {
        let (Some(registry), Some(document)) = (self.registry, &loaded.document) else {
            return Vec::new();
        };
        let synthesizer = PatchSynthesizer::new(registry);
        let mut patches = Vec::new();
        for finding in findings
            .iter_mut()
            .filter(|f| f.code == ErrorCode::TypeMismatch)
        {
            match synthesizer.synthesize(document, workflow, finding) {
                Ok(Some(patch)) => {
                    finding.suggestion = Some(patch.summary());
                    patches.push(patch);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        workflow = %workflow.name,
                        location = %finding.location,
                        error = %e,
                        "Patch synthesis failed"
                    );
                }
            }
        }
        patches
    }
}

fn step_location(workflow: &Workflow, step: &Step) -> Location {
    Location::workflow(&workflow.name).with_step(step.index, &step.store_as)
}

/// Whether a step running strictly before `step` (not concurrently with
/// it) uses a capability matching `matches`
fn runs_earlier(workflow: &Workflow, step: &Step, matches: impl Fn(&str) -> bool) -> bool {
    workflow.steps[..step.index.min(workflow.steps.len())]
        .iter()
        .any(|other| !step.is_parallel_sibling(other) && matches(other.capability_id.as_str()))
}

/// Record the steps that carry an error
fn exclude_failed(excluded: &mut BTreeSet<usize>, findings: &[Finding]) {
    excluded.extend(
        findings
            .iter()
            .filter(|f| f.is_error())
            .filter_map(|f| f.location.step_index),
    );
}
