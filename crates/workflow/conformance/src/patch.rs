//! Patch Synthesizer: coercion steps for type mismatches
//!
//! A `B203` whose `(found, expected)` pair has a registered coercion is
//! repaired by inserting the coercion capability immediately before the
//! consumer and pointing the consumer's binding at the new step's output.
//! Operations are anchored on step aliases, so several patches for one
//! workflow apply in any order.

use crate::diff::unified_diff;
use crate::errors::{ConformanceError, ConformanceResult};
use capability_ontology::{CoercionRegistry, CoercionRule};
use capability_types::parse_type;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use workflow_types::{Binding, ErrorCode, Finding, StepDocument, Workflow, WorkflowDocument};

/// One edit of a workflow document
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PatchOperation {
    /// Insert a step immediately before the step aliased `before`
    InsertStep { before: String, step: StepDocument },
    /// Replace the value bound to `step.field`
    RewriteBinding {
        step: String,
        field: String,
        from: Value,
        to: Value,
    },
}

/// A suggested fix for one type mismatch
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Patch {
    pub workflow: String,
    /// Alias of the consuming step
    pub step: String,
    pub field: String,
    pub found: String,
    pub expected: String,
    /// Coercion capability inserted by the patch
    pub capability: String,
    pub operations: Vec<PatchOperation>,
    /// Unified diff of the document rendering
    pub diff: String,
}

impl Patch {
    /// Apply the operations to a workflow document
    pub fn apply(&self, document: &mut WorkflowDocument) -> ConformanceResult<()> {
        for operation in &self.operations {
            match operation {
                PatchOperation::InsertStep { before, step } => {
                    let index = step_position(document, before)?;
                    document.steps.insert(index, step.clone());
                }
                PatchOperation::RewriteBinding { step, field, to, .. } => {
                    let index = step_position(document, step)?;
                    let binding = document.steps[index]
                        .input_bindings
                        .get_mut(field)
                        .ok_or_else(|| ConformanceError::BindingNotFound {
                            step: step.clone(),
                            field: field.clone(),
                        })?;
                    *binding = to.clone();
                }
            }
        }
        Ok(())
    }

    /// Suggestion text attached to the repaired finding
    pub fn summary(&self) -> String {
        let inserted = self.operations.iter().find_map(|op| match op {
            PatchOperation::InsertStep { step, .. } => step.store_as.clone(),
            _ => None,
        });
        format!(
            "Insert a '{}' step{} before '{}' to coerce {} to {}, and bind '{}' to its output",
            self.capability,
            inserted.map(|alias| format!(" '{}'", alias)).unwrap_or_default(),
            self.step,
            self.found,
            self.expected,
            self.field
        )
    }
}

fn step_position(document: &WorkflowDocument, alias: &str) -> ConformanceResult<usize> {
    document
        .steps
        .iter()
        .position(|s| s.store_as.as_deref() == Some(alias))
        .ok_or_else(|| ConformanceError::StepNotFound(alias.to_string()))
}

/// Builds patches from type mismatch findings
pub struct PatchSynthesizer<'a> {
    registry: &'a CoercionRegistry,
}

impl<'a> PatchSynthesizer<'a> {
    pub fn new(registry: &'a CoercionRegistry) -> Self {
        Self { registry }
    }

    /// Synthesize a patch for a finding, if it is a repairable mismatch
    pub fn synthesize(
        &self,
        document: &WorkflowDocument,
        workflow: &Workflow,
        finding: &Finding,
    ) -> ConformanceResult<Option<Patch>> {
        if finding.code != ErrorCode::TypeMismatch {
            return Ok(None);
        }
        let (Some(types), Some(alias), Some(field)) = (
            &finding.types,
            &finding.location.step,
            &finding.location.field,
        ) else {
            return Ok(None);
        };
        let Some(rule) = self.lookup(&types.found, &types.expected) else {
            tracing::debug!(
                workflow = %workflow.name,
                found = %types.found,
                expected = %types.expected,
                "No coercion registered"
            );
            return Ok(None);
        };
        // Only whole-value references can be rewired
        let Some(Binding::Reference(_)) = workflow
            .step(alias)
            .and_then(|s| s.input_bindings.get(field))
        else {
            return Ok(None);
        };

        let index = step_position(document, alias)?;
        let original = document.steps[index]
            .input_bindings
            .get(field)
            .cloned()
            .ok_or_else(|| ConformanceError::BindingNotFound {
                step: alias.clone(),
                field: field.clone(),
            })?;

        let new_alias = fresh_alias(document, &format!("{}_{}_coerced", alias, field));
        let mut inserted = StepDocument::new(rule.capability.as_str(), new_alias.clone());
        inserted.purpose = Some(format!("Coerce {} to {}", types.found, types.expected));
        inserted
            .input_bindings
            .insert(rule.input_field.clone(), original.clone());
        for (name, value) in &rule.params {
            inserted.input_bindings.insert(name.clone(), value.clone());
        }

        let rewired = Value::String(format!(
            "${{{}.{}:{}}}",
            new_alias, rule.output_field, types.expected
        ));

        let mut patch = Patch {
            workflow: workflow.name.clone(),
            step: alias.clone(),
            field: field.clone(),
            found: types.found.clone(),
            expected: types.expected.clone(),
            capability: rule.capability.to_string(),
            operations: vec![
                PatchOperation::InsertStep {
                    before: alias.clone(),
                    step: inserted,
                },
                PatchOperation::RewriteBinding {
                    step: alias.clone(),
                    field: field.clone(),
                    from: original,
                    to: rewired,
                },
            ],
            diff: String::new(),
        };

        let mut patched = document.clone();
        patch.apply(&mut patched)?;
        patch.diff = unified_diff(
            &serde_yaml::to_string(document)?,
            &serde_yaml::to_string(&patched)?,
            &format!("a/{}", workflow.name),
            &format!("b/{}", workflow.name),
        );

        tracing::info!(
            workflow = %workflow.name,
            step = %alias,
            field = %field,
            coercion = %rule.capability,
            "Coercion patch synthesized"
        );
        Ok(Some(patch))
    }

    fn lookup(&self, found: &str, expected: &str) -> Option<&'a CoercionRule> {
        let found = parse_type(found).ok()?;
        let expected = parse_type(expected).ok()?;
        self.registry.lookup(&found, &expected)
    }
}

/// `base`, or `base_2`, `base_3`, ... if already taken
fn fresh_alias(document: &WorkflowDocument, base: &str) -> String {
    let taken: HashSet<&str> = document
        .steps
        .iter()
        .filter_map(|s| s.store_as.as_deref())
        .collect();
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}
