//! The step graph checked by the conformance engine
//!
//! Built by the loader from a structurally valid document and never
//! mutated while checking.

use crate::{Binding, Expression, WorkflowError, WorkflowResult};
use capability_types::{CapabilityId, Risk};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

// ── Parallel groups ──────────────────────────────────────────────────

/// How the results of a parallel group are joined
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinStrategy {
    /// Wait for every member
    All,
    /// Continue when any member succeeds
    Any,
    /// Take the first member to finish
    First,
    /// Merge member outputs
    Merge,
}

impl JoinStrategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Self::All),
            "any" => Some(Self::Any),
            "first" => Some(Self::First),
            "merge" => Some(Self::Merge),
            _ => None,
        }
    }
}

// ── Steps ────────────────────────────────────────────────────────────

/// A halt condition evaluated before the step runs
#[derive(Clone, Debug, PartialEq)]
pub struct Gate {
    pub when: Expression,
    pub action: String,
    pub message: Option<String>,
}

/// A recovery edge
#[derive(Clone, Debug, PartialEq)]
pub struct FailureMode {
    pub condition: String,
    pub action: String,
    pub recovery: Option<String>,
    pub goto_step: Option<String>,
    pub max_loops: Option<u32>,
}

/// One capability invocation in a workflow
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    /// Position in the workflow
    pub index: usize,
    pub capability_id: CapabilityId,
    /// Alias under which later steps address this step's output
    pub store_as: String,
    pub input_bindings: IndexMap<String, Binding>,
    pub condition: Option<Expression>,
    pub parallel_group: Option<String>,
    pub gates: Vec<Gate>,
    pub failure_modes: Vec<FailureMode>,
}

impl Step {
    pub fn new(index: usize, capability_id: impl Into<String>, store_as: impl Into<String>) -> Self {
        Self {
            index,
            capability_id: CapabilityId::new(capability_id),
            store_as: store_as.into(),
            input_bindings: IndexMap::new(),
            condition: None,
            parallel_group: None,
            gates: Vec::new(),
            failure_modes: Vec::new(),
        }
    }

    pub fn with_binding(mut self, field: impl Into<String>, binding: Binding) -> Self {
        self.input_bindings.insert(field.into(), binding);
        self
    }

    pub fn with_parallel_group(mut self, group: impl Into<String>) -> Self {
        self.parallel_group = Some(group.into());
        self
    }

    pub fn with_failure_mode(mut self, failure_mode: FailureMode) -> Self {
        self.failure_modes.push(failure_mode);
        self
    }

    /// Whether both steps belong to the same parallel group
    pub fn is_parallel_sibling(&self, other: &Step) -> bool {
        self.index != other.index
            && self.parallel_group.is_some()
            && self.parallel_group == other.parallel_group
    }
}

// ── Workflow ─────────────────────────────────────────────────────────

/// A recovery loop: the body spans `target..=source`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoveryLoop {
    /// Index of the `goto_step` target
    pub target: usize,
    /// Index of the step declaring the failure mode
    pub source: usize,
    pub max_loops: u32,
}

/// A workflow step graph
#[derive(Clone, Debug, PartialEq)]
pub struct Workflow {
    pub name: String,
    pub version: Option<String>,
    pub ontology_version: Option<String>,
    /// Declared overall risk
    pub risk: Option<Risk>,
    /// Schema of the input namespace as authored
    pub inputs: Option<Value>,
    pub parallel_groups: IndexMap<String, JoinStrategy>,
    pub steps: Vec<Step>,
}

impl Workflow {
    /// Build a workflow; `store_as` aliases must be unique
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> WorkflowResult<Self> {
        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.store_as.as_str()) {
                return Err(WorkflowError::DuplicateStoreAs(step.store_as.clone()));
            }
        }
        Ok(Self {
            name: name.into(),
            version: None,
            ontology_version: None,
            risk: None,
            inputs: None,
            parallel_groups: IndexMap::new(),
            steps,
        })
    }

    pub fn with_inputs(mut self, inputs: Value) -> Self {
        self.inputs = Some(inputs);
        self
    }

    pub fn with_parallel_group(mut self, group: impl Into<String>, join: JoinStrategy) -> Self {
        self.parallel_groups.insert(group.into(), join);
        self
    }

    /// Find a step by its `store_as` alias
    pub fn step(&self, alias: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.store_as == alias)
    }

    /// Index of the step with the given alias
    pub fn step_index(&self, alias: &str) -> WorkflowResult<usize> {
        self.step(alias)
            .map(|s| s.index)
            .ok_or_else(|| WorkflowError::StepNotFound(alias.to_string()))
    }

    /// Declared recovery loops (`goto_step` back-edges)
    pub fn recovery_loops(&self) -> Vec<RecoveryLoop> {
        let mut loops = Vec::new();
        for step in &self.steps {
            for mode in &step.failure_modes {
                let Some(goto) = &mode.goto_step else {
                    continue;
                };
                let Some(target) = self.step(goto) else {
                    continue;
                };
                if target.index <= step.index {
                    loops.push(RecoveryLoop {
                        target: target.index,
                        source: step.index,
                        max_loops: mode.max_loops.unwrap_or(0),
                    });
                }
            }
        }
        loops
    }

    /// Whether `producer` is readable by `consumer` only through a
    /// recovery loop containing both (a value from the previous pass)
    pub fn loop_visible(&self, consumer: usize, producer: usize) -> bool {
        self.recovery_loops().iter().any(|l| {
            l.target <= consumer && consumer <= producer && producer <= l.source
        })
    }

    /// Steps in the given parallel group
    pub fn group_members(&self, group: &str) -> Vec<&Step> {
        self.steps
            .iter()
            .filter(|s| s.parallel_group.as_deref() == Some(group))
            .collect()
    }
}
