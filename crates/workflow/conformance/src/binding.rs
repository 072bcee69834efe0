//! Binding Resolver: type inference for step inputs
//!
//! For every reference a step reads, the resolver finds the producing
//! step, walks the reference path into the producer's output schema and
//! decides the value's type. The type is compared with the consumer
//! capability's declared input type.
//!
//! Inference never guesses. A union, an explicitly unknown type or an
//! array of either needs an annotation, even when several candidates
//! would fit the consumer.

use crate::ConformanceConfig;
use capability_ontology::Ontology;
use capability_types::{Capability, SchemaNode};
use workflow_types::{Binding, ErrorCode, Finding, Location, Reference, Step, Workflow};

/// How much of the inference pipeline a reference goes through
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Depth {
    /// Producer and path only; the value is rendered into text
    Existence,
    /// Producer, path and a unique type
    Typed,
}

/// Resolves the bindings of one workflow against the ontology
pub struct BindingResolver<'a> {
    ontology: &'a Ontology,
    workflow: &'a Workflow,
    config: &'a ConformanceConfig,
    input_schema: SchemaNode,
}

impl<'a> BindingResolver<'a> {
    /// `input_schema` types the input namespace
    pub fn new(
        ontology: &'a Ontology,
        workflow: &'a Workflow,
        config: &'a ConformanceConfig,
        input_schema: SchemaNode,
    ) -> Self {
        Self {
            ontology,
            workflow,
            config,
            input_schema,
        }
    }

    /// Check every binding, condition and gate of a step.
    ///
    /// Checking is exhaustive: one bad binding does not hide others.
    pub fn check_step(&self, step: &Step) -> Vec<Finding> {
        let mut findings = Vec::new();
        let Some(capability) = self.ontology.get(step.capability_id.as_str()) else {
            return findings;
        };
        let base = Location::workflow(&self.workflow.name).with_step(step.index, &step.store_as);

        for (field, binding) in &step.input_bindings {
            let location = base.clone().with_field(field.clone());
            let expected = capability.input_field(field);
            if expected.is_none() && !capability.accepts_undeclared_inputs() {
                findings.push(Finding::new(
                    ErrorCode::UnknownInputField,
                    location.clone(),
                    format!(
                        "Capability '{}' declares no input field '{}'",
                        capability.id, field
                    ),
                ));
            }

            let Some(found) = self.binding_type(step, binding, &location, &mut findings) else {
                continue;
            };
            if let Some(expected) = expected {
                if !expected.accepts(&found) {
                    findings.push(mismatch(capability, field, &found, expected, location));
                }
            }
        }

        for required in capability.required_inputs() {
            if !step.input_bindings.contains_key(required) {
                findings.push(Finding::new(
                    ErrorCode::MissingRequiredInput,
                    base.clone().with_field(required),
                    format!(
                        "Required input '{}' of capability '{}' is not bound",
                        required, capability.id
                    ),
                ));
            }
        }

        if let Some(condition) = &step.condition {
            let location = base.clone().with_field("condition");
            for reference in &condition.references {
                self.resolve(step, reference, &location, Depth::Existence, &mut findings);
            }
        }
        for (i, gate) in step.gates.iter().enumerate() {
            let location = base.clone().with_field(format!("gates[{}]", i));
            for reference in &gate.when.references {
                self.resolve(step, reference, &location, Depth::Existence, &mut findings);
            }
        }

        findings
    }

    /// Type of a binding's value, or `None` if it cannot be typed
    fn binding_type(
        &self,
        step: &Step,
        binding: &Binding,
        location: &Location,
        findings: &mut Vec<Finding>,
    ) -> Option<SchemaNode> {
        match binding {
            Binding::Reference(reference) => {
                self.resolve(step, reference, location, Depth::Typed, findings)
            }
            Binding::Template { references, .. } => {
                let mut resolved = true;
                for reference in references {
                    resolved &= self
                        .resolve(step, reference, location, Depth::Existence, findings)
                        .is_some();
                }
                resolved.then(SchemaNode::string)
            }
            Binding::Composite { value, references } => {
                let mut resolved = true;
                for reference in references {
                    resolved &= self
                        .resolve(step, reference, location, Depth::Existence, findings)
                        .is_some();
                }
                resolved.then(|| SchemaNode::of_value(value))
            }
            Binding::Literal(value) => Some(SchemaNode::of_value(value)),
        }
    }

    /// Resolve one reference, reporting at most one finding for it
    fn resolve(
        &self,
        consumer: &Step,
        reference: &Reference,
        location: &Location,
        depth: Depth,
        findings: &mut Vec<Finding>,
    ) -> Option<SchemaNode> {
        let output = match self.producer_output(consumer, reference) {
            Ok(output) => output,
            Err(finding) => {
                findings.push(finding.with_location(location.clone()));
                return None;
            }
        };

        let node = match output.walk(&reference.path) {
            Ok(node) => node,
            Err(e) => {
                findings.push(Finding::new(
                    ErrorCode::UnknownReferenceField,
                    location.clone(),
                    format!("Reference {} does not resolve: {}", reference, e),
                ));
                return None;
            }
        };

        if depth == Depth::Existence {
            return Some(node);
        }

        match &reference.annotation {
            None if node.is_ambiguous() => {
                findings.push(Finding::new(
                    ErrorCode::AmbiguousType,
                    location.clone(),
                    format!(
                        "Reference {} has no unique type ({}); add an annotation such as ${{{}:<type>}}",
                        reference,
                        node,
                        reference.target()
                    ),
                ));
                None
            }
            None => Some(node),
            Some(annotation) if !node.admits(annotation) => {
                findings.push(Finding::new(
                    ErrorCode::AnnotationMismatch,
                    location.clone(),
                    format!(
                        "Annotation '{}' on {} agrees with no candidate of {}",
                        annotation, reference, node
                    ),
                ));
                None
            }
            Some(annotation) if node.is_ambiguous() || matches!(node, SchemaNode::Any) => {
                Some(annotation.clone())
            }
            Some(_) => Some(node),
        }
    }

    /// Output schema of the referenced producer
    fn producer_output(
        &self,
        consumer: &Step,
        reference: &Reference,
    ) -> Result<SchemaNode, PendingFinding> {
        if reference.producer == self.config.input_namespace {
            return Ok(self.input_schema.clone());
        }

        let Some(producer) = self.workflow.step(&reference.producer) else {
            let mut known: Vec<&str> = self
                .workflow
                .steps
                .iter()
                .filter(|s| s.index < consumer.index)
                .map(|s| s.store_as.as_str())
                .collect();
            known.push(self.config.input_namespace.as_str());
            return Err(PendingFinding::new(
                ErrorCode::BadReferencePath,
                format!(
                    "Reference {} names no step; visible producers are: {}",
                    reference,
                    known.join(", ")
                ),
            ));
        };

        if producer.index < consumer.index {
            if consumer.is_parallel_sibling(producer) {
                return Err(PendingFinding::new(
                    ErrorCode::ParallelSiblingReference,
                    format!(
                        "Reference {} reads step '{}', which runs concurrently in parallel group '{}'",
                        reference,
                        producer.store_as,
                        producer.parallel_group.as_deref().unwrap_or_default()
                    ),
                ));
            }
        } else if !self.workflow.loop_visible(consumer.index, producer.index) {
            let relation = if producer.index == consumer.index {
                "the consuming step itself"
            } else {
                "a later step"
            };
            return Err(PendingFinding::new(
                ErrorCode::BadReferencePath,
                format!(
                    "Reference {} reads '{}', which is {}; producers must run earlier",
                    reference, producer.store_as, relation
                ),
            ));
        }

        Ok(self
            .ontology
            .get(producer.capability_id.as_str())
            .map(|c| c.output.clone())
            .unwrap_or(SchemaNode::Any))
    }
}

/// A finding whose location is filled in by the caller
struct PendingFinding {
    code: ErrorCode,
    message: String,
}

impl PendingFinding {
    fn new(code: ErrorCode, message: String) -> Self {
        Self { code, message }
    }

    fn with_location(self, location: Location) -> Finding {
        Finding::new(self.code, location, self.message)
    }
}

fn mismatch(
    capability: &Capability,
    field: &str,
    found: &SchemaNode,
    expected: &SchemaNode,
    location: Location,
) -> Finding {
    Finding::new(
        ErrorCode::TypeMismatch,
        location,
        format!(
            "Input '{}' of capability '{}' expects {} but the binding provides {}",
            field, capability.id, expected, found
        ),
    )
    .with_types(found.to_string(), expected.to_string())
}
