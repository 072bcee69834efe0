//! Conformance findings and the stable error taxonomy
//!
//! Every code is permanently bound to one name and one level. Codes are
//! partitioned by prefix: `V1xx` structural, `B2xx` binding, `S3xx`
//! schema and edge contracts, `R4xx` semantic policy.

use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Suggestion text for findings without an automated fix
pub const NO_REMEDIATION: &str = "No automated remediation available";

// ── Levels ───────────────────────────────────────────────────────────

/// Ordered conformance levels
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Level {
    /// Structural
    L1,
    /// Edge constraints
    L2,
    /// Contract and type
    L3,
    /// Semantic policy
    L4,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::L1, Level::L2, Level::L3, Level::L4];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L1 => "L1",
            Self::L2 => "L2",
            Self::L3 => "L3",
            Self::L4 => "L4",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::L1 => "structural",
            Self::L2 => "edge-constraint",
            Self::L3 => "contract/type",
            Self::L4 => "semantic",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finding severity
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Warning => f.write_str("warning"),
        }
    }
}

// ── Taxonomy ─────────────────────────────────────────────────────────

/// The stable finding code space
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    MalformedWorkflow,
    UnknownCapability,
    MissingRequiredField,
    DuplicateStoreAs,
    MalformedCapabilityId,
    BindingSyntaxError,
    ParallelGroupWithoutJoin,
    UnknownGotoTarget,
    UnboundedRecoveryLoop,
    IncompatibleOntologyVersion,
    BadReferencePath,
    UnknownReferenceField,
    TypeMismatch,
    AmbiguousType,
    AnnotationMismatch,
    ParallelSiblingReference,
    UnknownInputField,
    MissingRequiredInput,
    RequiresUnsatisfied,
    ConflictingCapabilities,
    OrderingViolation,
    MutationWithoutCheckpoint,
    SoftRequiresUnsatisfied,
    UnresolvedSchemaRef,
    SendWithoutSafeguard,
    ApprovalWithoutGate,
    UnderstatedRisk,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 27] = [
        Self::MalformedWorkflow,
        Self::UnknownCapability,
        Self::MissingRequiredField,
        Self::DuplicateStoreAs,
        Self::MalformedCapabilityId,
        Self::BindingSyntaxError,
        Self::ParallelGroupWithoutJoin,
        Self::UnknownGotoTarget,
        Self::UnboundedRecoveryLoop,
        Self::IncompatibleOntologyVersion,
        Self::BadReferencePath,
        Self::UnknownReferenceField,
        Self::TypeMismatch,
        Self::AmbiguousType,
        Self::AnnotationMismatch,
        Self::ParallelSiblingReference,
        Self::UnknownInputField,
        Self::MissingRequiredInput,
        Self::RequiresUnsatisfied,
        Self::ConflictingCapabilities,
        Self::OrderingViolation,
        Self::MutationWithoutCheckpoint,
        Self::SoftRequiresUnsatisfied,
        Self::UnresolvedSchemaRef,
        Self::SendWithoutSafeguard,
        Self::ApprovalWithoutGate,
        Self::UnderstatedRisk,
    ];

    /// Stable code string (`B203`)
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedWorkflow => "V100",
            Self::UnknownCapability => "V101",
            Self::MissingRequiredField => "V102",
            Self::DuplicateStoreAs => "V103",
            Self::MalformedCapabilityId => "V104",
            Self::BindingSyntaxError => "V105",
            Self::ParallelGroupWithoutJoin => "V106",
            Self::UnknownGotoTarget => "V107",
            Self::UnboundedRecoveryLoop => "V108",
            Self::IncompatibleOntologyVersion => "V109",
            Self::BadReferencePath => "B201",
            Self::UnknownReferenceField => "B202",
            Self::TypeMismatch => "B203",
            Self::AmbiguousType => "B204",
            Self::AnnotationMismatch => "B205",
            Self::ParallelSiblingReference => "B206",
            Self::UnknownInputField => "B207",
            Self::MissingRequiredInput => "B208",
            Self::RequiresUnsatisfied => "S301",
            Self::ConflictingCapabilities => "S302",
            Self::OrderingViolation => "S303",
            Self::MutationWithoutCheckpoint => "S304",
            Self::SoftRequiresUnsatisfied => "S305",
            Self::UnresolvedSchemaRef => "S306",
            Self::SendWithoutSafeguard => "R401",
            Self::ApprovalWithoutGate => "R402",
            Self::UnderstatedRisk => "R403",
        }
    }

    /// Stable human-readable name (`TYPE_MISMATCH`)
    pub fn name(&self) -> &'static str {
        match self {
            Self::MalformedWorkflow => "MALFORMED_WORKFLOW",
            Self::UnknownCapability => "UNKNOWN_CAPABILITY",
            Self::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            Self::DuplicateStoreAs => "DUPLICATE_STORE_AS",
            Self::MalformedCapabilityId => "MALFORMED_CAPABILITY_ID",
            Self::BindingSyntaxError => "BINDING_SYNTAX_ERROR",
            Self::ParallelGroupWithoutJoin => "PARALLEL_GROUP_WITHOUT_JOIN",
            Self::UnknownGotoTarget => "UNKNOWN_GOTO_TARGET",
            Self::UnboundedRecoveryLoop => "UNBOUNDED_RECOVERY_LOOP",
            Self::IncompatibleOntologyVersion => "INCOMPATIBLE_ONTOLOGY_VERSION",
            Self::BadReferencePath => "BAD_REFERENCE_PATH",
            Self::UnknownReferenceField => "UNKNOWN_REFERENCE_FIELD",
            Self::TypeMismatch => "TYPE_MISMATCH",
            Self::AmbiguousType => "AMBIGUOUS_TYPE",
            Self::AnnotationMismatch => "ANNOTATION_MISMATCH",
            Self::ParallelSiblingReference => "PARALLEL_SIBLING_REFERENCE",
            Self::UnknownInputField => "UNKNOWN_INPUT_FIELD",
            Self::MissingRequiredInput => "MISSING_REQUIRED_INPUT",
            Self::RequiresUnsatisfied => "REQUIRES_UNSATISFIED",
            Self::ConflictingCapabilities => "CONFLICTING_CAPABILITIES",
            Self::OrderingViolation => "ORDERING_VIOLATION",
            Self::MutationWithoutCheckpoint => "MUTATION_WITHOUT_CHECKPOINT",
            Self::SoftRequiresUnsatisfied => "SOFT_REQUIRES_UNSATISFIED",
            Self::UnresolvedSchemaRef => "UNRESOLVED_SCHEMA_REF",
            Self::SendWithoutSafeguard => "SEND_WITHOUT_SAFEGUARD",
            Self::ApprovalWithoutGate => "APPROVAL_WITHOUT_GATE",
            Self::UnderstatedRisk => "UNDERSTATED_RISK",
        }
    }

    /// Level the code is reported at
    pub fn level(&self) -> Level {
        match self {
            Self::MalformedWorkflow
            | Self::UnknownCapability
            | Self::MissingRequiredField
            | Self::DuplicateStoreAs
            | Self::MalformedCapabilityId
            | Self::BindingSyntaxError
            | Self::ParallelGroupWithoutJoin
            | Self::UnknownGotoTarget
            | Self::UnboundedRecoveryLoop
            | Self::IncompatibleOntologyVersion => Level::L1,
            Self::RequiresUnsatisfied
            | Self::ConflictingCapabilities
            | Self::OrderingViolation
            | Self::MutationWithoutCheckpoint
            | Self::SoftRequiresUnsatisfied => Level::L2,
            Self::BadReferencePath
            | Self::UnknownReferenceField
            | Self::TypeMismatch
            | Self::AmbiguousType
            | Self::AnnotationMismatch
            | Self::ParallelSiblingReference
            | Self::UnknownInputField
            | Self::MissingRequiredInput
            | Self::UnresolvedSchemaRef => Level::L3,
            Self::SendWithoutSafeguard | Self::ApprovalWithoutGate | Self::UnderstatedRisk => {
                Level::L4
            }
        }
    }

    /// Severity unless configuration overrides it
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::UnknownInputField
            | Self::MutationWithoutCheckpoint
            | Self::SoftRequiresUnsatisfied
            | Self::SendWithoutSafeguard
            | Self::ApprovalWithoutGate
            | Self::UnderstatedRisk => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// One-line description of the condition the code reports
    pub fn description(&self) -> &'static str {
        match self {
            Self::MalformedWorkflow => "The workflow body does not match the workflow document format",
            Self::UnknownCapability => "A step names a capability that is not in the ontology",
            Self::MissingRequiredField => "A step or workflow lacks a required field",
            Self::DuplicateStoreAs => "Two steps share the same store_as alias",
            Self::MalformedCapabilityId => "A capability id is not of the form [a-z][a-z0-9_-]*",
            Self::BindingSyntaxError => "A binding, condition or gate expression does not parse",
            Self::ParallelGroupWithoutJoin => "A parallel group has no declared join strategy",
            Self::UnknownGotoTarget => "A failure mode's goto_step names no step in the workflow",
            Self::UnboundedRecoveryLoop => "A goto_step recovery loop has no usable max_loops bound",
            Self::IncompatibleOntologyVersion => "The workflow targets an incompatible ontology major version",
            Self::BadReferencePath => "A reference names no preceding step or input namespace",
            Self::UnknownReferenceField => "A reference path does not exist in the producer's output schema",
            Self::TypeMismatch => "The bound value's type does not fit the consumer's input type",
            Self::AmbiguousType => "The bound value has no unique type and carries no annotation",
            Self::AnnotationMismatch => "The type annotation agrees with no candidate type",
            Self::ParallelSiblingReference => "A step reads the output of a step in its own parallel group",
            Self::UnknownInputField => "A binding targets an input field the capability does not declare",
            Self::MissingRequiredInput => "A required input field of the capability is not bound",
            Self::RequiresUnsatisfied => "A required capability does not run earlier in the workflow",
            Self::ConflictingCapabilities => "Two conflicting capabilities appear in the same workflow",
            Self::OrderingViolation => "A precedes/follows ordering constraint is violated",
            Self::MutationWithoutCheckpoint => "A mutating step has no earlier checkpoint step",
            Self::SoftRequiresUnsatisfied => "A soft requirement does not run earlier in the workflow",
            Self::UnresolvedSchemaRef => "The workflow's inputs schema cannot be resolved",
            Self::SendWithoutSafeguard => "A send step has no earlier constrain or checkpoint step",
            Self::ApprovalWithoutGate => "A step requiring approval has no gate",
            Self::UnderstatedRisk => "The declared workflow risk is below the risk of one of its steps",
        }
    }

    /// Look up a code by its code string or name
    pub fn from_code(s: &str) -> Option<Self> {
        let upper = s.to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|c| c.code() == upper || c.name() == upper)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

// ── Findings ─────────────────────────────────────────────────────────

/// Where a finding applies
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Location {
    pub workflow: String,
    /// `store_as` alias of the step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_index: Option<usize>,
    /// Input field, or `condition` / `gates[n]` for expressions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl Location {
    pub fn workflow(name: impl Into<String>) -> Self {
        Self {
            workflow: name.into(),
            ..Self::default()
        }
    }

    pub fn with_step(mut self, index: usize, alias: impl Into<String>) -> Self {
        self.step_index = Some(index);
        self.step = Some(alias.into());
        self
    }

    /// A step that has no usable alias
    pub fn with_step_index(mut self, index: usize) -> Self {
        self.step_index = Some(index);
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.workflow)?;
        match (&self.step, self.step_index) {
            (Some(alias), _) => write!(f, "/{}", alias)?,
            (None, Some(index)) => write!(f, "/steps[{}]", index)?,
            (None, None) => {}
        }
        if let Some(field) = &self.field {
            write!(f, "/{}", field)?;
        }
        Ok(())
    }
}

/// Found and expected types carried by a type mismatch
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TypePayload {
    pub found: String,
    pub expected: String,
}

/// One conformance finding
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Finding {
    pub code: ErrorCode,
    pub level: Level,
    pub severity: Severity,
    pub location: Location,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub types: Option<TypePayload>,
}

impl Finding {
    pub fn new(code: ErrorCode, location: Location, message: impl Into<String>) -> Self {
        Self {
            code,
            level: code.level(),
            severity: code.default_severity(),
            location,
            message: message.into(),
            suggestion: None,
            types: None,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_types(mut self, found: impl Into<String>, expected: impl Into<String>) -> Self {
        self.types = Some(TypePayload {
            found: found.into(),
            expected: expected.into(),
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// The suggestion, or the explicit no-remediation text
    pub fn suggestion_text(&self) -> &str {
        self.suggestion.as_deref().unwrap_or(NO_REMEDIATION)
    }

    /// Report order: level, step, field, code, then message
    pub fn report_order(&self, other: &Finding) -> Ordering {
        self.level
            .cmp(&other.level)
            .then_with(|| self.location.step_index.cmp(&other.location.step_index))
            .then_with(|| self.location.field.cmp(&other.location.field))
            .then_with(|| self.code.cmp(&other.code))
            .then_with(|| self.message.cmp(&other.message))
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}] {}: {}",
            self.code,
            self.code.name(),
            self.level,
            self.location,
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_codes_unique_and_prefixed() {
        let mut codes = HashSet::new();
        let mut names = HashSet::new();
        for code in ErrorCode::ALL {
            assert!(codes.insert(code.code()));
            assert!(names.insert(code.name()));
            let prefix_level = match &code.code()[..1] {
                "V" => Level::L1,
                "B" => Level::L3,
                "S" if code == ErrorCode::UnresolvedSchemaRef => Level::L3,
                "S" => Level::L2,
                "R" => Level::L4,
                other => panic!("unexpected prefix {other}"),
            };
            assert_eq!(code.level(), prefix_level, "{}", code);
        }
    }

    #[test]
    fn test_from_code() {
        assert_eq!(ErrorCode::from_code("B203"), Some(ErrorCode::TypeMismatch));
        assert_eq!(ErrorCode::from_code("b204"), Some(ErrorCode::AmbiguousType));
        assert_eq!(
            ErrorCode::from_code("UNKNOWN_CAPABILITY"),
            Some(ErrorCode::UnknownCapability)
        );
        assert_eq!(ErrorCode::from_code("X999"), None);
    }

    #[test]
    fn test_r4xx_are_warnings() {
        for code in ErrorCode::ALL {
            if code.level() == Level::L4 {
                assert_eq!(code.default_severity(), Severity::Warning);
            }
        }
        assert_eq!(ErrorCode::TypeMismatch.default_severity(), Severity::Error);
    }

    #[test]
    fn test_finding_order() {
        let wf = Location::workflow("wf");
        let a = Finding::new(ErrorCode::TypeMismatch, wf.clone().with_step(1, "b"), "x");
        let b = Finding::new(ErrorCode::BadReferencePath, wf.clone().with_step(2, "c"), "x");
        let c = Finding::new(ErrorCode::RequiresUnsatisfied, wf.clone().with_step(3, "d"), "x");
        let d = Finding::new(ErrorCode::UnresolvedSchemaRef, wf, "x");

        let mut findings = vec![b.clone(), a.clone(), d.clone(), c.clone()];
        findings.sort_by(|x, y| x.report_order(y));
        assert_eq!(findings, vec![c, d, a, b]);
    }

    #[test]
    fn test_suggestion_text() {
        let finding = Finding::new(ErrorCode::BadReferencePath, Location::workflow("wf"), "m");
        assert_eq!(finding.suggestion_text(), NO_REMEDIATION);
        let finding = finding.with_suggestion("Insert transform");
        assert_eq!(finding.suggestion_text(), "Insert transform");
    }

    #[test]
    fn test_location_display() {
        let location = Location::workflow("wf").with_step(2, "detect_out").with_field("source");
        assert_eq!(location.to_string(), "wf/detect_out/source");
    }

    #[test]
    fn test_serialize_code_as_string() {
        let json = serde_json::to_value(ErrorCode::TypeMismatch).unwrap();
        assert_eq!(json, "B203");
    }
}
