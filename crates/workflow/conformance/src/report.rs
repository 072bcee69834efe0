//! Error Reporter: deterministic reports
//!
//! Findings are ordered by level, step, field and code; workflows by
//! name. Rendering the same report twice yields identical bytes.

use crate::errors::ConformanceResult;
use crate::patch::Patch;
use serde::Serialize;
use std::fmt;
use workflow_types::{Finding, Level, Location, Severity, TypePayload};

/// Overall outcome for one workflow
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    PassWithWarnings,
    Fail,
}

impl Verdict {
    pub fn from_findings(findings: &[Finding]) -> Self {
        if findings.iter().any(Finding::is_error) {
            Self::Fail
        } else if findings.is_empty() {
            Self::Pass
        } else {
            Self::PassWithWarnings
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::PassWithWarnings => "pass_with_warnings",
            Self::Fail => "fail",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Workflow report ──────────────────────────────────────────────────

/// Findings and patches for one workflow
#[derive(Clone, Debug, PartialEq)]
pub struct WorkflowReport {
    pub workflow: String,
    pub verdict: Verdict,
    pub findings: Vec<Finding>,
    pub patches: Vec<Patch>,
}

impl WorkflowReport {
    pub fn new(workflow: impl Into<String>, mut findings: Vec<Finding>, patches: Vec<Patch>) -> Self {
        findings.sort_by(|a, b| a.report_order(b));
        Self {
            workflow: workflow.into(),
            verdict: Verdict::from_findings(&findings),
            findings,
            patches,
        }
    }

    pub fn errors(&self) -> usize {
        self.findings.iter().filter(|f| f.is_error()).count()
    }

    pub fn warnings(&self) -> usize {
        self.findings.len() - self.errors()
    }

    /// Findings at one level
    pub fn at_level(&self, level: Level) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.level == level)
    }
}

// ── Catalog report ───────────────────────────────────────────────────

/// Reports for every checked workflow
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CatalogReport {
    pub workflows: Vec<WorkflowReport>,
}

impl CatalogReport {
    pub fn new(mut workflows: Vec<WorkflowReport>) -> Self {
        workflows.sort_by(|a, b| a.workflow.cmp(&b.workflow));
        Self { workflows }
    }

    /// Whether any workflow has an error (L1 to L3 carry errors; L4 never does)
    pub fn has_errors(&self) -> bool {
        self.workflows.iter().any(|w| w.verdict == Verdict::Fail)
    }

    pub fn verdict(&self) -> Verdict {
        self.workflows
            .iter()
            .map(|w| w.verdict)
            .max()
            .unwrap_or(Verdict::Pass)
    }

    pub fn patches(&self) -> impl Iterator<Item = &Patch> {
        self.workflows.iter().flat_map(|w| w.patches.iter())
    }

    pub fn summary(&self) -> Summary {
        Summary {
            workflows: self.workflows.len(),
            passed: self
                .workflows
                .iter()
                .filter(|w| w.verdict != Verdict::Fail)
                .count(),
            failed: self
                .workflows
                .iter()
                .filter(|w| w.verdict == Verdict::Fail)
                .count(),
            errors: self.workflows.iter().map(WorkflowReport::errors).sum(),
            warnings: self.workflows.iter().map(WorkflowReport::warnings).sum(),
            patches: self.patches().count(),
        }
    }

    pub fn to_json(&self) -> ConformanceResult<String> {
        Ok(serde_json::to_string_pretty(&self.record())?)
    }

    pub fn to_yaml(&self) -> ConformanceResult<String> {
        Ok(serde_yaml::to_string(&self.record())?)
    }

    /// Every patch diff, one section per synthesized fix
    pub fn patch_file(&self) -> String {
        let mut out = String::new();
        for patch in self.patches() {
            out.push_str(&format!(
                "# {}/{}/{}: {} -> {} via {}\n",
                patch.workflow, patch.step, patch.field, patch.found, patch.expected, patch.capability
            ));
            out.push_str(&patch.diff);
        }
        out
    }

    fn record(&self) -> CatalogRecord<'_> {
        CatalogRecord {
            verdict: self.verdict(),
            summary: self.summary(),
            workflows: self
                .workflows
                .iter()
                .map(|w| WorkflowRecord {
                    workflow: &w.workflow,
                    verdict: w.verdict,
                    findings: w.findings.iter().map(FindingRecord::from).collect(),
                    patches: w.patches.iter().collect(),
                })
                .collect(),
        }
    }
}

/// Counts across a catalog report
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub workflows: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub patches: usize,
}

// ── Records ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct CatalogRecord<'a> {
    verdict: Verdict,
    summary: Summary,
    workflows: Vec<WorkflowRecord<'a>>,
}

#[derive(Serialize)]
struct WorkflowRecord<'a> {
    workflow: &'a str,
    verdict: Verdict,
    findings: Vec<FindingRecord<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    patches: Vec<&'a Patch>,
}

#[derive(Serialize)]
struct FindingRecord<'a> {
    error: ErrorRecord<'a>,
}

#[derive(Serialize)]
struct ErrorRecord<'a> {
    code: &'static str,
    name: &'static str,
    level: Level,
    severity: Severity,
    message: &'a str,
    location: &'a Location,
    suggestion: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    types: Option<&'a TypePayload>,
}

impl<'a> From<&'a Finding> for FindingRecord<'a> {
    fn from(finding: &'a Finding) -> Self {
        Self {
            error: ErrorRecord {
                code: finding.code.code(),
                name: finding.code.name(),
                level: finding.level,
                severity: finding.severity,
                message: &finding.message,
                location: &finding.location,
                suggestion: finding.suggestion_text(),
                types: finding.types.as_ref(),
            },
        }
    }
}
