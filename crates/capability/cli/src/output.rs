//! Output formatting utilities

use colored::*;
use workflow_conformance::{CatalogReport, Verdict, WorkflowReport};
use workflow_types::{Finding, Severity};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Print a catalog report as text
pub fn print_report(report: &CatalogReport, verbose: bool) {
    for workflow in &report.workflows {
        print_workflow(workflow, verbose);
    }

    let summary = report.summary();
    let line = format!(
        "{} workflow(s): {} passed, {} failed; {} error(s), {} warning(s), {} patch(es)",
        summary.workflows,
        summary.passed,
        summary.failed,
        summary.errors,
        summary.warnings,
        summary.patches
    );
    if report.has_errors() {
        print_error(&line);
    } else {
        print_success(&line);
    }
}

fn print_workflow(workflow: &WorkflowReport, verbose: bool) {
    let verdict = match workflow.verdict {
        Verdict::Pass => "pass".green(),
        Verdict::PassWithWarnings => "pass_with_warnings".yellow(),
        Verdict::Fail => "fail".red(),
    };
    println!("{} {}", workflow.workflow.bold(), verdict);

    for finding in &workflow.findings {
        print_finding(finding, verbose);
    }

    if verbose {
        for patch in &workflow.patches {
            println!("  {}", format!("patch for {}/{}", patch.step, patch.field).cyan());
            for line in patch.diff.lines() {
                let line = if line.starts_with('+') && !line.starts_with("+++") {
                    line.green()
                } else if line.starts_with('-') && !line.starts_with("---") {
                    line.red()
                } else {
                    line.normal()
                };
                println!("    {}", line);
            }
        }
    }
}

fn print_finding(finding: &Finding, verbose: bool) {
    let severity = match finding.severity {
        Severity::Error => "error".red(),
        Severity::Warning => "warning".yellow(),
    };
    println!(
        "  {} {} {} at {}",
        severity,
        finding.code.code().bold(),
        finding.code.name(),
        finding.location
    );
    println!("    {}", finding.message);
    if let Some(types) = &finding.types {
        if verbose {
            println!("    found: {}  expected: {}", types.found, types.expected);
        }
    }
    println!("    {} {}", "suggestion:".dimmed(), finding.suggestion_text());
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}
