//! Finding code lookup

use anyhow::{bail, Result};
use colored::*;
use std::process::ExitCode;
use workflow_types::{ErrorCode, NO_REMEDIATION};

/// Execute the explain command
pub fn execute(code: &str) -> Result<ExitCode> {
    let Some(code) = ErrorCode::from_code(code) else {
        bail!("Unknown finding code '{}'", code);
    };
    let level = code.level();
    println!("{} {}", code.code().bold(), code.name());
    println!("  level:    {} ({})", level.as_str(), level.title());
    println!("  severity: {}", code.default_severity());
    println!("  {}", code.description());
    if code == ErrorCode::TypeMismatch {
        println!(
            "  {}",
            "A registered coercion yields a patch; otherwise the suggestion reads".dimmed()
        );
        println!("  {}", format!("\"{}\"", NO_REMEDIATION).dimmed());
    }
    Ok(ExitCode::SUCCESS)
}
