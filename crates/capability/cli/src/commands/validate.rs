//! Workflow validation command

use crate::output::{self, print_info, OutputFormat};
use anyhow::{bail, Context, Result};
use capability_ontology::{CoercionRegistry, OntologyLoader};
use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::task::JoinSet;
use workflow_conformance::{CatalogReport, ConformanceChecker, ConformanceConfig};
use workflow_dsl::{LoadedWorkflow, WorkflowLoader};

/// Arguments for `capcheck validate`
#[derive(Args)]
pub struct ValidateArgs {
    /// Ontology document (YAML or JSON)
    #[arg(long)]
    pub ontology: PathBuf,

    /// Coercion registry (YAML)
    #[arg(long)]
    pub coercions: Option<PathBuf>,

    /// Workflow catalogs (YAML)
    #[arg(required = true)]
    pub catalogs: Vec<PathBuf>,

    /// Check only the named workflow
    #[arg(short, long)]
    pub workflow: Option<String>,

    /// Write synthesized patches to this file
    #[arg(long)]
    pub emit_patch: Option<PathBuf>,

    /// Report format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Checker configuration (TOML)
    #[arg(short, long, env = "CAPCHECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Report mutations without a checkpoint as errors
    #[arg(long)]
    pub strict: bool,
}

/// Execute the validate command
pub async fn execute(args: ValidateArgs, verbose: bool) -> Result<ExitCode> {
    let mut config = match &args.config {
        Some(path) => ConformanceConfig::load_path(path)
            .with_context(|| format!("Failed to load configuration {}", path.display()))?,
        None => ConformanceConfig::default(),
    };
    if args.strict {
        config = config.with_strict_checkpoints(true);
    }

    let ontology = OntologyLoader::new()
        .with_max_ref_depth(config.max_ref_depth)
        .load_path(&args.ontology)
        .with_context(|| format!("Failed to load ontology {}", args.ontology.display()))?;

    let registry = match &args.coercions {
        Some(path) => {
            let registry = CoercionRegistry::load_path(path)
                .with_context(|| format!("Failed to load coercion registry {}", path.display()))?;
            registry
                .validate_against(&ontology)
                .with_context(|| format!("Coercion registry {} is invalid", path.display()))?;
            Some(registry)
        }
        None => None,
    };

    let workflows = load_catalogs(&args, &config)?;
    tracing::debug!(workflows = workflows.len(), "Catalogs loaded");

    let report = check_parallel(
        Arc::new(ontology),
        registry.map(Arc::new),
        Arc::new(config),
        workflows,
    )
    .await?;

    match args.format {
        OutputFormat::Text => output::print_report(&report, verbose),
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Yaml => print!("{}", report.to_yaml()?),
    }

    if let Some(path) = &args.emit_patch {
        std::fs::write(path, report.patch_file())
            .with_context(|| format!("Failed to write patch file {}", path.display()))?;
        if matches!(args.format, OutputFormat::Text) {
            print_info(&format!(
                "Wrote {} patch(es) to {}",
                report.patches().count(),
                path.display()
            ));
        }
    }

    Ok(if report.has_errors() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn load_catalogs(args: &ValidateArgs, config: &ConformanceConfig) -> Result<Vec<LoadedWorkflow>> {
    let loader = WorkflowLoader::new().with_max_loops_cap(config.max_loops_cap);
    let mut workflows = Vec::new();
    for path in &args.catalogs {
        let loaded = loader
            .load_path(path)
            .with_context(|| format!("Failed to load workflow catalog {}", path.display()))?;
        workflows.extend(loaded);
    }

    if let Some(name) = &args.workflow {
        workflows.retain(|w| &w.name == name);
        if workflows.is_empty() {
            bail!("No workflow named '{}' in the given catalogs", name);
        }
    }
    Ok(workflows)
}

/// Check workflows on the blocking pool. Reports keep catalog order, so
/// same-named workflows from different catalogs stay in input order once
/// the catalog report sorts by name.
async fn check_parallel(
    ontology: Arc<capability_ontology::Ontology>,
    registry: Option<Arc<CoercionRegistry>>,
    config: Arc<ConformanceConfig>,
    workflows: Vec<LoadedWorkflow>,
) -> Result<CatalogReport> {
    let mut tasks = JoinSet::new();
    for (index, workflow) in workflows.into_iter().enumerate() {
        let ontology = Arc::clone(&ontology);
        let registry = registry.clone();
        let config = Arc::clone(&config);
        tasks.spawn_blocking(move || {
            let checker = ConformanceChecker::new(&ontology, &config);
            let report = match registry.as_deref() {
                Some(registry) => checker.with_registry(registry).check(&workflow),
                None => checker.check(&workflow),
            };
            (index, report)
        });
    }

    let mut reports = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        reports.push(joined.context("Workflow check task failed")?);
    }
    reports.sort_by_key(|(index, _)| *index);
    Ok(CatalogReport::new(
        reports.into_iter().map(|(_, report)| report).collect(),
    ))
}
