//! Ontology summary command

use crate::output::{print_success, OutputFormat};
use anyhow::{Context, Result};
use capability_ontology::{Ontology, OntologyLoader};
use capability_types::{EdgeKind, Layer};
use clap::Args;
use colored::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

/// Arguments for `capcheck ontology`
#[derive(Args)]
pub struct OntologyArgs {
    /// Ontology document (YAML or JSON)
    #[arg(long)]
    pub ontology: PathBuf,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Ontology overview
#[derive(Debug, Serialize)]
struct OntologySummary {
    version: String,
    capabilities: usize,
    layers: BTreeMap<Layer, usize>,
    edges: BTreeMap<EdgeKind, usize>,
}

impl From<&Ontology> for OntologySummary {
    fn from(ontology: &Ontology) -> Self {
        Self {
            version: ontology.version().to_string(),
            capabilities: ontology.len(),
            layers: ontology.layer_counts(),
            edges: ontology.edge_counts(),
        }
    }
}

/// Execute the ontology command
pub fn execute(args: OntologyArgs) -> Result<ExitCode> {
    let ontology = OntologyLoader::new()
        .load_path(&args.ontology)
        .with_context(|| format!("Failed to load ontology {}", args.ontology.display()))?;
    let summary = OntologySummary::from(&ontology);

    match args.format {
        OutputFormat::Text => {
            print_success(&format!(
                "Ontology {} is valid: {} capabilities",
                summary.version, summary.capabilities
            ));
            println!("{}", "Layers".bold());
            for layer in Layer::ALL {
                let count = summary.layers.get(&layer).copied().unwrap_or(0);
                println!("  {:<12} {}", layer.as_str(), count);
            }
            println!("{}", "Edges".bold());
            for kind in EdgeKind::ALL {
                let count = summary.edges.get(&kind).copied().unwrap_or(0);
                println!("  {:<15} {}", kind.as_str(), count);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&summary)?),
    }
    Ok(ExitCode::SUCCESS)
}
