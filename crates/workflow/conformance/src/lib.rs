//! Workflow Conformance
//!
//! Static checking of capability workflows against an ontology, in four
//! ordered levels:
//!
//! | Level | Codes | Checks |
//! |-------|-------|--------|
//! | L1 structural | `V1xx` | document shape, capability ids, ontology version |
//! | L2 edge-constraint | `S301`-`S305` | edge contracts: requires, conflicts, ordering, checkpoints |
//! | L3 contract/type | `B2xx`, `S306` | reference resolution, binding types, input schema refs |
//! | L4 semantic | `R4xx` | send safeguards, approvals, declared risk |
//!
//! The `S3xx` codes are contract findings. `S301`-`S305` are the edge
//! contracts between capabilities and run at L2. `S306` is a workflow
//! input schema whose `$ref` does not resolve; it runs with the type
//! checks at L3.
//!
//! Type mismatches with a registered coercion come back with a patch that
//! inserts the coercion step.
//!
//! # Usage
//!
//! ```rust,ignore
//! use capability_ontology::{CoercionRegistry, OntologyLoader};
//! use workflow_conformance::{ConformanceChecker, ConformanceConfig};
//! use workflow_dsl::WorkflowLoader;
//!
//! let ontology = OntologyLoader::new().load_path("ontology.yaml")?;
//! let registry = CoercionRegistry::load_path("coercions.yaml")?;
//! let config = ConformanceConfig::default();
//! let workflows = WorkflowLoader::new().load_path("workflows.yaml")?;
//!
//! let report = ConformanceChecker::new(&ontology, &config)
//!     .with_registry(&registry)
//!     .check_all(&workflows);
//! println!("{}", report.to_json()?);
//! ```

#![deny(unsafe_code)]

mod binding;
mod checker;
mod config;
mod diff;
mod errors;
mod patch;
mod report;

pub use binding::BindingResolver;
pub use checker::ConformanceChecker;
pub use config::{ConformanceConfig, VersionPolicy};
pub use diff::unified_diff;
pub use errors::{ConfigError, ConformanceError, ConformanceResult};
pub use patch::{Patch, PatchOperation, PatchSynthesizer};
pub use report::{CatalogReport, Summary, Verdict, WorkflowReport};
