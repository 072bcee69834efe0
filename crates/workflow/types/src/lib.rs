//! Workflow Domain Types
//!
//! Workflows compose ontology capabilities into ordered steps whose
//! inputs are wired to earlier steps' outputs through typed bindings.
//!
//! # Key Concepts
//!
//! - **WorkflowDocument**: the workflow as authored in YAML, kept
//!   verbatim so patches can be rendered against it.
//! - **Workflow / Step**: the step graph the conformance engine checks.
//! - **Binding**: a `${producer.path[:type]}` reference, a template
//!   embedding references, or a literal.
//! - **Finding**: a conformance result with a stable code, level,
//!   location and suggestion.
//!
//! # Design Principles
//!
//! 1. Workflows are checked, never executed.
//! 2. The graph is immutable once checking begins.
//! 3. Every finding is actionable or says that no remediation exists.

#![deny(unsafe_code)]

mod binding;
mod document;
mod errors;
mod finding;
mod workflow;

pub use binding::*;
pub use document::*;
pub use errors::*;
pub use finding::*;
pub use workflow::*;
