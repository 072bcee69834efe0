//! Workflow DSL
//!
//! Parses workflow catalogs (YAML) into step graphs and the binding
//! expressions they contain.
//!
//! # Binding syntax
//!
//! ```text
//! ${search_out.files}                    reference to a prior step's output
//! ${search_out.matches[0].path}          element segments
//! ${retrieve_out.body:array<string>}     explicit type annotation
//! ${input.query}                         the workflow's own inputs
//! "Found ${a.count} files"               template (a string)
//! ```
//!
//! # Usage
//!
//! ```rust
//! use workflow_dsl::WorkflowLoader;
//!
//! let catalog = r#"
//! find_files:
//!   steps:
//!     - capability: search
//!       store_as: search_out
//!     - capability: detect
//!       store_as: detect_out
//!       input_bindings:
//!         source: ${search_out.files}
//! "#;
//!
//! let loaded = WorkflowLoader::new().load_str(catalog, "catalog").unwrap();
//! assert!(loaded[0].is_structurally_valid());
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod lexer;
pub mod loader;
pub mod parser;

pub use errors::{DslError, DslResult};
pub use loader::{LoadedWorkflow, WorkflowLoader, DEFAULT_MAX_LOOPS_CAP};
pub use parser::{parse_binding, parse_expression, parse_references, Parser};
