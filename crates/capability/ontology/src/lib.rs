//! Capability Ontology Store
//!
//! Loads the capability ontology (capabilities plus typed edges), resolves
//! every capability's input and output schema through the schema
//! resolver, and validates the edge graph. It also hosts the coercion
//! registry consulted when a type mismatch can be repaired automatically.
//!
//! # Usage
//!
//! ```rust
//! use capability_ontology::OntologyLoader;
//!
//! let ontology = OntologyLoader::new()
//!     .load_str(r#"
//! version: "1.0.0"
//! nodes:
//!   - id: search
//!     layer: perceive
//!     output_schema:
//!       type: object
//!       properties:
//!         files: {type: array, items: {type: string}}
//! edges: []
//! "#)
//!     .unwrap();
//!
//! assert!(ontology.contains("search"));
//! ```
//!
//! A malformed ontology (unresolvable `$ref`, asymmetric `alternative_to`,
//! `requires` cycle) is rejected at load time with an `OntologyError`.

#![deny(unsafe_code)]

mod document;
mod errors;
mod registry;
mod resolver;
mod store;

pub use document::*;
pub use errors::*;
pub use registry::*;
pub use resolver::*;
pub use store::*;
