//! Capability Domain Types
//!
//! Capabilities are atomic, ontology-registered agent operations with
//! typed input and output schemas. They are plain data records tagged by
//! id: adding a capability means adding a row to the ontology, never a
//! new code path.
//!
//! # Key Concepts
//!
//! - **Capability**: an operation with a cognitive layer, a risk level,
//!   mutation/approval flags and resolved input/output schemas.
//! - **Edge**: a typed relation between two capabilities (`requires`,
//!   `conflicts_with`, `alternative_to`, ...).
//! - **SchemaNode**: a `$ref`-free type description used for inference.
//! - **Type expressions**: the textual form of a SchemaNode used by
//!   binding annotations and the coercion registry (`array<string>`).

#![deny(unsafe_code)]

mod capability;
mod edge;
mod errors;
mod schema;
mod type_expr;

pub use capability::*;
pub use edge::*;
pub use errors::*;
pub use schema::*;
pub use type_expr::parse_type;
