//! capcheck subcommands

pub mod explain;
pub mod ontology;
pub mod validate;
