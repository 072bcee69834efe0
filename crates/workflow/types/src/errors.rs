//! Error types for the workflow graph

/// Errors raised while building or querying a workflow graph
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Step not found: {0}")]
    StepNotFound(String),

    #[error("Duplicate store_as alias: {0}")]
    DuplicateStoreAs(String),
}

/// Result type for workflow graph operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;
