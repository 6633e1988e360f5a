//! Error types for the kgmem-memory crate.

use kgmem_graph::GraphError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Entity not found: {}", .names.join(", "))]
    NotFound { names: Vec<String> },

    #[error("Constraint violated: {0}")]
    Constraint(String),

    #[error("Graph store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MemoryError {
    /// Stable machine-readable tag for responses.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound { .. } => "not_found",
            Self::Constraint(_) => "constraint",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<GraphError> for MemoryError {
    fn from(e: GraphError) -> Self {
        match e {
            e if e.is_constraint_violation() => Self::Constraint(e.to_string()),
            GraphError::Connection(_) | GraphError::Query(_) | GraphError::Unavailable(_) => {
                Self::StoreUnavailable(e.to_string())
            }
            GraphError::Rejected { .. } | GraphError::Driver(_) => Self::Internal(e.to_string()),
            GraphError::Serialization(msg) => Self::Internal(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;
