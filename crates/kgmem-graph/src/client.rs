//! Neo4j connection management and shared graph client.

use kgmem_core::config::Neo4jSettings;
use neo4rs::{ConfigBuilder, Graph};

/// Status code Neo4j reports when a write breaks a schema constraint.
pub const CONSTRAINT_VALIDATION_FAILED: &str = "Neo.ClientError.Schema.ConstraintValidationFailed";

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Neo4j connection error: {0}")]
    Connection(String),

    /// The driver lost the server, or the server asked for a retry.
    #[error("Neo4j query error: {0}")]
    Query(neo4rs::Error),

    /// The server refused the statement with a client or database error.
    #[error("Neo4j rejected the query ({code}): {message}")]
    Rejected { code: String, message: String },

    /// A driver failure that is neither transport nor a server verdict.
    #[error("Neo4j driver error: {0}")]
    Driver(String),

    #[error("Graph store unavailable: {0}")]
    Unavailable(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GraphError {
    /// Whether Neo4j refused a write because of a schema constraint.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::Rejected { code, .. } if code == CONSTRAINT_VALIDATION_FAILED)
    }
}

impl From<neo4rs::Error> for GraphError {
    fn from(e: neo4rs::Error) -> Self {
        if matches!(
            e,
            neo4rs::Error::IOError { .. } | neo4rs::Error::ConnectionError
        ) {
            return Self::Query(e);
        }
        let message = e.to_string();
        match status_code(&message) {
            Some(code) if code.starts_with("Neo.TransientError.") => Self::Query(e),
            Some(code) => Self::Rejected {
                code: code.to_string(),
                message,
            },
            None => Self::Driver(message),
        }
    }
}

/// The first Neo4j status code (`Neo.<Class>.<Category>.<Title>`) in a
/// driver error message.
fn status_code(message: &str) -> Option<&str> {
    let start = message.find("Neo.")?;
    let rest = &message[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '.'))
        .unwrap_or(rest.len());
    let code = rest[..end].trim_end_matches('.');
    (code.split('.').count() == 4).then_some(code)
}

/// Configuration for connecting to Neo4j.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Neo4jSettings::default().into()
    }
}

impl From<Neo4jSettings> for GraphConfig {
    fn from(s: Neo4jSettings) -> Self {
        Self {
            uri: s.uri,
            user: s.user,
            password: s.password,
            max_connections: s.max_connections,
            fetch_size: s.fetch_size,
        }
    }
}

/// Thread-safe Neo4j graph client with connection pooling.
///
/// One client is created at startup and shared for the process lifetime.
/// Clone is cheap (inner Arc).
#[derive(Clone)]
pub struct GraphClient {
    graph: Graph,
}

impl GraphClient {
    /// Connect to Neo4j with the given configuration.
    pub async fn connect(config: &GraphConfig) -> Result<Self, GraphError> {
        let neo_config = ConfigBuilder::default()
            .uri(&config.uri)
            .user(&config.user)
            .password(&config.password)
            .max_connections(config.max_connections as usize)
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        let graph = Graph::connect(neo_config)
            .await
            .map_err(|e| GraphError::Connection(e.to_string()))?;

        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(Self { graph })
    }

    /// Install the uniqueness constraint that makes `name` the entity key.
    pub async fn ensure_schema(&self) -> Result<(), GraphError> {
        self.graph
            .run(neo4rs::query(crate::cypher::SCHEMA_CONSTRAINT))
            .await?;
        tracing::debug!("Memory.name uniqueness constraint in place");
        Ok(())
    }

    /// Begin a transaction.
    pub async fn start_txn(&self) -> Result<neo4rs::Txn, GraphError> {
        Ok(self.graph.start_txn().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_is_extracted_from_driver_text() {
        let text = "Failure { code: \"Neo.ClientError.Schema.ConstraintValidationFailed\", \
                    message: \"Node(12) already exists\" }";
        assert_eq!(status_code(text), Some(CONSTRAINT_VALIDATION_FAILED));
        assert_eq!(
            status_code("Neo.TransientError.Transaction.DeadlockDetected."),
            Some("Neo.TransientError.Transaction.DeadlockDetected")
        );
        assert_eq!(status_code("connection reset by peer"), None);
        assert_eq!(status_code("see Neo.docs"), None);
    }

    #[test]
    fn test_transport_errors_stay_query_errors() {
        let err: GraphError = neo4rs::Error::ConnectionError.into();
        assert!(matches!(err, GraphError::Query(_)));

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: GraphError = neo4rs::Error::IOError { detail: io }.into();
        assert!(matches!(err, GraphError::Query(_)));
        assert!(!err.is_constraint_violation());
    }

    #[test]
    fn test_constraint_rejection_is_recognized() {
        let err = GraphError::Rejected {
            code: CONSTRAINT_VALIDATION_FAILED.to_string(),
            message: "already exists".to_string(),
        };
        assert!(err.is_constraint_violation());

        let err = GraphError::Rejected {
            code: "Neo.ClientError.Statement.SyntaxError".to_string(),
            message: "bad".to_string(),
        };
        assert!(!err.is_constraint_violation());
    }
}
