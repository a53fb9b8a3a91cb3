//! Error types for the ScopeGraph gateway

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Faults reported by the graph store (driver or server side).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Session expired: {0}")]
    SessionExpired(String),
    #[error("Graph store unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("Query syntax error: {0}")]
    Syntax(String),
    #[error("Client error: {0}")]
    Client(String),
    #[error("Authorization error: {0}")]
    Authorization(String),
    #[error("Store reported notification: {0}")]
    Notification(String),
    #[error("Graph database connection error: {0}")]
    Connection(String),
}

impl StoreError {
    /// Only session expiry and unavailability are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::SessionExpired(_) | StoreError::ServiceUnavailable(_)
        )
    }
}

/// Outcome of the executor when a query could not produce records.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutorError {
    #[error("Query failed: {0}")]
    Fatal(#[source] StoreError),
    #[error("Graph store unavailable after {attempts} attempts: {last}")]
    Unavailable {
        attempts: u32,
        #[source]
        last: StoreError,
    },
}

/// Failure while mapping a single result column. Never surfaces to callers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("Column '{column}' holds an element without an id")]
    MissingId { column: String },
    #[error("Column '{column}' holds a malformed path: {nodes} nodes, {relationships} relationships")]
    MalformedPath {
        column: String,
        nodes: usize,
        relationships: usize,
    },
    #[error("Mapping worker for column '{column}' failed: {reason}")]
    Worker { column: String, reason: String },
}

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Failed to read style file {path}: {source}")]
    StyleFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse style configuration: {0}")]
    StyleParse(#[from] serde_yaml::Error),
    #[error("Invalid tenant id pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Top-level error of the render operation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Query rejected: {0}")]
    UnscopedQuery(String),
    #[error("Graph store error: {0}")]
    Store(#[source] StoreError),
    #[error("Graph store unavailable after {attempts} attempts: {last}")]
    Unavailable { attempts: u32, last: StoreError },
}

impl From<ExecutorError> for GatewayError {
    fn from(error: ExecutorError) -> Self {
        match error {
            ExecutorError::Fatal(source) => GatewayError::Store(source),
            ExecutorError::Unavailable { attempts, last } => {
                GatewayError::Unavailable { attempts, last }
            }
        }
    }
}

/// Category a caller can branch on without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    InputError,
    StoreError,
    Unavailable,
}

impl GatewayError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GatewayError::InvalidInput(_) | GatewayError::UnscopedQuery(_) => {
                ErrorCategory::InputError
            }
            GatewayError::Store(_) => ErrorCategory::StoreError,
            GatewayError::Unavailable { .. } => ErrorCategory::Unavailable,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            category: self.category(),
            message: self.to_string(),
        }
    }
}

/// Structured error payload returned instead of a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub category: ErrorCategory,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_retry_classes() {
        assert!(StoreError::SessionExpired("gone".into()).is_retryable());
        assert!(StoreError::ServiceUnavailable("down".into()).is_retryable());
        assert!(!StoreError::Syntax("bad".into()).is_retryable());
        assert!(!StoreError::Authorization("denied".into()).is_retryable());
        assert!(!StoreError::Notification("cartesian product".into()).is_retryable());
    }

    #[test]
    fn test_executor_error_conversion_keeps_categories_apart() {
        let fatal: GatewayError = ExecutorError::Fatal(StoreError::Syntax("bad".into())).into();
        let exhausted: GatewayError = ExecutorError::Unavailable {
            attempts: 3,
            last: StoreError::ServiceUnavailable("down".into()),
        }
        .into();

        assert_eq!(fatal.category(), ErrorCategory::StoreError);
        assert_eq!(exhausted.category(), ErrorCategory::Unavailable);
    }

    #[test]
    fn test_error_body_serialization() {
        let body = GatewayError::InvalidInput("query is required".into()).to_body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["category"], "input_error");
        assert_eq!(json["message"], "Invalid input: query is required");
    }
}
