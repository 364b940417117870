//! Error types for Elasticsearch operations.

use opensearch::http::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Elasticsearch error type.
#[derive(Error, Debug)]
pub enum ElasticsearchError {
    /// A required argument was present but unusable (empty id, zero page size, ...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Index not found.
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// Index already exists.
    #[error("Index already exists: {0}")]
    IndexExists(String),

    /// Document not found.
    #[error("Document not found: {index}/{id}")]
    DocumentNotFound {
        /// Index name.
        index: String,
        /// Document ID.
        id: String,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Query error.
    #[error("Query error: {0}")]
    Query(String),

    /// Bulk operation error.
    #[error("Bulk operation failed: {succeeded} succeeded, {failed} failed")]
    BulkError {
        /// Number of successful operations.
        succeeded: usize,
        /// Number of failed operations.
        failed: usize,
        /// Error details.
        errors: Vec<String>,
    },

    /// The engine answered with a non-success status.
    #[error("Engine error ({status}): {reason}")]
    Engine {
        /// HTTP status code.
        status: u16,
        /// Reason reported by the engine.
        reason: String,
    },

    /// Client error from the transport crate.
    #[error("Client error: {0}")]
    Client(#[from] opensearch::Error),
}

impl ElasticsearchError {
    /// Build an error from an engine error body.
    ///
    /// `index_not_found_exception` and `resource_already_exists_exception`
    /// map to their dedicated variants, everything else becomes [`Engine`].
    ///
    /// [`Engine`]: ElasticsearchError::Engine
    pub(crate) fn from_response(status: StatusCode, body: &Value, index: &str) -> Self {
        let error_type = body["error"]["type"].as_str().unwrap_or("");
        let reason = body["error"]["reason"]
            .as_str()
            .or_else(|| body["error"].as_str())
            .unwrap_or("Unknown error")
            .to_string();

        match error_type {
            "index_not_found_exception" => ElasticsearchError::IndexNotFound(index.to_string()),
            "resource_already_exists_exception" => {
                ElasticsearchError::IndexExists(index.to_string())
            }
            _ => ElasticsearchError::Engine {
                status: status.as_u16(),
                reason,
            },
        }
    }

    /// Whether this error reports an index that already exists.
    pub fn is_index_exists(&self) -> bool {
        matches!(self, ElasticsearchError::IndexExists(_))
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ElasticsearchError::InvalidArgument(message.into())
    }
}

/// Result type alias for Elasticsearch operations.
pub type Result<T> = std::result::Result<T, ElasticsearchError>;
