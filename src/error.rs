//! Error types for catalog-sync
//!
//! Errors fall into a few families:
//! - Transient transport failures (network, rate limiting) that the client retries
//! - Business errors reported by the remote service (never retried)
//! - Data-integrity errors where the catalog and the remote state disagree
//! - Local infrastructure errors (configuration, I/O, checkpoint database)

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for catalog-sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for catalog-sync
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The environment key that caused the error (e.g., "CATALOG_API_URL")
        key: Option<String>,
    },

    /// The catalog document is malformed or inconsistent
    #[error("invalid catalog: {0}")]
    Catalog(String),

    /// HTTP transport error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Connection-level failure reported by a non-HTTP transport
    #[error("connection error: {0}")]
    Connection(String),

    /// The remote service asked us to slow down (transient, retried)
    #[error("rate limited while executing {operation}")]
    RateLimited {
        /// Operation that was throttled
        operation: String,
    },

    /// Rate limiting persisted through every retry attempt
    #[error("rate limit exceeded for {operation} after {attempts} attempts")]
    RateLimitExceeded {
        /// Operation that was throttled
        operation: String,
        /// Number of attempts made
        attempts: u32,
    },

    /// GraphQL-level `errors` array on an otherwise successful response
    #[error("remote error in {operation}: {message}")]
    RemoteBusiness {
        /// Operation that failed
        operation: String,
        /// All error messages joined with "; "
        message: String,
        /// Individual error entries
        details: Vec<RemoteErrorDetail>,
    },

    /// A mutation returned a non-empty `errors` list in its payload
    #[error("{operation} rejected for {subject}: {message}")]
    Rejected {
        /// Mutation that was rejected
        operation: String,
        /// What the mutation was about (category name, SKU, ...)
        subject: String,
        /// All error messages joined with "; "
        message: String,
        /// Individual error entries
        details: Vec<RemoteErrorDetail>,
    },

    /// The response could not be interpreted (e.g. `data` missing)
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A product references a category path the taxonomy does not contain
    #[error("no category mapping for path \"{path}\" (sku {sku})")]
    MissingCategoryMapping {
        /// SKU of the product being imported
        sku: String,
        /// Joined category path that failed to resolve
        path: String,
    },

    /// A create mutation succeeded but returned no id
    #[error("{operation} returned no id for {subject}")]
    MissingId {
        /// Mutation that was executed
        operation: String,
        /// What was being created
        subject: String,
    },

    /// The configured channel does not exist remotely
    #[error("channel not found: {slug}")]
    ChannelNotFound {
        /// Channel slug that was looked up
        slug: String,
    },

    /// The run was cancelled by the operator
    #[error("operation cancelled")]
    Cancelled,

    /// Checkpoint database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Checkpoint database errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// A single error entry reported by the remote service
///
/// Used both for top-level GraphQL errors (where `code` comes from
/// `extensions.code`) and for mutation payload errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteErrorDetail {
    /// Human-readable message
    pub message: String,
    /// Machine-readable code (e.g. "NOT_FOUND"), if the service sent one
    #[serde(default)]
    pub code: Option<String>,
    /// Input field the error refers to
    #[serde(default)]
    pub field: Option<String>,
}

impl RemoteErrorDetail {
    /// Create a detail with only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            field: None,
        }
    }

    /// Create a detail with a message and code
    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
            field: None,
        }
    }
}

/// Join the messages of several error entries into one string
pub(crate) fn join_messages(details: &[RemoteErrorDetail]) -> String {
    details
        .iter()
        .map(|d| match &d.field {
            Some(field) => format!("{field}: {}", d.message),
            None => d.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Shorthand for a configuration error tied to an environment key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Error entries reported by the remote service, if any
    pub fn remote_details(&self) -> &[RemoteErrorDetail] {
        match self {
            Error::RemoteBusiness { details, .. } | Error::Rejected { details, .. } => details,
            _ => &[],
        }
    }

    /// Whether this error was caused by operator cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl From<crate::retry::Cancelled> for Error {
    fn from(_: crate::retry::Cancelled) -> Self {
        Error::Cancelled
    }
}
