//! Error types for starwatch.
//!
//! Each concern gets its own enum so callers can tell a broken configuration
//! apart from a flaky upstream or a full disk. [`Retryable`] is the shared
//! classification consumed by [`crate::retry::retry_with_backoff`].

use std::fmt;
use std::path::PathBuf;

/// Result type alias defaulting to [`ConfigError`].
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

/// Errors that can occur while loading, validating or reloading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to load configuration from a source.
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    /// Failed to deserialize configuration.
    #[error("Failed to deserialize configuration: {0}")]
    DeserializationError(String),

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// File watching failed to initialize.
    #[error("File watching error: {0}")]
    WatchError(String),

    /// Attempted to use a feature that is not enabled.
    #[error("Feature not enabled: {0}")]
    FeatureNotEnabled(&'static str),

    /// A reload callback rejected the new configuration.
    #[error("Reload callback #{index} failed: {reason}")]
    CallbackFailed {
        /// Position of the callback in registration order
        index: usize,
        /// Error reported by the callback
        reason: String,
    },

    /// The watcher was started twice.
    #[error("Configuration watcher is already running")]
    AlreadyRunning,

    /// IO error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Validation error for configuration validation.
#[derive(Debug)]
pub enum ValidationError {
    /// Custom validation error with a message.
    Custom(String),

    /// A specific field has an invalid value.
    InvalidField {
        /// The field name/path
        field: String,
        /// The reason why it's invalid
        reason: String,
    },

    /// Multiple validation errors occurred.
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    /// Create a custom validation error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Create an invalid field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Collapse a list of errors: `None` when empty, the error itself when
    /// there is exactly one, `Multiple` otherwise.
    pub fn from_list(mut errors: Vec<ValidationError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(msg) => write!(f, "{msg}"),
            Self::InvalidField { field, reason } => {
                write!(f, "Field '{field}' is invalid: {reason}")
            }
            Self::Multiple(errors) => {
                writeln!(f, "Multiple validation errors:")?;
                for (i, err) in errors.iter().enumerate() {
                    writeln!(f, "  {}. {}", i + 1, err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for ConfigError {
    fn from(err: ValidationError) -> Self {
        ConfigError::ValidationError(err.to_string())
    }
}

/// Coarse classification of a [`RemoteError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// The upstream refused the call because the quota is spent.
    RateLimited,
    /// The call was abandoned because shutdown was requested.
    Cancelled,
    /// Anything else: network, unexpected status, undecodable body.
    Other,
}

/// Failure talking to the upstream repository API.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    /// The upstream answered 403/429.
    #[error("rate limited by {endpoint} (status {status})")]
    RateLimited {
        /// Endpoint that refused the call
        endpoint: String,
        /// HTTP status returned
        status: u16,
    },

    /// Any other request failure.
    #[error("request to {endpoint} failed: {message}")]
    Request {
        /// Endpoint that failed
        endpoint: String,
        /// HTTP status, when a response was received
        status: Option<u16>,
        /// Human readable cause
        message: String,
    },

    /// The caller cancelled the operation.
    #[error("remote call cancelled")]
    Cancelled,
}

impl RemoteError {
    /// Build a [`RemoteError::Request`] without a status code.
    pub fn request(endpoint: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Request {
            endpoint: endpoint.into(),
            status: None,
            message: message.to_string(),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> RemoteErrorKind {
        match self {
            Self::RateLimited { .. } => RemoteErrorKind::RateLimited,
            Self::Cancelled => RemoteErrorKind::Cancelled,
            Self::Request { .. } => RemoteErrorKind::Other,
        }
    }
}

/// Failure reading or writing persisted entity snapshots.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The snapshot file exists but could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// File that failed
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The snapshot file exists but does not parse.
    #[error("corrupt snapshot at {}: {source}", .path.display())]
    Corrupt {
        /// File that failed
        path: PathBuf,
        /// Underlying decode error
        #[source]
        source: serde_json::Error,
    },

    /// Writing the temporary file (or creating the directory) failed.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        /// File that failed
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// The snapshot could not be serialized.
    #[error("failed to encode snapshot for {entity}: {source}")]
    Encode {
        /// Entity being saved
        entity: String,
        /// Underlying encode error
        #[source]
        source: serde_json::Error,
    },

    /// Moving the temporary file into place failed.
    #[error("failed to move {} into place: {source}", .path.display())]
    Rename {
        /// Destination file
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

/// Failure reported by a notification transport. Not further classified.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The request never produced a response.
    #[error("request failed: {0}")]
    Request(String),

    /// The endpoint answered with a non-success status.
    #[error("endpoint returned status {status}: {body}")]
    Status {
        /// HTTP status
        status: u16,
        /// Leading part of the response body
        body: String,
    },
}

/// Failure delivering to, or probing, a notification provider.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NotifyError {
    /// The transport rejected the message.
    #[error("provider {provider}: {source}")]
    Delivery {
        /// Provider name
        provider: String,
        /// Transport failure
        #[source]
        source: TransportError,
    },

    /// The caller cancelled the delivery, possibly while it waited for the
    /// rate limiter.
    #[error("delivery cancelled")]
    Cancelled,
}

/// Failure of a single entity check. Never aborts the whole cycle.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// Fetching the member list failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Loading, diffing or saving the snapshot failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Shutdown interrupted the check before its snapshot was saved.
    #[error("check cancelled")]
    Cancelled,
}

impl CheckError {
    /// Label used for the check error counter.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Remote(e) if e.kind() == RemoteErrorKind::RateLimited => "rate_limited",
            Self::Remote(_) => "remote_error",
            Self::Storage(_) => "storage_error",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Orchestration-level failures. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The operational HTTP surface could not bind.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested
        addr: String,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// A provider failed its startup probe.
    #[error("startup probe failed for provider {provider}: {source}")]
    ProbeFailed {
        /// Provider name
        provider: String,
        /// Probe failure
        #[source]
        source: NotifyError,
    },

    /// Installing or reloading the log subscriber failed.
    #[error("logging setup failed: {0}")]
    Logging(String),

    /// Configuration could not be loaded or watched.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The state store could not be initialized.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The member source or the providers could not be built.
    #[error("failed to build components: {0}")]
    Components(String),
}

/// Classification consumed by the retry helper.
pub trait Retryable: fmt::Display {
    /// Errors that must never be retried because waiting out the window would
    /// starve the caller.
    fn is_rate_limited(&self) -> bool {
        false
    }

    /// The error to return when cancellation wins.
    fn cancelled() -> Self;
}

impl Retryable for RemoteError {
    fn is_rate_limited(&self) -> bool {
        self.kind() == RemoteErrorKind::RateLimited
    }

    fn cancelled() -> Self {
        RemoteError::Cancelled
    }
}

impl Retryable for NotifyError {
    fn cancelled() -> Self {
        NotifyError::Cancelled
    }
}
