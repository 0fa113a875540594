/// Errors that can occur when fetching data from an upstream tracker.
///
/// # Examples
///
/// ```rust
/// use devpulse_ingest::error::IngestError;
///
/// let err = IngestError::NotFound("acme/missing".to_string());
/// assert!(err.to_string().contains("acme/missing"));
/// assert!(!err.is_recoverable());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The tracker API reported a failure (HTTP error, malformed payload).
    #[error("{tracker} API error: {message}")]
    Upstream { tracker: String, message: String },

    /// Request was throttled by the tracker. Callers may retry after backoff.
    #[error("{tracker} API rate limited, retry after backoff")]
    RateLimited { tracker: String },

    /// The upstream call did not answer within the adapter's deadline.
    #[error("{tracker} API timed out after {seconds}s")]
    Timeout { tracker: String, seconds: u64 },

    /// Credentials were rejected by the tracker.
    #[error("{tracker} authentication failed")]
    AuthFailed { tracker: String },

    /// The requested entity does not exist upstream.
    #[error("entity not found upstream: {0}")]
    NotFound(String),

    /// The requested ingestion source type is not registered.
    #[error("unsupported ingestion source: {0}")]
    UnsupportedSource(String),

    /// Adapter configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl IngestError {
    /// Whether a later refresh cycle is worth retrying.
    ///
    /// Transient upstream conditions (errors, throttling, timeouts, rejected
    /// credentials that may be rotated) are; a missing entity or a broken
    /// configuration will not heal on their own.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            IngestError::Upstream { .. }
                | IngestError::RateLimited { .. }
                | IngestError::Timeout { .. }
                | IngestError::AuthFailed { .. }
        )
    }
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, IngestError>;
