//! Error types for the report service

use thiserror::Error;

/// Main error type for the service
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Store gateway error
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Report generation error
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

/// Errors raised by a time-series gateway
///
/// Messages never carry store credentials; connection errors go through
/// [`crate::redis::util::safe_redis_error`] before they land here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Connection or transport failure to the backing store
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store rejected or could not answer a query for one key
    #[error("Query failed for '{key}': {reason}")]
    QueryFailed {
        /// Series key the query targeted
        key: String,
        /// Why the store rejected it
        reason: String,
    },
}

impl GatewayError {
    /// Create a query failure for a key
    pub fn query_failed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::QueryFailed {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable kind, used in rendered error markers
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::StoreUnavailable(_) => "StoreUnavailable",
            GatewayError::QueryFailed { .. } => "QueryFailed",
        }
    }

    /// Attach a key to an error raised before the key was known
    pub(crate) fn for_key(self, key: &str) -> Self {
        match self {
            GatewayError::QueryFailed { key: k, reason } if k.is_empty() => {
                GatewayError::QueryFailed {
                    key: key.to_string(),
                    reason,
                }
            },
            other => other,
        }
    }
}

/// Document rendering errors
#[derive(Error, Debug)]
pub enum RenderError {
    /// Backend could not encode the document
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Formatting into the output buffer failed
    #[error("Formatting failed: {0}")]
    Format(#[from] std::fmt::Error),
}

/// Errors from `generate_report`
#[derive(Error, Debug)]
pub enum ReportError {
    /// Key discovery failed, so no report could be produced
    #[error("ReportGenerationFailed: {0}")]
    GenerationFailed(#[source] GatewayError),

    /// The document backend failed
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// The caller cancelled the operation before it completed
    #[error("Report generation cancelled")]
    Cancelled,
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_kind() {
        assert_eq!(
            GatewayError::StoreUnavailable("down".into()).kind(),
            "StoreUnavailable"
        );
        assert_eq!(
            GatewayError::query_failed("ts:a", "WRONGTYPE").kind(),
            "QueryFailed"
        );
    }

    #[test]
    fn test_for_key_fills_missing_key() {
        let err = GatewayError::query_failed("", "bad reply").for_key("ts:x");
        assert_eq!(err, GatewayError::query_failed("ts:x", "bad reply"));

        // An existing key is preserved
        let err = GatewayError::query_failed("ts:a", "bad").for_key("ts:x");
        assert_eq!(err, GatewayError::query_failed("ts:a", "bad"));

        // Unavailability is untouched
        let err = GatewayError::StoreUnavailable("down".into()).for_key("ts:x");
        assert_eq!(err, GatewayError::StoreUnavailable("down".into()));
    }

    #[test]
    fn test_report_error_display() {
        let err = ReportError::GenerationFailed(GatewayError::StoreUnavailable(
            "Redis connection failed to localhost:6379: IO error".into(),
        ));
        let display = err.to_string();
        assert!(display.contains("ReportGenerationFailed"));

        use std::error::Error as _;
        assert!(err.source().is_some());
    }
}
