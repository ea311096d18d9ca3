//! Error types for the folio-metadata crate.
//!
//! Two families live here:
//!
//! - [`ProviderError`]: what a single metadata source may fail with. These
//!   never escape the orchestrator; they become `provider.failed` events.
//! - [`MetadataError`]: failures of the aggregation pipeline itself. Some are
//!   recovered by [`FetchService`](crate::fetch::FetchService) into an absent
//!   result, the rest propagate to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error codes for programmatic handling of provider failures.
pub mod error_codes {
    /// Connectivity or HTTP status failure.
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    /// The provider's own request deadline elapsed.
    pub const TIMEOUT_ERROR: &str = "TIMEOUT_ERROR";
    /// The provider returned a response it could not decode.
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    /// Any other provider-internal failure.
    pub const PROVIDER_ERROR: &str = "PROVIDER_ERROR";
}

/// Closed classification of provider failures.
///
/// Carried on `provider.failed` events so remote callers can branch on the
/// failure class without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// See [`ProviderError::Network`].
    Network,
    /// See [`ProviderError::Timeout`].
    Timeout,
    /// See [`ProviderError::Parse`].
    Parse,
    /// See [`ProviderError::Provider`].
    Provider,
}

impl ProviderErrorKind {
    /// Returns the wire name used in events (`"network"`, `"timeout"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Parse => "parse",
            Self::Provider => "provider",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors a [`MetadataProvider`](crate::provider::MetadataProvider) may return.
///
/// Providers must wrap unexpected internal failures in
/// [`ProviderError::Provider`] so callers never observe a provider's
/// implementation-specific error types.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    /// Connectivity or HTTP failure talking to the source.
    #[error("network error: {0}")]
    Network(String),

    /// The provider's own request timeout elapsed.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The source answered with something that could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),

    /// Catch-all for any other failure inside a provider.
    #[error("provider error: {0}")]
    Provider(String),
}

impl ProviderError {
    /// Returns the closed failure classification.
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::Network(_) => ProviderErrorKind::Network,
            Self::Timeout(_) => ProviderErrorKind::Timeout,
            Self::Parse(_) => ProviderErrorKind::Parse,
            Self::Provider(_) => ProviderErrorKind::Provider,
        }
    }

    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network(_) => error_codes::NETWORK_ERROR,
            Self::Timeout(_) => error_codes::TIMEOUT_ERROR,
            Self::Parse(_) => error_codes::PARSE_ERROR,
            Self::Provider(_) => error_codes::PROVIDER_ERROR,
        }
    }

    /// Returns the inner message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Network(m) | Self::Timeout(m) | Self::Parse(m) | Self::Provider(m) => m,
        }
    }
}

/// Errors raised by the aggregation pipeline.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// The query was structurally invalid (e.g. zero results requested).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// The optional fetch deadline elapsed before aggregation finished.
    #[error("metadata fetch timed out: {0}")]
    Timeout(String),

    /// A runtime failure inside the pipeline (worker join, closed channel).
    #[error("internal error: {0}")]
    Internal(String),

    /// Invalid configuration. Never recovered.
    #[error("config error: {0}")]
    Config(String),

    /// [`Merger::merge`](crate::merge::Merger::merge) was called with no
    /// records. Signals a caller-side contract violation and is never
    /// recovered.
    #[error("cannot merge an empty set of records")]
    EmptyMerge,
}

impl MetadataError {
    /// Returns `true` for the failure classes that `FetchService::fetch`
    /// converts into an absent result.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::InvalidQuery(_) | Self::Timeout(_) | Self::Internal(_) => true,
            Self::Config(_) | Self::EmptyMerge => false,
        }
    }
}

/// Convenience type alias for folio-metadata results.
pub type Result<T> = std::result::Result<T, MetadataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_network() {
        let err = ProviderError::Network("connection refused".into());
        assert_eq!(err.to_string(), "network error: connection refused");
    }

    #[test]
    fn display_timeout() {
        let err = ProviderError::Timeout("exceeded 8s limit".into());
        assert_eq!(err.to_string(), "timeout: exceeded 8s limit");
    }

    #[test]
    fn display_parse() {
        let err = ProviderError::Parse("unexpected JSON shape".into());
        assert_eq!(err.to_string(), "parse error: unexpected JSON shape");
    }

    #[test]
    fn kind_and_code_cover_every_variant() {
        let cases = [
            (ProviderError::Network("a".into()), ProviderErrorKind::Network, "NETWORK_ERROR"),
            (ProviderError::Timeout("b".into()), ProviderErrorKind::Timeout, "TIMEOUT_ERROR"),
            (ProviderError::Parse("c".into()), ProviderErrorKind::Parse, "PARSE_ERROR"),
            (ProviderError::Provider("d".into()), ProviderErrorKind::Provider, "PROVIDER_ERROR"),
        ];
        for (err, kind, code) in cases {
            assert_eq!(err.kind(), kind);
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn message_strips_prefix() {
        let err = ProviderError::Provider("boom".into());
        assert_eq!(err.message(), "boom");
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ProviderErrorKind::Timeout).expect("serialize");
        assert_eq!(json, "\"timeout\"");
        assert_eq!(ProviderErrorKind::Network.to_string(), "network");
    }

    #[test]
    fn recoverable_classes() {
        assert!(MetadataError::InvalidQuery("x".into()).is_recoverable());
        assert!(MetadataError::Timeout("x".into()).is_recoverable());
        assert!(MetadataError::Internal("x".into()).is_recoverable());
        assert!(!MetadataError::Config("x".into()).is_recoverable());
        assert!(!MetadataError::EmptyMerge.is_recoverable());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProviderError>();
        assert_send_sync::<MetadataError>();
    }
}
