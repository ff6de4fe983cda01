use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

use crate::details::ErrorDetails;
use crate::response::RateLimitInfo;

/// Classification of network-level failures.
///
/// Provides programmatic matching without relying on error message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum NetworkErrorKind {
    /// Host name could not be resolved
    DnsFailure,
    ConnectionRefused,
    ConnectionReset,
    /// TLS handshake or certificate failure
    Ssl,
    /// Other socket-level I/O failure
    Socket,
    /// The network operation itself timed out
    Timeout,
    Unknown,
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkErrorKind::DnsFailure => write!(f, "dns failure"),
            NetworkErrorKind::ConnectionRefused => write!(f, "connection refused"),
            NetworkErrorKind::ConnectionReset => write!(f, "connection reset"),
            NetworkErrorKind::Ssl => write!(f, "ssl"),
            NetworkErrorKind::Socket => write!(f, "socket"),
            NetworkErrorKind::Timeout => write!(f, "timeout"),
            NetworkErrorKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Phase of a request in which a timeout fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutPhase {
    Request,
    Connection,
    Read,
    Write,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutPhase::Request => write!(f, "request"),
            TimeoutPhase::Connection => write!(f, "connection"),
            TimeoutPhase::Read => write!(f, "read"),
            TimeoutPhase::Write => write!(f, "write"),
        }
    }
}

/// Errors surfaced by the Planning Center API transport.
///
/// ## HTTP Mapping
///
/// - 401 → `Authentication`
/// - 403 → `Authorization`
/// - 404 → `NotFound`
/// - 400, 422 → `Validation`
/// - 429 → `RateLimit`
/// - 5xx → `Server` (`is_transient` for 500/502/503/504)
/// - anything else → `General`
///
/// `Network` and `Timeout` never come from a response; transports build them
/// with [`PcoError::network`] and [`PcoError::timeout`].
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum PcoError {
    #[error("authentication failed: {}", .details.message)]
    Authentication { details: Box<ErrorDetails> },

    #[error("access denied: {}", .details.message)]
    Authorization { details: Box<ErrorDetails> },

    #[error("not found: {}", .details.message)]
    NotFound {
        details: Box<ErrorDetails>,
        resource_type: Option<String>,
        resource_id: Option<String>,
    },

    /// Request was rejected; `errors` maps field name → messages.
    #[error("validation failed: {}", .details.message)]
    Validation {
        details: Box<ErrorDetails>,
        errors: BTreeMap<String, Vec<String>>,
    },

    #[error("rate limit exceeded: {}", .details.message)]
    RateLimit {
        details: Box<ErrorDetails>,
        rate_limit: RateLimitInfo,
    },

    #[error("server error: {}", .details.message)]
    Server {
        details: Box<ErrorDetails>,
        is_transient: bool,
    },

    #[error("network error ({kind}): {}", .details.message)]
    Network {
        details: Box<ErrorDetails>,
        kind: NetworkErrorKind,
    },

    #[error("{phase} timed out after {timeout:?}: {}", .details.message)]
    Timeout {
        details: Box<ErrorDetails>,
        timeout: Duration,
        phase: TimeoutPhase,
    },

    #[error("{}", .details.message)]
    General { details: Box<ErrorDetails> },
}

impl PcoError {
    /// Map an HTTP status to the matching variant.
    ///
    /// Validation field errors and rate-limit info start empty; use
    /// [`PcoError::from_response`] to populate them from a raw response.
    pub fn from_status(status: StatusCode, details: ErrorDetails) -> Self {
        let details = Box::new(details.with_status(status.as_u16()));
        match status.as_u16() {
            401 => PcoError::Authentication { details },
            403 => PcoError::Authorization { details },
            404 => PcoError::NotFound {
                details,
                resource_type: None,
                resource_id: None,
            },
            400 | 422 => PcoError::Validation {
                details,
                errors: BTreeMap::new(),
            },
            429 => PcoError::RateLimit {
                details,
                rate_limit: RateLimitInfo::default(),
            },
            code @ 500..=599 => PcoError::Server {
                details,
                is_transient: matches!(code, 500 | 502 | 503 | 504),
            },
            _ => PcoError::General { details },
        }
    }

    pub fn network(kind: NetworkErrorKind, message: impl Into<String>) -> Self {
        PcoError::Network {
            details: Box::new(ErrorDetails::new(message)),
            kind,
        }
    }

    pub fn timeout(phase: TimeoutPhase, timeout: Duration, message: impl Into<String>) -> Self {
        PcoError::Timeout {
            details: Box::new(ErrorDetails::new(message)),
            timeout,
            phase,
        }
    }

    pub fn general(message: impl Into<String>) -> Self {
        PcoError::General {
            details: Box::new(ErrorDetails::new(message)),
        }
    }

    /// Mark a `NotFound` error with the resource that was looked up.
    #[must_use]
    pub fn with_resource(self, resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        match self {
            PcoError::NotFound { details, .. } => PcoError::NotFound {
                details,
                resource_type: Some(resource_type.into()),
                resource_id: Some(id.into()),
            },
            other => other,
        }
    }

    /// Attach the originating request to the error details.
    #[must_use]
    pub fn with_request(mut self, method: impl Into<String>, url: impl Into<String>) -> Self {
        let details = self.details_mut();
        details.request_method = Some(method.into());
        details.request_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn details(&self) -> &ErrorDetails {
        match self {
            PcoError::Authentication { details }
            | PcoError::Authorization { details }
            | PcoError::NotFound { details, .. }
            | PcoError::Validation { details, .. }
            | PcoError::RateLimit { details, .. }
            | PcoError::Server { details, .. }
            | PcoError::Network { details, .. }
            | PcoError::Timeout { details, .. }
            | PcoError::General { details } => details,
        }
    }

    fn details_mut(&mut self) -> &mut ErrorDetails {
        match self {
            PcoError::Authentication { details }
            | PcoError::Authorization { details }
            | PcoError::NotFound { details, .. }
            | PcoError::Validation { details, .. }
            | PcoError::RateLimit { details, .. }
            | PcoError::Server { details, .. }
            | PcoError::Network { details, .. }
            | PcoError::Timeout { details, .. }
            | PcoError::General { details } => details,
        }
    }

    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.details().status_code
    }

    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.details().request_id.as_deref()
    }

    /// Whether an external retry layer may safely repeat the request.
    ///
    /// TLS failures are never retried; they do not heal on their own.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            PcoError::RateLimit { .. } | PcoError::Timeout { .. } => true,
            PcoError::Server { is_transient, .. } => *is_transient,
            PcoError::Network { kind, .. } => !matches!(kind, NetworkErrorKind::Ssl),
            _ => false,
        }
    }

    /// Suggested delay before retrying, when the server provided one.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            PcoError::RateLimit { rate_limit, .. } => rate_limit.retry_after,
            _ => None,
        }
    }
}
