//! Diagnostic context shared by every error variant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Diagnostic context attached to a failed API call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[must_use]
pub struct ErrorDetails {
    /// Human-readable summary of the failure.
    pub message: String,
    /// HTTP status code, when the failure came from a response.
    pub status_code: Option<u16>,
    /// Server-assigned request id (`X-Request-Id`).
    pub request_id: Option<String>,
    /// Machine-readable error code from the response body.
    pub error_code: Option<String>,
    pub request_url: Option<String>,
    pub request_method: Option<String>,
    /// When the error was observed (UTC).
    pub timestamp: DateTime<Utc>,
    /// Raw response body, kept verbatim for debugging.
    pub response_body: Option<String>,
    /// Open-ended extra context (JSON:API `meta`, transport hints, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_data: BTreeMap<String, serde_json::Value>,
}

impl ErrorDetails {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: None,
            request_id: None,
            error_code: None,
            request_url: None,
            request_method: None,
            timestamp: Utc::now(),
            response_body: None,
            additional_data: BTreeMap::new(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn with_request(mut self, method: impl Into<String>, url: impl Into<String>) -> Self {
        self.request_method = Some(method.into());
        self.request_url = Some(url.into());
        self
    }

    pub fn with_response_body(mut self, body: impl Into<String>) -> Self {
        self.response_body = Some(body.into());
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.additional_data.insert(key.into(), value);
        self
    }
}
