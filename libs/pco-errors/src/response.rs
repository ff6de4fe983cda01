//! Mapping from raw HTTP error responses to [`PcoError`] (pure data).
//!
//! Planning Center answers failures with a JSON:API error document:
//!
//! ```json
//! {"errors":[{"status":"422","code":"invalid","title":"Unprocessable",
//!   "detail":"First name can't be blank",
//!   "source":{"pointer":"/data/attributes/first_name"}}]}
//! ```
//!
//! Rate-limit state travels in headers (`Retry-After`,
//! `X-PCO-API-Request-Rate-Limit`, `X-PCO-API-Request-Rate-Count`).

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};

use crate::details::ErrorDetails;
use crate::error::PcoError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const RATE_LIMIT_HEADER: &str = "x-pco-api-request-rate-limit";
pub const RATE_COUNT_HEADER: &str = "x-pco-api-request-rate-count";

/// JSON:API error document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorDocument {
    #[serde(default)]
    pub errors: Vec<ErrorObject>,
}

/// A single JSON:API error object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorObject {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub source: Option<ErrorSource>,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

/// Location of the offending input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorSource {
    /// JSON pointer into the request document, e.g. `/data/attributes/email`
    #[serde(default)]
    pub pointer: Option<String>,
    /// Query parameter name
    #[serde(default)]
    pub parameter: Option<String>,
}

impl ErrorObject {
    /// Best human-readable message: `detail`, then `title`.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.detail.as_deref().or(self.title.as_deref())
    }

    /// Field the error refers to: last pointer segment or the parameter name.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        let source = self.source.as_ref()?;
        if let Some(pointer) = source.pointer.as_deref() {
            return pointer.rsplit('/').next().filter(|s| !s.is_empty());
        }
        source.parameter.as_deref()
    }
}

/// Rate-limit state reported with a 429 response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub retry_after: Option<Duration>,
    /// Requests allowed per period.
    pub limit: Option<u32>,
    /// Requests left in the current period.
    pub remaining: Option<u32>,
    /// When the current period resets.
    pub reset_at: Option<DateTime<Utc>>,
}

impl RateLimitInfo {
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let retry_after = header_str(headers, http::header::RETRY_AFTER.as_str())
            .and_then(parse_retry_after);
        let limit = header_str(headers, RATE_LIMIT_HEADER).and_then(|v| v.parse::<u32>().ok());
        let count = header_str(headers, RATE_COUNT_HEADER).and_then(|v| v.parse::<u32>().ok());
        let remaining = match (limit, count) {
            (Some(limit), Some(count)) => Some(limit.saturating_sub(count)),
            _ => None,
        };
        let reset_at = retry_after
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);
        Self {
            retry_after,
            limit,
            remaining,
            reset_at,
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

/// `Retry-After` is either delta-seconds or an HTTP date.
fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = httpdate::parse_http_date(value).ok()?;
    Some(at.duration_since(SystemTime::now()).unwrap_or(Duration::ZERO))
}

impl PcoError {
    /// Build an error from a non-2xx response.
    ///
    /// The body is kept verbatim in the details; when it is a JSON:API error
    /// document the first error supplies message and code, and every error
    /// with a source contributes to the validation field map.
    pub fn from_response(status: StatusCode, headers: &HeaderMap, body: &str) -> Self {
        let document = serde_json::from_str::<ErrorDocument>(body).ok();
        let first = document.as_ref().and_then(|d| d.errors.first());

        let message = first
            .and_then(ErrorObject::message)
            .map(str::to_owned)
            .or_else(|| status.canonical_reason().map(str::to_owned))
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

        let mut details = ErrorDetails::new(message);
        if !body.is_empty() {
            details = details.with_response_body(body);
        }
        if let Some(id) = header_str(headers, REQUEST_ID_HEADER) {
            details = details.with_request_id(id);
        }
        if let Some(code) = first.and_then(|e| e.code.as_deref()) {
            details = details.with_error_code(code);
        }
        if let Some(meta) = first.and_then(|e| e.meta.clone()) {
            details = details.with_data("meta", meta);
        }

        tracing::debug!(
            status = status.as_u16(),
            request_id = ?details.request_id,
            "mapping error response"
        );

        match PcoError::from_status(status, details) {
            PcoError::Validation { details, .. } => PcoError::Validation {
                details,
                errors: document.map(|d| field_errors(&d)).unwrap_or_default(),
            },
            PcoError::RateLimit { details, .. } => PcoError::RateLimit {
                details,
                rate_limit: RateLimitInfo::from_headers(headers),
            },
            other => other,
        }
    }
}

fn field_errors(document: &ErrorDocument) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for error in &document.errors {
        let (Some(field), Some(message)) = (error.field(), error.message()) else {
            continue;
        };
        out.entry(field.to_owned())
            .or_default()
            .push(message.to_owned());
    }
    out
}
