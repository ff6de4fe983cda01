#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! # `pco-errors` - error taxonomy for the Planning Center API
//!
//! Every failure surfaced by a transport is one of the [`PcoError`] variants.
//! Each variant carries [`ErrorDetails`] with the diagnostic context of the
//! failed request (status, request id, URL, raw body, ...).
//!
//! - [`PcoError::from_response`] maps a raw HTTP error response, including its
//!   JSON:API `errors` document and rate-limit headers, to the taxonomy.
//! - [`PcoError::is_retryable`] classifies errors for an external retry layer.
//!
//! ## Example
//!
//! ```rust,ignore
//! use pco_errors::PcoError;
//!
//! let err = PcoError::from_response(status, &headers, &body)
//!     .with_request("GET", "https://api.planningcenteronline.com/people/v2/people");
//! if err.is_retryable() {
//!     // hand over to the retry layer
//! }
//! ```

pub mod details;
pub mod error;
pub mod response;

pub use details::ErrorDetails;
pub use error::{NetworkErrorKind, PcoError, TimeoutPhase};
pub use response::{ErrorDocument, ErrorObject, ErrorSource, RateLimitInfo};
