use pco_errors::PcoError;
use thiserror::Error;

/// Unified error type for query building and execution.
///
/// - `InvalidArgument` and `Translation` are raised synchronously while
///   chaining; no builder is produced.
/// - `EmptySequence` / `MoreThanOneElement` are cardinality failures of the
///   `first`/`single` family.
/// - `Remote` carries the transport error unchanged.
#[derive(Error, Debug, Clone)]
pub enum QueryError {
    #[error("invalid argument `{param}`: {reason}")]
    InvalidArgument { param: &'static str, reason: String },

    #[error("sequence contains no elements")]
    EmptySequence,

    #[error("sequence contains more than one element")]
    MoreThanOneElement,

    #[error("cannot translate `{expression}`: {reason}")]
    Translation { expression: String, reason: String },

    /// The service ignored the `aggregate` parameter; no value was computed.
    #[error("aggregate `{aggregate}` was not applied by the service")]
    AggregateNotApplied { aggregate: String },

    #[error(transparent)]
    Remote(#[from] PcoError),
}

impl QueryError {
    #[must_use]
    pub fn invalid(param: &'static str, reason: impl Into<String>) -> Self {
        QueryError::InvalidArgument {
            param,
            reason: reason.into(),
        }
    }
}
