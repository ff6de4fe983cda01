//! Predicate and composite-filter translation to `where[...]` entries.
//!
//! Every function here is pure. Keys returned are the filter-map keys
//! (`status`, `created_at[gte]`, `emails_count`); values are already encoded.

use std::fmt::Display;

use crate::ast::{CompareOp, Predicate, Value};
use crate::error::QueryError;

pub const NULL: &str = "null";
pub const NOT_NULL: &str = "!null";

/// Relationship-count comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountFilter {
    Exactly(u32),
    GreaterThan(u32),
    LessThan(u32),
    Between(u32, u32),
}

impl CountFilter {
    /// Encoded filter value.
    ///
    /// # Errors
    /// `InvalidArgument` when a `Between` range is inverted.
    pub fn encode(self) -> Result<String, QueryError> {
        match self {
            CountFilter::Exactly(n) => Ok(n.to_string()),
            CountFilter::GreaterThan(n) => Ok(format!(">{n}")),
            CountFilter::LessThan(n) => Ok(format!("<{n}")),
            CountFilter::Between(min, max) => {
                if min > max {
                    return Err(QueryError::invalid(
                        "count",
                        format!("minimum {min} is greater than maximum {max}"),
                    ));
                }
                Ok(format!("{min}..{max}"))
            }
        }
    }
}

/// Trim and lower-case a field name, rejecting empty ones.
///
/// # Errors
/// `InvalidArgument` naming `param` when the name is blank.
pub fn normalize_field(param: &'static str, raw: &str) -> Result<String, QueryError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(QueryError::invalid(param, "must not be empty"));
    }
    Ok(trimmed.to_lowercase())
}

/// Like [`normalize_field`] but keeps the caller's casing (relationship
/// names and include paths are case-sensitive on the wire).
///
/// # Errors
/// `InvalidArgument` naming `param` when the name is blank.
pub fn require_name(param: &'static str, raw: &str) -> Result<String, QueryError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(QueryError::invalid(param, "must not be empty"));
    }
    Ok(trimmed.to_owned())
}

/// Reject string literals the filter syntax would read as an operator.
///
/// # Errors
/// `InvalidArgument` for a string starting with `!` (negation) or equal to
/// `null`; use a not-equal or null filter instead.
pub fn check_literal(value: &Value) -> Result<(), QueryError> {
    match value {
        Value::String(s) if s.starts_with('!') => Err(QueryError::invalid(
            "value",
            format!("`{s}` would be read as a negation"),
        )),
        Value::String(s) if s == NULL => Err(QueryError::invalid(
            "value",
            "the string `null` would be read as a null check",
        )),
        _ => Ok(()),
    }
}

fn translation_error(predicate: &Predicate, reason: &str) -> QueryError {
    QueryError::Translation {
        expression: predicate.to_string(),
        reason: reason.to_owned(),
    }
}

fn op_suffix(op: CompareOp) -> Option<&'static str> {
    match op {
        CompareOp::Eq | CompareOp::Ne => None,
        CompareOp::Gt => Some("gt"),
        CompareOp::Ge => Some("gte"),
        CompareOp::Lt => Some("lt"),
        CompareOp::Le => Some("lte"),
    }
}

/// Flatten a predicate into filter entries.
///
/// Conjunctions are flattened; the last entry for a key wins when merged.
///
/// # Errors
/// - `Translation` for `Or`, `Not`, an empty field name, or an ordering
///   comparison against null
/// - `InvalidArgument` for an empty or null-bearing IN list, or an
///   equality literal rejected by [`check_literal`]
pub fn translate(predicate: &Predicate) -> Result<Vec<(String, String)>, QueryError> {
    let mut out = Vec::new();
    translate_into(predicate, &mut out)?;
    Ok(out)
}

fn translate_into(
    predicate: &Predicate,
    out: &mut Vec<(String, String)>,
) -> Result<(), QueryError> {
    match predicate {
        Predicate::Compare { field, op, value } => {
            let field = normalize_field("field", field)
                .map_err(|_| translation_error(predicate, "field name is empty"))?;
            if value.is_null() && op.is_ordering() {
                return Err(translation_error(
                    predicate,
                    "ordering comparison against null is not supported",
                ));
            }
            if matches!(op, CompareOp::Eq | CompareOp::Ne) {
                check_literal(value)?;
            }
            let entry = match op_suffix(*op) {
                Some(suffix) => (format!("{field}[{suffix}]"), value.to_string()),
                None if *op == CompareOp::Ne => (field, format!("!{value}")),
                None => (field, value.to_string()),
            };
            out.push(entry);
        }
        Predicate::In {
            field,
            values,
            negated,
        } => {
            let field = normalize_field("field", field)
                .map_err(|_| translation_error(predicate, "field name is empty"))?;
            let encoded = if *negated {
                encode_not_in(values)?
            } else {
                encode_in(values)?
            };
            out.push((field, encoded));
        }
        Predicate::IsNull { field, negated } => {
            let field = normalize_field("field", field)
                .map_err(|_| translation_error(predicate, "field name is empty"))?;
            let value = if *negated { NOT_NULL } else { NULL };
            out.push((field, value.to_owned()));
        }
        Predicate::And(children) => {
            for child in children {
                translate_into(child, out)?;
            }
        }
        Predicate::Or(..) => {
            return Err(translation_error(
                predicate,
                "disjunctions cannot be expressed as where[] filters",
            ));
        }
        Predicate::Not(..) => {
            return Err(translation_error(
                predicate,
                "negated sub-expressions cannot be expressed as where[] filters",
            ));
        }
    }
    Ok(())
}

/// Comma-joined IN list.
///
/// # Errors
/// `InvalidArgument` when the list is empty, holds a null, or a member
/// contains the `,` separator or fails [`check_literal`].
pub fn encode_in(values: &[Value]) -> Result<String, QueryError> {
    if values.is_empty() {
        return Err(QueryError::invalid("values", "IN list must not be empty"));
    }
    if values.iter().any(Value::is_null) {
        return Err(QueryError::invalid(
            "values",
            "IN list must not contain null",
        ));
    }
    let mut members = Vec::with_capacity(values.len());
    for value in values {
        check_literal(value)?;
        let rendered = value.to_string();
        if rendered.contains(',') {
            return Err(QueryError::invalid(
                "values",
                format!("IN member `{rendered}` contains the `,` separator"),
            ));
        }
        members.push(rendered);
    }
    Ok(members.join(","))
}

/// `!`-prefixed IN list.
///
/// # Errors
/// Same as [`encode_in`].
pub fn encode_not_in(values: &[Value]) -> Result<String, QueryError> {
    encode_in(values).map(|joined| format!("!{joined}"))
}

/// Range encoding: `min..max`, `start..`, or `..end`.
///
/// # Errors
/// `InvalidArgument` when both bounds are absent, when `min > max`, or when a
/// bound cannot be ordered (NaN, mixed kinds, null).
pub fn encode_range(min: Option<&Value>, max: Option<&Value>) -> Result<String, QueryError> {
    match (min, max) {
        (None, None) => Err(QueryError::invalid(
            "range",
            "at least one bound is required",
        )),
        (Some(lo), None) => {
            ensure_bound("min", lo)?;
            Ok(format!("{lo}.."))
        }
        (None, Some(hi)) => {
            ensure_bound("max", hi)?;
            Ok(format!("..{hi}"))
        }
        (Some(lo), Some(hi)) => {
            ensure_bound("min", lo)?;
            ensure_bound("max", hi)?;
            match bound_cmp(lo, hi) {
                Some(std::cmp::Ordering::Greater) => Err(QueryError::invalid(
                    "range",
                    format!("minimum {lo} is greater than maximum {hi}"),
                )),
                Some(_) => Ok(format!("{lo}..{hi}")),
                None => Err(QueryError::invalid(
                    "range",
                    format!("bounds {lo} and {hi} are not comparable"),
                )),
            }
        }
    }
}

fn ensure_bound(param: &'static str, value: &Value) -> Result<(), QueryError> {
    match value {
        Value::Null => Err(QueryError::invalid(param, "range bound must not be null")),
        Value::Float(x) if x.is_nan() => Err(QueryError::invalid(param, "range bound is NaN")),
        _ => Ok(()),
    }
}

#[allow(clippy::cast_precision_loss)]
fn bound_cmp(lo: &Value, hi: &Value) -> Option<std::cmp::Ordering> {
    match (lo, hi) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
        (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::DateTime(b)) => Some(a.cmp(&b.date_naive())),
        (Value::DateTime(a), Value::Date(b)) => Some(a.date_naive().cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// `{relationship}_count`
#[must_use]
pub fn relationship_count_key(relationship: &str) -> String {
    format!("{relationship}_count")
}

/// `has_{relationship}`
#[must_use]
pub fn has_key(relationship: &str) -> String {
    format!("has_{relationship}")
}

/// `{relationship}.{field}`
#[must_use]
pub fn scoped_key(relationship: &str, field: impl Display) -> String {
    format!("{relationship}.{field}")
}
