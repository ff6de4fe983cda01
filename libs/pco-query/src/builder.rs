//! Immutable fluent query builder
//!
//! Every chaining method borrows the receiver and returns a *new* builder
//! carrying a copy of the accumulated [`QueryParameters`]. Fallible methods
//! validate eagerly and return `Err` without producing a builder, so a
//! half-applied update is never observable.
//!
//! # Example
//!
//! ```rust,ignore
//! use pco_query::{QueryBuilder, SortDir};
//!
//! let base = QueryBuilder::<PersonSchema, Person>::new(source);
//! let active = base.filter(STATUS.eq("active"))?;
//! let recent = active
//!     .order_by(CREATED_AT, SortDir::Desc)?
//!     .take(25)?;
//!
//! // `base` and `active` are untouched
//! assert!(base.params().filters.is_empty());
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::Span;

use crate::ast::{IntoValue, Predicate, Value};
use crate::error::QueryError;
use crate::params::{QueryParameters, SortDir, SortKey};
use crate::schema::{AsFieldName, RelationRef, Schema};
use crate::source::ListSource;
use crate::translate::{
    self, CountFilter, NOT_NULL, NULL, check_literal, encode_in, encode_not_in, encode_range, has_key,
    normalize_field, relationship_count_key, require_name, scoped_key,
};

/// Filter key carrying a server-side grouping request.
pub const GROUP_BY_KEY: &str = "group_by";

/// Generic query builder over a schema `S`, a model `T`, and the DTO `D` the
/// list source returns.
pub struct QueryBuilder<S: Schema, T, D = T> {
    pub(crate) source: Arc<dyn ListSource<D>>,
    pub(crate) endpoint: Arc<str>,
    pub(crate) mapper: fn(D) -> T,
    pub(crate) span: Span,
    pub(crate) params: QueryParameters,
    _schema: PhantomData<fn() -> S>,
}

fn identity<T>(value: T) -> T {
    value
}

fn query_span(endpoint: &str) -> Span {
    tracing::debug_span!("pco_query", endpoint = %endpoint)
}

impl<S: Schema, T> QueryBuilder<S, T, T> {
    /// Builder whose source already yields models.
    #[must_use]
    pub fn new(source: Arc<dyn ListSource<T>>) -> Self {
        Self::with_mapper(source, identity::<T>)
    }
}

impl<S: Schema, T, D> QueryBuilder<S, T, D> {
    /// Builder that maps each DTO through `mapper` after a list call.
    #[must_use]
    pub fn with_mapper(source: Arc<dyn ListSource<D>>, mapper: fn(D) -> T) -> Self {
        Self {
            source,
            endpoint: Arc::from(S::ENDPOINT),
            mapper,
            span: query_span(S::ENDPOINT),
            params: QueryParameters::default(),
            _schema: PhantomData,
        }
    }

    /// Same query against a different endpoint (for example, a fully
    /// qualified URL).
    #[must_use]
    pub fn at_endpoint(&self, endpoint: impl Into<Arc<str>>) -> Self {
        let endpoint = endpoint.into();
        Self {
            span: query_span(&endpoint),
            endpoint,
            ..self.with_params(self.params.clone())
        }
    }

    /// Same builder with `params` replacing the accumulated parameters.
    #[must_use]
    pub fn with_params(&self, params: QueryParameters) -> Self {
        Self {
            source: Arc::clone(&self.source),
            endpoint: Arc::clone(&self.endpoint),
            mapper: self.mapper,
            span: self.span.clone(),
            params,
            _schema: PhantomData,
        }
    }

    fn update<F>(&self, apply: F) -> Result<Self, QueryError>
    where
        F: FnOnce(&mut QueryParameters) -> Result<(), QueryError>,
    {
        let mut params = self.params.clone();
        apply(&mut params)?;
        Ok(self.with_params(params))
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    #[must_use]
    pub fn params(&self) -> &QueryParameters {
        &self.params
    }

    /// Snapshot of the accumulated parameters.
    pub fn build(&self) -> QueryParameters {
        self.params.clone()
    }

    // --- filters -----------------------------------------------------------

    /// `where[field]=value`
    ///
    /// # Errors
    /// `InvalidArgument` for an empty field name, a null value (use
    /// [`Self::where_null`]), or a string that starts with `!` or equals
    /// `null` (see [`translate::check_literal`]).
    pub fn where_eq<V: IntoValue>(
        &self,
        field: impl AsFieldName,
        value: V,
    ) -> Result<Self, QueryError> {
        let field = normalize_field("field", field.as_field_name())?;
        let value = value.into_value();
        if value.is_null() {
            return Err(QueryError::invalid(
                "value",
                format!("`{field}` cannot be compared to null here; use where_null"),
            ));
        }
        check_literal(&value)?;
        self.update(|p| {
            p.merge_filter(field, value.to_string());
            Ok(())
        })
    }

    /// Several equality filters at once; either all apply or none do.
    ///
    /// # Errors
    /// Same as [`Self::where_eq`] for any pair.
    pub fn where_all<I, K, V>(&self, pairs: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsFieldName,
        V: IntoValue,
    {
        self.update(|p| {
            for (field, value) in pairs {
                let field = normalize_field("field", field.as_field_name())?;
                let value = value.into_value();
                if value.is_null() {
                    return Err(QueryError::invalid(
                        "value",
                        format!("`{field}` cannot be compared to null here; use where_null"),
                    ));
                }
                check_literal(&value)?;
                p.merge_filter(field, value.to_string());
            }
            Ok(())
        })
    }

    /// Apply a typed predicate.
    ///
    /// ```rust,ignore
    /// builder.filter(STATUS.eq("active").and(CREATED_AT.ge(start)))?
    /// ```
    ///
    /// # Errors
    /// `Translation` when the predicate cannot be flattened into `where[]`
    /// entries, `InvalidArgument` for an invalid IN list.
    pub fn filter(&self, predicate: impl Into<Predicate>) -> Result<Self, QueryError> {
        let predicate = predicate.into();
        let pairs = translate::translate(&predicate)?;
        self.update(|p| {
            for (field, value) in pairs {
                p.merge_filter(field, value);
            }
            Ok(())
        })
    }

    /// # Errors
    /// `InvalidArgument` for an empty field, an empty list, a null member, or a
    /// member that contains `,`.
    pub fn where_in<I, V>(&self, field: impl AsFieldName, values: I) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = V>,
        V: IntoValue,
    {
        let field = normalize_field("field", field.as_field_name())?;
        let values: Vec<Value> = values.into_iter().map(IntoValue::into_value).collect();
        let encoded = encode_in(&values)?;
        self.update(|p| {
            p.merge_filter(field, encoded);
            Ok(())
        })
    }

    /// # Errors
    /// Same as [`Self::where_in`].
    pub fn where_not_in<I, V>(
        &self,
        field: impl AsFieldName,
        values: I,
    ) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = V>,
        V: IntoValue,
    {
        let field = normalize_field("field", field.as_field_name())?;
        let values: Vec<Value> = values.into_iter().map(IntoValue::into_value).collect();
        let encoded = encode_not_in(&values)?;
        self.update(|p| {
            p.merge_filter(field, encoded);
            Ok(())
        })
    }

    /// # Errors
    /// `InvalidArgument` for an empty field name.
    pub fn where_null(&self, field: impl AsFieldName) -> Result<Self, QueryError> {
        self.set_filter(field, NULL.to_owned())
    }

    /// # Errors
    /// `InvalidArgument` for an empty field name.
    pub fn where_not_null(&self, field: impl AsFieldName) -> Result<Self, QueryError> {
        self.set_filter(field, NOT_NULL.to_owned())
    }

    fn set_filter(&self, field: impl AsFieldName, encoded: String) -> Result<Self, QueryError> {
        let field = normalize_field("field", field.as_field_name())?;
        self.update(|p| {
            p.merge_filter(field, encoded);
            Ok(())
        })
    }

    /// Range with optional bounds: `start..end`, `start..`, or `..end`.
    ///
    /// # Errors
    /// `InvalidArgument` when both bounds are absent or `start > end`.
    pub fn where_date_range<V: IntoValue>(
        &self,
        field: impl AsFieldName,
        start: Option<V>,
        end: Option<V>,
    ) -> Result<Self, QueryError> {
        let start = start.map(IntoValue::into_value);
        let end = end.map(IntoValue::into_value);
        let encoded = encode_range(start.as_ref(), end.as_ref())?;
        self.set_filter(field, encoded)
    }

    /// Closed range `min..max`.
    ///
    /// # Errors
    /// `InvalidArgument` when `min > max` or a bound is null.
    pub fn where_between<V: IntoValue>(
        &self,
        field: impl AsFieldName,
        min: V,
        max: V,
    ) -> Result<Self, QueryError> {
        let (min, max) = (min.into_value(), max.into_value());
        let encoded = encode_range(Some(&min), Some(&max))?;
        self.set_filter(field, encoded)
    }

    /// Open range `start..`.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty field or a null bound.
    pub fn where_after<V: IntoValue>(
        &self,
        field: impl AsFieldName,
        start: V,
    ) -> Result<Self, QueryError> {
        let encoded = encode_range(Some(&start.into_value()), None)?;
        self.set_filter(field, encoded)
    }

    /// Open range `..end`.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty field or a null bound.
    pub fn where_before<V: IntoValue>(
        &self,
        field: impl AsFieldName,
        end: V,
    ) -> Result<Self, QueryError> {
        let encoded = encode_range(None, Some(&end.into_value()))?;
        self.set_filter(field, encoded)
    }

    // --- relationship filters ----------------------------------------------

    /// `where[has_{relationship}]=true`
    ///
    /// # Errors
    /// `InvalidArgument` for an empty relationship name.
    pub fn where_has_relationship(
        &self,
        relationship: impl AsFieldName,
    ) -> Result<Self, QueryError> {
        self.relationship_presence(relationship, true)
    }

    /// `where[has_{relationship}]=false`
    ///
    /// # Errors
    /// `InvalidArgument` for an empty relationship name.
    pub fn where_doesnt_have_relationship(
        &self,
        relationship: impl AsFieldName,
    ) -> Result<Self, QueryError> {
        self.relationship_presence(relationship, false)
    }

    fn relationship_presence(
        &self,
        relationship: impl AsFieldName,
        present: bool,
    ) -> Result<Self, QueryError> {
        let relationship = require_name("relationship", relationship.as_field_name())?;
        self.update(|p| {
            p.merge_filter(has_key(&relationship), present.to_string());
            Ok(())
        })
    }

    /// Equality on a field of a related resource: `where[{relationship}.{field}]`.
    ///
    /// # Errors
    /// `InvalidArgument` for empty names or a null value.
    pub fn where_has<V: IntoValue>(
        &self,
        relationship: impl AsFieldName,
        field: impl AsFieldName,
        value: V,
    ) -> Result<Self, QueryError> {
        let relationship = require_name("relationship", relationship.as_field_name())?;
        let field = normalize_field("field", field.as_field_name())?;
        let value = value.into_value();
        if value.is_null() {
            return Err(QueryError::invalid(
                "value",
                "related-field comparison against null is not supported",
            ));
        }
        self.update(|p| {
            p.merge_filter(scoped_key(&relationship, field), value.to_string());
            Ok(())
        })
    }

    /// # Errors
    /// `InvalidArgument` for an empty name or an inverted range.
    pub fn where_relationship_count_matching(
        &self,
        relationship: impl AsFieldName,
        count: CountFilter,
    ) -> Result<Self, QueryError> {
        let relationship = require_name("relationship", relationship.as_field_name())?;
        let encoded = count.encode()?;
        self.update(|p| {
            p.merge_filter(relationship_count_key(&relationship), encoded);
            Ok(())
        })
    }

    /// Exactly `count` related records.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty relationship name.
    pub fn where_relationship_count(
        &self,
        relationship: impl AsFieldName,
        count: u32,
    ) -> Result<Self, QueryError> {
        self.where_relationship_count_matching(relationship, CountFilter::Exactly(count))
    }

    /// # Errors
    /// `InvalidArgument` for an empty relationship name.
    pub fn where_relationship_count_greater_than(
        &self,
        relationship: impl AsFieldName,
        count: u32,
    ) -> Result<Self, QueryError> {
        self.where_relationship_count_matching(relationship, CountFilter::GreaterThan(count))
    }

    /// # Errors
    /// `InvalidArgument` for an empty relationship name.
    pub fn where_relationship_count_less_than(
        &self,
        relationship: impl AsFieldName,
        count: u32,
    ) -> Result<Self, QueryError> {
        self.where_relationship_count_matching(relationship, CountFilter::LessThan(count))
    }

    /// # Errors
    /// `InvalidArgument` for an empty relationship name or `min > max`.
    pub fn where_relationship_count_between(
        &self,
        relationship: impl AsFieldName,
        min: u32,
        max: u32,
    ) -> Result<Self, QueryError> {
        self.where_relationship_count_matching(relationship, CountFilter::Between(min, max))
    }

    // --- includes ----------------------------------------------------------

    /// Side-load relationships. Names already included are skipped.
    ///
    /// # Errors
    /// `InvalidArgument` if any name is empty; nothing is applied in that case.
    pub fn include<I>(&self, names: I) -> Result<Self, QueryError>
    where
        I: IntoIterator,
        I::Item: AsFieldName,
    {
        self.update(|p| {
            for name in names {
                p.add_include(require_name("include", name.as_field_name())?);
            }
            Ok(())
        })
    }

    #[must_use]
    pub fn include_relation(&self, relation: RelationRef<S>) -> Self {
        let mut params = self.params.clone();
        params.add_include(relation.name());
        self.with_params(params)
    }

    /// Nested include such as `households.people`, stored literally.
    ///
    /// # Errors
    /// `InvalidArgument` when the path or any of its segments is empty.
    pub fn include_deep(&self, path: &str) -> Result<Self, QueryError> {
        let path = require_name("path", path)?;
        if path.split('.').any(|segment| segment.trim().is_empty()) {
            return Err(QueryError::invalid(
                "path",
                format!("`{path}` contains an empty segment"),
            ));
        }
        self.update(|p| {
            p.add_include(path);
            Ok(())
        })
    }

    // --- ordering ----------------------------------------------------------

    /// Replace the sort sequence with a single key.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty field name.
    pub fn order_by(&self, field: impl AsFieldName, dir: SortDir) -> Result<Self, QueryError> {
        let field = normalize_field("field", field.as_field_name())?;
        self.update(|p| {
            p.order_by = vec![SortKey { field, dir }];
            Ok(())
        })
    }

    /// # Errors
    /// `InvalidArgument` for an empty field name.
    pub fn order_by_desc(&self, field: impl AsFieldName) -> Result<Self, QueryError> {
        self.order_by(field, SortDir::Desc)
    }

    /// Append a secondary sort key.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty field name.
    pub fn then_by(&self, field: impl AsFieldName, dir: SortDir) -> Result<Self, QueryError> {
        let field = normalize_field("field", field.as_field_name())?;
        self.update(|p| {
            p.order_by.push(SortKey { field, dir });
            Ok(())
        })
    }

    /// # Errors
    /// `InvalidArgument` for an empty field name.
    pub fn then_by_desc(&self, field: impl AsFieldName) -> Result<Self, QueryError> {
        self.then_by(field, SortDir::Desc)
    }

    // --- paging ------------------------------------------------------------

    /// Page size.
    ///
    /// # Errors
    /// `InvalidArgument` when `count` is zero.
    pub fn take(&self, count: u32) -> Result<Self, QueryError> {
        if count == 0 {
            return Err(QueryError::invalid("count", "must be greater than zero"));
        }
        self.update(|p| {
            p.per_page = Some(count);
            Ok(())
        })
    }

    #[must_use]
    pub fn skip(&self, count: u32) -> Self {
        let mut params = self.params.clone();
        params.offset = Some(count);
        self.with_params(params)
    }

    /// One-based page: `per_page = page_size`, `offset = (page - 1) * page_size`.
    ///
    /// # Errors
    /// `InvalidArgument` when either argument is zero or the offset overflows.
    pub fn page(&self, page: u32, page_size: u32) -> Result<Self, QueryError> {
        if page == 0 {
            return Err(QueryError::invalid("page", "pages are numbered from 1"));
        }
        if page_size == 0 {
            return Err(QueryError::invalid("page_size", "must be greater than zero"));
        }
        let offset = (page - 1).checked_mul(page_size).ok_or_else(|| {
            QueryError::invalid("page", format!("offset for page {page} overflows"))
        })?;
        self.update(|p| {
            p.per_page = Some(page_size);
            p.offset = Some(offset);
            Ok(())
        })
    }

    // --- grouping ----------------------------------------------------------

    /// # Errors
    /// `InvalidArgument` for an empty field name.
    pub fn group_by(&self, field: impl AsFieldName) -> Result<Self, QueryError> {
        let field = normalize_field("field", field.as_field_name())?;
        self.update(|p| {
            p.merge_filter(GROUP_BY_KEY, field);
            Ok(())
        })
    }

    /// `where[having[field]]=value`
    ///
    /// # Errors
    /// `InvalidArgument` for an empty field name or a null value.
    pub fn having<V: IntoValue>(
        &self,
        field: impl AsFieldName,
        value: V,
    ) -> Result<Self, QueryError> {
        let field = normalize_field("field", field.as_field_name())?;
        let value = value.into_value();
        if value.is_null() {
            return Err(QueryError::invalid("value", "having value must not be null"));
        }
        self.update(|p| {
            p.merge_filter(format!("having[{field}]"), value.to_string());
            Ok(())
        })
    }
}

impl<S: Schema, T, D> Clone for QueryBuilder<S, T, D> {
    fn clone(&self) -> Self {
        self.with_params(self.params.clone())
    }
}

impl<S: Schema, T, D> fmt::Debug for QueryBuilder<S, T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("endpoint", &self.endpoint)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
