//! Terminal operators
//!
//! Everything here ends in one or more calls to the builder's
//! [`ListSource`](crate::source::ListSource). Cardinality operators shape
//! the request (`per_page = 1` or `2`) and check the returned page; server
//! aggregates ask the service to compute a value and fail if it did not;
//! `*_by` aggregates walk every page and reduce in memory.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::iter::Sum;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use futures_util::stream::{BoxStream, StreamExt, TryStreamExt};
use pco_errors::PcoError;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::ast::Predicate;
use crate::builder::QueryBuilder;
use crate::error::QueryError;
use crate::page::{PagedResult, PaginationOptions};
use crate::pager::{ItemsPager, PagesPager};
use crate::params::QueryParameters;
use crate::schema::{AsFieldName, Schema};
use crate::translate::normalize_field;

/// Filter key carrying a server-side aggregate request.
pub const AGGREGATE_KEY: &str = "aggregate";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AggregateFn {
    Sum,
    Average,
    Min,
    Max,
    CountDistinct,
    SumDistinct,
}

impl AggregateFn {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AggregateFn::Sum => "sum",
            AggregateFn::Average => "avg",
            AggregateFn::Min => "min",
            AggregateFn::Max => "max",
            AggregateFn::CountDistinct => "count_distinct",
            AggregateFn::SumDistinct => "sum_distinct",
        }
    }

    /// `sum(amount_cents)`, the value sent in `where[aggregate]` and the key
    /// read back from `meta.aggregates`.
    #[must_use]
    pub fn expression(self, field: &str) -> String {
        format!("{}({field})", self.as_str())
    }
}

/// Items sharing one grouping key, in the order they were fetched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grouping<K, T> {
    pub key: K,
    pub items: Vec<T>,
}

type PageFuture<D> = BoxFuture<'static, Result<PagedResult<D>, PcoError>>;

impl<S, T, D> QueryBuilder<S, T, D>
where
    S: Schema,
    T: Send + 'static,
    D: Send + 'static,
{
    /// Run the query once with the accumulated parameters.
    ///
    /// # Errors
    /// `Remote` with the service error, unchanged.
    pub async fn execute(&self, cancel: &CancellationToken) -> Result<PagedResult<T>, QueryError> {
        self.run(self.params.clone(), cancel).await
    }

    async fn run(
        &self,
        params: QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<PagedResult<T>, QueryError> {
        let mapper = self.mapper;
        async {
            tracing::debug!(params = %params, "listing resources");
            let page = self.source.list(&self.endpoint, params, cancel).await?;
            tracing::debug!(
                returned = page.data.len(),
                total_count = ?page.meta.total_count,
                "list completed"
            );
            Ok(page.map(mapper))
        }
        .instrument(self.span.clone())
        .await
    }

    fn with_page_size(&self, per_page: u32) -> QueryParameters {
        let mut params = self.params.clone();
        params.per_page = Some(per_page);
        params
    }

    // --- cardinality -------------------------------------------------------

    /// # Errors
    /// `Remote` on service failure.
    pub async fn first_or_default(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, QueryError> {
        let page = self.run(self.with_page_size(1), cancel).await?;
        Ok(page.data.into_iter().next())
    }

    /// # Errors
    /// `EmptySequence` when nothing matches, `Remote` on service failure.
    pub async fn first(&self, cancel: &CancellationToken) -> Result<T, QueryError> {
        self.first_or_default(cancel)
            .await?
            .ok_or(QueryError::EmptySequence)
    }

    /// # Errors
    /// `MoreThanOneElement` when two or more records match, `Remote` on
    /// service failure.
    pub async fn single_or_default(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, QueryError> {
        let page = self.run(self.with_page_size(2), cancel).await?;
        if page.data.len() > 1 {
            return Err(QueryError::MoreThanOneElement);
        }
        Ok(page.data.into_iter().next())
    }

    /// # Errors
    /// `EmptySequence`, `MoreThanOneElement`, or `Remote`.
    pub async fn single(&self, cancel: &CancellationToken) -> Result<T, QueryError> {
        self.single_or_default(cancel)
            .await?
            .ok_or(QueryError::EmptySequence)
    }

    /// Total matches as reported by the service, falling back to the length
    /// of the returned page.
    ///
    /// # Errors
    /// `Remote` on service failure.
    pub async fn count(&self, cancel: &CancellationToken) -> Result<u64, QueryError> {
        let page = self.run(self.params.clone(), cancel).await?;
        Ok(page
            .meta
            .total_count
            .unwrap_or_else(|| u64::try_from(page.data.len()).unwrap_or(u64::MAX)))
    }

    /// # Errors
    /// Translation errors from `predicate`, or `Remote`.
    pub async fn count_where(
        &self,
        predicate: impl Into<Predicate>,
        cancel: &CancellationToken,
    ) -> Result<u64, QueryError> {
        self.filter(predicate)?.count(cancel).await
    }

    /// # Errors
    /// `Remote` on service failure.
    pub async fn any(&self, cancel: &CancellationToken) -> Result<bool, QueryError> {
        let page = self.run(self.with_page_size(1), cancel).await?;
        Ok(!page.is_empty())
    }

    /// # Errors
    /// Translation errors from `predicate`, or `Remote`.
    pub async fn any_where(
        &self,
        predicate: impl Into<Predicate>,
        cancel: &CancellationToken,
    ) -> Result<bool, QueryError> {
        self.filter(predicate)?.any(cancel).await
    }

    // --- server aggregates -------------------------------------------------

    /// Ask the service to compute `func(field)` over every match.
    ///
    /// # Errors
    /// `AggregateNotApplied` when the response carries no value for the
    /// expression; `Remote` on service failure.
    pub async fn aggregate(
        &self,
        func: AggregateFn,
        field: impl AsFieldName,
        cancel: &CancellationToken,
    ) -> Result<f64, QueryError> {
        let field = normalize_field("field", field.as_field_name())?;
        let expression = func.expression(&field);
        let mut params = self.with_page_size(1);
        params.merge_filter(AGGREGATE_KEY, expression.clone());

        let page = self.run(params, cancel).await?;
        let value = page.meta.aggregates.get(&expression).copied();
        value.ok_or_else(|| {
            tracing::warn!(aggregate = %expression, "service ignored aggregate request");
            QueryError::AggregateNotApplied {
                aggregate: expression,
            }
        })
    }

    /// # Errors
    /// See [`Self::aggregate`].
    pub async fn sum(
        &self,
        field: impl AsFieldName,
        cancel: &CancellationToken,
    ) -> Result<f64, QueryError> {
        self.aggregate(AggregateFn::Sum, field, cancel).await
    }

    /// # Errors
    /// See [`Self::aggregate`].
    pub async fn average(
        &self,
        field: impl AsFieldName,
        cancel: &CancellationToken,
    ) -> Result<f64, QueryError> {
        self.aggregate(AggregateFn::Average, field, cancel).await
    }

    /// # Errors
    /// See [`Self::aggregate`].
    pub async fn min(
        &self,
        field: impl AsFieldName,
        cancel: &CancellationToken,
    ) -> Result<f64, QueryError> {
        self.aggregate(AggregateFn::Min, field, cancel).await
    }

    /// # Errors
    /// See [`Self::aggregate`].
    pub async fn max(
        &self,
        field: impl AsFieldName,
        cancel: &CancellationToken,
    ) -> Result<f64, QueryError> {
        self.aggregate(AggregateFn::Max, field, cancel).await
    }

    /// # Errors
    /// See [`Self::aggregate`].
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub async fn count_distinct(
        &self,
        field: impl AsFieldName,
        cancel: &CancellationToken,
    ) -> Result<u64, QueryError> {
        let value = self
            .aggregate(AggregateFn::CountDistinct, field, cancel)
            .await?;
        Ok(value.max(0.0).round() as u64)
    }

    /// # Errors
    /// See [`Self::aggregate`].
    pub async fn sum_distinct(
        &self,
        field: impl AsFieldName,
        cancel: &CancellationToken,
    ) -> Result<f64, QueryError> {
        self.aggregate(AggregateFn::SumDistinct, field, cancel).await
    }

    // --- multi-page --------------------------------------------------------

    fn page_fetcher(
        &self,
        cancel: CancellationToken,
    ) -> impl FnMut(QueryParameters) -> PageFuture<D> + Send + 'static {
        let source = Arc::clone(&self.source);
        let endpoint = Arc::clone(&self.endpoint);
        let span = self.span.clone();
        move |params| {
            let source = Arc::clone(&source);
            let endpoint = Arc::clone(&endpoint);
            let cancel = cancel.clone();
            async move {
                tracing::debug!(params = %params, "fetching page");
                source.list(&endpoint, params, &cancel).await
            }
            .instrument(span.clone())
            .boxed()
        }
    }

    /// Lazy stream of pages, advancing by offset.
    pub fn pages_stream(
        &self,
        options: PaginationOptions,
        cancel: CancellationToken,
    ) -> BoxStream<'static, Result<PagedResult<T>, QueryError>> {
        let mapper = self.mapper;
        PagesPager::new(self.params.clone(), options, self.page_fetcher(cancel))
            .map(move |page| page.map(|p| p.map(mapper)).map_err(QueryError::from))
            .boxed()
    }

    /// Lazy stream of items across pages, stopping at `max_items`.
    pub fn items_stream(
        &self,
        options: PaginationOptions,
        cancel: CancellationToken,
    ) -> BoxStream<'static, Result<T, QueryError>> {
        let mapper = self.mapper;
        ItemsPager::new(self.params.clone(), options, self.page_fetcher(cancel))
            .map(move |item| item.map(mapper).map_err(QueryError::from))
            .boxed()
    }

    /// Every matching item, honoring the paging bounds in `options`.
    ///
    /// # Errors
    /// The first `Remote` error encountered.
    pub async fn fetch_all(
        &self,
        options: PaginationOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>, QueryError> {
        let items: Vec<T> = self
            .items_stream(options, cancel.clone())
            .try_collect()
            .await?;
        tracing::debug!(parent: &self.span, fetched = items.len(), "fetched all pages");
        Ok(items)
    }

    // --- client-side aggregates --------------------------------------------

    /// Sum of `selector` over every item.
    ///
    /// # Errors
    /// The first `Remote` error encountered.
    pub async fn sum_by<K, F>(
        &self,
        selector: F,
        options: PaginationOptions,
        cancel: &CancellationToken,
    ) -> Result<K, QueryError>
    where
        K: Sum<K>,
        F: Fn(&T) -> K,
    {
        let items = self.fetch_all(options, cancel).await?;
        Ok(items.iter().map(selector).sum())
    }

    /// # Errors
    /// `EmptySequence` when nothing matches, or `Remote`.
    #[allow(clippy::cast_precision_loss)]
    pub async fn average_by<F>(
        &self,
        selector: F,
        options: PaginationOptions,
        cancel: &CancellationToken,
    ) -> Result<f64, QueryError>
    where
        F: Fn(&T) -> f64,
    {
        let items = self.fetch_all(options, cancel).await?;
        if items.is_empty() {
            return Err(QueryError::EmptySequence);
        }
        let total: f64 = items.iter().map(selector).sum();
        Ok(total / items.len() as f64)
    }

    /// # Errors
    /// `EmptySequence` when nothing matches, or `Remote`.
    pub async fn min_by<K, F>(
        &self,
        selector: F,
        options: PaginationOptions,
        cancel: &CancellationToken,
    ) -> Result<K, QueryError>
    where
        K: PartialOrd,
        F: Fn(&T) -> K,
    {
        let items = self.fetch_all(options, cancel).await?;
        extreme(items.iter().map(selector), |candidate, best| candidate < best)
    }

    /// # Errors
    /// `EmptySequence` when nothing matches, or `Remote`.
    pub async fn max_by<K, F>(
        &self,
        selector: F,
        options: PaginationOptions,
        cancel: &CancellationToken,
    ) -> Result<K, QueryError>
    where
        K: PartialOrd,
        F: Fn(&T) -> K,
    {
        let items = self.fetch_all(options, cancel).await?;
        extreme(items.iter().map(selector), |candidate, best| candidate > best)
    }

    /// # Errors
    /// The first `Remote` error encountered.
    pub async fn count_distinct_by<K, F>(
        &self,
        selector: F,
        options: PaginationOptions,
        cancel: &CancellationToken,
    ) -> Result<u64, QueryError>
    where
        K: Eq + Hash,
        F: Fn(&T) -> K,
    {
        let items = self.fetch_all(options, cancel).await?;
        let distinct: HashSet<K> = items.iter().map(selector).collect();
        Ok(u64::try_from(distinct.len()).unwrap_or(u64::MAX))
    }

    /// # Errors
    /// The first `Remote` error encountered.
    pub async fn sum_distinct_by<K, F>(
        &self,
        selector: F,
        options: PaginationOptions,
        cancel: &CancellationToken,
    ) -> Result<K, QueryError>
    where
        K: Eq + Hash + Sum<K>,
        F: Fn(&T) -> K,
    {
        let items = self.fetch_all(options, cancel).await?;
        let distinct: HashSet<K> = items.iter().map(selector).collect();
        Ok(distinct.into_iter().sum())
    }

    // --- grouping ----------------------------------------------------------

    /// The first page as a single group with a unit key. An empty page
    /// yields no groups.
    ///
    /// # Errors
    /// `Remote` on service failure.
    pub async fn grouped(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Grouping<(), T>>, QueryError> {
        let page = self.execute(cancel).await?;
        if page.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Grouping {
            key: (),
            items: page.data,
        }])
    }

    /// Record `group_by` for the service, fetch every page, and group
    /// client-side by `key_fn`. Groups appear in first-seen order.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty field name, or `Remote`.
    pub async fn grouped_by<K, F>(
        &self,
        field: impl AsFieldName,
        key_fn: F,
        options: PaginationOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<Grouping<K, T>>, QueryError>
    where
        K: Eq + Hash + Clone,
        F: Fn(&T) -> K,
    {
        let items = self.group_by(field)?.fetch_all(options, cancel).await?;
        let mut groups: Vec<Grouping<K, T>> = Vec::new();
        let mut index: HashMap<K, usize> = HashMap::new();
        for item in items {
            let key = key_fn(&item);
            if let Some(&slot) = index.get(&key) {
                groups[slot].items.push(item);
            } else {
                index.insert(key.clone(), groups.len());
                groups.push(Grouping {
                    key,
                    items: vec![item],
                });
            }
        }
        Ok(groups)
    }
}

fn extreme<K, I, F>(values: I, better: F) -> Result<K, QueryError>
where
    I: Iterator<Item = K>,
    F: Fn(&K, &K) -> bool,
{
    let mut best: Option<K> = None;
    for value in values {
        best = match best {
            Some(current) if !better(&value, &current) => Some(current),
            _ => Some(value),
        };
    }
    best.ok_or(QueryError::EmptySequence)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_expressions() {
        assert_eq!(AggregateFn::Sum.expression("amount"), "sum(amount)");
        assert_eq!(AggregateFn::Average.expression("amount"), "avg(amount)");
        assert_eq!(
            AggregateFn::CountDistinct.expression("fund_id"),
            "count_distinct(fund_id)"
        );
        assert_eq!(
            AggregateFn::SumDistinct.expression("amount"),
            "sum_distinct(amount)"
        );
    }

    #[test]
    fn test_extreme() {
        let min = extreme([3, 1, 2].into_iter(), |c, b| c < b).unwrap();
        assert_eq!(min, 1);
        let max = extreme([3, 1, 5].into_iter(), |c, b| c > b).unwrap();
        assert_eq!(max, 5);
        assert!(matches!(
            extreme(std::iter::empty::<i32>(), |c, b| c < b),
            Err(QueryError::EmptySequence)
        ));
    }
}
