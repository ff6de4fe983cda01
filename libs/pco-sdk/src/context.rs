//! Per-resource fluent context.
//!
//! A [`FluentContext`] pairs a [`QueryBuilder`] with the resource service it
//! runs against. Like the builder it is an immutable value: every chaining
//! call returns a new context and leaves the receiver untouched.

use std::fmt;
use std::sync::Arc;

use pco_query::{
    AsFieldName, CancellationToken, ListSource, PagedResult, PaginationOptions, Predicate,
    QueryBuilder, QueryError, QueryParameters, Schema, SortDir,
};
use tracing::Instrument;

use crate::service::{ResourceService, ResourceStream, ServiceSource};

/// A Planning Center resource: a queryable schema bound to its domain model.
pub trait Resource: Schema + Send + Sync + 'static {
    type Model: Clone + Send + Sync + 'static;
}

pub struct FluentContext<R: Resource> {
    service: Arc<dyn ResourceService<R::Model>>,
    query: QueryBuilder<R, R::Model>,
    pagination: PaginationOptions,
    default_page_size: Option<u32>,
}

impl<R: Resource> FluentContext<R> {
    #[must_use]
    pub fn new(service: Arc<dyn ResourceService<R::Model>>) -> Self {
        let source: Arc<dyn ListSource<R::Model>> =
            Arc::new(ServiceSource::new(Arc::clone(&service)));
        Self {
            service,
            query: QueryBuilder::new(source),
            pagination: PaginationOptions::default(),
            default_page_size: None,
        }
    }

    fn with_query(&self, query: QueryBuilder<R, R::Model>) -> Self {
        Self {
            service: Arc::clone(&self.service),
            query,
            pagination: self.pagination,
            default_page_size: self.default_page_size,
        }
    }

    #[must_use]
    pub fn with_endpoint(&self, endpoint: impl Into<Arc<str>>) -> Self {
        self.with_query(self.query.at_endpoint(endpoint))
    }

    /// Pagination used by [`Self::get_all`] and [`Self::stream`] when the call
    /// passes none.
    #[must_use]
    pub fn with_pagination(&self, pagination: PaginationOptions) -> Self {
        Self {
            pagination,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_default_page_size(&self, default_page_size: Option<u32>) -> Self {
        Self {
            default_page_size,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn query(&self) -> &QueryBuilder<R, R::Model> {
        &self.query
    }

    #[must_use]
    pub fn params(&self) -> &QueryParameters {
        self.query.params()
    }

    // --- chaining ----------------------------------------------------------

    /// # Errors
    /// Whatever [`QueryBuilder::filter`] rejects.
    pub fn filter(&self, predicate: impl Into<Predicate>) -> Result<Self, QueryError> {
        Ok(self.with_query(self.query.filter(predicate)?))
    }

    /// # Errors
    /// `InvalidArgument` for an empty relationship name.
    pub fn include<I>(&self, names: I) -> Result<Self, QueryError>
    where
        I: IntoIterator,
        I::Item: AsFieldName,
    {
        Ok(self.with_query(self.query.include(names)?))
    }

    /// # Errors
    /// `InvalidArgument` for an empty field name.
    pub fn order_by(&self, field: impl AsFieldName) -> Result<Self, QueryError> {
        Ok(self.with_query(self.query.order_by(field, SortDir::Asc)?))
    }

    /// # Errors
    /// `InvalidArgument` for an empty field name.
    pub fn order_by_desc(&self, field: impl AsFieldName) -> Result<Self, QueryError> {
        Ok(self.with_query(self.query.order_by_desc(field)?))
    }

    /// # Errors
    /// `InvalidArgument` for an empty field name.
    pub fn then_by(&self, field: impl AsFieldName) -> Result<Self, QueryError> {
        Ok(self.with_query(self.query.then_by(field, SortDir::Asc)?))
    }

    /// # Errors
    /// `InvalidArgument` for an empty field name.
    pub fn then_by_desc(&self, field: impl AsFieldName) -> Result<Self, QueryError> {
        Ok(self.with_query(self.query.then_by_desc(field)?))
    }

    /// # Errors
    /// `InvalidArgument` when `count` is zero.
    pub fn take(&self, count: u32) -> Result<Self, QueryError> {
        Ok(self.with_query(self.query.take(count)?))
    }

    #[must_use]
    pub fn skip(&self, count: u32) -> Self {
        self.with_query(self.query.skip(count))
    }

    /// Apply any builder operation the context does not wrap directly.
    ///
    /// ```rust,ignore
    /// let ctx = ctx.refine(|q| q.where_between(CREATED_AT, start, end))?;
    /// ```
    ///
    /// # Errors
    /// Whatever `apply` returns.
    pub fn refine<F>(&self, apply: F) -> Result<Self, QueryError>
    where
        F: FnOnce(&QueryBuilder<R, R::Model>) -> Result<QueryBuilder<R, R::Model>, QueryError>,
    {
        Ok(self.with_query(apply(&self.query)?))
    }

    // --- execution ---------------------------------------------------------

    /// # Errors
    /// `Remote` with the service error.
    pub async fn get(&self, id: &str, cancel: &CancellationToken) -> Result<R::Model, QueryError> {
        async {
            tracing::debug!(id, "fetching resource");
            Ok(self.service.get(id, cancel).await?)
        }
        .instrument(self.query.span().clone())
        .await
    }

    /// One page with the accumulated parameters, returned unchanged.
    ///
    /// `per_page` is `page_size` when given, otherwise the one already set on
    /// the query, otherwise the configured default.
    ///
    /// # Errors
    /// `Remote` with the service error.
    pub async fn get_paged(
        &self,
        page_size: Option<u32>,
        cancel: &CancellationToken,
    ) -> Result<PagedResult<R::Model>, QueryError> {
        let mut params = self.query.build();
        params.per_page = page_size.or(params.per_page).or(self.default_page_size);
        self.list(params, cancel).await
    }

    /// One-based page of `page_size` records.
    ///
    /// # Errors
    /// `InvalidArgument` for a zero page or size, `Remote` on service failure.
    pub async fn get_page(
        &self,
        page: u32,
        page_size: u32,
        cancel: &CancellationToken,
    ) -> Result<PagedResult<R::Model>, QueryError> {
        let params = self.query.page(page, page_size)?.build();
        self.list(params, cancel).await
    }

    async fn list(
        &self,
        params: QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<PagedResult<R::Model>, QueryError> {
        async {
            tracing::debug!(params = %params, "listing resources");
            let page = self.service.list(params, cancel).await?;
            tracing::debug!(returned = page.data.len(), "list completed");
            Ok(page)
        }
        .instrument(self.query.span().clone())
        .await
    }

    /// Every matching record across pages.
    ///
    /// # Errors
    /// `Remote` with the first failing page's error.
    pub async fn get_all(
        &self,
        options: Option<PaginationOptions>,
        cancel: &CancellationToken,
    ) -> Result<Vec<R::Model>, QueryError> {
        let options = options.unwrap_or(self.pagination);
        Ok(self
            .service
            .get_all(self.query.build(), Some(options), cancel)
            .instrument(self.query.span().clone())
            .await?)
    }

    /// Lazily stream every matching record.
    #[must_use]
    pub fn stream(
        &self,
        options: Option<PaginationOptions>,
        cancel: CancellationToken,
    ) -> ResourceStream<R::Model> {
        let options = options.unwrap_or(self.pagination);
        Arc::clone(&self.service).stream(self.query.build(), Some(options), cancel)
    }

    // --- terminals ---------------------------------------------------------

    /// # Errors
    /// `EmptySequence` when nothing matches.
    pub async fn first(&self, cancel: &CancellationToken) -> Result<R::Model, QueryError> {
        self.query.first(cancel).await
    }

    /// # Errors
    /// `Remote` on service failure.
    pub async fn first_or_default(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<R::Model>, QueryError> {
        self.query.first_or_default(cancel).await
    }

    /// # Errors
    /// `EmptySequence` or `MoreThanOneElement`.
    pub async fn single(&self, cancel: &CancellationToken) -> Result<R::Model, QueryError> {
        self.query.single(cancel).await
    }

    /// # Errors
    /// `MoreThanOneElement` when two or more records match.
    pub async fn single_or_default(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<R::Model>, QueryError> {
        self.query.single_or_default(cancel).await
    }

    /// # Errors
    /// `Remote` on service failure.
    pub async fn count(&self, cancel: &CancellationToken) -> Result<u64, QueryError> {
        self.query.count(cancel).await
    }

    /// # Errors
    /// `Remote` on service failure.
    pub async fn any(&self, cancel: &CancellationToken) -> Result<bool, QueryError> {
        self.query.any(cancel).await
    }
}

impl<R: Resource> Clone for FluentContext<R> {
    fn clone(&self) -> Self {
        self.with_query(self.query.clone())
    }
}

impl<R: Resource> fmt::Debug for FluentContext<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FluentContext")
            .field("endpoint", &self.query.endpoint())
            .field("params", self.query.params())
            .field("pagination", &self.pagination)
            .finish_non_exhaustive()
    }
}
