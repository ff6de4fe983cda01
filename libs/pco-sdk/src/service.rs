//! Resource service seam.
//!
//! A `ResourceService<T>` is the black box that issues requests for one
//! resource type. Fluent contexts only ever talk to it through this trait, so
//! an HTTP transport, a recorded fixture, or an in-memory fake are
//! interchangeable.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use pco_errors::PcoError;
use pco_query::{ItemsPager, ListSource, PagedResult, PaginationOptions, QueryParameters};
use tokio_util::sync::CancellationToken;

/// Lazy stream of resources across pages.
pub type ResourceStream<T> = BoxStream<'static, Result<T, PcoError>>;

#[async_trait]
pub trait ResourceService<T: Send + 'static>: Send + Sync + 'static {
    /// Fetch a single resource by id.
    async fn get(&self, id: &str, cancel: &CancellationToken) -> Result<T, PcoError>;

    /// Fetch one page.
    async fn list(
        &self,
        params: QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<PagedResult<T>, PcoError>;

    /// Fetch every page, starting at `params.offset`.
    ///
    /// The default walks pages with [`Self::list`].
    async fn get_all(
        &self,
        params: QueryParameters,
        options: Option<PaginationOptions>,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>, PcoError> {
        let options = options.unwrap_or_default();
        ItemsPager::new(params, options, |page| self.list(page, cancel))
            .try_collect()
            .await
    }

    /// Lazy item stream. The default walks pages with [`Self::list`].
    fn stream(
        self: Arc<Self>,
        params: QueryParameters,
        options: Option<PaginationOptions>,
        cancel: CancellationToken,
    ) -> ResourceStream<T> {
        let options = options.unwrap_or_default();
        ItemsPager::new(params, options, move |page| {
            let service = Arc::clone(&self);
            let cancel = cancel.clone();
            async move { service.list(page, &cancel).await }
        })
        .boxed()
    }
}

/// Adapts a resource service to the builder's list seam.
pub struct ServiceSource<T: Send + 'static> {
    service: Arc<dyn ResourceService<T>>,
}

impl<T: Send + 'static> ServiceSource<T> {
    #[must_use]
    pub fn new(service: Arc<dyn ResourceService<T>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<T: Send + 'static> ListSource<T> for ServiceSource<T> {
    async fn list(
        &self,
        endpoint: &str,
        params: QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<PagedResult<T>, PcoError> {
        tracing::trace!(endpoint, "delegating list to resource service");
        self.service.list(params, cancel).await
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Numbers {
        total: u32,
        offsets: Mutex<Vec<Option<u32>>>,
    }

    #[async_trait]
    impl ResourceService<u32> for Numbers {
        async fn get(&self, id: &str, _cancel: &CancellationToken) -> Result<u32, PcoError> {
            id.parse()
                .map_err(|_| PcoError::general(format!("bad id {id}")))
        }

        async fn list(
            &self,
            params: QueryParameters,
            _cancel: &CancellationToken,
        ) -> Result<PagedResult<u32>, PcoError> {
            self.offsets.lock().push(params.offset);
            let offset = params.offset.unwrap_or(0);
            let end = (offset + params.per_page.unwrap_or(10)).min(self.total);
            Ok(PagedResult::from_items((offset..end.max(offset)).collect()))
        }
    }

    fn numbers(total: u32) -> Arc<Numbers> {
        Arc::new(Numbers {
            total,
            offsets: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_default_get_all_walks_pages() {
        let svc = numbers(7);
        let all = svc
            .get_all(
                QueryParameters::new(),
                Some(PaginationOptions::default().with_page_size(3)),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(all, (0..7).collect::<Vec<_>>());
        assert_eq!(*svc.offsets.lock(), vec![Some(0), Some(3), Some(6)]);
    }

    #[tokio::test]
    async fn test_default_stream_is_lazy() {
        let svc = numbers(100);
        let first_two: Vec<u32> = Arc::clone(&svc)
            .stream(
                QueryParameters::new(),
                Some(PaginationOptions::default().with_page_size(5)),
                CancellationToken::new(),
            )
            .take(2)
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(first_two, vec![0, 1]);
        assert_eq!(svc.offsets.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_service_source_delegates_list() {
        let svc = numbers(3);
        let source = ServiceSource::new(svc.clone());
        let page = source
            .list("/x", QueryParameters::new().with_per_page(2), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(page.data, vec![0, 1]);
        assert_eq!(svc.get("5", &CancellationToken::new()).await.unwrap(), 5);
    }
}
