//! Offset-based pagination with Stream API
//!
//! Converts a page-fetching function into a `Stream` of pages or items,
//! hiding offset bookkeeping from callers.
//!
//! Paging stops when any of these holds:
//! - the service returns an empty page
//! - the page is shorter than `page_size` and no next offset was reported
//! - the next offset reaches the reported `total_count`
//! - `max_pages` pages were fetched
//! - [`MAX_UNREPORTED_PAGES`] full pages in a row arrived without a
//!   `total_count` or next offset (a service that ignores `offset` would
//!   otherwise be walked forever)
//! - a fetch fails (the error is yielded once, then the stream ends)
//!
//! # Example
//!
//! ```rust,ignore
//! use futures_util::StreamExt;
//! use pco_query::{ItemsPager, PaginationOptions};
//!
//! let mut people = ItemsPager::new(params, PaginationOptions::default(), |p| async move {
//!     service.list(p, &cancel).await
//! });
//!
//! while let Some(person) = people.next().await {
//!     println!("{}", person?.first_name);
//! }
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures_core::Stream;
use pin_project_lite::pin_project;

use crate::page::{PagedResult, PaginationOptions};
use crate::params::QueryParameters;

/// Consecutive full pages with neither `total_count` nor a next offset after
/// which paging stops.
pub const MAX_UNREPORTED_PAGES: u32 = 1_000;

pin_project! {
    /// A pager that yields whole pages.
    ///
    /// # Type Parameters
    ///
    /// * `T` - The item type
    /// * `E` - The error type
    /// * `F` - The fetcher function type
    /// * `Fut` - The future returned by the fetcher
    pub struct PagesPager<T, E, F, Fut>
    where
        F: FnMut(QueryParameters) -> Fut,
        Fut: Future<Output = Result<PagedResult<T>, E>>,
    {
        base: QueryParameters,
        page_size: u32,
        next_offset: u32,
        max_pages: Option<u32>,
        pages_fetched: u32,
        unreported_pages: u32,
        done: bool,
        fetcher: F,
        #[pin]
        current_fetch: Option<Fut>,
    }
}

impl<T, E, F, Fut> PagesPager<T, E, F, Fut>
where
    F: FnMut(QueryParameters) -> Fut,
    Fut: Future<Output = Result<PagedResult<T>, E>>,
{
    /// Start paging from `base.offset` (or zero). Each request carries
    /// `per_page = options.page_size`, overriding any `per_page` in `base`.
    pub fn new(base: QueryParameters, options: PaginationOptions, fetcher: F) -> Self {
        let next_offset = base.offset.unwrap_or(0);
        Self {
            base,
            page_size: options.page_size.max(1),
            next_offset,
            max_pages: options.max_pages,
            pages_fetched: 0,
            unreported_pages: 0,
            done: options.max_pages == Some(0),
            fetcher,
            current_fetch: None,
        }
    }
}

impl<T, E, F, Fut> Stream for PagesPager<T, E, F, Fut>
where
    F: FnMut(QueryParameters) -> Fut,
    Fut: Future<Output = Result<PagedResult<T>, E>>,
{
    type Item = Result<PagedResult<T>, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if *this.done {
                return Poll::Ready(None);
            }

            if let Some(fut) = this.current_fetch.as_mut().as_pin_mut() {
                match fut.poll(cx) {
                    Poll::Ready(Ok(page)) => {
                        this.current_fetch.set(None);
                        *this.pages_fetched += 1;

                        let returned = u32::try_from(page.data.len()).unwrap_or(u32::MAX);
                        let requested_at = *this.next_offset;
                        let advanced = match page.meta.next_offset() {
                            Some(offset) => Some(offset).filter(|o| *o > requested_at),
                            None if returned < *this.page_size => None,
                            None => requested_at.checked_add(returned),
                        };

                        match advanced {
                            Some(offset) if returned > 0 => *this.next_offset = offset,
                            _ => *this.done = true,
                        }
                        if let Some(total) = page.meta.total_count
                            && u64::from(*this.next_offset) >= total
                        {
                            *this.done = true;
                        }
                        if this.max_pages.is_some_and(|max| *this.pages_fetched >= max) {
                            *this.done = true;
                        }

                        if page.meta.total_count.is_none() && page.meta.next.is_none() {
                            *this.unreported_pages += 1;
                        } else {
                            *this.unreported_pages = 0;
                        }
                        if !*this.done && *this.unreported_pages >= MAX_UNREPORTED_PAGES {
                            tracing::warn!(
                                pages = *this.pages_fetched,
                                offset = *this.next_offset,
                                "paging stopped: service reports no total or next offset"
                            );
                            *this.done = true;
                        }

                        // A trailing empty page carries nothing; only the
                        // first one is surfaced so callers still see a page.
                        if returned == 0 && *this.pages_fetched > 1 {
                            return Poll::Ready(None);
                        }
                        return Poll::Ready(Some(Ok(page)));
                    }
                    Poll::Ready(Err(e)) => {
                        this.current_fetch.set(None);
                        *this.done = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                    Poll::Pending => return Poll::Pending,
                }
            }

            let mut params = this.base.clone();
            params.per_page = Some(*this.page_size);
            params.offset = Some(*this.next_offset);

            let fut = (this.fetcher)(params);
            this.current_fetch.set(Some(fut));

            // Poll the newly-installed future on the next loop turn so it
            // registers the current waker itself.
        }
    }
}

pin_project! {
    /// A pager that yields individual items across pages.
    pub struct ItemsPager<T, E, F, Fut>
    where
        F: FnMut(QueryParameters) -> Fut,
        Fut: Future<Output = Result<PagedResult<T>, E>>,
    {
        #[pin]
        pages: PagesPager<T, E, F, Fut>,
        buffer: VecDeque<T>,
        remaining: Option<u64>,
    }
}

impl<T, E, F, Fut> ItemsPager<T, E, F, Fut>
where
    F: FnMut(QueryParameters) -> Fut,
    Fut: Future<Output = Result<PagedResult<T>, E>>,
{
    pub fn new(base: QueryParameters, options: PaginationOptions, fetcher: F) -> Self {
        Self {
            pages: PagesPager::new(base, options, fetcher),
            buffer: VecDeque::new(),
            remaining: options.max_items,
        }
    }
}

impl<T, E, F, Fut> Stream for ItemsPager<T, E, F, Fut>
where
    F: FnMut(QueryParameters) -> Fut,
    Fut: Future<Output = Result<PagedResult<T>, E>>,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if *this.remaining == Some(0) {
                return Poll::Ready(None);
            }

            if let Some(item) = this.buffer.pop_front() {
                if let Some(left) = this.remaining.as_mut() {
                    *left -= 1;
                }
                return Poll::Ready(Some(Ok(item)));
            }

            match ready!(this.pages.as_mut().poll_next(cx)) {
                Some(Ok(page)) => this.buffer.extend(page.data),
                Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                None => return Poll::Ready(None),
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(clippy::similar_names)]
mod tests {
    use super::*;
    use crate::page::{NextPage, PageMeta};
    use futures_util::StreamExt;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    struct FakeError(String);

    /// Serves `total` integers in offset order, recording every request.
    #[derive(Clone)]
    struct FakeFetcher {
        total: u32,
        report_total: bool,
        fail_at_offset: Option<u32>,
        calls: Arc<Mutex<Vec<(Option<u32>, Option<u32>)>>>,
    }

    impl FakeFetcher {
        fn new(total: u32) -> Self {
            Self {
                total,
                report_total: true,
                fail_at_offset: None,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn fetch(
            &self,
            params: QueryParameters,
        ) -> impl Future<Output = Result<PagedResult<u32>, FakeError>> + use<> {
            self.calls
                .lock()
                .unwrap()
                .push((params.per_page, params.offset));
            let offset = params.offset.unwrap_or(0);
            let per_page = params.per_page.unwrap_or(100);
            let result = if self.fail_at_offset == Some(offset) {
                Err(FakeError(format!("boom at {offset}")))
            } else {
                let end = (offset + per_page).min(self.total);
                let data: Vec<u32> = (offset..end.max(offset)).collect();
                Ok(PagedResult::new(
                    data,
                    PageMeta {
                        total_count: self.report_total.then_some(u64::from(self.total)),
                        count: end.saturating_sub(offset),
                        ..PageMeta::default()
                    },
                ))
            };
            async move { result }
        }

        fn calls(&self) -> Vec<(Option<u32>, Option<u32>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn options(page_size: u32) -> PaginationOptions {
        PaginationOptions::default().with_page_size(page_size)
    }

    #[tokio::test]
    async fn test_pages_advance_by_offset() {
        let fetcher = FakeFetcher::new(5);
        let f = fetcher.clone();
        let pages: Vec<_> = PagesPager::new(QueryParameters::new(), options(2), move |p| f.fetch(p))
            .collect()
            .await;

        let data: Vec<Vec<u32>> = pages.into_iter().map(|p| p.unwrap().data).collect();
        assert_eq!(data, vec![vec![0, 1], vec![2, 3], vec![4]]);
        assert_eq!(
            fetcher.calls(),
            vec![(Some(2), Some(0)), (Some(2), Some(2)), (Some(2), Some(4))]
        );
    }

    #[tokio::test]
    async fn test_stops_on_short_page_without_total() {
        let mut fetcher = FakeFetcher::new(4);
        fetcher.report_total = false;
        let f = fetcher.clone();
        let items: Vec<u32> =
            ItemsPager::new(QueryParameters::new(), options(3), move |p| f.fetch(p))
                .map(Result::unwrap)
                .collect()
                .await;

        assert_eq!(items, vec![0, 1, 2, 3]);
        assert_eq!(fetcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_exact_multiple_without_total_fetches_one_empty_page() {
        let mut fetcher = FakeFetcher::new(4);
        fetcher.report_total = false;
        let f = fetcher.clone();
        let pages: Vec<_> = PagesPager::new(QueryParameters::new(), options(2), move |p| f.fetch(p))
            .collect()
            .await;

        assert_eq!(pages.len(), 2);
        assert_eq!(fetcher.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_max_pages_and_max_items() {
        let fetcher = FakeFetcher::new(50);
        let f = fetcher.clone();
        let pages: Vec<_> = PagesPager::new(
            QueryParameters::new(),
            options(10).with_max_pages(2),
            move |p| f.fetch(p),
        )
        .collect()
        .await;
        assert_eq!(pages.len(), 2);

        let fetcher = FakeFetcher::new(50);
        let f = fetcher.clone();
        let items: Vec<u32> = ItemsPager::new(
            QueryParameters::new(),
            options(10).with_max_items(15),
            move |p| f.fetch(p),
        )
        .map(Result::unwrap)
        .collect()
        .await;
        assert_eq!(items.len(), 15);
        assert_eq!(items.last().copied(), Some(14));
        assert_eq!(fetcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_starts_from_base_offset() {
        let fetcher = FakeFetcher::new(10);
        let f = fetcher.clone();
        let base = QueryParameters::new().with_offset(7);
        let items: Vec<u32> = ItemsPager::new(base, options(5), move |p| f.fetch(p))
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(items, vec![7, 8, 9]);
    }

    #[tokio::test]
    async fn test_error_is_yielded_once_then_stream_ends() {
        let mut fetcher = FakeFetcher::new(10);
        fetcher.fail_at_offset = Some(4);
        let f = fetcher.clone();
        let results: Vec<Result<u32, FakeError>> =
            ItemsPager::new(QueryParameters::new(), options(4), move |p| f.fetch(p))
                .collect()
                .await;

        assert_eq!(results.len(), 5);
        assert!(results[..4].iter().all(Result::is_ok));
        assert_eq!(results[4], Err(FakeError("boom at 4".to_owned())));
    }

    #[tokio::test]
    async fn test_offset_ignoring_service_is_cut_off() {
        let calls = Arc::new(Mutex::new(0_u32));
        let counter = Arc::clone(&calls);
        let pager = ItemsPager::new(QueryParameters::new(), options(2), move |_p| {
            *counter.lock().unwrap() += 1;
            async move { Ok::<_, FakeError>(PagedResult::new(vec![0_u32, 1], PageMeta::default())) }
        });

        let items: Vec<u32> = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            pager.map(Result::unwrap).collect::<Vec<_>>(),
        )
        .await
        .expect("pager must terminate");

        assert_eq!(*calls.lock().unwrap(), MAX_UNREPORTED_PAGES);
        assert_eq!(items.len(), 2 * MAX_UNREPORTED_PAGES as usize);
    }

    #[tokio::test]
    async fn test_reported_total_resets_unreported_run() {
        let fetcher = FakeFetcher::new(MAX_UNREPORTED_PAGES * 2 + 1);
        let f = fetcher.clone();
        let pages: Vec<_> = PagesPager::new(QueryParameters::new(), options(1), move |p| f.fetch(p))
            .collect()
            .await;
        assert_eq!(pages.len(), (MAX_UNREPORTED_PAGES * 2 + 1) as usize);
    }

    #[tokio::test]
    async fn test_follows_reported_next_offset() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&calls);
        let pager = PagesPager::new(QueryParameters::new(), options(2), move |p: QueryParameters| {
            recorded.lock().unwrap().push(p.offset);
            let offset = p.offset.unwrap_or(0);
            let next = (offset == 0).then_some(NextPage { offset: 10 });
            async move {
                Ok::<_, FakeError>(PagedResult::new(
                    vec![offset],
                    PageMeta {
                        next,
                        ..PageMeta::default()
                    },
                ))
            }
        });
        let pages: Vec<_> = pager.collect().await;

        assert_eq!(pages.len(), 2);
        assert_eq!(*calls.lock().unwrap(), vec![Some(0), Some(10)]);
    }
}
