#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use pco_sdk::{CancellationToken, PagedResult, PcoError, ResourceService};
use pco_query::QueryParameters;

/// In-memory resource service.
///
/// With `data`, list calls slice it by `offset`/`per_page` and report the full
/// length as `total_count`. Queued replies take precedence and are returned
/// verbatim. Every request is recorded, and so is whether the token it
/// carried (for `get` and `list` alike) was cancelled.
pub struct MemoryService<T> {
    pub data: Vec<T>,
    pub id_of: fn(&T) -> &str,
    pub calls: Mutex<Vec<QueryParameters>>,
    pub cancelled: Mutex<Vec<bool>>,
    pub replies: Mutex<VecDeque<Result<PagedResult<T>, PcoError>>>,
}

impl<T: Clone + Send + Sync + 'static> MemoryService<T> {
    pub fn new(data: Vec<T>, id_of: fn(&T) -> &str) -> Arc<Self> {
        Arc::new(Self {
            data,
            id_of,
            calls: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            replies: Mutex::new(VecDeque::new()),
        })
    }

    pub fn with_replies(
        replies: impl IntoIterator<Item = Result<PagedResult<T>, PcoError>>,
        id_of: fn(&T) -> &str,
    ) -> Arc<Self> {
        Arc::new(Self {
            data: Vec::new(),
            id_of,
            calls: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            replies: Mutex::new(replies.into_iter().collect()),
        })
    }

    pub fn calls(&self) -> Vec<QueryParameters> {
        self.calls.lock().clone()
    }

    pub fn cancelled(&self) -> Vec<bool> {
        self.cancelled.lock().clone()
    }

    pub fn last_params(&self) -> QueryParameters {
        self.calls.lock().last().cloned().expect("no list call recorded")
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> ResourceService<T> for MemoryService<T> {
    async fn get(&self, id: &str, cancel: &CancellationToken) -> Result<T, PcoError> {
        self.cancelled.lock().push(cancel.is_cancelled());
        self.data
            .iter()
            .find(|item| (self.id_of)(item) == id)
            .cloned()
            .ok_or_else(|| {
                PcoError::from_status(
                    http_not_found(),
                    pco_sdk::ErrorDetails::new(format!("no record {id}")),
                )
            })
    }

    async fn list(
        &self,
        params: QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<PagedResult<T>, PcoError> {
        self.calls.lock().push(params.clone());
        self.cancelled.lock().push(cancel.is_cancelled());

        if let Some(reply) = self.replies.lock().pop_front() {
            return reply;
        }

        let offset = params.offset.unwrap_or(0) as usize;
        let per_page = params.per_page.unwrap_or(25) as usize;
        let page: Vec<T> = self.data.iter().skip(offset).take(per_page).cloned().collect();
        let mut result = PagedResult::from_items(page);
        result.meta.total_count = Some(self.data.len() as u64);
        Ok(result)
    }
}

fn http_not_found() -> http::StatusCode {
    http::StatusCode::NOT_FOUND
}

/// Collects the `message` of every event emitted while the guard is alive,
/// prefixed with `span_name: ` when the event fired inside a span.
pub fn capture_messages() -> (tracing::subscriber::DefaultGuard, Arc<Mutex<Vec<String>>>) {
    use tracing_subscriber::layer::SubscriberExt;

    #[derive(Clone, Default)]
    struct MessageCapture {
        messages: Arc<Mutex<Vec<String>>>,
    }

    impl<S> tracing_subscriber::Layer<S> for MessageCapture
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let mut visitor = MessageVisitor(String::new());
            event.record(&mut visitor);
            let line = match ctx.event_span(event) {
                Some(span) => format!("{}: {}", span.name(), visitor.0),
                None => visitor.0,
            };
            self.messages.lock().push(line);
        }
    }

    struct MessageVisitor(String);
    impl tracing::field::Visit for MessageVisitor {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{value:?}");
            }
        }
    }

    let capture = MessageCapture::default();
    let messages = Arc::clone(&capture.messages);
    let guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(capture));
    (guard, messages)
}
