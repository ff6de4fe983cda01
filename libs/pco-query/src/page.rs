use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Offset of the following page, as reported by the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextPage {
    pub offset: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
    /// Total number of matching records across all pages, when the service
    /// reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<NextPage>,
    /// Server-computed aggregates keyed by the requested expression
    /// (`sum(amount_cents)`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub aggregates: BTreeMap<String, f64>,
}

impl PageMeta {
    #[must_use]
    pub fn next_offset(&self) -> Option<u32> {
        self.next.map(|n| n.offset)
    }
}

/// One page of results.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub meta: PageMeta,
}

impl<T> PagedResult<T> {
    #[must_use]
    pub fn new(data: Vec<T>, meta: PageMeta) -> Self {
        Self { data, meta }
    }

    /// Single page holding `data`, with `count`/`total_count` derived from it.
    #[must_use]
    pub fn from_items(data: Vec<T>) -> Self {
        let count = u32::try_from(data.len()).unwrap_or(u32::MAX);
        Self {
            meta: PageMeta {
                total_count: Some(u64::from(count)),
                count,
                ..PageMeta::default()
            },
            data,
        }
    }

    #[must_use]
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> PagedResult<U> {
        PagedResult {
            data: self.data.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Paging bounds for multi-page operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationOptions {
    pub page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
}

pub const DEFAULT_PAGE_SIZE: u32 = 100;

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: None,
            max_items: None,
        }
    }
}

impl PaginationOptions {
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    #[must_use]
    pub fn with_max_items(mut self, max_items: u64) -> Self {
        self.max_items = Some(max_items);
        self
    }
}
