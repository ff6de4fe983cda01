//! Flat request parameters accumulated by the builder.
//!
//! `QueryParameters` owns all of its collections, so `clone()` always yields
//! an independent copy.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// Ordering primitives
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDir {
    #[serde(rename = "asc")]
    Asc,
    #[serde(rename = "desc")]
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SortKey {
    pub field: String,
    pub dir: SortDir,
}

impl SortKey {
    /// Wire token: `field` or `-field`.
    #[must_use]
    pub fn to_token(&self) -> String {
        match self.dir {
            SortDir::Asc => self.field.clone(),
            SortDir::Desc => format!("-{}", self.field),
        }
    }

    /// Parse a wire token (`-created_at` → descending `created_at`).
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        let (dir, field) = match token.strip_prefix('-') {
            Some(rest) => (SortDir::Desc, rest),
            None => (SortDir::Asc, token.strip_prefix('+').unwrap_or(token)),
        };
        if field.is_empty() {
            return None;
        }
        Some(SortKey {
            field: field.to_owned(),
            dir,
        })
    }
}

/// Parameters of a single list request.
///
/// - `filters`: field → encoded filter value, last write wins
/// - `include`: relationships to side-load, in insertion order, no duplicates
/// - `order_by`: sort keys, primary first
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct QueryParameters {
    pub filters: BTreeMap<String, String>,
    pub include: Vec<String>,
    pub order_by: Vec<SortKey>,
    pub per_page: Option<u32>,
    pub offset: Option<u32>,
}

impl QueryParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a filter entry.
    pub fn merge_filter(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.filters.insert(field.into(), value.into());
    }

    /// Append a relationship unless it is already included.
    ///
    /// Returns `true` when the name was added.
    pub fn add_include(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.include.contains(&name) {
            return false;
        }
        self.include.push(name);
        true
    }

    #[must_use]
    pub fn filter(&self, field: &str) -> Option<&str> {
        self.filters.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }

    #[must_use]
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Comma-joined sort tokens, e.g. `-created_at,last_name`.
    #[must_use]
    pub fn order_token(&self) -> Option<String> {
        if self.order_by.is_empty() {
            return None;
        }
        Some(
            self.order_by
                .iter()
                .map(SortKey::to_token)
                .collect::<Vec<_>>()
                .join(","),
        )
    }

    /// Wire form as ordered `(name, value)` pairs.
    ///
    /// A filter key that already carries a bracketed suffix (`created_at[gte]`)
    /// becomes `where[created_at][gte]`.
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.filters.len() + 4);
        for (field, value) in &self.filters {
            let name = match field.split_once('[') {
                Some((head, tail)) => format!("where[{head}][{tail}"),
                None => format!("where[{field}]"),
            };
            pairs.push((name, value.clone()));
        }
        if !self.include.is_empty() {
            pairs.push(("include".to_owned(), self.include.join(",")));
        }
        if let Some(order) = self.order_token() {
            pairs.push(("order".to_owned(), order));
        }
        if let Some(per_page) = self.per_page {
            pairs.push(("per_page".to_owned(), per_page.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_owned(), offset.to_string()));
        }
        pairs
    }

    /// URL-encoded query string (without the leading `?`).
    ///
    /// # Errors
    /// Returns the encoder error if a pair cannot be form-encoded.
    pub fn to_query_string(&self) -> Result<String, serde_urlencoded::ser::Error> {
        serde_urlencoded::to_string(self.to_query_pairs())
    }
}

impl fmt::Display for QueryParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs = self.to_query_pairs();
        if pairs.is_empty() {
            return write!(f, "(none)");
        }
        let formatted: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "{}", formatted.join("&"))
    }
}
