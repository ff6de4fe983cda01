#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! # `pco-query` - fluent query building for the Planning Center API
//!
//! - **Parameters** (`params` module) - the flat `where`/`include`/`order`/paging
//!   state sent with a list request
//! - **Typed predicates** (`ast`, `schema` modules) - field references that
//!   build a small predicate AST with compile-time field checking
//! - **Translation** (`translate` module) - predicate AST and composite filters
//!   to `where[...]` entries
//! - **Builder** (`builder` module) - immutable chainable `QueryBuilder`
//! - **Terminal operators** (`terminal` module) - `first`, `single`, `count`,
//!   aggregates, grouping
//! - **Paging** (`page`, `pager` modules) - paged results and offset-driven
//!   streams
//!
//! ## Example
//!
//! ```rust,ignore
//! use pco_query::{QueryBuilder, SortDir};
//!
//! let people = QueryBuilder::<PersonSchema, Person>::new(source)
//!     .filter(STATUS.eq("active"))?
//!     .include(["emails"])?
//!     .order_by("created_at", SortDir::Desc)?
//!     .take(25)?;
//!
//! let first = people.first(&cancel).await?;
//! ```

pub mod ast;
pub mod builder;
pub mod error;
pub mod page;
pub mod pager;
pub mod params;
pub mod schema;
pub mod source;
pub mod terminal;
pub mod translate;

pub use ast::{CompareOp, IntoValue, Predicate, Value};
pub use builder::QueryBuilder;
pub use error::QueryError;
pub use page::{NextPage, PageMeta, PagedResult, PaginationOptions};
pub use pager::{ItemsPager, MAX_UNREPORTED_PAGES, PagesPager};
pub use params::{QueryParameters, SortDir, SortKey};
pub use schema::{AsFieldName, FieldRef, RelationRef, Schema};
pub use source::ListSource;
pub use terminal::{AggregateFn, Grouping};
pub use translate::CountFilter;

// Re-exported so callers don't need a direct dependency for the token type.
pub use tokio_util::sync::CancellationToken;
