#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! # `pco-sdk` - typed Planning Center client
//!
//! Per-product fluent contexts (People, Giving, Calendar, Check-Ins, Groups,
//! Registrations, Publishing, Services, Webhooks) layered over the generic
//! [`pco_query::QueryBuilder`]. HTTP transport and DTO mapping live behind
//! [`ResourceService`]; this crate only decides what to ask for.
//!
//! ```rust,ignore
//! use pco_sdk::{PlanningCenter, modules::people::People};
//!
//! let pco = PlanningCenter::load(None)?;
//! pco.register::<People>(people_service);
//!
//! let page = pco
//!     .people()?
//!     .filter(People::STATUS.eq("active"))?
//!     .include(["emails"])?
//!     .order_by_desc("created_at")?
//!     .take(25)?
//!     .get_paged(None, &cancel)
//!     .await?;
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod dates;
pub mod fan_out;
pub mod hub;
pub mod modules;
pub mod service;

pub use client::PlanningCenter;
pub use config::{ConfigError, SdkConfig};
pub use context::{FluentContext, Resource};
pub use fan_out::create_and_attach;
pub use hub::{HubError, ServiceHub};
pub use service::{ResourceService, ResourceStream, ServiceSource};

pub use pco_errors::{ErrorDetails, PcoError};
pub use pco_query::{CancellationToken, PagedResult, PaginationOptions, QueryError};
