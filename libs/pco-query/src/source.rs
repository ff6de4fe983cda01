use async_trait::async_trait;
use pco_errors::PcoError;
use tokio_util::sync::CancellationToken;

use crate::page::PagedResult;
use crate::params::QueryParameters;

/// The list call a builder executes against.
///
/// Implemented by resource services; the builder never performs I/O itself.
/// `cancel` must be forwarded to the transport unchanged.
#[async_trait]
pub trait ListSource<D>: Send + Sync {
    async fn list(
        &self,
        endpoint: &str,
        params: QueryParameters,
        cancel: &CancellationToken,
    ) -> Result<PagedResult<D>, PcoError>;
}
