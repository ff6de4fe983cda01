use std::future::Future;

use futures::future::try_join_all;
use pco_errors::PcoError;

/// Create a parent record, then attach every child to it concurrently.
///
/// Attachments run only after `create` succeeds. The first failing attachment
/// fails the whole call; the parent is not rolled back.
///
/// # Errors
/// The creation error, or the first attachment error.
pub async fn create_and_attach<P, A, R, C, F, Fut>(
    create: C,
    attachments: impl IntoIterator<Item = A>,
    attach: F,
) -> Result<(P, Vec<R>), PcoError>
where
    C: Future<Output = Result<P, PcoError>>,
    F: Fn(&P, A) -> Fut,
    Fut: Future<Output = Result<R, PcoError>>,
{
    let parent = create.await?;
    let pending: Vec<Fut> = attachments
        .into_iter()
        .map(|child| attach(&parent, child))
        .collect();
    tracing::debug!(attachments = pending.len(), "attaching children to created parent");

    let attached = try_join_all(pending).await.inspect_err(|err| {
        tracing::warn!(error = %err, "attachment failed after parent was created");
    })?;
    Ok((parent, attached))
}
