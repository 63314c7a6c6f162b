//! Batch resolution of large id collections.
//!
//! Platforms cap how many items one metadata call may ask for (1000 song
//! details for NetEase, 10 vkeys for QQ). [`resolve_in_batches`] splits the
//! ids into contiguous chunks, fetches them one after another and
//! concatenates the results in input order.

use std::future::Future;

use tracing::debug;

use super::ApiError;

/// Fetches `ids` in chunks of `batch_size`, sequentially, preserving order.
///
/// Zero ids return an empty list without calling `fetch`. A `batch_size` of
/// zero is treated as one. The first failing chunk aborts the whole
/// resolution; no partial result is returned.
///
/// # Errors
///
/// Returns the first [`ApiError`] produced by `fetch`.
pub async fn resolve_in_batches<Id, Item, F, Fut>(
    ids: &[Id],
    batch_size: usize,
    mut fetch: F,
) -> Result<Vec<Item>, ApiError>
where
    F: FnMut(Vec<Id>) -> Fut,
    Fut: Future<Output = Result<Vec<Item>, ApiError>>,
    Id: Clone,
{
    let batch_size = batch_size.max(1);
    let mut items = Vec::with_capacity(ids.len());
    for (index, chunk) in ids.chunks(batch_size).enumerate() {
        debug!(batch = index, size = chunk.len(), "fetching batch");
        let mut fetched = fetch(chunk.to_vec()).await?;
        items.append(&mut fetched);
    }
    Ok(items)
}
