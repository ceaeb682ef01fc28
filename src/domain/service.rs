//! The read-through pattern shared by every entity family.
//!
//! # Responsibilities
//! - `get_or_fetch`: cascade read, origin fetch on total miss, write-through
//! - `fan_out`: concurrent per-item lookups joined in input order, with
//!   per-item failure isolation
//!
//! # Design Decisions
//! - Absence is never cached, so recovery is immediate once the origin answers
//! - A cache write failure never hides a fetched value from the caller
//! - No de-duplication of concurrent misses for the same key

use std::fmt::Debug;
use std::future::Future;

use futures_util::future::join_all;

use crate::cache::{CacheCascade, CacheKey, CachedEntity, DurableLookup};
use crate::upstream::UpstreamResult;

/// Read `key` through the cascade; on a total miss run `fetch` and write the
/// result through every tier.
///
/// Returns `Ok(None)` when the origin has nothing (absent, throttled, or an
/// empty result). Upstream errors propagate and nothing is cached.
pub async fn get_or_fetch<E, F, Fut>(
    cascade: &CacheCascade<E>,
    key: &CacheKey,
    lookup: &DurableLookup,
    fetch: F,
) -> UpstreamResult<Option<E>>
where
    E: CachedEntity,
    F: FnOnce() -> Fut,
    Fut: Future<Output = UpstreamResult<Option<E>>>,
{
    if let Some(entity) = cascade.read(key, lookup).await {
        return Ok(Some(entity));
    }

    match fetch().await? {
        Some(entity) if !entity.is_absent() => {
            if cascade.write(key, &entity).await.is_err() {
                tracing::warn!(key = %key, "Returning fetched value without caching it");
            }
            Ok(Some(entity))
        }
        _ => {
            tracing::debug!(key = %key, "Origin has no data, nothing cached");
            Ok(None)
        }
    }
}

/// Run `lookup` for every item concurrently, preserving input order.
///
/// An item whose lookup fails becomes `None`; the other items are unaffected.
pub async fn fan_out<I, T, F, Fut>(items: I, lookup: F) -> Vec<Option<T>>
where
    I: IntoIterator,
    I::Item: Debug + Clone,
    F: Fn(I::Item) -> Fut,
    Fut: Future<Output = UpstreamResult<Option<T>>>,
{
    let items: Vec<I::Item> = items.into_iter().collect();
    let results = join_all(items.iter().cloned().map(&lookup)).await;

    items
        .into_iter()
        .zip(results)
        .map(|(item, result)| match result {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(item = ?item, error = %e, "Fan-out lookup failed");
                None
            }
        })
        .collect()
}
