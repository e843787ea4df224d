//! Background refresh of entries served from cache

use std::sync::Arc;

use super::SharedStorage;
use crate::cache::CacheEntry;
use crate::fetch::{Fetcher, Request};

/// What a background revalidation did to the cached entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revalidation {
    /// Live copy was strictly newer and replaced the entry
    Replaced,
    /// Upstream reports the resource gone; entry deleted
    Removed,
    /// Live copy is not newer
    Unchanged,
    /// One side carries no usable `Last-Modified`, or the live response
    /// cannot be compared
    Skipped,
    /// Live fetch failed or the cache could not be written
    Failed,
}

/// Compare a live response against the cached entry and refresh it in place.
///
/// Only `Last-Modified` decides freshness. Entries without the header are
/// left alone.
pub(crate) async fn revalidate<F: Fetcher>(
    fetcher: Arc<F>,
    storage: SharedStorage,
    request: Request,
    cached: CacheEntry,
) -> Revalidation {
    let live = match fetcher.fetch(&request).await {
        Ok(live) => live,
        Err(e) => {
            log::debug!("Revalidation fetch for {} failed: {}", cached.key, e);
            return Revalidation::Failed;
        }
    };

    if matches!(live.status, 404 | 410) {
        log::debug!("Upstream dropped {}, evicting", cached.key);
        return match super::with_storage(&storage, |s| s.delete(cached.region, &cached.key)) {
            Ok(_) => Revalidation::Removed,
            Err(e) => {
                log::warn!("Failed to evict {}: {}", cached.key, e);
                Revalidation::Failed
            }
        };
    }

    if !live.is_ok() || live.is_opaque() {
        return Revalidation::Skipped;
    }

    let (Some(live_modified), Some(cached_modified)) = (live.last_modified(), cached.last_modified)
    else {
        return Revalidation::Skipped;
    };

    if live_modified.timestamp() <= cached_modified {
        return Revalidation::Unchanged;
    }

    log::debug!("Refreshing {} (newer upstream copy)", cached.key);
    let result = super::with_storage(&storage, |s| {
        s.delete(cached.region, &cached.key)?;
        s.put(cached.region, &cached.key, &live)
    });

    match result {
        Ok(()) => Revalidation::Replaced,
        Err(e) => {
            log::warn!("Failed to refresh {}: {}", cached.key, e);
            Revalidation::Failed
        }
    }
}
