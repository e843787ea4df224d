//! Install step: repopulate the offline cache from the precache manifest

use futures::future::join_all;
use url::Url;

use super::{OfflineRouter, RouterEvent};
use crate::cache::{Region, request_key};
use crate::fetch::{Fetcher, Request};

/// What an install run did
#[derive(Debug, Default, Clone)]
pub struct InstallReport {
    /// Entries removed from `offline-cache` and `shared-files`
    pub cleared: usize,
    /// Manifest URLs now cached
    pub cached: Vec<String>,
    /// Manifest URLs that could not be cached, with the reason
    pub failed: Vec<(String, String)>,
    /// Clients that received the version-ready notification
    pub notified: usize,
}

impl InstallReport {
    pub fn to_json(&self) -> serde_json::Value {
        let failed: Vec<_> = self
            .failed
            .iter()
            .map(|(url, reason)| serde_json::json!({ "url": url, "reason": reason }))
            .collect();
        serde_json::json!({
            "cleared": self.cleared,
            "cached": self.cached,
            "failed": failed,
            "notified": self.notified,
        })
    }
}

impl<F: Fetcher + 'static> OfflineRouter<F> {
    /// Clear the install-owned regions, precache `manifest`, then tell every
    /// subscriber a fresh version is ready.
    ///
    /// Nothing here fails the install: problems are logged, recorded in the
    /// report, and the notification is still sent.
    pub async fn install<P>(&self, manifest: &[Url], on_progress: P) -> InstallReport
    where
        P: Fn(&Url, bool) + Sync,
    {
        let mut report = InstallReport::default();

        for region in [Region::OfflineCache, Region::SharedFiles] {
            match self.with_storage(|s| s.clear_region(region)) {
                Ok(stats) => report.cleared += stats.entries_removed,
                Err(e) => log::warn!("Install could not clear {}: {}", region, e),
            }
        }

        let fetches = manifest.iter().map(|url| {
            let on_progress = &on_progress;
            async move {
                let result = self.fetcher.fetch(&Request::get(url.clone())).await;
                on_progress(url, matches!(&result, Ok(r) if r.is_ok()));
                (url, result)
            }
        });

        for (url, result) in join_all(fetches).await {
            let outcome = match result {
                Ok(response) if response.is_ok() => self
                    .with_storage(|s| s.put(Region::OfflineCache, &request_key(url), &response))
                    .map_err(|e| e.to_string()),
                Ok(response) => Err(format!("HTTP {}", response.status)),
                Err(e) => Err(e.to_string()),
            };

            match outcome {
                Ok(()) => report.cached.push(url.to_string()),
                Err(reason) => {
                    log::warn!("Precache of {} failed: {}", url, reason);
                    report.failed.push((url.to_string(), reason));
                }
            }
        }

        report.notified = self.events.send(RouterEvent::VersionReady).unwrap_or(0);
        log::info!(
            "Install finished: {} cached, {} failed, {} clients notified",
            report.cached.len(),
            report.failed.len(),
            report.notified
        );
        report
    }
}
