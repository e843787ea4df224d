//! Named cache regions and their lifetime policy

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::CacheError;

/// A named partition of the cache with its own eviction policy.
///
/// Entries are keyed by `(region, request_key)` so the same URL can never
/// leak from one region into another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    /// Navigable assets and static content next to the API
    OfflineCache,
    /// Derived thumbnail images, kept for a day
    PreviewIcons,
    /// Files shared into the app, waiting for the upload view
    SharedFiles,
}

impl Region {
    /// All regions, in cache-match priority order.
    pub const ALL: [Region; 3] = [Region::OfflineCache, Region::PreviewIcons, Region::SharedFiles];

    /// Storage name of the region
    pub fn name(&self) -> &'static str {
        match self {
            Region::OfflineCache => "offline-cache",
            Region::PreviewIcons => "preview-icons",
            Region::SharedFiles => "shared-files",
        }
    }

    /// How long an entry stays matchable. `None` means until invalidated.
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            Region::PreviewIcons => Some(Duration::from_secs(24 * 60 * 60)), // 24 hr
            Region::OfflineCache | Region::SharedFiles => None,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Region {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offline-cache" => Ok(Region::OfflineCache),
            "preview-icons" | "preview-thumbnails" => Ok(Region::PreviewIcons),
            "shared-files" | "share-target-cache" => Ok(Region::SharedFiles),
            other => Err(CacheError::Corrupt(format!("unknown cache region '{}'", other))),
        }
    }
}
