//! Local cache storage for routed responses
//!
//! Provides SQLite-backed storage with file blob storage for large bodies,
//! partitioned into [`Region`]s that each carry their own lifetime policy.

pub mod key;
pub mod region;
pub mod storage;

// Re-export main types
pub use key::{request_key, request_key_str};
pub use region::Region;
pub use storage::{CacheEntry, CacheStorage, ClearStats, RegionStats};
