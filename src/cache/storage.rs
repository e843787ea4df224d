//! SQLite-based cache storage with file blob support
//!
//! Stores small bodies inline in SQLite, large bodies (>10KB) as files.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};

use super::Region;
use super::key::blob_name;
use crate::error::CacheError;
use crate::fetch::{Response, ResponseKind};

/// Schema version - increment to trigger nuke-and-rebuild
const SCHEMA_VERSION: i32 = 1;

/// Bodies larger than this are stored as external blobs
const INLINE_THRESHOLD: usize = 10 * 1024; // 10KB

type Result<T> = std::result::Result<T, CacheError>;

/// A stored response together with its bookkeeping
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub region: Region,
    pub key: String,
    pub response: Response,
    /// `Last-Modified` of the stored response, unix seconds
    pub last_modified: Option<i64>,
    pub created_at: i64,
}

/// SQLite-backed cache storage with file blob support
pub struct CacheStorage {
    conn: Connection,
    blobs_dir: PathBuf,
}

impl CacheStorage {
    /// Open or create cache storage at the default XDG cache location
    pub fn open() -> Result<Self> {
        let cache_dir = Self::cache_dir()?;
        Self::open_at(&cache_dir)
    }

    /// Get the cache directory path (~/.cache/filedash on Linux)
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_base = dirs::cache_dir().ok_or(CacheError::NoHome)?;
        Ok(cache_base.join("filedash"))
    }

    /// Open cache storage at a specific directory
    pub fn open_at(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create cache dir: {}", e)))?;

        let db_path = cache_dir.join("cache.db");
        let blobs_dir = cache_dir.join("blobs");
        std::fs::create_dir_all(&blobs_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create blobs dir: {}", e)))?;

        let conn = Connection::open(&db_path)?;

        // Check schema version - nuke if mismatched
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |r| r.get(0))
            .unwrap_or(0);

        if version != 0 && version != SCHEMA_VERSION {
            log::info!(
                "Cache schema version mismatch ({} != {}), rebuilding",
                version,
                SCHEMA_VERSION
            );
            drop(conn);
            Self::nuke(&db_path, &blobs_dir)?;
            return Self::open_at(cache_dir);
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                region TEXT NOT NULL,
                request_key TEXT NOT NULL,
                url TEXT NOT NULL,
                status INTEGER NOT NULL,
                opaque INTEGER NOT NULL DEFAULT 0,
                headers TEXT NOT NULL,
                body BLOB,
                blob_path TEXT,
                last_modified INTEGER,
                created_at INTEGER NOT NULL,
                expires_at INTEGER,
                size_bytes INTEGER NOT NULL,
                PRIMARY KEY (region, request_key)
            );

            CREATE INDEX IF NOT EXISTS idx_request_key ON cache_entries(request_key);
            CREATE INDEX IF NOT EXISTS idx_expires_at ON cache_entries(expires_at);
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(Self { conn, blobs_dir })
    }

    /// Find a live entry for `key` in any region, in [`Region::ALL`] order.
    pub fn match_any(&self, key: &str) -> Result<Option<CacheEntry>> {
        for region in Region::ALL {
            if let Some(entry) = self.get(region, key)? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Get a live (unexpired) entry from one region
    pub fn get(&self, region: Region, key: &str) -> Result<Option<CacheEntry>> {
        let now = Utc::now().timestamp();

        #[allow(clippy::type_complexity)]
        let row: Option<(
            String,
            u16,
            bool,
            String,
            Option<Vec<u8>>,
            Option<String>,
            Option<i64>,
            i64,
        )> = self
            .conn
            .query_row(
                "SELECT url, status, opaque, headers, body, blob_path, last_modified, created_at
                 FROM cache_entries
                 WHERE region = ?1 AND request_key = ?2
                   AND (expires_at IS NULL OR expires_at > ?3)",
                params![region.name(), key, now],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                    ))
                },
            )
            .optional()?;

        let Some((url, status, opaque, headers, body, blob_path, last_modified, created_at)) = row
        else {
            return Ok(None);
        };

        let body = match (body, blob_path) {
            (Some(body), None) => body,
            (None, Some(blob_path)) => match std::fs::read(self.blobs_dir.join(&blob_path)) {
                Ok(data) => data,
                Err(e) => {
                    log::warn!("Failed to read blob {}: {}", blob_path, e);
                    // Delete stale entry
                    let _ = self.delete(region, key);
                    return Ok(None);
                }
            },
            _ => return Err(CacheError::Corrupt(format!("entry {} has no body", key))),
        };

        let headers: Vec<(String, String)> = serde_json::from_str(&headers)
            .map_err(|e| CacheError::Corrupt(format!("headers of {}: {}", key, e)))?;

        Ok(Some(CacheEntry {
            region,
            key: key.to_string(),
            response: Response {
                url,
                status,
                headers,
                body,
                kind: if opaque {
                    ResponseKind::Opaque
                } else {
                    ResponseKind::Basic
                },
            },
            last_modified,
            created_at,
        }))
    }

    /// Store a response, replacing any existing entry for the same key
    pub fn put(&self, region: Region, key: &str, response: &Response) -> Result<()> {
        let now = Utc::now().timestamp();
        let expires = region.ttl().map(|ttl| now + ttl.as_secs() as i64);
        let last_modified = response.last_modified().map(|d| d.timestamp());
        let headers = serde_json::to_string(&response.headers)
            .map_err(|e| CacheError::Corrupt(e.to_string()))?;

        // Drop any previous out-of-line body first
        self.remove_blob(region, key)?;

        let (body, blob_path) = if response.body.len() <= INLINE_THRESHOLD {
            (Some(response.body.as_slice()), None)
        } else {
            (None, Some(self.write_blob(region, key, &response.body)?))
        };

        self.conn.execute(
            "INSERT OR REPLACE INTO cache_entries
             (region, request_key, url, status, opaque, headers, body, blob_path,
              last_modified, created_at, expires_at, size_bytes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                region.name(),
                key,
                response.url,
                response.status,
                response.is_opaque(),
                headers,
                body,
                blob_path,
                last_modified,
                now,
                expires,
                response.body.len()
            ],
        )?;
        Ok(())
    }

    /// Delete a specific entry. Returns false if nothing was stored.
    pub fn delete(&self, region: Region, key: &str) -> Result<bool> {
        self.remove_blob(region, key)?;
        let deleted = self.conn.execute(
            "DELETE FROM cache_entries WHERE region = ?1 AND request_key = ?2",
            params![region.name(), key],
        )?;
        Ok(deleted > 0)
    }

    /// Remove every entry in one region
    pub fn clear_region(&self, region: Region) -> Result<ClearStats> {
        let blob_paths: Vec<String> = {
            let mut stmt = self.conn.prepare(
                "SELECT blob_path FROM cache_entries
                 WHERE region = ?1 AND blob_path IS NOT NULL",
            )?;
            let rows = stmt.query_map([region.name()], |r| r.get(0))?;
            rows.filter_map(|r| r.ok()).collect()
        };

        for path in blob_paths {
            if let Err(e) = std::fs::remove_file(self.blobs_dir.join(&path)) {
                log::warn!("Failed to remove blob {}: {}", path, e);
            }
        }

        let removed = self.conn.execute(
            "DELETE FROM cache_entries WHERE region = ?1",
            [region.name()],
        )?;

        Ok(ClearStats {
            entries_removed: removed,
        })
    }

    /// Clear all cache entries in every region
    pub fn clear_all(&self) -> Result<ClearStats> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))?;

        self.conn.execute("DELETE FROM cache_entries", [])?;

        // Clear blobs directory
        if self.blobs_dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.blobs_dir) {
                log::warn!("Failed to clear blobs directory: {}", e);
            }
            std::fs::create_dir_all(&self.blobs_dir)
                .map_err(|e| CacheError::Io(format!("Failed to recreate blobs dir: {}", e)))?;
        }

        Ok(ClearStats {
            entries_removed: count as usize,
        })
    }

    /// Shift an entry's timestamps `by` into the past
    #[cfg(test)]
    pub(crate) fn backdate(&self, region: Region, key: &str, by: std::time::Duration) -> Result<()> {
        let secs = by.as_secs() as i64;
        self.conn.execute(
            "UPDATE cache_entries
             SET created_at = created_at - ?3, expires_at = expires_at - ?3
             WHERE region = ?1 AND request_key = ?2",
            params![region.name(), key, secs],
        )?;
        Ok(())
    }

    /// Keys stored in a region, oldest first
    #[cfg(test)]
    pub fn keys(&self, region: Region) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT request_key FROM cache_entries WHERE region = ?1
             ORDER BY created_at, request_key",
        )?;
        let rows = stmt.query_map([region.name()], |r| r.get(0))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Per-region statistics
    pub fn stats(&self) -> Result<Vec<RegionStats>> {
        let now = Utc::now().timestamp();

        Region::ALL
            .iter()
            .map(|region| -> Result<RegionStats> {
                let (total, valid, size): (i64, i64, i64) = self.conn.query_row(
                    "SELECT COUNT(*),
                            COALESCE(SUM(CASE WHEN expires_at IS NULL OR expires_at > ?2
                                         THEN 1 ELSE 0 END), 0),
                            COALESCE(SUM(size_bytes), 0)
                     FROM cache_entries WHERE region = ?1",
                    params![region.name(), now],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
                )?;

                let newest: Option<i64> = self
                    .conn
                    .query_row(
                        "SELECT MAX(created_at) FROM cache_entries WHERE region = ?1",
                        [region.name()],
                        |r| r.get(0),
                    )
                    .optional()?
                    .flatten();

                Ok(RegionStats {
                    region: *region,
                    total_entries: total as usize,
                    valid_entries: valid as usize,
                    expired_entries: (total - valid) as usize,
                    total_size_bytes: size as usize,
                    newest_entry: newest,
                })
            })
            .collect()
    }

    /// Write a blob file, sharded by first 2 chars of its name
    fn write_blob(&self, region: Region, key: &str, data: &[u8]) -> Result<String> {
        let name = blob_name(region, key);
        let shard = &name[..2];
        let shard_dir = self.blobs_dir.join(shard);
        std::fs::create_dir_all(&shard_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create shard dir: {}", e)))?;

        let filename = format!("{}.bin", name);
        let rel_path = format!("{}/{}", shard, filename);

        std::fs::write(shard_dir.join(&filename), data)
            .map_err(|e| CacheError::Io(format!("Failed to write blob: {}", e)))?;

        Ok(rel_path)
    }

    fn remove_blob(&self, region: Region, key: &str) -> Result<()> {
        let blob_path: Option<String> = self
            .conn
            .query_row(
                "SELECT blob_path FROM cache_entries WHERE region = ?1 AND request_key = ?2",
                params![region.name(), key],
                |r| r.get(0),
            )
            .optional()?
            .flatten();

        if let Some(path) = blob_path {
            let full_path = self.blobs_dir.join(&path);
            if full_path.exists() {
                std::fs::remove_file(&full_path)
                    .map_err(|e| CacheError::Io(format!("Failed to remove blob: {}", e)))?;
            }
        }
        Ok(())
    }

    /// Nuke the cache (delete DB and all blobs)
    fn nuke(db_path: &Path, blobs_dir: &Path) -> Result<()> {
        if db_path.exists() {
            std::fs::remove_file(db_path)
                .map_err(|e| CacheError::Io(format!("Failed to remove cache DB: {}", e)))?;
        }
        if blobs_dir.exists() {
            std::fs::remove_dir_all(blobs_dir)
                .map_err(|e| CacheError::Io(format!("Failed to remove blobs dir: {}", e)))?;
        }
        Ok(())
    }
}

/// Statistics about a clear operation
#[derive(Debug)]
pub struct ClearStats {
    pub entries_removed: usize,
}

/// Statistics about one region
#[derive(Debug, Clone)]
pub struct RegionStats {
    pub region: Region,
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub total_size_bytes: usize,
    pub newest_entry: Option<i64>,
}
