//! Cache management commands

use serde::Serialize;
use tabled::Tabled;

use crate::cache::{CacheStorage, ClearStats, Region, RegionStats};
use crate::cli::OutputFormat;
use crate::error::Result;
use crate::output::{format_json, format_size, format_table, format_timestamp};

/// One region in `cache status`
#[derive(Debug, Serialize, Tabled)]
struct RegionRow {
    #[tabled(rename = "REGION")]
    region: String,
    #[tabled(rename = "ENTRIES")]
    valid_entries: usize,
    #[tabled(rename = "EXPIRED")]
    expired_entries: usize,
    #[tabled(rename = "SIZE")]
    #[serde(skip)]
    size: String,
    #[tabled(skip)]
    total_size_bytes: usize,
    #[tabled(rename = "NEWEST")]
    #[serde(skip)]
    newest: String,
    #[tabled(skip)]
    newest_entry_timestamp: Option<i64>,
}

impl From<&RegionStats> for RegionRow {
    fn from(stats: &RegionStats) -> Self {
        Self {
            region: stats.region.to_string(),
            valid_entries: stats.valid_entries,
            expired_entries: stats.expired_entries,
            size: format_size(stats.total_size_bytes),
            total_size_bytes: stats.total_size_bytes,
            newest: stats
                .newest_entry
                .map(format_timestamp)
                .unwrap_or_else(|| "-".to_string()),
            newest_entry_timestamp: stats.newest_entry,
        }
    }
}

fn cache_path() -> String {
    CacheStorage::cache_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Show cache status/statistics
pub fn status(format: OutputFormat) -> Result<()> {
    let cache = CacheStorage::open()?;
    let rows: Vec<RegionRow> = cache.stats()?.iter().map(RegionRow::from).collect();

    match format {
        OutputFormat::Json => {
            #[derive(Serialize)]
            struct CacheStatus<'a> {
                path: String,
                regions: &'a [RegionRow],
            }
            let status = CacheStatus {
                path: cache_path(),
                regions: &rows,
            };
            println!("{}", format_json(&status)?);
        }
        OutputFormat::Table => println!("{}", format_table(&rows)),
        OutputFormat::Pretty => {
            println!("Cache Status");
            println!("────────────────────────────────────────");
            println!("Location:       {}", cache_path());
            for row in &rows {
                println!();
                println!("{}", row.region);
                println!("  Valid entries:  {}", row.valid_entries);
                println!("  Expired:        {}", row.expired_entries);
                println!("  Total size:     {}", row.size);
                if row.newest_entry_timestamp.is_some() {
                    println!("  Newest entry:   {}", row.newest);
                }
            }
        }
    }

    Ok(())
}

/// Clear one region, or every region
pub fn clear(region: Option<Region>, format: OutputFormat) -> Result<()> {
    let cache = CacheStorage::open()?;
    let stats: ClearStats = match region {
        Some(region) => cache.clear_region(region)?,
        None => cache.clear_all()?,
    };
    let scope = region.map_or_else(|| "all regions".to_string(), |r| r.to_string());

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "region": region.map(|r| r.to_string()),
                "entries_removed": stats.entries_removed,
                "success": true,
            });
            println!("{}", format_json(&json)?);
        }
        _ => {
            if stats.entries_removed > 0 {
                println!(
                    "Cleared {} cache entries from {}",
                    stats.entries_removed, scope
                );
            } else {
                println!("Cache ({}) was already empty", scope);
            }
        }
    }

    Ok(())
}

/// Show cache path
pub fn path() -> Result<()> {
    println!("{}", CacheStorage::cache_dir()?.display());
    Ok(())
}
