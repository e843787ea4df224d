//! Install command: refill the offline cache from the precache manifest

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::{CommandContext, OutputFormat};
use crate::error::Result;
use crate::output::format_json;

/// Run `install`
pub async fn run(ctx: &CommandContext) -> Result<()> {
    let router = ctx.router()?;
    let manifest = ctx.config.precache_urls()?;

    let pb = if ctx.format == OutputFormat::Json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(manifest.len() as u64)
    };
    pb.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let report = router
        .install(&manifest, |url, ok| {
            pb.inc(1);
            let mark = if ok { "✓" } else { "✗" };
            pb.set_message(format!("{} {}", mark, url.path()));
        })
        .await;
    pb.finish_and_clear();

    if ctx.format == OutputFormat::Json {
        println!("{}", format_json(&report.to_json())?);
        return Ok(());
    }

    println!(
        "{} Precached {} of {} files ({} stale entries cleared)",
        if report.failed.is_empty() {
            "✓".green()
        } else {
            "⚠".yellow()
        },
        report.cached.len(),
        manifest.len(),
        report.cleared
    );
    for (url, reason) in &report.failed {
        println!("  {} {}: {}", "✗".red(), url, reason);
    }

    Ok(())
}
