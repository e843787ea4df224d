//! Route a single request through the offline router

use std::path::Path;

use colored::Colorize;
use serde::Serialize;

use crate::cli::{CommandContext, OutputFormat};
use crate::error::Result;
use crate::fetch::Request;
use crate::output::{format_json, format_size};
use crate::router::{Revalidation, Source};

/// Human-readable origin of a routed response
pub fn describe(source: Source) -> String {
    match source {
        Source::Cache(region) => format!("cache ({})", region),
        Source::Stored(region) => format!("network, stored in {}", region),
        Source::Network => "network".to_string(),
        Source::Shell => "cached app shell".to_string(),
        Source::ShareTarget => "share target".to_string(),
        Source::NotFound => "not found".to_string(),
    }
}

#[derive(Serialize)]
struct FetchSummary {
    url: String,
    status: u16,
    source: String,
    bytes: usize,
    revalidation: Option<String>,
}

/// Run `fetch`: GET `url` through the router and report where it came from
pub async fn run(ctx: &CommandContext, url: &str, output: Option<&Path>) -> Result<()> {
    let router = ctx.router()?;
    let url = ctx.resolve_url(url)?;

    let routed = router.handle(Request::get(url.clone())).await?;

    // Let the background refresh finish before the process exits
    let revalidation = match routed.revalidation {
        Some(task) => match task.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                log::warn!("Revalidation task failed: {}", e);
                Some(Revalidation::Failed)
            }
        },
        None => None,
    };

    if let Some(path) = output {
        std::fs::write(path, &routed.response.body)?;
    }

    match ctx.format {
        OutputFormat::Json => {
            let summary = FetchSummary {
                url: url.to_string(),
                status: routed.response.status,
                source: describe(routed.source),
                bytes: routed.response.body.len(),
                revalidation: revalidation.map(|r| format!("{:?}", r).to_lowercase()),
            };
            println!("{}", format_json(&summary)?);
        }
        _ => {
            let status = routed.response.status.to_string();
            let status = if routed.response.is_ok() {
                status.green()
            } else {
                status.red()
            };
            println!(
                "{} {} via {} ({})",
                status,
                url,
                describe(routed.source).bold(),
                format_size(routed.response.body.len())
            );
            if let Some(outcome) = revalidation {
                println!("{} revalidation: {:?}", "○".dimmed(), outcome);
            }
            match output {
                Some(path) => println!("Body written to {}", path.display()),
                None if ctx.format == OutputFormat::Pretty => {
                    if let Ok(text) = std::str::from_utf8(&routed.response.body) {
                        if !text.is_empty() {
                            println!("\n{}", text);
                        }
                    }
                }
                None => {}
            }
        }
    }

    Ok(())
}
