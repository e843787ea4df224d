//! Share-target handoff from the command line
//!
//! `share` posts a file to the upload endpoint exactly as a share sheet
//! would; `take` plays the upload view that collects it afterwards.

use std::path::Path;

use chrono::Utc;
use colored::Colorize;

use crate::cli::{CommandContext, OutputFormat};
use crate::error::{Error, Result};
use crate::fetch::Request;
use crate::output::{format_json, format_size};
use crate::router::classify::UPLOAD_PATH;
use crate::router::multipart;

/// Content type for a file name, by extension
pub fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("txt") | Some("log") => "text/plain",
        Some("html") | Some("htm") => "text/html",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Key from a `/dashboard/upload?file=<key>` location
pub fn key_from_location(location: &str) -> Option<i64> {
    let (_, query) = location.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == "file")
        .and_then(|(_, value)| value.parse().ok())
}

/// Run `share`
pub async fn share(ctx: &CommandContext, path: &Path, content_type: Option<&str>) -> Result<()> {
    let data = std::fs::read(path)?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::Other(format!("Not a file: {}", path.display())))?;
    let content_type = content_type.unwrap_or_else(|| guess_content_type(path));

    let boundary = format!("filedash-{}", Utc::now().timestamp_millis());
    let body = multipart::encode_file(&boundary, "file", filename, content_type, &data);

    let router = ctx.router()?;
    let url = ctx.config.origin_url()?.join(UPLOAD_PATH).map_err(|e| Error::Other(e.to_string()))?;
    let request = Request::post(
        url,
        &format!("multipart/form-data; boundary={}", boundary),
        body,
    );

    let routed = router.handle(request).await?;
    let location = routed.response.header("location").map(str::to_string);
    let key = location.as_deref().and_then(key_from_location);

    let (Some(location), Some(key)) = (location, key) else {
        return Err(Error::Other(format!(
            "Share target answered {} without a redirect",
            routed.response.status
        )));
    };

    match ctx.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "key": key,
                "location": location,
                "filename": filename,
                "bytes": data.len(),
            });
            println!("{}", format_json(&json)?);
        }
        _ => {
            println!(
                "{} Shared {} ({})",
                "✓".green(),
                filename.bold(),
                format_size(data.len())
            );
            println!("Key:      {}", key);
            println!("Location: {}", location);
        }
    }

    Ok(())
}

/// Run `take`: collect the shared file and write it out.
///
/// With `keep` the file stays parked for another consumer; otherwise it is
/// removed as it is read.
pub async fn take(ctx: &CommandContext, key: i64, output: &Path, keep: bool) -> Result<()> {
    let router = ctx.router()?;
    let file = if keep {
        router.load_shared(key)?
    } else {
        router.take_shared(key)?
    };
    let Some(file) = file else {
        return Err(Error::Other(format!("No shared file with key {}", key)));
    };

    std::fs::write(output, &file.data)?;

    match ctx.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "key": key,
                "filename": file.filename,
                "content_type": file.content_type,
                "bytes": file.data.len(),
                "output": output.display().to_string(),
                "kept": keep,
            });
            println!("{}", format_json(&json)?);
        }
        _ => println!(
            "{} Wrote {} ({}, {}) to {}",
            "✓".green(),
            file.filename.bold(),
            file.content_type,
            format_size(file.data.len()),
            output.display()
        ),
    }

    Ok(())
}
