//! Cache key generation

use sha2::{Digest, Sha256};
use url::Url;

use super::Region;

/// Normalize a request URL into its cache key.
///
/// The fragment never reaches the server, so two URLs differing only in
/// their fragment share one entry.
pub fn request_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

/// Parse and normalize a raw URL string into its cache key.
pub fn request_key_str(raw: &str) -> Option<String> {
    Url::parse(raw).ok().map(|u| request_key(&u))
}

/// File name for an out-of-line body: SHA-256 of region and key.
pub fn blob_name(region: Region, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(region.name().as_bytes());
    hasher.update(b"|");
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}
