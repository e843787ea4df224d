//! Network fetch boundary used by the offline router
//!
//! [`Fetcher`] is the only way the router reaches the network, so every
//! routing decision can be exercised against [`MockFetcher`] in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use url::Url;

use crate::error::FetchError;

pub mod http;
#[cfg(test)]
pub mod mock;

pub use http::HttpFetcher;
#[cfg(test)]
pub use mock::MockFetcher;

/// Header carrying the original file name of a shared file
pub const SHARED_FILENAME_HEADER: &str = "x-filedash-filename";

/// How a request was issued, which decides whether its response is readable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level page load
    Navigate,
    /// Same-origin or CORS request
    #[default]
    Cors,
    /// Cross-origin request whose response the client may not inspect
    NoCors,
}

/// Whether the response body and status may be inspected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseKind {
    #[default]
    Basic,
    Opaque,
}

/// Request passing through the router
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub mode: RequestMode,
}

impl Request {
    /// A plain GET
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: Vec::new(),
            body: Vec::new(),
            mode: RequestMode::default(),
        }
    }

    /// A POST with a body and content type
    pub fn post(url: Url, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            method: Method::POST,
            url,
            headers: vec![("content-type".to_string(), content_type.to_string())],
            body,
            mode: RequestMode::default(),
        }
    }

    /// Set the request mode
    #[cfg(test)]
    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Response produced by the network or the cache
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub kind: ResponseKind,
}

impl Response {
    /// A basic response with the given status and body
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            status,
            headers: Vec::new(),
            body: body.into(),
            kind: ResponseKind::Basic,
        }
    }

    /// An empty 404
    pub fn not_found(url: impl Into<String>) -> Self {
        Self::new(url, 404, Vec::new())
    }

    /// A `303 See Other` pointing at `location`
    pub fn see_other(url: impl Into<String>, location: &str) -> Self {
        Self::new(url, 303, Vec::new()).with_header("location", location)
    }

    /// Append a header
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Mark the response opaque
    #[cfg(test)]
    pub fn opaque(mut self) -> Self {
        self.kind = ResponseKind::Opaque;
        self
    }

    /// Status in the 2xx range
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_opaque(&self) -> bool {
        self.kind == ResponseKind::Opaque
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Parsed `Last-Modified` header
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.header("last-modified").and_then(parse_http_date)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Parse an HTTP-date (`Wed, 21 Oct 2015 07:28:00 GMT`).
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Network access for the router
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request. `Err` means no response arrived at all.
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}
