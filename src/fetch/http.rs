//! reqwest-backed fetcher

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use reqwest::header::{HeaderName, HeaderValue};
use url::Url;

use super::{Fetcher, Request, RequestMode, Response, ResponseKind};
use crate::error::FetchError;

/// Live network fetcher.
///
/// Cross-origin `NoCors` requests come back opaque: status 0, no headers,
/// no body, the same view a browser page gets of them.
pub struct HttpFetcher {
    http: HttpClient,
    origin: Url,
}

impl HttpFetcher {
    /// Create a fetcher for pages served from `origin`
    pub fn new(origin: Url) -> Result<Self, FetchError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("filedash/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::from)?;

        Ok(Self { http, origin })
    }

    fn is_cross_origin(&self, url: &Url) -> bool {
        url.origin() != self.origin.origin()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let mut builder = self
            .http
            .request(request.method.clone(), request.url.clone());

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FetchError::InvalidRequest(e.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| FetchError::InvalidRequest(e.to_string()))?;
            builder = builder.header(name, value);
        }

        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(FetchError::from)?;

        if request.mode == RequestMode::NoCors && self.is_cross_origin(&request.url) {
            log::debug!("Opaque response for {}", request.url);
            return Ok(Response {
                url: request.url.to_string(),
                status: 0,
                headers: Vec::new(),
                body: Vec::new(),
                kind: ResponseKind::Opaque,
            });
        }

        let url = response.url().to_string();
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body = response.bytes().await.map_err(FetchError::from)?.to_vec();

        Ok(Response {
            url,
            status,
            headers,
            body,
            kind: ResponseKind::Basic,
        })
    }
}
