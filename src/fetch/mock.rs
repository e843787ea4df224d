//! Scripted fetcher for router tests
//!
//! Responses are registered per URL. When several are registered for the
//! same URL they are returned in order and the last one repeats.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Fetcher, Request, Response};
use crate::error::FetchError;

/// Scripted outcome for one fetch
#[derive(Debug, Clone)]
enum Scripted {
    Respond(Response),
    Fail(String),
}

/// Mock fetcher for testing.
///
/// # Example
/// ```ignore
/// let fetcher = MockFetcher::new();
/// fetcher.respond("https://dash.test/app.js", Response::new("https://dash.test/app.js", 200, "js"));
/// ```
#[derive(Default, Clone)]
pub struct MockFetcher {
    scripts: Arc<std::sync::Mutex<HashMap<String, Vec<Scripted>>>>,
    /// Captured request URLs, in order
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `url`
    pub fn respond(&self, url: &str, response: Response) {
        self.push(url, Scripted::Respond(response));
    }

    /// Queue a network failure for `url`
    pub fn fail(&self, url: &str) {
        self.push(url, Scripted::Fail(format!("connection reset: {}", url)));
    }

    fn push(&self, url: &str, scripted: Scripted) {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push(scripted);
    }

    /// Number of fetches made for `url`
    pub async fn call_count(&self, url: &str) -> usize {
        self.calls.lock().await.iter().filter(|u| *u == url).count()
    }

    /// Total number of fetches made
    pub async fn total_calls(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let url = request.url.to_string();
        self.calls.lock().await.push(url.clone());

        let scripted = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(&url) {
                Some(queue) if queue.len() > 1 => Some(queue.remove(0)),
                Some(queue) => queue.first().cloned(),
                None => None,
            }
        };

        match scripted {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(msg)) => Err(FetchError::Network(msg)),
            None => Err(FetchError::Network(format!("no route to {}", url))),
        }
    }
}
