//! Share-target handoff
//!
//! Files shared into the app are parked in the `shared-files` region under
//! a timestamp key until the upload view picks them up.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

use super::classify::RouteRules;
use super::multipart;
use super::{OfflineRouter, Routed, Source};
use crate::cache::{Region, request_key};
use crate::error::CacheError;
use crate::fetch::{Fetcher, Request, Response, SHARED_FILENAME_HEADER};

/// Form field carrying the shared file
const FILE_FIELD: &str = "file";

/// A pending shared file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Issues strictly increasing millisecond keys
#[derive(Debug, Default)]
pub(crate) struct ShareKeys {
    last: AtomicI64,
}

impl ShareKeys {
    pub(crate) fn next(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let key = now.max(prev + 1);
            match self
                .last
                .compare_exchange(prev, key, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return key,
                Err(actual) => prev = actual,
            }
        }
    }
}

impl<F: Fetcher + 'static> OfflineRouter<F> {
    /// Answer a share-target POST: park the file and redirect to the upload view.
    pub(crate) fn handle_share_target(&self, request: &Request) -> Routed {
        let url = request.url.to_string();
        let Some(file) = extract_file(request) else {
            log::warn!("Share-target POST without a '{}' part", FILE_FIELD);
            return Routed::new(Response::new(url, 400, "missing file"), Source::ShareTarget);
        };

        match self.stash_shared(&file) {
            Ok(key) => {
                log::debug!("Stored shared file {} as {}", file.filename, key);
                let location = RouteRules::upload_location(key);
                Routed::new(Response::see_other(url, &location), Source::ShareTarget)
            }
            Err(e) => {
                log::warn!("Failed to store shared file: {}", e);
                Routed::new(Response::new(url, 500, "could not store file"), Source::ShareTarget)
            }
        }
    }

    /// Park a file in `shared-files` and return its key
    pub fn stash_shared(&self, file: &SharedFile) -> Result<i64, CacheError> {
        let key = self.share_keys.next();
        let url = self.rules.shared_url(key);
        let response = Response::new(url.as_str(), 200, file.data.clone())
            .with_header("content-type", &file.content_type)
            .with_header(SHARED_FILENAME_HEADER, &file.filename)
            .with_header("content-length", &file.data.len().to_string());

        self.with_storage(|s| s.put(Region::SharedFiles, &request_key(&url), &response))?;
        Ok(key)
    }

    /// Read a pending shared file without removing it.
    ///
    /// The consumer sends [`super::ControlMessage::DeleteShare`] once it is done.
    pub fn load_shared(&self, key: i64) -> Result<Option<SharedFile>, CacheError> {
        let url = self.rules.shared_url(key);
        let entry = self.with_storage(|s| s.get(Region::SharedFiles, &request_key(&url)))?;
        Ok(entry.map(|entry| into_shared_file(entry.response)))
    }

    /// Read and delete a pending shared file under one storage lock, so
    /// concurrent callers see it exactly once.
    pub fn take_shared(&self, key: i64) -> Result<Option<SharedFile>, CacheError> {
        let key = request_key(&self.rules.shared_url(key));
        let entry = self.with_storage(|s| {
            let entry = s.get(Region::SharedFiles, &key)?;
            if entry.is_some() {
                s.delete(Region::SharedFiles, &key)?;
            }
            Ok(entry)
        })?;
        Ok(entry.map(|entry| into_shared_file(entry.response)))
    }

    pub(crate) fn delete_shared(&self, key: i64) -> Result<bool, CacheError> {
        let url = self.rules.shared_url(key);
        self.with_storage(|s| s.delete(Region::SharedFiles, &request_key(&url)))
    }
}

fn into_shared_file(response: Response) -> SharedFile {
    SharedFile {
        filename: response
            .header(SHARED_FILENAME_HEADER)
            .unwrap_or("shared-file")
            .to_string(),
        content_type: response
            .header("content-type")
            .unwrap_or("application/octet-stream")
            .to_string(),
        data: response.body,
    }
}

fn extract_file(request: &Request) -> Option<SharedFile> {
    let boundary = multipart::boundary(request.header("content-type")?)?;
    let parts = multipart::parse(&request.body, &boundary)?;
    let part = parts.into_iter().find(|p| p.name == FILE_FIELD)?;

    Some(SharedFile {
        filename: part.filename.unwrap_or_else(|| "shared-file".to_string()),
        content_type: part
            .content_type
            .unwrap_or_else(|| "application/octet-stream".to_string()),
        data: part.data,
    })
}
