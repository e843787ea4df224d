//! URL classification for routing decisions

use reqwest::Method;
use url::Url;

use crate::fetch::Request;

/// Share-target endpoint on the dashboard origin
pub const UPLOAD_PATH: &str = "/dashboard/upload";

/// Prefix under which shared files are addressed
pub const SHARED_PREFIX: &str = "/dashboard/shared/";

/// Application shell served when the network cannot help
pub const SHELL_PATH: &str = "/index.html";

const API_PREFIX: &str = "/api/";
const THUMBNAIL_PREFIX: &str = "/thumbnails/";

/// What kind of resource a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlClass {
    /// Share-target POST
    Upload,
    /// Dashboard API; never cached
    Api,
    /// Preview thumbnail
    Thumbnail,
    /// File handed in through the share target
    SharedFile,
    /// Anything else on or off the origin
    Asset,
}

/// Hosts and origin the router classifies against
#[derive(Debug, Clone)]
pub struct RouteRules {
    pub origin: Url,
    pub api_host: String,
    pub thumbnail_host: String,
}

impl RouteRules {
    pub fn new(origin: Url, api_host: impl Into<String>, thumbnail_host: impl Into<String>) -> Self {
        Self {
            origin,
            api_host: api_host.into(),
            thumbnail_host: thumbnail_host.into(),
        }
    }

    /// Classify a request by method and URL
    pub fn classify(&self, request: &Request) -> UrlClass {
        let url = &request.url;
        let same_origin = url.origin() == self.origin.origin();
        let path = url.path();
        let host = url.host_str().unwrap_or_default();

        if request.method == Method::POST && same_origin && path == UPLOAD_PATH {
            return UrlClass::Upload;
        }

        if host.eq_ignore_ascii_case(&self.api_host) || path.starts_with(API_PREFIX) {
            return UrlClass::Api;
        }

        if host.eq_ignore_ascii_case(&self.thumbnail_host) || path.starts_with(THUMBNAIL_PREFIX) {
            return UrlClass::Thumbnail;
        }

        if same_origin && path.starts_with(SHARED_PREFIX) {
            return UrlClass::SharedFile;
        }

        UrlClass::Asset
    }

    /// URL of the cached application shell
    pub fn shell_url(&self) -> Url {
        let mut url = self.origin.clone();
        url.set_path(SHELL_PATH);
        url.set_query(None);
        url
    }

    /// URL under which a shared file is stored
    pub fn shared_url(&self, key: i64) -> Url {
        let mut url = self.origin.clone();
        url.set_path(&format!("{}{}", SHARED_PREFIX, key));
        url.set_query(None);
        url
    }

    /// Redirect target handing a shared file to the upload view
    pub fn upload_location(key: i64) -> String {
        format!("{}?file={}", UPLOAD_PATH, key)
    }
}
