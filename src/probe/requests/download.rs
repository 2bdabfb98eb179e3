use crate::probe::requests::{cache_busted, Request};
use url::Url;

/// One chunk of a download trial. The body is read to the end and
/// counted.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    url: Url,
}

impl DownloadRequest {
    pub fn new(endpoint: &Url, index: usize) -> Self {
        Self { url: cache_busted(endpoint, index) }
    }
}

impl Request for DownloadRequest {
    fn url(&self) -> &Url {
        &self.url
    }
}
