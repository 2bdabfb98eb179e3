use crate::probe::requests::{cache_busted, Request};
use reqwest::Method;
use url::Url;

/// Header-only round trip used to time latency.
#[derive(Debug, Clone)]
pub struct PingRequest {
    url: Url,
}

impl PingRequest {
    pub fn new(endpoint: &Url, index: usize) -> Self {
        Self { url: cache_busted(endpoint, index) }
    }
}

impl Request for PingRequest {
    const METHOD: Method = Method::HEAD;

    fn url(&self) -> &Url {
        &self.url
    }
}
