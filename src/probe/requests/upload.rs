use crate::probe::requests::{cache_busted, Request, RequestBody, UA};
use reqwest::header::{
    HeaderMap, HeaderValue, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE,
    USER_AGENT,
};
use reqwest::Method;
use url::Url;

/// A zero-filled payload posted to time an upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    url: Url,
    bytes: usize,
}

impl UploadRequest {
    pub fn new(endpoint: &Url, index: usize, bytes: usize) -> Self {
        Self { url: cache_busted(endpoint, index), bytes }
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Request for UploadRequest {
    const METHOD: Method = Method::POST;

    fn url(&self) -> &Url {
        &self.url
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(USER_AGENT, HeaderValue::from_static(UA));

        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );

        headers.insert(CONTENT_LENGTH, self.bytes.into());

        headers
    }

    fn body(&self) -> RequestBody {
        RequestBody::Zeroes(self.bytes)
    }
}
