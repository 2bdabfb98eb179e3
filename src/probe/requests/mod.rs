//! Typed descriptions of the HTTP requests a probe cycle issues.
//!
//! A request knows its method, target URL, headers and body. Sending and
//! timing it is the [`Transport`](crate::probe::Transport)'s job.

pub mod download;
pub mod ping;
pub mod upload;

pub use download::DownloadRequest;
pub use ping::PingRequest;
pub use upload::UploadRequest;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, USER_AGENT};
use reqwest::Method;
use url::Url;

pub(crate) const UA: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Payload attached to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestBody {
    None,
    /// `n` zero bytes
    Zeroes(usize),
}

impl RequestBody {
    pub fn len(&self) -> usize {
        match self {
            RequestBody::None => 0,
            RequestBody::Zeroes(n) => *n,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait Request {
    const METHOD: Method = Method::GET;

    fn url(&self) -> &Url;

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(USER_AGENT, HeaderValue::from_static(UA));

        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        headers
    }

    fn body(&self) -> RequestBody {
        RequestBody::None
    }

    /// Whether the response body should be read to the end.
    fn reads_body(&self) -> bool {
        Self::METHOD == Method::GET
    }
}

impl<R: Request> Request for &R {
    const METHOD: Method = R::METHOD;

    fn url(&self) -> &Url {
        (**self).url()
    }

    fn headers(&self) -> HeaderMap {
        (**self).headers()
    }

    fn body(&self) -> RequestBody {
        (**self).body()
    }

    fn reads_body(&self) -> bool {
        (**self).reads_body()
    }
}

/// Copy of `endpoint` with a `t=<millis>_<index>` query parameter, so
/// no cache between here and the server can answer the request.
pub fn cache_busted(endpoint: &Url, index: usize) -> Url {
    let mut url = endpoint.clone();
    let stamp = format!("{}_{}", Utc::now().timestamp_millis(), index);
    url.query_pairs_mut().append_pair("t", &stamp);
    url
}
