use crate::errors::SpeedLensError;
use crate::probe::requests::{Request, RequestBody, UA};
use log::debug;
use reqwest::{Body, Client as ReqwestClient, RequestBuilder};
use std::time::Duration;

/// What came back from one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    /// HTTP status code
    pub status: u16,
    /// Response body bytes read, 0 when the body is not read
    pub bytes: u64,
}

impl Transfer {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends probe requests. Implemented by [`Client`] and by test doubles.
///
/// A transport only fails when no response arrived at all. Any status
/// code is a successful transfer; callers decide what a status means.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send<R: Request>(&self, request: &R) -> Result<Transfer, SpeedLensError>;
}

impl<T: Transport> Transport for &T {
    async fn send<R: Request>(&self, request: &R) -> Result<Transfer, SpeedLensError> {
        (**self).send(request).await
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    client: ReqwestClient,
}

impl Client {
    /// Build a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, SpeedLensError> {
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .user_agent(UA)
            .build()?;

        Ok(Client { client })
    }
}

impl Transport for Client {
    async fn send<R: Request>(&self, request: &R) -> Result<Transfer, SpeedLensError> {
        let url = request.url();

        let response = self
            .client
            .request(R::METHOD, url.clone())
            .headers(request.headers())
            .probe_body(request.body())
            .send()
            .await?;

        let status = response.status().as_u16();

        let bytes = if request.reads_body() {
            response.bytes().await?.len() as u64
        } else {
            0
        };

        debug!("{} {} -> {} ({} bytes)", R::METHOD, url, status, bytes);

        Ok(Transfer { status, bytes })
    }
}

trait RequestBuilderExt: Sized {
    fn probe_body(self, body: RequestBody) -> Self;
}

impl RequestBuilderExt for RequestBuilder {
    fn probe_body(self, body: RequestBody) -> Self {
        match body {
            RequestBody::None => self,
            RequestBody::Zeroes(n) => self.body(Body::from(vec![0u8; n])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_is_success() {
        assert!(Transfer { status: 200, bytes: 0 }.is_success());
        assert!(Transfer { status: 204, bytes: 0 }.is_success());
        assert!(!Transfer { status: 301, bytes: 0 }.is_success());
        assert!(!Transfer { status: 503, bytes: 0 }.is_success());
    }

    #[test]
    fn test_client_builds() {
        assert!(Client::new(Duration::from_secs(10)).is_ok());
    }
}
