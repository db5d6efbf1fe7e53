use async_trait::async_trait;
use reqwest::{Request, Response};
use std::time::Duration;

/// Executes a prepared request. The seam between the transport and the
/// network, so tests can swap in canned replies.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

/// [`HttpClient`] backed by a shared `reqwest::Client`.
pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub fn new() -> Self {
        Self(reqwest::Client::new())
    }

    /// Builds a client that gives up on connection establishment after
    /// `connect_timeout`. The overall request deadline is enforced by
    /// [`connect`](super::connect) itself.
    pub fn with_connect_timeout(connect_timeout: Duration) -> reqwest::Result<Self> {
        let inner = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self(inner))
    }
}

impl From<reqwest::Client> for BasicClient {
    fn from(inner: reqwest::Client) -> Self {
        Self(inner)
    }
}

impl Default for BasicClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        self.0.execute(req).await
    }
}
