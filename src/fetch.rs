//! Reading data sources from disk or over HTTP.

use async_trait::async_trait;
use reqwest::{Request, Response};
use tracing::debug;

use crate::error::{Error, Result};

/// Executes HTTP requests. Implemented by [`BasicClient`]; wrappers can decorate requests.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub fn new() -> Self {
        Self(reqwest::Client::new())
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

pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = Request::new(
        reqwest::Method::GET,
        url.parse::<reqwest::Url>()
            .map_err(|e| Error::data_load(url, e))?,
    );

    let resp = client
        .execute(req)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| Error::data_load(url, e))?;
    let bytes = resp.bytes().await.map_err(|e| Error::data_load(url, e))?;
    Ok(bytes.to_vec())
}

pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Loads a source from a local file path or fetches it over HTTP.
#[tracing::instrument(skip(client))]
pub async fn read_source<C: HttpClient>(client: &C, source: &str) -> Result<Vec<u8>> {
    let bytes = if is_url(source) {
        fetch_bytes(client, source).await?
    } else {
        tokio::fs::read(source)
            .await
            .map_err(|e| Error::data_load(source, e))?
    };
    debug!(bytes = bytes.len(), "Source read");
    Ok(bytes)
}
