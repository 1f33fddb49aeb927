//! Fetch collaborator: authenticated GETs against one Marathon instance.

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use marathon_exporter_core::error::{ExporterError, Result};

use crate::config::SourceConfig;

pub const METRICS_PATH: &str = "/metrics";
pub const APPS_PATH: &str = "/v2/apps";
pub const INFO_PATH: &str = "/v2/info";

/// Retrieves raw documents from a source. Paths are relative to the source URI.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, path: &str) -> Result<Bytes>;
}

/// `reqwest`-backed fetcher with timeouts, optional basic auth and optional
/// certificate verification.
pub struct HttpFetcher {
    client: reqwest::Client,
    base: String,
    auth: Option<(String, String)>,
}

impl HttpFetcher {
    pub fn new(source: &SourceConfig) -> Result<Self> {
        let auth = source.credentials()?;

        let mut url: Url = source.url()?;
        // credentials travel in the Authorization header, never in the URL
        url.set_username("")
            .and_then(|()| url.set_password(None))
            .map_err(|()| ExporterError::Config(format!("source uri {:?} cannot carry credentials", source.uri)))?;

        let client = reqwest::Client::builder()
            .timeout(source.timeout())
            .connect_timeout(source.timeout())
            .danger_accept_invalid_certs(source.insecure_skip_verify)
            .build()
            .map_err(|e| ExporterError::Transport(format!("http client init failed: {e}")))?;

        Ok(Self {
            client,
            base: url.as_str().trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, path: &str) -> Result<Bytes> {
        let url = self.url_for(path);
        let mut req = self.client.get(&url);
        if let Some((user, password)) = &self.auth {
            req = req.basic_auth(user, Some(password));
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ExporterError::Transport(format!("GET {url}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ExporterError::Transport(format!("GET {url}: status {status}")));
        }
        resp.bytes()
            .await
            .map_err(|e| ExporterError::Transport(format!("GET {url}: reading body: {e}")))
    }
}
