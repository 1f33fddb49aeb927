use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use marathon_exporter_core::error::{ExporterError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    pub version: u32,

    #[serde(default)]
    pub exporter: ExporterSection,

    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl ExporterConfig {
    /// Version-1 config with default exporter settings and no sources.
    pub fn empty() -> Self {
        Self {
            version: 1,
            exporter: ExporterSection::default(),
            sources: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ExporterError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        if self.sources.is_empty() {
            return Err(ExporterError::Config("sources must not be empty".into()));
        }

        self.exporter.validate()?;
        for source in &self.sources {
            source.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for ExporterSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            metrics_path: default_metrics_path(),
            namespace: default_namespace(),
        }
    }
}

impl ExporterSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if !self.metrics_path.starts_with('/') || matches!(self.metrics_path.as_str(), "/" | "/healthz") {
            return Err(ExporterError::Config(
                "exporter.metrics_path must start with '/' and must not be '/' or '/healthz'".into(),
            ));
        }
        // ':' and '*' would turn the path into a router capture
        if self.metrics_path.contains([':', '*']) {
            return Err(ExporterError::Config(format!(
                "exporter.metrics_path {:?} must not contain ':' or '*'",
                self.metrics_path
            )));
        }
        if !is_metric_identifier(&self.namespace) {
            return Err(ExporterError::Config(format!(
                "exporter.namespace {:?} is not a valid metric name prefix",
                self.namespace
            )));
        }
        Ok(())
    }

    /// Parsed listen address; `:port` binds every interface.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let listen = match self.listen.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{port}"),
            None => self.listen.clone(),
        };
        listen.parse().map_err(|e| {
            ExporterError::Config(format!("exporter.listen {:?} is invalid: {e}", self.listen))
        })
    }
}

fn is_metric_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn default_listen() -> String {
    "0.0.0.0:9088".into()
}
fn default_metrics_path() -> String {
    "/metrics".into()
}
fn default_namespace() -> String {
    "marathon".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub uri: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Marathon clusters commonly run with self-signed certificates.
    #[serde(default = "default_true")]
    pub insecure_skip_verify: bool,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub scrape_apps: bool,

    #[serde(default = "default_true")]
    pub startup_check: bool,
}

impl SourceConfig {
    /// Source with default settings, as created from `--marathon.uri`.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            timeout_ms: default_timeout_ms(),
            insecure_skip_verify: true,
            username: None,
            password: None,
            scrape_apps: false,
            startup_check: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.url()?;
        if !(1000..=120000).contains(&self.timeout_ms) {
            return Err(ExporterError::Config(format!(
                "source {}: timeout_ms must be between 1000 and 120000",
                self.uri
            )));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(ExporterError::Config(format!(
                "source {}: username and password must be set together",
                self.uri
            )));
        }
        Ok(())
    }

    pub fn url(&self) -> Result<Url> {
        let url = Url::parse(&self.uri)
            .map_err(|e| ExporterError::Config(format!("source uri {:?} is invalid: {e}", self.uri)))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ExporterError::Config(format!(
                "source uri {:?} must be an http(s) URL with a host",
                self.uri
            )));
        }
        Ok(url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Value of the `instance` label: `host` or `host:port`.
    pub fn instance_id(&self) -> Result<String> {
        let url = self.url()?;
        let host = url.host_str().unwrap_or_default();
        Ok(match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }

    /// Basic-auth credentials: explicit settings win over URI userinfo.
    pub fn credentials(&self) -> Result<Option<(String, String)>> {
        if let (Some(u), Some(p)) = (&self.username, &self.password) {
            return Ok(Some((u.clone(), p.clone())));
        }
        let url = self.url()?;
        Ok(match url.password() {
            Some(p) if !url.username().is_empty() => {
                Some((url.username().to_string(), p.to_string()))
            }
            _ => None,
        })
    }
}

fn default_timeout_ms() -> u64 {
    10000
}
fn default_true() -> bool {
    true
}
