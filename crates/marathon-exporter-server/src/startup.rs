//! Startup connectivity check against `/v2/info`.
//!
//! Runs before the exporter starts serving; unlike scrapes it retries.

use std::time::Duration;

use serde::Deserialize;

use marathon_exporter_core::error::{ExporterError, Result};

use crate::fetch::{Fetcher, INFO_PATH};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MarathonInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

async fn fetch_info(fetcher: &dyn Fetcher) -> Result<MarathonInfo> {
    let body = fetcher.fetch(INFO_PATH).await?;
    serde_json::from_slice(&body).map_err(|e| ExporterError::Parse(format!("invalid info document: {e}")))
}

/// Poll the source until it answers, doubling the delay between attempts.
pub async fn wait_for_source(fetcher: &dyn Fetcher, instance: &str, policy: RetryPolicy) -> Result<MarathonInfo> {
    let mut delay = policy.initial_delay;
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match fetch_info(fetcher).await {
            Ok(info) => {
                tracing::info!(%instance, name = %info.name, version = %info.version, "connected to Marathon");
                return Ok(info);
            }
            Err(e) => {
                tracing::debug!(%instance, attempt, error = %e, "problem connecting to Marathon");
                if policy.max_attempts.is_some_and(|max| attempt >= max) {
                    return Err(e);
                }
                tracing::info!(%instance, retry_in = ?delay, "couldn't connect to Marathon, retrying");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(policy.max_delay);
            }
        }
    }
}
