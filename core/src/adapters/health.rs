//! HTTP health probe adapter.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::ports::HealthProbePort;

/// Body shape of a health endpoint that reports `{"status": "..."}`.
#[derive(Debug, Deserialize)]
struct HealthBody {
    status: Option<String>,
}

/// Probes a `GET /health` style endpoint with reqwest.
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    client: reqwest::Client,
}

impl HttpHealthProbe {
    /// Create a probe whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl HealthProbePort for HttpHealthProbe {
    async fn probe(&self, url: &str, expect_status: Option<&str>) -> Result<()> {
        let failed = |reason: String| Error::HealthCheckFailed {
            url: url.to_string(),
            reason,
        };

        tracing::debug!(url, "Probing health endpoint");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {}", status)));
        }

        let Some(expected) = expect_status else {
            return Ok(());
        };

        let body: HealthBody = response
            .json()
            .await
            .map_err(|e| failed(format!("invalid health body: {}", e)))?;

        match body.status.as_deref() {
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => Err(failed(format!(
                "status is \"{}\", expected \"{}\"",
                actual, expected
            ))),
            None => Err(failed("response has no status field".to_string())),
        }
    }
}
