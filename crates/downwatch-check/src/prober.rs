//! Reachability probe.
//!
//! One HEAD request per call, no retries. Any HTTP response counts as
//! reachable regardless of status code; a failed connect, a timeout or an
//! empty response counts as unreachable.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::redirect::Policy;
use serde::Serialize;
use tracing::debug;

use downwatch_core::ProbeConfig;

use crate::error::CheckResult;

/// Result of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// The endpoint answered with an HTTP response.
    Reachable,
    /// The connection failed, timed out, or returned nothing.
    Unreachable,
}

impl Verdict {
    pub fn is_reachable(self) -> bool {
        self == Verdict::Reachable
    }
}

/// Performs a single reachability check. Must not touch persisted state.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, address: &str) -> Verdict;
}

/// HTTP(S) prober backed by a shared `reqwest` client.
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new(config: &ProbeConfig) -> CheckResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .redirect(Policy::none())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, address: &str) -> Verdict {
        match self.client.head(address).send().await {
            Ok(resp) => {
                debug!(%address, status = %resp.status(), "probe answered");
                Verdict::Reachable
            }
            Err(e) => {
                debug!(%address, error = %e, "probe failed");
                Verdict::Unreachable
            }
        }
    }
}
