//! Active network probes and the error taxonomy they share.
//!
//! Probe failures never escape to callers of the diagnostics runner: every
//! probe exposes a fallible `try_*` method and an infallible wrapper that logs
//! the failure and reports an absent sample instead.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA};
use reqwest::Client;
use thiserror::Error;
use tracing::warn;

use crate::config::ProbeConfig;

pub mod http;

#[derive(Debug, Error)]
pub enum ProbeError {
    /// DNS resolution or TCP/TLS connect failed.
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("probe exceeded its {}ms bound", .0.as_millis())]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The transfer finished faster than the clock can resolve, so no rate
    /// can be derived.
    #[error("transfer completed in zero elapsed time")]
    ZeroElapsed,
}

impl ProbeError {
    /// Sort a reqwest failure into the probe taxonomy.
    pub fn from_request(err: reqwest::Error, bound: Duration) -> Self {
        if err.is_timeout() {
            ProbeError::Timeout(bound)
        } else if err.is_connect() {
            ProbeError::NetworkUnreachable(err.to_string())
        } else {
            ProbeError::Transport(err)
        }
    }
}

/// Round-trip timing against a remote endpoint.
#[async_trait::async_trait]
pub trait LatencyProbe: Send + Sync {
    /// One round trip, in whole milliseconds.
    async fn try_measure(&self) -> Result<u64, ProbeError>;

    /// One round trip, or `None` when the probe failed.
    async fn measure(&self) -> Option<u64> {
        match self.try_measure().await {
            Ok(ms) => Some(ms),
            Err(e) => {
                warn!(error = %e, "latency probe failed");
                None
            }
        }
    }
}

/// Shared HTTP client for the probes. Caching is disabled at the request
/// level so repeated runs measure the network rather than a cache.
pub fn build_client(cfg: &ProbeConfig) -> Result<Client, ProbeError> {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

    let client = Client::builder()
        .user_agent(cfg.user_agent.as_str())
        .default_headers(headers)
        .connect_timeout(cfg.latency_timeout())
        .build()?;
    Ok(client)
}

/// Whole milliseconds, saturating.
pub(crate) fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
