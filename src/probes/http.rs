use super::{build_client, duration_ms, LatencyProbe, ProbeError};
use crate::config::ProbeConfig;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

/// HTTP round-trip probe.
///
/// Any HTTP-level response counts as a completed round trip, whatever its
/// status. An erroring endpoint or an intercepting proxy therefore still
/// looks reachable; only transport failures produce an absent sample. The
/// body is never read since nothing is assumed about the payload.
pub struct HttpLatencyProbe {
    client: Client,
    url: String,
    bound: Duration,
}

impl HttpLatencyProbe {
    pub fn new(cfg: &ProbeConfig) -> Result<Self, ProbeError> {
        Ok(Self::with_client(build_client(cfg)?, cfg))
    }

    pub fn with_client(client: Client, cfg: &ProbeConfig) -> Self {
        Self {
            client,
            url: cfg.latency_url.clone(),
            bound: cfg.latency_timeout(),
        }
    }
}

#[async_trait::async_trait]
impl LatencyProbe for HttpLatencyProbe {
    async fn try_measure(&self) -> Result<u64, ProbeError> {
        let start = Instant::now();
        let response = tokio::time::timeout(self.bound, self.client.get(&self.url).send())
            .await
            .map_err(|_| ProbeError::Timeout(self.bound))?
            .map_err(|e| ProbeError::from_request(e, self.bound))?;
        let rtt_ms = duration_ms(start.elapsed());

        debug!(url = %self.url, status = response.status().as_u16(), rtt_ms, "latency probe response");
        Ok(rtt_ms)
    }
}
