//! Single-connection HTTP download probe.

use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::{debug, warn};

use super::{speed_mbps, ThroughputProbe, ThroughputSample};
use crate::config::ProbeConfig;
use crate::probes::{build_client, ProbeError};

/// Fetches one moderately large resource and converts the elapsed time into
/// a bitrate using a configured nominal size.
///
/// The received byte count is logged for comparison but deliberately not used
/// in the formula: the nominal size is the contract, whatever the endpoint
/// actually served.
pub struct HttpThroughputProbe {
    client: Client,
    url: String,
    nominal_bytes: u64,
    bound: Duration,
}

impl HttpThroughputProbe {
    pub fn new(cfg: &ProbeConfig) -> Result<Self, ProbeError> {
        Ok(Self::with_client(build_client(cfg)?, cfg))
    }

    pub fn with_client(client: Client, cfg: &ProbeConfig) -> Self {
        Self {
            client,
            url: cfg.download_url.clone(),
            nominal_bytes: cfg.nominal_download_bytes,
            bound: cfg.download_timeout(),
        }
    }

    /// Request, then drain the body. Returns bytes actually received.
    async fn fetch(&self) -> Result<u64, ProbeError> {
        // Unique query value defeats intermediary caches that ignore headers.
        let token = uuid::Uuid::new_v4().simple().to_string();
        let mut response = self
            .client
            .get(&self.url)
            .query(&[("nocache", token.as_str())])
            .send()
            .await
            .map_err(|e| ProbeError::from_request(e, self.bound))?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %self.url, status = status.as_u16(), "download endpoint returned non-success status");
        }

        let mut received: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ProbeError::from_request(e, self.bound))?
        {
            received += chunk.len() as u64;
        }
        Ok(received)
    }
}

#[async_trait::async_trait]
impl ThroughputProbe for HttpThroughputProbe {
    async fn try_measure_download(&self) -> Result<ThroughputSample, ProbeError> {
        let start = Instant::now();
        let received = tokio::time::timeout(self.bound, self.fetch())
            .await
            .map_err(|_| ProbeError::Timeout(self.bound))??;
        let elapsed = start.elapsed();

        let mbps = speed_mbps(self.nominal_bytes, elapsed).ok_or(ProbeError::ZeroElapsed)?;
        debug!(
            url = %self.url,
            nominal_bytes = self.nominal_bytes,
            received_bytes = received,
            elapsed_ms = elapsed.as_millis() as u64,
            mbps,
            "download probe finished"
        );
        Ok(ThroughputSample::download(mbps))
    }
}
