//! Approximate throughput: a timed single-connection download plus a
//! downlink-derived upload figure.
//!
//! Both numbers are estimates. The download rate assumes a nominal resource
//! size and inherits whatever the remote endpoint can serve; the upload rate
//! is not measured at all (see [`derive_upload`]).

pub mod http;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::probes::ProbeError;

pub use self::http::HttpThroughputProbe;

/// Ratio applied to the environment's downlink hint to approximate upload.
pub const UPLOAD_FROM_DOWNLINK_RATIO: f64 = 0.8;

const BITS_PER_MEGABIT: f64 = 1_048_576.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Download,
    Upload,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Download => write!(f, "download"),
            Direction::Upload => write!(f, "upload"),
        }
    }
}

/// A bitrate in megabits per second, rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThroughputSample {
    pub direction: Direction,
    pub mbps: f64,
}

impl ThroughputSample {
    pub fn download(mbps: f64) -> Self {
        Self {
            direction: Direction::Download,
            mbps: round2(mbps),
        }
    }

    pub fn upload(mbps: f64) -> Self {
        Self {
            direction: Direction::Upload,
            mbps: round2(mbps),
        }
    }
}

/// Timed bulk transfer.
#[async_trait::async_trait]
pub trait ThroughputProbe: Send + Sync {
    async fn try_measure_download(&self) -> Result<ThroughputSample, ProbeError>;

    /// Download rate, or `None` when the transfer failed.
    async fn measure_download(&self) -> Option<ThroughputSample> {
        match self.try_measure_download().await {
            Ok(sample) => Some(sample),
            Err(e) => {
                warn!(error = %e, "download probe failed");
                None
            }
        }
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `(nominal_bytes * 8) / seconds / 2^20`, rounded to two decimals.
///
/// `None` when no time elapsed.
pub fn speed_mbps(nominal_bytes: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return None;
    }
    let bits = nominal_bytes as f64 * 8.0;
    Some(round2(bits / secs / BITS_PER_MEGABIT))
}

/// Upload approximation from the environment's downlink capacity hint.
///
/// This is a labeled heuristic, not an upload test: no upload-capable
/// endpoint exists, so the figure is 80% of the reported downlink. Without a
/// usable hint there is no upload sample.
pub fn derive_upload(downlink_mbps_hint: Option<f64>) -> Option<ThroughputSample> {
    let hint = downlink_mbps_hint?;
    if !hint.is_finite() || hint < 0.0 {
        warn!(hint, "ignoring unusable downlink hint");
        return None;
    }
    Some(ThroughputSample::upload(hint * UPLOAD_FROM_DOWNLINK_RATIO))
}
