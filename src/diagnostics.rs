//! Diagnostics orchestration: connectivity check, latency probe, download
//! probe, upload approximation, grade.
//!
//! A runner executes at most one run at a time. Within a run the probes are
//! strictly sequential so the download never competes with the latency
//! measurement. Probe failures become absent samples; `run` itself only fails
//! when another run is in progress or the run is cancelled.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::NetpulseConfig;
use crate::connectivity::{ConnectivityObserver, ConnectivityState};
use crate::link::{self, LinkInfo, LinkMetadata};
use crate::probes::http::HttpLatencyProbe;
use crate::probes::{LatencyProbe, ProbeError};
use crate::quality::{classify, QualityGrade};
use crate::throughput::{derive_upload, HttpThroughputProbe, ThroughputProbe, ThroughputSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("a diagnostics run is already in progress")]
    AlreadyRunning,

    #[error("diagnostics run was cancelled")]
    Cancelled,
}

/// Outcome of one diagnostics run. Immutable; the next run replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsResult {
    pub connectivity: ConnectivityState,
    /// Round trip in milliseconds.
    pub latency_ms: Option<u64>,
    pub download: Option<ThroughputSample>,
    /// Derived from the downlink hint, never measured.
    pub upload: Option<ThroughputSample>,
    pub grade: QualityGrade,
    pub link: LinkInfo,
    pub measured_at: DateTime<Utc>,
}

impl DiagnosticsResult {
    /// All samples absent, graded `Disconnected`.
    pub fn disconnected(link: LinkInfo) -> Self {
        Self {
            connectivity: ConnectivityState::Offline,
            latency_ms: None,
            download: None,
            upload: None,
            grade: QualityGrade::Disconnected,
            link,
            measured_at: Utc::now(),
        }
    }
}

pub struct DiagnosticsRunner {
    observer: ConnectivityObserver,
    latency: Arc<dyn LatencyProbe>,
    throughput: Arc<dyn ThroughputProbe>,
    link: Arc<dyn LinkMetadata>,
    running: AtomicBool,
    /// Bumped on every run start and on cancel; only the current generation
    /// may publish a result.
    generation: AtomicU64,
    state: watch::Sender<RunState>,
    cancel: Mutex<CancellationToken>,
    last: Mutex<Option<Arc<DiagnosticsResult>>>,
}

impl DiagnosticsRunner {
    pub fn new(
        observer: ConnectivityObserver,
        latency: Arc<dyn LatencyProbe>,
        throughput: Arc<dyn ThroughputProbe>,
        link: Arc<dyn LinkMetadata>,
    ) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        Self {
            observer,
            latency,
            throughput,
            link,
            running: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            state,
            cancel: Mutex::new(CancellationToken::new()),
            last: Mutex::new(None),
        }
    }

    /// Wire the HTTP probes and link metadata described by `cfg`.
    pub fn from_config(cfg: &NetpulseConfig, observer: ConnectivityObserver) -> Result<Self, ProbeError> {
        let client = crate::probes::build_client(&cfg.probes)?;
        Ok(Self::new(
            observer,
            Arc::new(HttpLatencyProbe::with_client(client.clone(), &cfg.probes)),
            Arc::new(HttpThroughputProbe::with_client(client, &cfg.probes)),
            link::from_config(&cfg.link),
        ))
    }

    pub fn state(&self) -> RunState {
        if self.running.load(Ordering::Acquire) {
            RunState::Running
        } else {
            RunState::Idle
        }
    }

    pub fn subscribe_state(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    pub fn last_result(&self) -> Option<Arc<DiagnosticsResult>> {
        self.last_slot().clone()
    }

    pub fn connectivity(&self) -> &ConnectivityObserver {
        &self.observer
    }

    /// Execute one diagnostics run.
    ///
    /// Rejected with [`RunError::AlreadyRunning`] while another run is in
    /// progress. Dropping the returned future abandons the run: in-flight
    /// requests are aborted and the runner returns to idle.
    pub async fn run(&self) -> Result<DiagnosticsResult, RunError> {
        let guard = self.begin()?;
        let token = guard.token.clone();

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!(generation = guard.generation, "diagnostics run cancelled");
                return Err(RunError::Cancelled);
            }
            result = self.sequence() => result,
        };

        guard.publish(result)
    }

    /// Abort the in-flight run, if any. Its result is discarded.
    pub fn cancel(&self) -> bool {
        let token = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::AcqRel);
        token.cancel();
        self.running.load(Ordering::Acquire)
    }

    fn begin(&self) -> Result<RunGuard<'_>, RunError> {
        // Held until the new token and generation are installed, so a
        // concurrent `cancel()` sees either no run or this run's token.
        let mut current = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("run rejected, already running");
            return Err(RunError::AlreadyRunning);
        }

        let token = CancellationToken::new();
        *current = token.clone();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        drop(current);

        // Previous samples are cleared for the duration of the run.
        *self.last_slot() = None;
        self.state.send_replace(RunState::Running);
        info!(generation, "diagnostics run started");

        Ok(RunGuard {
            runner: self,
            generation,
            token,
        })
    }

    async fn sequence(&self) -> DiagnosticsResult {
        if self.observer.current() == ConnectivityState::Offline {
            info!("offline, skipping probes");
            return DiagnosticsResult::disconnected(self.link.link_info());
        }

        let latency_ms = self.latency.measure().await;
        debug!(?latency_ms, "latency probe done");

        let download = self.throughput.measure_download().await;
        debug!(download_mbps = download.map(|s| s.mbps), "download probe done");

        let link = self.link.link_info();
        let upload = derive_upload(link.downlink_mbps);

        // Connectivity may have changed while the probes were in flight.
        let connectivity = self.observer.current();
        DiagnosticsResult {
            connectivity,
            latency_ms,
            download,
            upload,
            grade: classify(connectivity, latency_ms),
            link,
            measured_at: Utc::now(),
        }
    }

    fn last_slot(&self) -> MutexGuard<'_, Option<Arc<DiagnosticsResult>>> {
        self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds the running flag for one run and releases it on drop, including
/// when the run future is abandoned mid-flight.
struct RunGuard<'a> {
    runner: &'a DiagnosticsRunner,
    generation: u64,
    token: CancellationToken,
}

impl RunGuard<'_> {
    /// Store `result` as the latest, unless this run has been superseded.
    fn publish(self, result: DiagnosticsResult) -> Result<DiagnosticsResult, RunError> {
        let mut slot = self.runner.last_slot();
        let current = self.runner.generation.load(Ordering::Acquire);
        if self.token.is_cancelled() || current != self.generation {
            debug!(generation = self.generation, current, "discarding superseded result");
            return Err(RunError::Cancelled);
        }
        *slot = Some(Arc::new(result.clone()));
        drop(slot);

        info!(
            generation = self.generation,
            connectivity = %result.connectivity,
            latency_ms = ?result.latency_ms,
            download_mbps = ?result.download.map(|s| s.mbps),
            upload_mbps = ?result.upload.map(|s| s.mbps),
            grade = %result.grade,
            "diagnostics run finished"
        );
        Ok(result)
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.runner.running.store(false, Ordering::Release);
        self.runner.state.send_replace(RunState::Idle);
    }
}
