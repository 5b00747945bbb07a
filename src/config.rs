//! TOML configuration for netpulse.
//!
//! Layered lookup: explicit path, then the `NETPULSE_CONFIG` environment
//! variable, then `/etc/netpulse/netpulse.toml`, then compiled-in defaults.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Environment variable naming an alternate config file.
pub const CONFIG_ENV_VAR: &str = "NETPULSE_CONFIG";

const SYSTEM_CONFIG_PATH: &str = "/etc/netpulse/netpulse.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetpulseConfig {
    #[serde(default)]
    pub probes: ProbeConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl NetpulseConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Resolve the configuration. An explicit path must load; the env var and
    /// system locations fall through to defaults with a warning.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        Ok(Self::load_or_default())
    }

    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "{CONFIG_ENV_VAR} set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Probes
// ---------------------------------------------------------------------------

/// Endpoints and bounds for the latency and download probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Small, highly available resource used for round-trip timing.
    pub latency_url: String,
    /// Moderately large resource fetched for the download estimate.
    pub download_url: String,
    /// Assumed size of the download resource in bytes. This is an estimate
    /// fed into the bitrate formula, not something the probe verifies.
    pub nominal_download_bytes: u64,
    /// Upper bound on a latency measurement (milliseconds).
    pub latency_timeout_ms: u64,
    /// Upper bound on a download measurement, body included (milliseconds).
    pub download_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            latency_url: "https://www.google.com/favicon.ico".to_string(),
            download_url: "https://via.placeholder.com/1000x1000.jpg".to_string(),
            nominal_download_bytes: 5_000_000,
            latency_timeout_ms: 10_000,
            download_timeout_ms: 30_000,
            user_agent: concat!("netpulse/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ProbeConfig {
    pub fn latency_timeout(&self) -> Duration {
        Duration::from_millis(self.latency_timeout_ms)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_millis(self.download_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// Link metadata
// ---------------------------------------------------------------------------

/// Link metadata source. Static values here take precedence over detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Read link type and speed of the default-route interface from sysfs.
    pub detect: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_type: Option<String>,
    /// Downlink capacity hint (Mbps) used for the upload approximation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downlink_mbps: Option<f64>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            detect: true,
            link_type: None,
            effective_type: None,
            downlink_mbps: None,
        }
    }
}

impl LinkConfig {
    pub fn has_static_values(&self) -> bool {
        self.link_type.is_some() || self.effective_type.is_some() || self.downlink_mbps.is_some()
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8181".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    /// `RUST_LOG` wins when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Pretty,
    Json,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = NetpulseConfig::default();

        assert_eq!(cfg.probes.latency_url, "https://www.google.com/favicon.ico");
        assert_eq!(cfg.probes.nominal_download_bytes, 5_000_000);
        assert_eq!(cfg.probes.latency_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.probes.download_timeout(), Duration::from_secs(30));
        assert!(cfg.probes.user_agent.starts_with("netpulse/"));

        assert!(cfg.link.detect);
        assert!(!cfg.link.has_static_values());

        assert_eq!(cfg.server.bind, "127.0.0.1:8181");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[probes]
latency_url = "http://192.0.2.1/ping"
download_url = "http://192.0.2.1/blob"
nominal_download_bytes = 1048576
latency_timeout_ms = 2500
download_timeout_ms = 15000
user_agent = "probe-test"

[link]
detect = false
link_type = "wifi"
effective_type = "4g"
downlink_mbps = 10.0

[server]
bind = "0.0.0.0:9000"

[logging]
level = "debug"
format = "json"
"#;

        let cfg: NetpulseConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(cfg.probes.latency_url, "http://192.0.2.1/ping");
        assert_eq!(cfg.probes.download_url, "http://192.0.2.1/blob");
        assert_eq!(cfg.probes.nominal_download_bytes, 1_048_576);
        assert_eq!(cfg.probes.latency_timeout(), Duration::from_millis(2500));
        assert_eq!(cfg.probes.user_agent, "probe-test");
        assert!(!cfg.link.detect);
        assert_eq!(cfg.link.link_type.as_deref(), Some("wifi"));
        assert_eq!(cfg.link.effective_type.as_deref(), Some("4g"));
        assert_eq!(cfg.link.downlink_mbps, Some(10.0));
        assert!(cfg.link.has_static_values());
        assert_eq!(cfg.server.bind, "0.0.0.0:9000");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let cfg: NetpulseConfig = toml::from_str(
            r#"
[probes]
latency_timeout_ms = 500
"#,
        )
        .unwrap();

        assert_eq!(cfg.probes.latency_timeout_ms, 500);
        assert_eq!(cfg.probes.download_timeout_ms, 30_000);
        assert_eq!(cfg.probes.nominal_download_bytes, 5_000_000);
        assert!(cfg.link.detect);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("netpulse.toml");
        std::fs::write(
            &path,
            r#"
[server]
bind = "127.0.0.1:9999"
"#,
        )
        .unwrap();

        let cfg = NetpulseConfig::load(&path).unwrap();
        assert_eq!(cfg.server.bind, "127.0.0.1:9999");

        let resolved = NetpulseConfig::resolve(Some(&path)).unwrap();
        assert_eq!(resolved.server.bind, "127.0.0.1:9999");
    }

    #[test]
    fn test_explicit_missing_file_errors() {
        assert!(NetpulseConfig::load(Path::new("/nonexistent/netpulse.toml")).is_err());
        assert!(NetpulseConfig::resolve(Some(Path::new("/nonexistent/netpulse.toml"))).is_err());
    }

    #[test]
    fn test_invalid_toml_errors() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[probes\nlatency_url = ").unwrap();
        assert!(NetpulseConfig::load(&path).is_err());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let cfg = NetpulseConfig::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let back: NetpulseConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(cfg.probes.download_url, back.probes.download_url);
        assert_eq!(cfg.probes.nominal_download_bytes, back.probes.nominal_download_bytes);
        assert_eq!(back.link.downlink_mbps, None);
    }
}
