//! Environment-reported link metadata (link type, effective type, downlink
//! capacity). Every field is optional; a missing capability degrades to
//! "unknown" rather than an error.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::LinkConfig;
use crate::system::network::SysfsLinkMetadata;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkInfo {
    pub link_type: Option<String>,
    pub effective_type: Option<String>,
    pub downlink_mbps: Option<f64>,
}

impl LinkInfo {
    pub fn unknown() -> Self {
        Self::default()
    }

    /// Fill the gaps in `self` from `other`.
    pub fn or(self, other: LinkInfo) -> LinkInfo {
        LinkInfo {
            link_type: self.link_type.or(other.link_type),
            effective_type: self.effective_type.or(other.effective_type),
            downlink_mbps: self.downlink_mbps.or(other.downlink_mbps),
        }
    }

    pub fn link_type_label(&self) -> &str {
        self.link_type.as_deref().unwrap_or("unknown")
    }

    pub fn effective_type_label(&self) -> &str {
        self.effective_type.as_deref().unwrap_or("unknown")
    }
}

/// Read-only link metadata query supplied by the environment.
pub trait LinkMetadata: Send + Sync {
    fn link_info(&self) -> LinkInfo;
}

/// Environment without any link metadata capability.
pub struct NoLinkMetadata;

impl LinkMetadata for NoLinkMetadata {
    fn link_info(&self) -> LinkInfo {
        LinkInfo::unknown()
    }
}

/// Fixed values, typically from configuration.
pub struct StaticLinkMetadata(pub LinkInfo);

impl LinkMetadata for StaticLinkMetadata {
    fn link_info(&self) -> LinkInfo {
        self.0.clone()
    }
}

/// Static values first, detected values for whatever is left unset.
pub struct LayeredLinkMetadata {
    overrides: LinkInfo,
    fallback: Box<dyn LinkMetadata>,
}

impl LayeredLinkMetadata {
    pub fn new(overrides: LinkInfo, fallback: Box<dyn LinkMetadata>) -> Self {
        Self { overrides, fallback }
    }
}

impl LinkMetadata for LayeredLinkMetadata {
    fn link_info(&self) -> LinkInfo {
        self.overrides.clone().or(self.fallback.link_info())
    }
}

/// Build the link metadata source described by `[link]`.
pub fn from_config(cfg: &LinkConfig) -> Arc<dyn LinkMetadata> {
    let overrides = LinkInfo {
        link_type: cfg.link_type.clone(),
        effective_type: cfg.effective_type.clone(),
        downlink_mbps: cfg.downlink_mbps,
    };
    match (cfg.detect, cfg.has_static_values()) {
        (true, true) => Arc::new(LayeredLinkMetadata::new(
            overrides,
            Box::new(SysfsLinkMetadata::detect()),
        )),
        (true, false) => Arc::new(SysfsLinkMetadata::detect()),
        (false, true) => Arc::new(StaticLinkMetadata(overrides)),
        (false, false) => Arc::new(NoLinkMetadata),
    }
}
