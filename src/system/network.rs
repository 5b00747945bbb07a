use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::link::{LinkInfo, LinkMetadata};

const SYSFS_NET: &str = "/sys/class/net";

/// The host's default route, as reported by the OS routing tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultRoute {
    pub gateway: Option<String>,
    pub device: Option<String>,
}

/// Look up the default route.
///
/// `Ok(None)` means the routing table was readable and has no default route;
/// `Err` means neither `ip` (Linux) nor `route` (macOS) could be queried.
pub fn default_route() -> std::io::Result<Option<DefaultRoute>> {
    // Linux 'ip route' first
    match Command::new("ip").args(["route", "show", "default"]).output() {
        Ok(output) if output.status.success() => {
            return Ok(parse_ip_route(&String::from_utf8_lossy(&output.stdout)));
        }
        Ok(_) | Err(_) => {}
    }

    // macOS 'route -n get default'. Exits non-zero when there is no default.
    let output = Command::new("route").args(["-n", "get", "default"]).output()?;
    if output.status.success() {
        Ok(parse_route_get(&String::from_utf8_lossy(&output.stdout)))
    } else {
        Ok(None)
    }
}

/// Initial reachability for the connectivity observer: a default route means
/// reachable. `None` when the routing table cannot be read.
pub fn reachability() -> Option<bool> {
    match default_route() {
        Ok(route) => {
            debug!(?route, "default route lookup");
            Some(route.is_some())
        }
        Err(e) => {
            debug!(error = %e, "routing table unavailable, reachability unknown");
            None
        }
    }
}

/// format: default via 192.168.1.1 dev eth0 proto dhcp ...
fn parse_ip_route(output: &str) -> Option<DefaultRoute> {
    let line = output.lines().find(|l| l.trim_start().starts_with("default"))?;
    let mut gateway = None;
    let mut device = None;
    let mut words = line.split_whitespace();
    while let Some(word) = words.next() {
        match word {
            "via" => gateway = words.next().map(str::to_string),
            "dev" => device = words.next().map(str::to_string),
            _ => {}
        }
    }
    Some(DefaultRoute { gateway, device })
}

/// format: "   gateway: 192.168.1.1" / "  interface: en0"
fn parse_route_get(output: &str) -> Option<DefaultRoute> {
    let mut gateway = None;
    let mut device = None;
    for line in output.lines() {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        match key.trim() {
            "gateway" => gateway = Some(value.trim().to_string()),
            "interface" => device = Some(value.trim().to_string()),
            _ => {}
        }
    }
    if gateway.is_none() && device.is_none() {
        return None;
    }
    Some(DefaultRoute { gateway, device })
}

/// Link metadata for the default-route interface, read from sysfs.
///
/// Wireless interfaces usually report no `speed`, so the downlink hint is only
/// present for wired links. There is no OS equivalent of an "effective type".
pub struct SysfsLinkMetadata {
    root: PathBuf,
    device: Option<String>,
}

impl SysfsLinkMetadata {
    pub fn detect() -> Self {
        let device = default_route().ok().flatten().and_then(|r| r.device);
        Self::new(SYSFS_NET, device)
    }

    pub fn new(root: impl Into<PathBuf>, device: Option<String>) -> Self {
        Self {
            root: root.into(),
            device,
        }
    }
}

impl LinkMetadata for SysfsLinkMetadata {
    fn link_info(&self) -> LinkInfo {
        let Some(device) = &self.device else {
            return LinkInfo::unknown();
        };
        let dir = self.root.join(device);
        LinkInfo {
            link_type: link_type(&dir),
            effective_type: None,
            downlink_mbps: link_speed_mbps(&dir),
        }
    }
}

fn link_type(dir: &Path) -> Option<String> {
    if dir.join("wireless").exists() {
        return Some("wifi".to_string());
    }
    // ARPHRD_ETHER
    match std::fs::read_to_string(dir.join("type")).ok()?.trim() {
        "1" => Some("ethernet".to_string()),
        _ => Some("other".to_string()),
    }
}

fn link_speed_mbps(dir: &Path) -> Option<f64> {
    // -1 or unreadable when the link is down or the driver does not say
    let speed: i64 = std::fs::read_to_string(dir.join("speed")).ok()?.trim().parse().ok()?;
    (speed > 0).then_some(speed as f64)
}
