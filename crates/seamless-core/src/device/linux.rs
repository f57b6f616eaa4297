//! Linux probes over `/sys/class/net`, `/sys/class/power_supply` and `/proc/loadavg`.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{DeviceProbe, DeviceStatus, NetworkHandle, NetworkMonitor};

/// Battery at or below this percentage counts as low while not charging.
const LOW_BATTERY_PERCENT: u8 = 15;

/// Interface name prefixes of mobile-broadband links, treated as metered.
const METERED_PREFIXES: [&str; 3] = ["wwan", "rmnet", "usb"];

pub struct SysfsProbe {
    net_root: PathBuf,
    power_root: PathBuf,
    loadavg_path: PathBuf,
    idle_load_threshold: f64,
}

impl SysfsProbe {
    pub fn new(idle_load_threshold: f64) -> Self {
        Self::with_roots(
            "/sys/class/net",
            "/sys/class/power_supply",
            "/proc/loadavg",
            idle_load_threshold,
        )
    }

    /// Probe rooted somewhere other than the live system (tests, containers).
    pub fn with_roots(
        net_root: impl Into<PathBuf>,
        power_root: impl Into<PathBuf>,
        loadavg_path: impl Into<PathBuf>,
        idle_load_threshold: f64,
    ) -> Self {
        Self {
            net_root: net_root.into(),
            power_root: power_root.into(),
            loadavg_path: loadavg_path.into(),
            idle_load_threshold,
        }
    }

    fn battery(&self) -> (bool, bool) {
        let Ok(entries) = fs::read_dir(&self.power_root) else {
            // No power_supply class: mains-powered machine.
            return (false, true);
        };
        let mut capacity: Option<u8> = None;
        let mut charging = false;
        let mut has_battery = false;
        for entry in entries.flatten() {
            let dir = entry.path();
            match read_trimmed(&dir.join("type")).as_deref() {
                Some("Battery") => {
                    has_battery = true;
                    if let Some(c) = read_trimmed(&dir.join("capacity")).and_then(|s| s.parse().ok()) {
                        capacity = Some(capacity.map_or(c, |prev: u8| prev.min(c)));
                    }
                    if matches!(
                        read_trimmed(&dir.join("status")).as_deref(),
                        Some("Charging") | Some("Full")
                    ) {
                        charging = true;
                    }
                }
                Some("Mains") | Some("USB") => {
                    if read_trimmed(&dir.join("online")).as_deref() == Some("1") {
                        charging = true;
                    }
                }
                _ => {}
            }
        }
        if !has_battery {
            return (false, true);
        }
        let low = !charging && capacity.is_some_and(|c| c <= LOW_BATTERY_PERCENT);
        (low, charging)
    }

    fn idle(&self) -> bool {
        let load = read_trimmed(&self.loadavg_path)
            .and_then(|s| s.split_whitespace().next().and_then(|f| f.parse::<f64>().ok()));
        match load {
            Some(l) => l < self.idle_load_threshold,
            None => false,
        }
    }
}

impl NetworkMonitor for SysfsProbe {
    /// First interface that is up, preferring unmetered, then wired, then by name.
    fn active_network(&self) -> Option<NetworkHandle> {
        let entries = fs::read_dir(&self.net_root).ok()?;
        let mut candidates: Vec<NetworkHandle> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name == "lo" {
                    return None;
                }
                let dir = entry.path();
                if read_trimmed(&dir.join("operstate")).as_deref() != Some("up") {
                    return None;
                }
                let wireless = dir.join("wireless").exists() || dir.join("phy80211").exists();
                let metered = METERED_PREFIXES.iter().any(|p| name.starts_with(p));
                Some(NetworkHandle {
                    interface: name,
                    metered,
                    roaming: false,
                    wireless,
                })
            })
            .collect();
        candidates.sort_by(|a, b| {
            (a.metered, a.wireless, &a.interface).cmp(&(b.metered, b.wireless, &b.interface))
        });
        let active = candidates.into_iter().next();
        debug!(network = ?active, "active network lookup");
        active
    }
}

impl DeviceProbe for SysfsProbe {
    fn status(&self) -> DeviceStatus {
        let (battery_low, charging) = self.battery();
        DeviceStatus {
            network: self.active_network(),
            battery_low,
            charging,
            idle: self.idle(),
        }
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}
