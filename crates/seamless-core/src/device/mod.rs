//! Device observation: active network, battery/charging, idleness.
//!
//! Lookups are synchronous and bounded (a handful of small sysfs/procfs
//! reads, no retries), so they are safe to call from async code.

mod linux;

pub use linux::SysfsProbe;

use serde::{Deserialize, Serialize};

/// The network a check should run over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkHandle {
    /// Interface name, e.g. `wlan0`.
    pub interface: String,
    pub metered: bool,
    pub roaming: bool,
    pub wireless: bool,
}

/// Snapshot of the conditions job descriptors are evaluated against.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceStatus {
    pub network: Option<NetworkHandle>,
    pub battery_low: bool,
    pub charging: bool,
    pub idle: bool,
}

pub trait NetworkMonitor: Send + Sync {
    /// The currently active network, if any.
    fn active_network(&self) -> Option<NetworkHandle>;
}

pub trait DeviceProbe: Send + Sync {
    fn status(&self) -> DeviceStatus;
}
