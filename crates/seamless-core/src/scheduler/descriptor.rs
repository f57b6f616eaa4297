//! Job descriptors handed to the job host.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::backoff::BackoffPolicy;
use crate::device::DeviceStatus;
use crate::store::{Constraints, NetworkType};

/// Job identifier. One slot per id on the host.
pub type JobId = i64;

/// The periodic update check.
pub const PERIODIC_JOB_ID: JobId = 1;
/// The one-shot reboot that waits for the device to go idle.
pub const IDLE_REBOOT_JOB_ID: JobId = 2;

/// Minimum delay before an armed idle reboot may fire.
pub const IDLE_REBOOT_MIN_LATENCY: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    UpdateCheck,
    IdleReboot,
}

/// Cadence and backoff of the periodic check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicSettings {
    pub interval: Duration,
    pub backoff: BackoffPolicy,
}

impl Default for PeriodicSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            backoff: BackoffPolicy::default(),
        }
    }
}

/// What the host should run and when it is allowed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job_id: JobId,
    pub kind: JobKind,
    /// Repeat interval; None for one-shot jobs.
    pub period: Option<Duration>,
    /// Delay after submission before the first run.
    pub min_latency: Duration,
    /// Required network; None if the job needs no network.
    pub network: Option<NetworkType>,
    pub battery_not_low: bool,
    pub requires_charging: bool,
    pub requires_device_idle: bool,
    /// Channel the check runs against (job extra, not a trigger condition).
    pub channel: Option<String>,
    pub backoff: BackoffPolicy,
}

impl JobDescriptor {
    /// Periodic update check whose conditions mirror `constraints`.
    pub fn update_check(constraints: &Constraints, periodic: &PeriodicSettings) -> Self {
        Self {
            job_id: PERIODIC_JOB_ID,
            kind: JobKind::UpdateCheck,
            period: Some(periodic.interval),
            min_latency: Duration::ZERO,
            network: Some(constraints.network_type),
            battery_not_low: constraints.battery_not_low,
            requires_charging: constraints.requires_charging,
            requires_device_idle: false,
            channel: Some(constraints.channel.clone()),
            backoff: periodic.backoff,
        }
    }

    pub fn idle_reboot() -> Self {
        Self {
            job_id: IDLE_REBOOT_JOB_ID,
            kind: JobKind::IdleReboot,
            period: None,
            min_latency: IDLE_REBOOT_MIN_LATENCY,
            network: None,
            battery_not_low: false,
            requires_charging: false,
            requires_device_idle: true,
            channel: None,
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn is_periodic(&self) -> bool {
        self.period.is_some()
    }

    pub fn conditions_met(&self, status: &DeviceStatus) -> bool {
        if let Some(network) = self.network {
            if !network.is_satisfied_by(status.network.as_ref()) {
                return false;
            }
        }
        (!self.battery_not_low || !status.battery_low)
            && (!self.requires_charging || status.charging)
            && (!self.requires_device_idle || status.idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::NetworkHandle;

    fn constraints() -> Constraints {
        Constraints {
            channel: "stable".into(),
            network_type: NetworkType::Unmetered,
            battery_not_low: true,
            requires_charging: false,
            idle_reboot_enabled: false,
        }
    }

    fn wifi() -> NetworkHandle {
        NetworkHandle {
            interface: "wlan0".into(),
            metered: false,
            roaming: false,
            wireless: true,
        }
    }

    #[test]
    fn update_check_translates_constraints() {
        let periodic = PeriodicSettings::default();
        let d = JobDescriptor::update_check(&constraints(), &periodic);
        assert_eq!(d.job_id, PERIODIC_JOB_ID);
        assert_eq!(d.network, Some(NetworkType::Unmetered));
        assert!(d.battery_not_low);
        assert!(!d.requires_charging);
        assert!(!d.requires_device_idle);
        assert_eq!(d.channel.as_deref(), Some("stable"));
        assert_eq!(d.period, Some(periodic.interval));
    }

    #[test]
    fn update_check_needs_matching_network_and_battery() {
        let d = JobDescriptor::update_check(&constraints(), &PeriodicSettings::default());
        let mut status = DeviceStatus {
            network: Some(wifi()),
            ..DeviceStatus::default()
        };
        assert!(d.conditions_met(&status));

        status.battery_low = true;
        assert!(!d.conditions_met(&status));

        status.battery_low = false;
        status.network = Some(NetworkHandle {
            metered: true,
            ..wifi()
        });
        assert!(!d.conditions_met(&status));

        status.network = None;
        assert!(!d.conditions_met(&status));
    }

    #[test]
    fn charging_requirement() {
        let mut c = constraints();
        c.requires_charging = true;
        let d = JobDescriptor::update_check(&c, &PeriodicSettings::default());
        let mut status = DeviceStatus {
            network: Some(wifi()),
            ..DeviceStatus::default()
        };
        assert!(!d.conditions_met(&status));
        status.charging = true;
        assert!(d.conditions_met(&status));
    }

    #[test]
    fn idle_reboot_needs_only_idleness() {
        let d = JobDescriptor::idle_reboot();
        assert!(!d.is_periodic());
        assert!(!d.conditions_met(&DeviceStatus::default()));
        assert!(d.conditions_met(&DeviceStatus {
            idle: true,
            battery_low: true,
            ..DeviceStatus::default()
        }));
    }

    #[test]
    fn wifi_only_rejects_wired() {
        let mut c = constraints();
        c.network_type = NetworkType::WifiOnly;
        let d = JobDescriptor::update_check(&c, &PeriodicSettings::default());
        let wired = NetworkHandle {
            interface: "eth0".into(),
            metered: false,
            roaming: false,
            wireless: false,
        };
        assert!(!d.conditions_met(&DeviceStatus {
            network: Some(wired),
            ..DeviceStatus::default()
        }));
    }
}
