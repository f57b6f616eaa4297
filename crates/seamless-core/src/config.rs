use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::scheduler::{BackoffKind, BackoffPolicy, PeriodicSettings};
use crate::store::{Constraints, NetworkType};

/// Static defaults applied when a setting has never been stored (or is malformed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintDefaults {
    /// Update channel, e.g. "stable" or "beta".
    pub channel: String,
    /// Network type as its persisted integer (1 = any, 2 = unmetered, 3 = not roaming, 4 = wifi only).
    pub network_type: i64,
    pub battery_not_low: bool,
    pub requires_charging: bool,
    /// Reboot automatically once the device is idle after an update was applied.
    pub idle_reboot: bool,
}

impl Default for ConstraintDefaults {
    fn default() -> Self {
        Self {
            channel: "stable".to_string(),
            network_type: NetworkType::Any.as_i64(),
            battery_not_low: true,
            requires_charging: false,
            idle_reboot: false,
        }
    }
}

impl ConstraintDefaults {
    /// Network type default; an out-of-range integer in the config file means `Any`.
    pub fn network_type(&self) -> NetworkType {
        NetworkType::from_i64(self.network_type).unwrap_or(NetworkType::Any)
    }

    /// Constraints as they read on a device with nothing stored.
    pub fn constraints(&self) -> Constraints {
        Constraints {
            channel: self.channel.clone(),
            network_type: self.network_type(),
            battery_not_low: self.battery_not_low,
            requires_charging: self.requires_charging,
            idle_reboot_enabled: self.idle_reboot,
        }
    }
}

/// Backoff applied by the job runner when an update check asks to be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    pub initial_delay_secs: u64,
    pub max_delay_secs: u64,
    #[serde(default)]
    pub policy: BackoffKind,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: 30,
            max_delay_secs: 5 * 60 * 60,
            policy: BackoffKind::Exponential,
        }
    }
}

impl BackoffConfig {
    pub fn to_policy(self) -> BackoffPolicy {
        BackoffPolicy {
            kind: self.policy,
            initial_delay: Duration::from_secs(self.initial_delay_secs),
            max_delay: Duration::from_secs(self.max_delay_secs.max(self.initial_delay_secs)),
        }
    }
}

/// Periodic update-check job parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodicConfig {
    /// Minimum interval between two periodic checks.
    pub interval_secs: u64,
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Default for PeriodicConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60 * 60,
            backoff: BackoffConfig::default(),
        }
    }
}

impl PeriodicConfig {
    pub fn to_settings(self) -> PeriodicSettings {
        PeriodicSettings {
            interval: Duration::from_secs(self.interval_secs.max(1)),
            backoff: self.backoff.to_policy(),
        }
    }
}

/// Local job runner tuning (`seamless run`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// How often due jobs are evaluated against the device state.
    pub poll_interval_secs: u64,
    /// The device counts as idle while the 1-minute load average stays below this.
    pub idle_load_threshold: f64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            idle_load_threshold: 0.3,
        }
    }
}

/// Global configuration loaded from `~/.config/seamless/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeamlessConfig {
    /// Command started for each update check. The request is passed through
    /// `SEAMLESS_*` environment variables. Checks fail (and are retried) while unset.
    #[serde(default)]
    pub update_command: Option<Vec<String>>,
    /// Command used for an idle-triggered reboot.
    #[serde(default = "default_reboot_command")]
    pub reboot_command: Vec<String>,
    #[serde(default)]
    pub defaults: ConstraintDefaults,
    #[serde(default)]
    pub periodic: PeriodicConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
}

fn default_reboot_command() -> Vec<String> {
    vec!["systemctl".to_string(), "reboot".to_string()]
}

impl Default for SeamlessConfig {
    fn default() -> Self {
        Self {
            update_command: None,
            reboot_command: default_reboot_command(),
            defaults: ConstraintDefaults::default(),
            periodic: PeriodicConfig::default(),
            runner: RunnerConfig::default(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("seamless")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SeamlessConfig> {
    load_or_init_at(&config_path()?)
}

/// Same as [`load_or_init`] for an explicit path.
pub fn load_or_init_at(path: &Path) -> Result<SeamlessConfig> {
    if !path.exists() {
        let default_cfg = SeamlessConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: SeamlessConfig = toml::from_str(&data)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = SeamlessConfig::default();
        assert_eq!(cfg.defaults.channel, "stable");
        assert_eq!(cfg.defaults.network_type(), NetworkType::Any);
        assert!(cfg.defaults.battery_not_low);
        assert!(!cfg.defaults.requires_charging);
        assert!(!cfg.defaults.idle_reboot);
        assert_eq!(cfg.periodic.interval_secs, 3600);
        assert_eq!(cfg.reboot_command, vec!["systemctl", "reboot"]);
        assert!(cfg.update_command.is_none());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = SeamlessConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: SeamlessConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let cfg: SeamlessConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, SeamlessConfig::default());
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            update_command = ["/usr/lib/seamless/update-check", "--quiet"]

            [defaults]
            channel = "beta"
            network_type = 4
            battery_not_low = false
            requires_charging = true
            idle_reboot = true

            [periodic]
            interval_secs = 14400

            [periodic.backoff]
            initial_delay_secs = 60
            max_delay_secs = 600
            policy = "linear"
        "#;
        let cfg: SeamlessConfig = toml::from_str(toml).unwrap();
        assert_eq!(
            cfg.update_command.as_deref(),
            Some(&["/usr/lib/seamless/update-check".to_string(), "--quiet".to_string()][..])
        );
        let constraints = cfg.defaults.constraints();
        assert_eq!(constraints.channel, "beta");
        assert_eq!(constraints.network_type, NetworkType::WifiOnly);
        assert!(!constraints.battery_not_low);
        assert!(constraints.requires_charging);
        assert!(constraints.idle_reboot_enabled);

        let periodic = cfg.periodic.to_settings();
        assert_eq!(periodic.interval, Duration::from_secs(14400));
        assert_eq!(periodic.backoff.kind, BackoffKind::Linear);
        assert_eq!(periodic.backoff.initial_delay, Duration::from_secs(60));
        assert_eq!(periodic.backoff.max_delay, Duration::from_secs(600));
        // Sections that were left out keep their defaults.
        assert_eq!(cfg.runner, RunnerConfig::default());
    }

    #[test]
    fn out_of_range_network_default_falls_back_to_any() {
        let defaults = ConstraintDefaults {
            network_type: 42,
            ..ConstraintDefaults::default()
        };
        assert_eq!(defaults.network_type(), NetworkType::Any);
    }

    #[test]
    fn load_or_init_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = load_or_init_at(&path).unwrap();
        assert_eq!(cfg, SeamlessConfig::default());
        assert!(path.exists());
        let reloaded = load_or_init_at(&path).unwrap();
        assert_eq!(reloaded, cfg);
    }
}
