//! Types read from and written to the constraint store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::device::NetworkHandle;

/// Persisted setting names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    Channel,
    NetworkType,
    BatteryNotLow,
    RequiresCharging,
    IdleReboot,
    /// Set by the update engine, never by the user.
    WaitingForReboot,
}

impl SettingKey {
    pub const ALL: [SettingKey; 6] = [
        SettingKey::Channel,
        SettingKey::NetworkType,
        SettingKey::BatteryNotLow,
        SettingKey::RequiresCharging,
        SettingKey::IdleReboot,
        SettingKey::WaitingForReboot,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SettingKey::Channel => "channel",
            SettingKey::NetworkType => "network_type",
            SettingKey::BatteryNotLow => "battery_not_low",
            SettingKey::RequiresCharging => "requires_charging",
            SettingKey::IdleReboot => "idle_reboot",
            SettingKey::WaitingForReboot => "waiting_for_reboot",
        }
    }

    pub fn is_user_editable(self) -> bool {
        self != SettingKey::WaitingForReboot
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = String;

    /// Accepts the stored name or its dashed spelling (`battery-not-low`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_");
        SettingKey::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| format!("unknown setting: {s}"))
    }
}

/// Network requirement for the periodic check. Persisted as an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    Any,
    Unmetered,
    NotRoaming,
    WifiOnly,
}

impl NetworkType {
    pub fn as_i64(self) -> i64 {
        match self {
            NetworkType::Any => 1,
            NetworkType::Unmetered => 2,
            NetworkType::NotRoaming => 3,
            NetworkType::WifiOnly => 4,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(NetworkType::Any),
            2 => Some(NetworkType::Unmetered),
            3 => Some(NetworkType::NotRoaming),
            4 => Some(NetworkType::WifiOnly),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NetworkType::Any => "any",
            NetworkType::Unmetered => "unmetered",
            NetworkType::NotRoaming => "not-roaming",
            NetworkType::WifiOnly => "wifi-only",
        }
    }

    /// Whether `network` (the currently active one, if any) meets this requirement.
    pub fn is_satisfied_by(self, network: Option<&NetworkHandle>) -> bool {
        let Some(net) = network else {
            return false;
        };
        match self {
            NetworkType::Any => true,
            NetworkType::Unmetered => !net.metered,
            NetworkType::NotRoaming => !net.roaming,
            NetworkType::WifiOnly => net.wireless,
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkType {
    type Err = String;

    /// Accepts a name (`wifi-only`, `wifi_only`) or the persisted integer.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(n) = s.parse::<i64>() {
            return NetworkType::from_i64(n).ok_or_else(|| format!("unknown network type: {n}"));
        }
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "any" => Ok(NetworkType::Any),
            "unmetered" => Ok(NetworkType::Unmetered),
            "not-roaming" => Ok(NetworkType::NotRoaming),
            "wifi-only" | "wifi" => Ok(NetworkType::WifiOnly),
            _ => Err(format!("unknown network type: {s}")),
        }
    }
}

/// Conditions under which the periodic update check may run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    pub channel: String,
    pub network_type: NetworkType,
    pub battery_not_low: bool,
    pub requires_charging: bool,
    pub idle_reboot_enabled: bool,
}

/// Whether an applied update is waiting for a reboot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RebootState {
    pub waiting_for_reboot: bool,
}

/// Value written by [`super::ConstraintStore::set`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Text(String),
    Int(i64),
    Bool(bool),
}

impl SettingValue {
    pub(crate) fn encode(&self) -> String {
        match self {
            SettingValue::Text(s) => s.clone(),
            SettingValue::Int(n) => n.to_string(),
            SettingValue::Bool(b) => b.to_string(),
        }
    }

    /// Boolean reading of the value, decoded the same way the store reads it back.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            other => parse_bool(&other.encode()),
        }
    }

    /// Parse user input for `key` into the value type that key stores.
    pub fn parse_for(key: SettingKey, input: &str) -> Result<Self, String> {
        match key {
            SettingKey::Channel => {
                let channel = input.trim();
                if channel.is_empty() {
                    return Err("channel must not be empty".to_string());
                }
                Ok(SettingValue::Text(channel.to_string()))
            }
            SettingKey::NetworkType => input
                .parse::<NetworkType>()
                .map(|t| SettingValue::Int(t.as_i64())),
            SettingKey::BatteryNotLow
            | SettingKey::RequiresCharging
            | SettingKey::IdleReboot
            | SettingKey::WaitingForReboot => parse_bool(input)
                .map(SettingValue::Bool)
                .ok_or_else(|| format!("{key} expects true/false, got {input:?}")),
        }
    }
}

/// Lenient boolean decoding shared by user input and stored values.
pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Broadcast after every successful store write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingChange {
    pub key: SettingKey,
    /// The value written; None when the key was cleared back to its default.
    pub value: Option<SettingValue>,
}
