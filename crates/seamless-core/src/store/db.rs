//! SQLite-backed constraint store.

use anyhow::Result;
use sqlx::Row;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::types::{
    parse_bool, Constraints, NetworkType, RebootState, SettingChange, SettingKey, SettingValue,
};
use crate::config::ConstraintDefaults;
use crate::state_db::{unix_timestamp, StateDb};

/// Buffered change notifications per subscriber before it starts lagging.
const CHANGE_CAPACITY: usize = 64;

/// Persisted settings plus change notification. Cheap to clone; clones share
/// the pool and the notification channel.
#[derive(Clone)]
pub struct ConstraintStore {
    db: StateDb,
    defaults: Arc<ConstraintDefaults>,
    changes: broadcast::Sender<SettingChange>,
}

impl ConstraintStore {
    pub fn new(db: &StateDb, defaults: ConstraintDefaults) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            db: db.clone(),
            defaults: Arc::new(defaults),
            changes,
        }
    }

    pub fn defaults(&self) -> &ConstraintDefaults {
        &self.defaults
    }

    /// Receive a [`SettingChange`] for every write made after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SettingChange> {
        self.changes.subscribe()
    }

    /// Current constraints; missing or malformed fields read as their defaults.
    pub async fn get(&self) -> Result<Constraints> {
        let d = &self.defaults;
        let network_type = match self.get_int(SettingKey::NetworkType).await? {
            Some(n) => match NetworkType::from_i64(n) {
                Some(t) => t,
                None => {
                    warn!(value = n, "unknown stored network_type; using default");
                    d.network_type()
                }
            },
            None => d.network_type(),
        };
        Ok(Constraints {
            channel: self
                .get_string(SettingKey::Channel)
                .await?
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| d.channel.clone()),
            network_type,
            battery_not_low: self
                .get_bool(SettingKey::BatteryNotLow)
                .await?
                .unwrap_or(d.battery_not_low),
            requires_charging: self
                .get_bool(SettingKey::RequiresCharging)
                .await?
                .unwrap_or(d.requires_charging),
            idle_reboot_enabled: self
                .get_bool(SettingKey::IdleReboot)
                .await?
                .unwrap_or(d.idle_reboot),
        })
    }

    pub async fn get_reboot_state(&self) -> Result<RebootState> {
        Ok(RebootState {
            waiting_for_reboot: self
                .get_bool(SettingKey::WaitingForReboot)
                .await?
                .unwrap_or(false),
        })
    }

    pub async fn set_waiting_for_reboot(&self, waiting: bool) -> Result<()> {
        self.set(SettingKey::WaitingForReboot, SettingValue::Bool(waiting))
            .await
    }

    /// Write one field, then notify subscribers. The write is durable before
    /// the notification goes out, so listeners always read the new value.
    pub async fn set(&self, key: SettingKey, value: SettingValue) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key.as_str())
        .bind(value.encode())
        .bind(unix_timestamp())
        .execute(&self.db.pool)
        .await?;

        debug!(%key, value = ?value, "setting stored");
        self.notify(key, Some(value));
        Ok(())
    }

    /// Remove a stored value so the default applies again.
    pub async fn clear(&self, key: SettingKey) -> Result<()> {
        let removed = sqlx::query("DELETE FROM settings WHERE key = ?1")
            .bind(key.as_str())
            .execute(&self.db.pool)
            .await?
            .rows_affected();
        if removed > 0 {
            debug!(%key, "setting cleared");
            self.notify(key, None);
        }
        Ok(())
    }

    fn notify(&self, key: SettingKey, value: Option<SettingValue>) {
        let _ = self.changes.send(SettingChange { key, value });
    }

    async fn get_raw(&self, key: SettingKey) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?1")
            .bind(key.as_str())
            .fetch_optional(&self.db.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    pub async fn set_string(&self, key: SettingKey, value: impl Into<String>) -> Result<()> {
        self.set(key, SettingValue::Text(value.into())).await
    }

    pub async fn set_int(&self, key: SettingKey, value: i64) -> Result<()> {
        self.set(key, SettingValue::Int(value)).await
    }

    pub async fn set_bool(&self, key: SettingKey, value: bool) -> Result<()> {
        self.set(key, SettingValue::Bool(value)).await
    }

    pub async fn get_string(&self, key: SettingKey) -> Result<Option<String>> {
        self.get_raw(key).await
    }

    /// Stored integer, or None if absent or not an integer.
    pub async fn get_int(&self, key: SettingKey) -> Result<Option<i64>> {
        Ok(self.get_raw(key).await?.and_then(|raw| {
            let parsed = raw.trim().parse::<i64>().ok();
            if parsed.is_none() {
                warn!(%key, %raw, "stored value is not an integer; using default");
            }
            parsed
        }))
    }

    /// Stored boolean, or None if absent or not a boolean.
    pub async fn get_bool(&self, key: SettingKey) -> Result<Option<bool>> {
        Ok(self.get_raw(key).await?.and_then(|raw| {
            let parsed = parse_bool(&raw);
            if parsed.is_none() {
                warn!(%key, %raw, "stored value is not a boolean; using default");
            }
            parsed
        }))
    }
}
