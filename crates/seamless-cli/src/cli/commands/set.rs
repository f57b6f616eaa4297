//! `seamless set <key> <value>` – edit a user setting.

use anyhow::{anyhow, bail, Result};
use seamless_core::service::Service;
use seamless_core::store::{SettingKey, SettingValue};

pub async fn run_set(service: &Service, key: SettingKey, input: &str) -> Result<()> {
    if !key.is_user_editable() {
        bail!("{key} is managed by the update engine and cannot be set");
    }
    let value = SettingValue::parse_for(key, input).map_err(|e| anyhow!(e))?;

    // Subscribed for the duration of the edit so this process reschedules itself.
    let trigger = service.trigger();
    let subscription = trigger.subscribe();
    let result = trigger.update_setting(key, value).await;
    subscription.unsubscribe().await;
    result?;

    println!("Set {key} to {}", input.trim());
    Ok(())
}
