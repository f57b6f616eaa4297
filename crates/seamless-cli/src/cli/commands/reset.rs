//! `seamless reset <key>` – clear a stored setting back to its default.

use anyhow::{bail, Result};
use seamless_core::service::Service;
use seamless_core::store::SettingKey;

pub async fn run_reset(service: &Service, key: SettingKey) -> Result<()> {
    if !key.is_user_editable() {
        bail!("{key} is managed by the update engine and cannot be reset");
    }
    let trigger = service.trigger();
    let subscription = trigger.subscribe();
    let result = trigger.reset_setting(key).await;
    subscription.unsubscribe().await;
    result?;

    println!("Reset {key} to its default");
    Ok(())
}
