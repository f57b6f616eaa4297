//! `seamless reboot-required` / `seamless reboot-completed` – hooks for the
//! update engine and for boot.

use anyhow::Result;
use seamless_core::service::Service;

pub async fn run_reboot_required(service: &Service) -> Result<()> {
    service.trigger().on_reboot_required().await?;
    println!("Waiting for reboot; periodic checks paused");
    Ok(())
}

pub async fn run_reboot_completed(service: &Service) -> Result<()> {
    service.trigger().on_reboot_completed().await?;
    println!("Reboot recorded; periodic checks resumed");
    Ok(())
}
