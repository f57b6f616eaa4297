//! `seamless check` – manual update check.

use anyhow::Result;
use seamless_core::manual::ManualCheckOutcome;
use seamless_core::service::Service;

pub async fn run_check(service: &Service) -> Result<()> {
    match service.trigger().request_manual_check().await? {
        ManualCheckOutcome::Started { network: Some(net) } => {
            println!("Update check started on {}", net.interface);
        }
        ManualCheckOutcome::Started { network: None } => {
            println!("Update check started (no active network)");
        }
        ManualCheckOutcome::Dropped => {
            println!("An update is waiting for a reboot; not checking.");
        }
    }
    Ok(())
}
