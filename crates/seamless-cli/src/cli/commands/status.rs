//! `seamless status` – show constraints, reboot state and pending jobs.

use anyhow::Result;
use seamless_core::host::PendingJob;
use seamless_core::service::Service;
use std::time::{SystemTime, UNIX_EPOCH};

pub async fn run_status(service: &Service) -> Result<()> {
    let report = service.status().await?;
    let c = &report.constraints;
    println!("{:<20} {}", "channel", c.channel);
    println!("{:<20} {}", "network_type", c.network_type);
    println!("{:<20} {}", "battery_not_low", c.battery_not_low);
    println!("{:<20} {}", "requires_charging", c.requires_charging);
    println!("{:<20} {}", "idle_reboot", c.idle_reboot_enabled);
    println!("{:<20} {}", "waiting_for_reboot", report.reboot.waiting_for_reboot);
    println!(
        "{:<20} {}",
        "state",
        format!("{:?}", report.state).to_lowercase()
    );
    println!();

    if report.jobs.is_empty() {
        println!("No pending jobs.");
        return Ok(());
    }
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default();
    println!("{:<4} {:<12} {:<12} {}", "ID", "KIND", "NEXT RUN", "ATTEMPTS");
    for job in &report.jobs {
        println!(
            "{:<4} {:<12} {:<12} {}",
            job.descriptor.job_id,
            format!("{:?}", job.descriptor.kind).to_lowercase(),
            next_run(job, now),
            job.attempts
        );
    }
    Ok(())
}

fn next_run(job: &PendingJob, now: i64) -> String {
    let wait = job.next_run - now;
    if wait <= 0 {
        "due".to_string()
    } else {
        format!("in {wait}s")
    }
}
