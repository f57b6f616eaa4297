//! `seamless run` – daemon loop until Ctrl-C.

use anyhow::Result;
use seamless_core::service::Service;
use tokio::sync::watch;

pub async fn run_daemon(service: &Service) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            // Without a signal handler the daemon runs until killed.
            tracing::warn!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
        tracing::info!("interrupt received");
        let _ = shutdown_tx.send(true);
    });

    service.run(shutdown_rx).await?;
    tracing::info!("daemon stopped");
    Ok(())
}
