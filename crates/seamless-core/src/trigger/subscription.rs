use std::sync::Arc;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::UpdateCheckTrigger;
use crate::store::SettingChange;

/// Listener registration on the store. Dropping it stops the listener
/// without waiting; [`Subscription::unsubscribe`] first handles every change
/// already announced.
pub struct Subscription {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub(super) fn spawn(
        trigger: Arc<UpdateCheckTrigger>,
        mut changes: broadcast::Receiver<SettingChange>,
    ) -> Self {
        let (shutdown, mut stop) = watch::channel(false);
        let task = tokio::spawn(async move {
            debug!("trigger subscribed to setting changes");
            loop {
                tokio::select! {
                    biased;
                    received = changes.recv() => match received {
                        Ok(change) => handle(&trigger, change).await,
                        Err(RecvError::Lagged(missed)) => {
                            warn!(missed, "trigger lagged behind setting changes");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = stop.changed() => {
                        loop {
                            match changes.try_recv() {
                                Ok(change) => handle(&trigger, change).await,
                                Err(TryRecvError::Lagged(missed)) => {
                                    warn!(missed, "trigger lagged behind setting changes");
                                }
                                Err(_) => break,
                            }
                        }
                        break;
                    }
                }
            }
            debug!("trigger unsubscribed");
        });
        Self { shutdown, task }
    }

    /// Stop listening after draining pending notifications.
    pub async fn unsubscribe(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("trigger subscription task failed: {e}");
        }
    }
}

async fn handle(trigger: &UpdateCheckTrigger, change: SettingChange) {
    if let Err(e) = trigger.on_setting_changed(&change).await {
        warn!(key = %change.key, "handling setting change failed: {e:#}");
    }
}
