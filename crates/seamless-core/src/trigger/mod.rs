//! Update-check trigger: turns settings edits, manual requests and reboot
//! events into scheduling decisions.
//!
//! | Event                                         | Effect                                          |
//! |-----------------------------------------------|-------------------------------------------------|
//! | `channel`/`battery_not_low`/`requires_charging` changed | reschedule, unless waiting for reboot |
//! | network type set                              | persist, then reschedule unless waiting         |
//! | network type cleared                          | reschedule against the default, unless waiting  |
//! | `idle_reboot` turned off                      | cancel idle reboot (always)                     |
//! | manual check                                  | dropped while waiting, else start a check       |
//! | manual check exits                            | leave `CheckPending` once no check is running   |
//! | reboot required                               | set waiting, cancel periodic job, arm idle reboot |
//! | reboot completed                              | clear waiting, drop idle reboot, reschedule     |
//!
//! Nothing else reschedules. Notifications for a written `network_type` are
//! ignored because [`UpdateCheckTrigger::set_network_type`] already did.
//!
//! `CheckPending` lives in this process only: a check started by another
//! process, or before a restart, is not tracked.

mod subscription;

pub use subscription::Subscription;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::device::{DeviceStatus, NetworkMonitor};
use crate::exec::{CheckCompletion, CheckRequest, UpdateService};
use crate::host::{JobHandler, JobOutcome};
use crate::idle_reboot::IdleRebootController;
use crate::manual::{CheckContext, ManualCheckOutcome, ManualCheckRequest};
use crate::scheduler::{JobDescriptor, JobKind, ScheduleOutcome, Scheduler};
use crate::store::{ConstraintStore, NetworkType, SettingChange, SettingKey, SettingValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    /// A manual check was handed off and has not reported back.
    CheckPending,
    WaitingForReboot,
}

/// Manual checks started by this process that have not exited yet.
#[derive(Default)]
struct PendingChecks {
    next_id: AtomicU64,
    running: Mutex<HashSet<u64>>,
}

impl PendingChecks {
    fn running(&self) -> MutexGuard<'_, HashSet<u64>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start(&self) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.running().insert(id);
        id
    }

    fn finish(&self, id: u64) {
        self.running().remove(&id);
    }

    fn clear(&self) {
        self.running().clear();
    }

    fn any(&self) -> bool {
        !self.running().is_empty()
    }
}

pub struct UpdateCheckTrigger {
    store: ConstraintStore,
    scheduler: Scheduler,
    idle_reboot: IdleRebootController,
    network: Arc<dyn NetworkMonitor>,
    updates: Arc<dyn UpdateService>,
    pending_checks: Arc<PendingChecks>,
}

impl UpdateCheckTrigger {
    pub fn new(
        store: ConstraintStore,
        scheduler: Scheduler,
        idle_reboot: IdleRebootController,
        network: Arc<dyn NetworkMonitor>,
        updates: Arc<dyn UpdateService>,
    ) -> Self {
        Self {
            store,
            scheduler,
            idle_reboot,
            network,
            updates,
            pending_checks: Arc::default(),
        }
    }

    pub fn store(&self) -> &ConstraintStore {
        &self.store
    }

    pub async fn state(&self) -> Result<TriggerState> {
        if self.store.get_reboot_state().await?.waiting_for_reboot {
            return Ok(TriggerState::WaitingForReboot);
        }
        if self.pending_checks.any() {
            return Ok(TriggerState::CheckPending);
        }
        Ok(TriggerState::Idle)
    }

    /// Start consuming store notifications on a background task.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        Subscription::spawn(Arc::clone(self), self.store.subscribe())
    }

    /// React to a stored setting having changed. Decisions use the value
    /// carried by `change`, never a fresh read of the store.
    pub async fn on_setting_changed(&self, change: &SettingChange) -> Result<()> {
        let key = change.key;
        match key {
            SettingKey::Channel | SettingKey::BatteryNotLow | SettingKey::RequiresCharging => {
                self.reschedule().await?;
            }
            SettingKey::IdleReboot => {
                let enabled = change
                    .value
                    .as_ref()
                    .and_then(SettingValue::as_bool)
                    .unwrap_or(self.store.defaults().idle_reboot);
                if !enabled {
                    if let Err(e) = self.idle_reboot.cancel().await {
                        warn!("cancelling idle reboot failed: {e:#}");
                    }
                }
            }
            SettingKey::NetworkType if change.value.is_none() => {
                self.reschedule().await?;
            }
            SettingKey::NetworkType | SettingKey::WaitingForReboot => {
                debug!(%key, "change does not reschedule");
            }
        }
        Ok(())
    }

    /// Persist a new network type, then reschedule against it.
    pub async fn set_network_type(&self, network_type: NetworkType) -> Result<()> {
        self.store
            .set(
                SettingKey::NetworkType,
                SettingValue::Int(network_type.as_i64()),
            )
            .await?;
        self.reschedule().await?;
        Ok(())
    }

    /// Apply a user edit. Network type goes through [`Self::set_network_type`];
    /// everything else is stored and handled via the change notification.
    pub async fn update_setting(&self, key: SettingKey, value: SettingValue) -> Result<()> {
        if !key.is_user_editable() {
            anyhow::bail!("{key} is not a user setting");
        }
        if key == SettingKey::NetworkType {
            let network_type = match &value {
                SettingValue::Int(n) => NetworkType::from_i64(*n),
                _ => None,
            }
            .ok_or_else(|| anyhow::anyhow!("invalid network type value: {value:?}"))?;
            return self.set_network_type(network_type).await;
        }
        self.store.set(key, value).await
    }

    /// Drop a user edit so its default applies again. A cleared network type
    /// reschedules here; other keys are handled via the change notification.
    pub async fn reset_setting(&self, key: SettingKey) -> Result<()> {
        if !key.is_user_editable() {
            anyhow::bail!("{key} is not a user setting");
        }
        self.store.clear(key).await?;
        if key == SettingKey::NetworkType {
            self.reschedule().await?;
        }
        Ok(())
    }

    /// Resubmit the periodic job from current constraints unless a reboot is
    /// pending. Submission failures are logged and leave the previous job in place.
    pub async fn reschedule(&self) -> Result<Option<ScheduleOutcome>> {
        if self.store.get_reboot_state().await?.waiting_for_reboot {
            debug!("waiting for reboot; not scheduling");
            return Ok(None);
        }
        let constraints = self.store.get().await?;
        match self.scheduler.schedule(&constraints).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(e) => {
                warn!("scheduling failed, retrying on next change: {e:#}");
                Ok(None)
            }
        }
    }

    /// User pressed "check for updates".
    pub async fn request_manual_check(&self) -> Result<ManualCheckOutcome> {
        let ctx = CheckContext {
            store: &self.store,
            network: self.network.as_ref(),
            updates: self.updates.as_ref(),
        };
        let (outcome, completion) = ManualCheckRequest::invoke_tracked(&ctx).await?;
        if matches!(outcome, ManualCheckOutcome::Started { .. }) {
            let id = self.pending_checks.start();
            if let Some(completion) = completion {
                self.watch_check(id, completion);
            }
        }
        Ok(outcome)
    }

    fn watch_check(&self, id: u64, completion: CheckCompletion) {
        let pending = Arc::clone(&self.pending_checks);
        tokio::spawn(async move {
            let success = completion.await.unwrap_or(false);
            debug!(id, success, "manual check finished");
            pending.finish(id);
        });
    }

    /// Every manual check reported back. Needed only for update services that
    /// return no completion.
    pub fn check_finished(&self) {
        self.pending_checks.clear();
    }

    /// An update was applied and needs a reboot.
    pub async fn on_reboot_required(&self) -> Result<()> {
        self.store.set_waiting_for_reboot(true).await?;
        info!("update applied; waiting for reboot");
        if let Err(e) = self.scheduler.cancel().await {
            warn!("cancelling periodic job failed: {e:#}");
        }
        if let Err(e) = self.idle_reboot.arm().await {
            warn!("arming idle reboot failed: {e:#}");
        }
        Ok(())
    }

    /// The device came back up after the pending reboot.
    pub async fn on_reboot_completed(&self) -> Result<()> {
        self.store.set_waiting_for_reboot(false).await?;
        self.check_finished();
        info!("reboot completed");
        if let Err(e) = self.idle_reboot.cancel().await {
            warn!("cancelling idle reboot failed: {e:#}");
        }
        self.reschedule().await?;
        Ok(())
    }
}

#[async_trait]
impl JobHandler for UpdateCheckTrigger {
    async fn run(&self, job: &JobDescriptor, status: &DeviceStatus) -> JobOutcome {
        match job.kind {
            JobKind::UpdateCheck => {
                match self.store.get_reboot_state().await {
                    Ok(state) if state.waiting_for_reboot => {
                        debug!("periodic check skipped: waiting for reboot");
                        return JobOutcome::Done;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("reading reboot state failed: {e:#}");
                        return JobOutcome::Retry;
                    }
                }
                let channel = job
                    .channel
                    .clone()
                    .unwrap_or_else(|| self.store.defaults().channel.clone());
                let request = CheckRequest {
                    user_initiated: false,
                    network: status.network.clone(),
                    channel,
                };
                match self.updates.start_check(request) {
                    Ok(_) => JobOutcome::Done,
                    Err(e) => {
                        warn!("periodic check failed to start: {e:#}");
                        JobOutcome::Retry
                    }
                }
            }
            JobKind::IdleReboot => match self.idle_reboot.on_device_idle().await {
                Ok(_) => JobOutcome::Done,
                Err(e) => {
                    warn!("idle reboot failed: {e:#}");
                    JobOutcome::Retry
                }
            },
        }
    }
}
