//! Reboot-when-idle after an update has been applied.
//!
//! Arming submits a one-shot job that requires the device to be idle; the
//! job host fires it through [`IdleRebootController::on_device_idle`]. Both
//! gates (`waiting_for_reboot`, `idle_reboot`) are re-read from the store on
//! every call, so a cancel caused by disabling the setting cannot be undone
//! by a stale arm.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::SchedulingError;
use crate::exec::Rebooter;
use crate::host::JobHost;
use crate::scheduler::{JobDescriptor, IDLE_REBOOT_JOB_ID};
use crate::store::ConstraintStore;

#[derive(Clone)]
pub struct IdleRebootController {
    store: ConstraintStore,
    host: Arc<dyn JobHost>,
    rebooter: Arc<dyn Rebooter>,
}

impl IdleRebootController {
    pub fn new(store: ConstraintStore, host: Arc<dyn JobHost>, rebooter: Arc<dyn Rebooter>) -> Self {
        Self {
            store,
            host,
            rebooter,
        }
    }

    async fn gates_open(&self) -> Result<bool> {
        let waiting = self.store.get_reboot_state().await?.waiting_for_reboot;
        let enabled = self.store.get().await?.idle_reboot_enabled;
        debug!(waiting, enabled, "idle reboot gates");
        Ok(waiting && enabled)
    }

    /// Request a reboot for the next time the device is idle. Returns false
    /// (and submits nothing) unless a reboot is pending and idle reboot is enabled.
    pub async fn arm(&self) -> Result<bool> {
        if !self.gates_open().await? {
            debug!("idle reboot not armed");
            return Ok(false);
        }
        self.host
            .submit(&JobDescriptor::idle_reboot())
            .await
            .map_err(|source| SchedulingError::SubmissionFailed {
                job_id: IDLE_REBOOT_JOB_ID,
                source,
            })?;
        info!("idle reboot armed");
        Ok(true)
    }

    /// Withdraw any armed idle reboot. Safe when nothing is armed.
    pub async fn cancel(&self) -> Result<()> {
        self.host
            .cancel(IDLE_REBOOT_JOB_ID)
            .await
            .map_err(|source| SchedulingError::SubmissionFailed {
                job_id: IDLE_REBOOT_JOB_ID,
                source,
            })?;
        info!("idle reboot cancelled");
        Ok(())
    }

    /// The device went idle while the reboot job was armed. Reboots only if
    /// both gates are still open; returns whether a reboot was requested.
    pub async fn on_device_idle(&self) -> Result<bool> {
        if !self.gates_open().await? {
            info!("device idle but idle reboot no longer applies");
            return Ok(false);
        }
        self.rebooter.reboot()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SettingKey, SettingValue};
    use crate::testing::{Fixture, HostCall};

    async fn enable_idle_reboot(fx: &Fixture, enabled: bool) {
        fx.store
            .set(SettingKey::IdleReboot, SettingValue::Bool(enabled))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn arm_requires_both_gates() {
        let fx = Fixture::new().await;
        let idle = fx.idle_reboot();

        assert!(!idle.arm().await.unwrap());
        enable_idle_reboot(&fx, true).await;
        assert!(!idle.arm().await.unwrap(), "no reboot pending");
        fx.store.set_waiting_for_reboot(true).await.unwrap();
        enable_idle_reboot(&fx, false).await;
        assert!(!idle.arm().await.unwrap(), "idle reboot disabled");
        assert!(fx.host.slot(IDLE_REBOOT_JOB_ID).is_none());

        enable_idle_reboot(&fx, true).await;
        assert!(idle.arm().await.unwrap());
        let job = fx.host.slot(IDLE_REBOOT_JOB_ID).unwrap();
        assert!(job.requires_device_idle);
    }

    #[tokio::test]
    async fn cancel_is_safe_when_not_armed() {
        let fx = Fixture::new().await;
        fx.idle_reboot().cancel().await.unwrap();
        assert!(matches!(
            fx.host.calls().as_slice(),
            [HostCall::Cancel {
                job_id: IDLE_REBOOT_JOB_ID,
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn cancel_then_arm_with_setting_disabled_stays_disarmed() {
        let fx = Fixture::new().await;
        let idle = fx.idle_reboot();
        fx.store.set_waiting_for_reboot(true).await.unwrap();
        enable_idle_reboot(&fx, true).await;
        assert!(idle.arm().await.unwrap());

        enable_idle_reboot(&fx, false).await;
        idle.cancel().await.unwrap();
        assert!(!idle.arm().await.unwrap());
        assert!(fx.host.slot(IDLE_REBOOT_JOB_ID).is_none());
    }

    #[tokio::test]
    async fn on_device_idle_reboots_only_when_gates_open() {
        let fx = Fixture::new().await;
        let idle = fx.idle_reboot();
        assert!(!idle.on_device_idle().await.unwrap());
        assert_eq!(fx.rebooter.count(), 0);

        fx.store.set_waiting_for_reboot(true).await.unwrap();
        enable_idle_reboot(&fx, true).await;
        assert!(idle.on_device_idle().await.unwrap());
        assert_eq!(fx.rebooter.count(), 1);
    }

    #[tokio::test]
    async fn host_failure_surfaces_as_scheduling_error() {
        let fx = Fixture::new().await;
        fx.store.set_waiting_for_reboot(true).await.unwrap();
        enable_idle_reboot(&fx, true).await;
        fx.host.set_failing(true);
        let err = fx.idle_reboot().arm().await.unwrap_err();
        assert!(err.downcast_ref::<SchedulingError>().is_some());
    }
}
