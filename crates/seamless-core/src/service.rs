//! One process worth of wiring: store, job host, scheduler, controller and
//! trigger built from a [`SeamlessConfig`].

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

use crate::config::SeamlessConfig;
use crate::device::{DeviceProbe, NetworkMonitor, SysfsProbe};
use crate::exec::{CommandRebooter, CommandUpdateService, Rebooter, UpdateService};
use crate::host::{JobRunner, LocalJobHost, PendingJob};
use crate::idle_reboot::IdleRebootController;
use crate::scheduler::Scheduler;
use crate::state_db::StateDb;
use crate::store::{ConstraintStore, Constraints, RebootState};
use crate::trigger::{TriggerState, UpdateCheckTrigger};

/// Everything outside the process the service talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub probe: Arc<dyn DeviceProbe>,
    pub network: Arc<dyn NetworkMonitor>,
    pub updates: Arc<dyn UpdateService>,
    pub rebooter: Arc<dyn Rebooter>,
}

impl Collaborators {
    /// Sysfs for device state, configured commands for checks and reboots.
    pub fn from_config(cfg: &SeamlessConfig) -> Self {
        let probe = Arc::new(SysfsProbe::new(cfg.runner.idle_load_threshold));
        Self {
            probe: probe.clone(),
            network: probe,
            updates: Arc::new(CommandUpdateService::new(
                cfg.update_command.clone().unwrap_or_default(),
            )),
            rebooter: Arc::new(CommandRebooter::new(cfg.reboot_command.clone())),
        }
    }
}

/// Snapshot printed by `seamless status`.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub constraints: Constraints,
    pub reboot: RebootState,
    pub state: TriggerState,
    pub jobs: Vec<PendingJob>,
}

pub struct Service {
    config: SeamlessConfig,
    store: ConstraintStore,
    host: LocalJobHost,
    probe: Arc<dyn DeviceProbe>,
    trigger: Arc<UpdateCheckTrigger>,
}

impl Service {
    pub fn new(config: SeamlessConfig, db: &StateDb, parts: Collaborators) -> Self {
        let store = ConstraintStore::new(db, config.defaults.clone());
        let host = LocalJobHost::new(db);
        let shared_host = Arc::new(host.clone());
        let scheduler = Scheduler::new(shared_host.clone(), config.periodic.to_settings());
        let idle_reboot = IdleRebootController::new(store.clone(), shared_host, parts.rebooter);
        let trigger = Arc::new(UpdateCheckTrigger::new(
            store.clone(),
            scheduler,
            idle_reboot,
            parts.network,
            parts.updates,
        ));
        Self {
            config,
            store,
            host,
            probe: parts.probe,
            trigger,
        }
    }

    /// Open the default state database and use the real collaborators.
    pub async fn open_default(config: SeamlessConfig) -> Result<Self> {
        let db = StateDb::open_default().await?;
        let parts = Collaborators::from_config(&config);
        Ok(Self::new(config, &db, parts))
    }

    pub fn store(&self) -> &ConstraintStore {
        &self.store
    }

    pub fn host(&self) -> &LocalJobHost {
        &self.host
    }

    pub fn trigger(&self) -> &Arc<UpdateCheckTrigger> {
        &self.trigger
    }

    pub async fn status(&self) -> Result<StatusReport> {
        Ok(StatusReport {
            constraints: self.store.get().await?,
            reboot: self.store.get_reboot_state().await?,
            state: self.trigger.state().await?,
            jobs: self.host.list().await?,
        })
    }

    pub fn runner(&self) -> JobRunner {
        JobRunner::new(
            self.host.clone(),
            self.probe.clone(),
            self.trigger.clone(),
            Duration::from_secs(self.config.runner.poll_interval_secs),
        )
    }

    /// Daemon mode: listen for setting changes, schedule once, then fire jobs
    /// until `shutdown` flips.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let subscription = self.trigger.subscribe();
        match self.trigger.reschedule().await? {
            Some(outcome) => info!(?outcome, "startup schedule"),
            None => info!("startup schedule skipped"),
        }
        self.runner().run(shutdown).await;
        subscription.unsubscribe().await;
        Ok(())
    }
}
