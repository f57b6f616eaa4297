//! Recording collaborators for unit tests.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use crate::config::ConstraintDefaults;
use crate::device::{NetworkHandle, NetworkMonitor};
use crate::error::HostError;
use crate::exec::{CheckCompletion, CheckRequest, Rebooter, UpdateService};
use crate::host::JobHost;
use crate::idle_reboot::IdleRebootController;
use crate::manual::CheckContext;
use crate::scheduler::{JobDescriptor, JobId, PeriodicSettings, Scheduler};
use crate::state_db::open_memory;
use crate::store::ConstraintStore;
use crate::trigger::UpdateCheckTrigger;

pub(crate) fn wifi() -> NetworkHandle {
    NetworkHandle {
        interface: "wlan0".into(),
        metered: false,
        roaming: false,
        wireless: true,
    }
}

/// One call made on [`RecordingHost`], with the store's reboot flag at that moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HostCall {
    Submit {
        descriptor: JobDescriptor,
        waiting_for_reboot: Option<bool>,
    },
    Cancel {
        job_id: JobId,
        waiting_for_reboot: Option<bool>,
    },
}

/// In-memory job host: one slot per id plus a journal of calls.
#[derive(Default)]
pub(crate) struct RecordingHost {
    slots: Mutex<HashMap<JobId, JobDescriptor>>,
    calls: Mutex<Vec<HostCall>>,
    failing: AtomicBool,
    store: Option<ConstraintStore>,
}

impl RecordingHost {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Also snapshot `waiting_for_reboot` from `store` on every call.
    pub(crate) fn watching(store: ConstraintStore) -> Self {
        Self {
            store: Some(store),
            ..Self::default()
        }
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn slot(&self, job_id: JobId) -> Option<JobDescriptor> {
        self.slots.lock().unwrap().get(&job_id).cloned()
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    pub(crate) fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn submissions(&self, job_id: JobId) -> Vec<JobDescriptor> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                HostCall::Submit { descriptor, .. } if descriptor.job_id == job_id => {
                    Some(descriptor)
                }
                _ => None,
            })
            .collect()
    }

    pub(crate) fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    async fn waiting(&self) -> Option<bool> {
        match &self.store {
            Some(store) => store
                .get_reboot_state()
                .await
                .ok()
                .map(|s| s.waiting_for_reboot),
            None => None,
        }
    }

    fn check_available(&self) -> Result<(), HostError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(HostError::Unavailable("test host offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl JobHost for RecordingHost {
    async fn submit(&self, descriptor: &JobDescriptor) -> Result<(), HostError> {
        self.check_available()?;
        let waiting_for_reboot = self.waiting().await;
        self.calls.lock().unwrap().push(HostCall::Submit {
            descriptor: descriptor.clone(),
            waiting_for_reboot,
        });
        self.slots
            .lock()
            .unwrap()
            .insert(descriptor.job_id, descriptor.clone());
        Ok(())
    }

    async fn cancel(&self, job_id: JobId) -> Result<(), HostError> {
        self.check_available()?;
        let waiting_for_reboot = self.waiting().await;
        self.calls.lock().unwrap().push(HostCall::Cancel {
            job_id,
            waiting_for_reboot,
        });
        self.slots.lock().unwrap().remove(&job_id);
        Ok(())
    }

    async fn pending(&self, job_id: JobId) -> Result<Option<JobDescriptor>, HostError> {
        self.check_available()?;
        Ok(self.slot(job_id))
    }
}

#[derive(Default)]
pub(crate) struct StaticNetwork {
    network: Mutex<Option<NetworkHandle>>,
    lookups: AtomicUsize,
}

impl StaticNetwork {
    pub(crate) fn set(&self, network: Option<NetworkHandle>) {
        *self.network.lock().unwrap() = network;
    }

    pub(crate) fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl NetworkMonitor for StaticNetwork {
    fn active_network(&self) -> Option<NetworkHandle> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.network.lock().unwrap().clone()
    }
}

/// Records requests; every started check stays running until [`Self::finish_all`].
#[derive(Default)]
pub(crate) struct RecordingUpdates {
    requests: Mutex<Vec<CheckRequest>>,
    running: Mutex<Vec<oneshot::Sender<bool>>>,
    failing: AtomicBool,
}

impl RecordingUpdates {
    pub(crate) fn requests(&self) -> Vec<CheckRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn finish_all(&self, success: bool) {
        for done in self.running.lock().unwrap().drain(..) {
            let _ = done.send(success);
        }
    }
}

impl UpdateService for RecordingUpdates {
    fn start_check(&self, request: CheckRequest) -> Result<Option<CheckCompletion>> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("update service unavailable");
        }
        self.requests.lock().unwrap().push(request);
        let (done, completion) = oneshot::channel();
        self.running.lock().unwrap().push(done);
        Ok(Some(completion))
    }
}

#[derive(Default)]
pub(crate) struct RecordingRebooter {
    count: AtomicUsize,
}

impl RecordingRebooter {
    pub(crate) fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Rebooter for RecordingRebooter {
    fn reboot(&self) -> Result<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory store wired to recording collaborators.
pub(crate) struct Fixture {
    pub store: ConstraintStore,
    pub host: Arc<RecordingHost>,
    pub network: Arc<StaticNetwork>,
    pub updates: Arc<RecordingUpdates>,
    pub rebooter: Arc<RecordingRebooter>,
}

impl Fixture {
    pub(crate) async fn new() -> Self {
        let db = open_memory().await.unwrap();
        let store = ConstraintStore::new(&db, ConstraintDefaults::default());
        Self {
            host: Arc::new(RecordingHost::watching(store.clone())),
            store,
            network: Arc::new(StaticNetwork::default()),
            updates: Arc::new(RecordingUpdates::default()),
            rebooter: Arc::new(RecordingRebooter::default()),
        }
    }

    pub(crate) fn scheduler(&self) -> Scheduler {
        Scheduler::new(self.host.clone(), PeriodicSettings::default())
    }

    pub(crate) fn idle_reboot(&self) -> IdleRebootController {
        IdleRebootController::new(self.store.clone(), self.host.clone(), self.rebooter.clone())
    }

    pub(crate) fn check_context(&self) -> CheckContext<'_> {
        CheckContext {
            store: &self.store,
            network: self.network.as_ref(),
            updates: self.updates.as_ref(),
        }
    }

    pub(crate) fn trigger(&self) -> Arc<UpdateCheckTrigger> {
        Arc::new(UpdateCheckTrigger::new(
            self.store.clone(),
            self.scheduler(),
            self.idle_reboot(),
            self.network.clone(),
            self.updates.clone(),
        ))
    }
}
