//! In-process stand-ins for the device, the update engine and the reboot
//! command, so a full [`Service`] can run against a temporary database.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use seamless_core::config::SeamlessConfig;
use seamless_core::device::{DeviceProbe, DeviceStatus, NetworkHandle, NetworkMonitor};
use seamless_core::exec::{CheckCompletion, CheckRequest, Rebooter, UpdateService};
use seamless_core::service::{Collaborators, Service};
use seamless_core::state_db::StateDb;

pub fn wifi() -> NetworkHandle {
    NetworkHandle {
        interface: "wlan0".into(),
        metered: false,
        roaming: false,
        wireless: true,
    }
}

pub fn cellular() -> NetworkHandle {
    NetworkHandle {
        interface: "wwan0".into(),
        metered: true,
        roaming: false,
        wireless: false,
    }
}

#[derive(Default)]
pub struct FakeDevice {
    status: Mutex<DeviceStatus>,
}

impl FakeDevice {
    pub fn set(&self, status: DeviceStatus) {
        *self.status.lock().unwrap() = status;
    }
}

impl DeviceProbe for FakeDevice {
    fn status(&self) -> DeviceStatus {
        self.status.lock().unwrap().clone()
    }
}

impl NetworkMonitor for FakeDevice {
    fn active_network(&self) -> Option<NetworkHandle> {
        self.status.lock().unwrap().network.clone()
    }
}

/// Update engine whose checks run until [`Updates::finish`].
#[derive(Default)]
pub struct Updates {
    requests: Mutex<Vec<CheckRequest>>,
    running: Mutex<Vec<oneshot::Sender<bool>>>,
}

impl Updates {
    pub fn requests(&self) -> Vec<CheckRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn finish(&self) {
        for done in self.running.lock().unwrap().drain(..) {
            let _ = done.send(true);
        }
    }
}

impl UpdateService for Updates {
    fn start_check(&self, request: CheckRequest) -> anyhow::Result<Option<CheckCompletion>> {
        self.requests.lock().unwrap().push(request);
        let (done, completion) = oneshot::channel();
        self.running.lock().unwrap().push(done);
        Ok(Some(completion))
    }
}

#[derive(Default)]
pub struct Reboots(AtomicUsize);

impl Reboots {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Rebooter for Reboots {
    fn reboot(&self) -> anyhow::Result<()> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Harness {
    pub service: Service,
    pub device: Arc<FakeDevice>,
    pub updates: Arc<Updates>,
    pub reboots: Arc<Reboots>,
}

impl Harness {
    pub fn new(db: &StateDb) -> Self {
        let device = Arc::new(FakeDevice::default());
        let updates = Arc::new(Updates::default());
        let reboots = Arc::new(Reboots::default());
        let parts = Collaborators {
            probe: device.clone(),
            network: device.clone(),
            updates: updates.clone(),
            rebooter: reboots.clone(),
        };
        Self {
            service: Service::new(SeamlessConfig::default(), db, parts),
            device,
            updates,
            reboots,
        }
    }
}
