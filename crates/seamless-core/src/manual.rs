//! User-initiated "check for updates now".

use anyhow::Result;
use tracing::{info, warn};

use crate::device::{NetworkHandle, NetworkMonitor};
use crate::exec::{CheckCompletion, CheckRequest, UpdateService};
use crate::store::ConstraintStore;

/// Collaborators a manual check needs.
pub struct CheckContext<'a> {
    pub store: &'a ConstraintStore,
    pub network: &'a dyn NetworkMonitor,
    pub updates: &'a dyn UpdateService,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualCheckOutcome {
    /// Handed to the update service over `network` (None: no active network).
    Started { network: Option<NetworkHandle> },
    /// A reboot is pending; nothing was started.
    Dropped,
}

/// Ephemeral request; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualCheckRequest {
    pub network: Option<NetworkHandle>,
}

impl ManualCheckRequest {
    /// Record the active network. A missing network is logged, not an error:
    /// the update service reports its own connectivity failure.
    pub fn capture(monitor: &dyn NetworkMonitor) -> Self {
        let network = monitor.active_network();
        if network.is_none() {
            warn!("manual check requested; network will be unavailable");
        }
        Self { network }
    }

    /// Gate on `waiting_for_reboot`, then start an out-of-band check.
    pub async fn invoke(ctx: &CheckContext<'_>) -> Result<ManualCheckOutcome> {
        Ok(Self::invoke_tracked(ctx).await?.0)
    }

    /// Like [`Self::invoke`], also returning the started check's completion
    /// when the update service reports one.
    pub async fn invoke_tracked(
        ctx: &CheckContext<'_>,
    ) -> Result<(ManualCheckOutcome, Option<CheckCompletion>)> {
        if ctx.store.get_reboot_state().await?.waiting_for_reboot {
            info!("manual check dropped: waiting for reboot");
            return Ok((ManualCheckOutcome::Dropped, None));
        }
        let request = Self::capture(ctx.network);
        let channel = ctx.store.get().await?.channel;
        let completion = ctx.updates.start_check(CheckRequest {
            user_initiated: true,
            network: request.network.clone(),
            channel,
        })?;
        let outcome = ManualCheckOutcome::Started {
            network: request.network,
        };
        Ok((outcome, completion))
    }
}
