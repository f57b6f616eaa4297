//! Update-execution and reboot collaborators.
//!
//! The reboot command is fire-and-forget. The update command is spawned and
//! watched on a background task that reports its exit through the returned
//! [`CheckCompletion`].

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::device::NetworkHandle;

/// One update check handed to the update engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckRequest {
    pub user_initiated: bool,
    /// Network observed when the check was requested; None if there was none.
    pub network: Option<NetworkHandle>,
    pub channel: String,
}

/// Resolves with `true` once a started check exits successfully, `false` on
/// failure. A dropped sender also means the check is over.
pub type CheckCompletion = oneshot::Receiver<bool>;

pub trait UpdateService: Send + Sync {
    /// Start a check. Returning Ok means it was handed off, not that it succeeded.
    /// None: the service never reports back.
    fn start_check(&self, request: CheckRequest) -> Result<Option<CheckCompletion>>;
}

pub trait Rebooter: Send + Sync {
    fn reboot(&self) -> Result<()>;
}

/// Runs `update_command` with the request in `SEAMLESS_*` environment variables.
pub struct CommandUpdateService {
    argv: Vec<String>,
}

impl CommandUpdateService {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl UpdateService for CommandUpdateService {
    fn start_check(&self, request: CheckRequest) -> Result<Option<CheckCompletion>> {
        let mut cmd = command(&self.argv).context("update_command is not configured")?;
        cmd.env("SEAMLESS_USER_INITIATED", if request.user_initiated { "1" } else { "0" })
            .env("SEAMLESS_CHANNEL", &request.channel);
        match &request.network {
            Some(net) => {
                cmd.env("SEAMLESS_NETWORK", &net.interface)
                    .env("SEAMLESS_NETWORK_METERED", if net.metered { "1" } else { "0" });
            }
            None => {
                cmd.env_remove("SEAMLESS_NETWORK");
            }
        }
        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to start {}", self.argv[0]))?;
        let pid = child.id();
        info!(
            pid,
            user_initiated = request.user_initiated,
            channel = %request.channel,
            "update check started"
        );

        let (done, completion) = oneshot::channel();
        tokio::spawn(async move {
            let success = match child.wait().await {
                Ok(status) if status.success() => true,
                Ok(status) => {
                    warn!(pid, %status, "update check exited unsuccessfully");
                    false
                }
                Err(e) => {
                    warn!(pid, "waiting for update check failed: {e}");
                    false
                }
            };
            info!(pid, success, "update check finished");
            let _ = done.send(success);
        });
        Ok(Some(completion))
    }
}

/// Runs `reboot_command` (default `systemctl reboot`).
pub struct CommandRebooter {
    argv: Vec<String>,
}

impl CommandRebooter {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl Rebooter for CommandRebooter {
    fn reboot(&self) -> Result<()> {
        let mut cmd = command(&self.argv).context("reboot_command is not configured")?;
        let child = cmd
            .spawn()
            .with_context(|| format!("failed to start {}", self.argv[0]))?;
        info!(pid = child.id(), "reboot requested");
        Ok(())
    }
}

fn command(argv: &[String]) -> Result<Command> {
    let Some((program, args)) = argv.split_first() else {
        bail!("empty command");
    };
    let mut cmd = Command::new(program);
    cmd.args(args);
    Ok(cmd)
}
