//! CLI command handlers, one file per command.

mod check;
mod completions;
mod reboot;
mod reset;
mod run;
mod set;
mod status;

pub use check::run_check;
pub use completions::{run_completions, run_man};
pub use reboot::{run_reboot_completed, run_reboot_required};
pub use reset::run_reset;
pub use run::run_daemon;
pub use set::run_set;
pub use status::run_status;
