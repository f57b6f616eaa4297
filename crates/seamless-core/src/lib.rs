pub mod config;
pub mod logging;
pub mod state_db;

pub mod device;
pub mod error;
pub mod exec;
pub mod host;
pub mod idle_reboot;
pub mod manual;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod trigger;

#[cfg(test)]
mod testing;
