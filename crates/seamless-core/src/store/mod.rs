//! Constraint store: persisted update settings with change notification.
//!
//! Each field is written independently (one UPSERT per `set`); readers
//! assemble [`Constraints`] field by field and substitute configured
//! defaults for anything missing or malformed.

mod db;
mod types;

pub use db::ConstraintStore;
pub use types::{
    Constraints, NetworkType, RebootState, SettingChange, SettingKey, SettingValue,
};
