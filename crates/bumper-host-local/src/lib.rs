//! Local host adapters for bumper
//!
//! Provides:
//! - A SQLite registry of elevated subjects (the privilege flag)
//! - A durable wake-up table polled by the service loop
//! - Identity resolution against the configured subject directory

mod db;
mod directory;
mod privileges;
mod scheduler;

pub use directory::*;
pub use privileges::*;
pub use scheduler::*;
