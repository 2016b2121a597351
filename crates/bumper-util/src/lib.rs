//! Shared utilities for bumper
//!
//! This crate provides:
//! - ID types (SubjectId)
//! - Time utilities (mockable wall clock, UTC formatting, duration helpers)
//! - Default paths for config and data directories

mod ids;
mod paths;
mod time;

pub use ids::*;
pub use paths::*;
pub use time::*;
