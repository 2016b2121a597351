//! bumperd - timed privilege grants
//!
//! Wires the components together:
//! - Configuration loading and data directory layout
//! - Grant store, privilege registry and wake-up table
//! - The `grant` command surface
//! - The expiry service loop

mod app;
mod commands;
mod service;

pub use app::*;
pub use commands::*;
pub use service::*;
