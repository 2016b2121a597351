//! Host collaborator interfaces for bumper
//!
//! This crate defines the seams between the grant manager and the host
//! environment it runs in. It contains no platform code itself, only the
//! traits and in-memory mocks for tests.

mod mock;
mod traits;

pub use mock::*;
pub use traits::*;
