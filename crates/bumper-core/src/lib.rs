//! Grant manager for bumper
//!
//! This crate owns the grant lifecycle:
//! - Issuing a grant (store record, privilege, expiry wake-up) as one unit
//! - Revoking on wake-up, re-checking expiry against the stored grant
//! - Sweeping every expired grant in one batched write
//! - Read-only listing with time remaining

mod error;
mod manager;

pub use error::*;
pub use manager::*;
