use bumper_host_api::HostError;
use bumper_store::StoreError;
use thiserror::Error;

/// Grant manager errors
#[derive(Debug, Error)]
pub enum GrantError {
    #[error("Invalid duration: {minutes} minutes (allowed {min}-{max})")]
    InvalidDuration { minutes: u32, min: u32, max: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Host(#[from] HostError),
}

pub type GrantResult<T> = Result<T, GrantError>;
