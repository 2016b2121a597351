//! Host collaborator traits

use bumper_util::SubjectId;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors from host collaborator operations
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Privilege change failed: {0}")]
    Privilege(String),

    #[error("Scheduling failed: {0}")]
    Schedule(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// Toggles the elevated privilege for a subject.
///
/// The manager only calls this; what "elevated" means is up to the host.
/// The flag can be set for reasons unrelated to any grant, so it is never
/// treated as the source of truth for whether a grant exists.
pub trait PrivilegeToggle: Send + Sync {
    /// Give the subject the elevated privilege
    fn grant(&self, subject: &SubjectId) -> HostResult<()>;

    /// Take the elevated privilege away
    fn revoke(&self, subject: &SubjectId) -> HostResult<()>;

    /// Whether the subject currently holds the privilege
    fn is_elevated(&self, subject: &SubjectId) -> HostResult<bool>;
}

/// One-shot wake-ups keyed by subject.
///
/// Firing is best-effort: a wake-up may arrive late, early, twice, or not at
/// all. The manager re-checks expiry on every wake-up and a periodic sweep
/// catches the ones that never arrive.
pub trait Scheduler: Send + Sync {
    /// Schedule a wake-up at `at`, replacing any pending one for the subject
    fn schedule(&self, subject: &SubjectId, at: DateTime<Utc>) -> HostResult<()>;

    /// Remove the subject's pending wake-up. No-op if none exists.
    fn cancel(&self, subject: &SubjectId) -> HostResult<()>;
}

/// A wake-up that came due
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeUp {
    pub subject_id: SubjectId,
    pub fire_at: DateTime<Utc>,
}

/// A subject known to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: SubjectId,
    pub login: Option<String>,
    pub email: Option<String>,
    /// Administrator somewhere on the host (not necessarily elevated)
    pub admin: bool,
}

impl Subject {
    /// Login if known, else the ID
    pub fn display_name(&self) -> &str {
        self.login.as_deref().unwrap_or(self.id.as_str())
    }
}

/// Resolves operator input (ID, login or email) to a subject
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, identifier: &str) -> Option<Subject>;
}
