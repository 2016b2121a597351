//! Grant records

use bumper_util::{SubjectId, remaining_minutes_ceil};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Every stored grant, keyed by subject. At most one grant per subject.
pub type GrantMap = BTreeMap<SubjectId, Grant>;

/// One active temporary elevation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    /// The elevated subject
    pub subject_id: SubjectId,

    /// Actor who issued the grant; `None` when unknown or issued by the system
    #[serde(default)]
    pub elevated_by: Option<SubjectId>,

    /// When the grant became active (unix seconds on disk)
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start: DateTime<Utc>,

    /// When the grant stops being valid (unix seconds on disk)
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expires: DateTime<Utc>,
}

impl Grant {
    pub fn new(
        subject_id: SubjectId,
        elevated_by: Option<SubjectId>,
        start: DateTime<Utc>,
        duration: chrono::Duration,
    ) -> Self {
        Self {
            subject_id,
            elevated_by,
            start,
            expires: start + duration,
        }
    }

    /// Length of the grant window
    pub fn duration(&self) -> chrono::Duration {
        self.expires - self.start
    }

    /// Time left until expiry. Zero or negative once expired.
    pub fn remaining(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.expires - now
    }

    /// Whole minutes left, rounded up, never below zero
    pub fn remaining_minutes(&self, now: DateTime<Utc>) -> i64 {
        remaining_minutes_ceil(self.remaining(now))
    }

    /// A grant is expired from its `expires` instant onward
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }
}
