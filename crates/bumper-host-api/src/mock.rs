//! Mock host collaborators for testing

use bumper_util::SubjectId;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::{
    HostError, HostResult, IdentityResolver, PrivilegeToggle, Scheduler, Subject, WakeUp,
};

/// In-memory privilege flags with call counters and failure switches
pub struct MockPrivileges {
    elevated: Mutex<HashSet<SubjectId>>,
    grant_calls: AtomicUsize,
    revoke_calls: AtomicUsize,

    /// Configure grant to fail
    pub fail_grant: Arc<Mutex<bool>>,

    /// Configure revoke to fail
    pub fail_revoke: Arc<Mutex<bool>>,
}

impl MockPrivileges {
    pub fn new() -> Self {
        Self {
            elevated: Mutex::new(HashSet::new()),
            grant_calls: AtomicUsize::new(0),
            revoke_calls: AtomicUsize::new(0),
            fail_grant: Arc::new(Mutex::new(false)),
            fail_revoke: Arc::new(Mutex::new(false)),
        }
    }

    /// Mark a subject elevated without counting a grant call, as if the host
    /// elevated it for some unrelated reason
    pub fn set_elevated(&self, subject: &SubjectId, elevated: bool) {
        let mut set = self.elevated.lock().unwrap();
        if elevated {
            set.insert(subject.clone());
        } else {
            set.remove(subject);
        }
    }

    pub fn elevated(&self, subject: &SubjectId) -> bool {
        self.elevated.lock().unwrap().contains(subject)
    }

    pub fn grant_calls(&self) -> usize {
        self.grant_calls.load(Ordering::SeqCst)
    }

    pub fn revoke_calls(&self) -> usize {
        self.revoke_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockPrivileges {
    fn default() -> Self {
        Self::new()
    }
}

impl PrivilegeToggle for MockPrivileges {
    fn grant(&self, subject: &SubjectId) -> HostResult<()> {
        if *self.fail_grant.lock().unwrap() {
            return Err(HostError::Privilege("Mock grant failure".into()));
        }
        self.grant_calls.fetch_add(1, Ordering::SeqCst);
        self.elevated.lock().unwrap().insert(subject.clone());
        Ok(())
    }

    fn revoke(&self, subject: &SubjectId) -> HostResult<()> {
        if *self.fail_revoke.lock().unwrap() {
            return Err(HostError::Privilege("Mock revoke failure".into()));
        }
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        self.elevated.lock().unwrap().remove(subject);
        Ok(())
    }

    fn is_elevated(&self, subject: &SubjectId) -> HostResult<bool> {
        Ok(self.elevated(subject))
    }
}

/// A scheduler call, recorded in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerCall {
    Schedule { subject_id: SubjectId, at: DateTime<Utc> },
    Cancel { subject_id: SubjectId },
}

/// In-memory scheduler that never fires on its own.
///
/// Tests drive wake-ups by hand with [`MockScheduler::take_due`].
pub struct MockScheduler {
    pending: Mutex<BTreeMap<SubjectId, DateTime<Utc>>>,
    calls: Mutex<Vec<SchedulerCall>>,

    /// Configure schedule to fail
    pub fail_schedule: Arc<Mutex<bool>>,
}

impl MockScheduler {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_schedule: Arc::new(Mutex::new(false)),
        }
    }

    /// Pending fire time for a subject
    pub fn pending_for(&self, subject: &SubjectId) -> Option<DateTime<Utc>> {
        self.pending.lock().unwrap().get(subject).copied()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Every call made so far
    pub fn calls(&self) -> Vec<SchedulerCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Remove and return wake-ups due at `now`
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<WakeUp> {
        let mut pending = self.pending.lock().unwrap();
        let due: Vec<WakeUp> = pending
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(subject_id, at)| WakeUp {
                subject_id: subject_id.clone(),
                fire_at: *at,
            })
            .collect();
        for wake in &due {
            pending.remove(&wake.subject_id);
        }
        due
    }
}

impl Default for MockScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for MockScheduler {
    fn schedule(&self, subject: &SubjectId, at: DateTime<Utc>) -> HostResult<()> {
        if *self.fail_schedule.lock().unwrap() {
            return Err(HostError::Schedule("Mock schedule failure".into()));
        }
        self.calls.lock().unwrap().push(SchedulerCall::Schedule {
            subject_id: subject.clone(),
            at,
        });
        self.pending.lock().unwrap().insert(subject.clone(), at);
        Ok(())
    }

    fn cancel(&self, subject: &SubjectId) -> HostResult<()> {
        self.calls.lock().unwrap().push(SchedulerCall::Cancel {
            subject_id: subject.clone(),
        });
        self.pending.lock().unwrap().remove(subject);
        Ok(())
    }
}

/// Fixed list of subjects, resolved by ID, login or email
#[derive(Debug, Clone, Default)]
pub struct MockDirectory {
    subjects: Vec<Subject>,
}

impl MockDirectory {
    pub fn new(subjects: Vec<Subject>) -> Self {
        Self { subjects }
    }
}

impl IdentityResolver for MockDirectory {
    fn resolve(&self, identifier: &str) -> Option<Subject> {
        self.subjects
            .iter()
            .find(|s| {
                s.id.as_str() == identifier
                    || s.login.as_deref() == Some(identifier)
                    || s.email.as_deref() == Some(identifier)
            })
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn mock_privileges_toggle() {
        let privileges = MockPrivileges::new();
        let alice = SubjectId::new("alice");

        assert!(!privileges.is_elevated(&alice).unwrap());
        privileges.grant(&alice).unwrap();
        assert!(privileges.is_elevated(&alice).unwrap());
        privileges.revoke(&alice).unwrap();
        assert!(!privileges.is_elevated(&alice).unwrap());

        assert_eq!(privileges.grant_calls(), 1);
        assert_eq!(privileges.revoke_calls(), 1);
    }

    #[test]
    fn mock_privileges_failure() {
        let privileges = MockPrivileges::new();
        *privileges.fail_grant.lock().unwrap() = true;

        let alice = SubjectId::new("alice");
        assert!(privileges.grant(&alice).is_err());
        assert!(!privileges.elevated(&alice));
        assert_eq!(privileges.grant_calls(), 0);
    }

    #[test]
    fn mock_scheduler_replaces_pending() {
        let scheduler = MockScheduler::new();
        let alice = SubjectId::new("alice");
        let t1 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let t2 = t1 + chrono::Duration::minutes(10);

        scheduler.schedule(&alice, t1).unwrap();
        scheduler.schedule(&alice, t2).unwrap();

        assert_eq!(scheduler.pending_count(), 1);
        assert_eq!(scheduler.pending_for(&alice), Some(t2));
    }

    #[test]
    fn mock_scheduler_take_due() {
        let scheduler = MockScheduler::new();
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        scheduler.schedule(&SubjectId::new("early"), t0).unwrap();
        scheduler
            .schedule(&SubjectId::new("late"), t0 + chrono::Duration::minutes(5))
            .unwrap();

        let due = scheduler.take_due(t0);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].subject_id.as_str(), "early");
        assert_eq!(scheduler.pending_count(), 1);
    }

    #[test]
    fn mock_directory_resolves_any_identifier() {
        let directory = MockDirectory::new(vec![Subject {
            id: SubjectId::new("1"),
            login: Some("alice".into()),
            email: Some("alice@example.org".into()),
            admin: true,
        }]);

        assert!(directory.resolve("1").is_some());
        assert!(directory.resolve("alice").is_some());
        assert!(directory.resolve("alice@example.org").is_some());
        assert!(directory.resolve("bob").is_none());
    }
}
