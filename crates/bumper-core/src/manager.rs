//! Grant manager

use bumper_config::GrantLimits;
use bumper_host_api::{PrivilegeToggle, Scheduler};
use bumper_store::{Grant, GrantStore, GrantTransaction};
use bumper_util::{SubjectId, minutes};
use chrono::{DateTime, SubsecRound, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{GrantError, GrantResult};

/// Result of handling an expiry wake-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevokeOutcome {
    /// No grant stored for the subject; nothing to do
    NotFound,
    /// Grant has not expired yet (early or stale wake-up); re-armed
    Rescheduled { expires: DateTime<Utc> },
    /// Grant was expired and has been removed
    Revoked,
}

/// A stored grant with the time left at the moment of listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveGrant {
    pub grant: Grant,
    /// Zero or negative when the grant is past expiry but not yet swept
    pub remaining: chrono::Duration,
}

impl ActiveGrant {
    /// Whole minutes left, rounded up, never below zero
    pub fn remaining_minutes(&self) -> i64 {
        bumper_util::remaining_minutes_ceil(self.remaining)
    }
}

/// Issues and revokes timed privilege grants.
///
/// Every mutating operation runs inside one store transaction, so concurrent
/// callers (other threads, or another process sharing the store) never lose
/// each other's updates. Time is passed in by the caller.
pub struct GrantManager {
    store: Arc<dyn GrantStore>,
    privileges: Arc<dyn PrivilegeToggle>,
    scheduler: Arc<dyn Scheduler>,
    limits: GrantLimits,
}

impl GrantManager {
    pub fn new(
        store: Arc<dyn GrantStore>,
        privileges: Arc<dyn PrivilegeToggle>,
        scheduler: Arc<dyn Scheduler>,
        limits: GrantLimits,
    ) -> Self {
        info!(
            min_minutes = limits.min_minutes,
            max_minutes = limits.max_minutes,
            "Grant manager initialized"
        );

        Self {
            store,
            privileges,
            scheduler,
            limits,
        }
    }

    pub fn limits(&self) -> GrantLimits {
        self.limits
    }

    /// Elevate `subject` for `duration_minutes` starting at `now`.
    ///
    /// Re-issuing replaces the existing grant; the window restarts from `now`
    /// and is never added to the old one. On failure nothing changes: the
    /// store write is rolled back and a privilege granted by this call is
    /// taken away again.
    pub fn issue(
        &self,
        subject: &SubjectId,
        actor: Option<&SubjectId>,
        duration_minutes: u32,
        now: DateTime<Utc>,
    ) -> GrantResult<Grant> {
        if !self.limits.allows(duration_minutes) {
            return Err(GrantError::InvalidDuration {
                minutes: duration_minutes,
                min: self.limits.min_minutes,
                max: self.limits.max_minutes,
            });
        }

        // Stored with second precision
        let now = now.trunc_subsecs(0);
        let grant = Grant::new(subject.clone(), actor.cloned(), now, minutes(duration_minutes));

        let mut txn = self.store.begin()?;
        let mut grants = txn.get_all()?;
        let replaced = grants.insert(subject.clone(), grant.clone());
        txn.put_all(&grants)?;

        let was_elevated = self.privileges.is_elevated(subject)?;
        if !was_elevated {
            // Dropping the transaction on error rolls the write back
            self.privileges.grant(subject)?;
        }

        if let Err(e) = self.arm_and_commit(txn, &grant) {
            if !was_elevated {
                self.compensate(subject);
            }
            return Err(e);
        }

        info!(
            subject_id = %subject,
            elevated_by = actor.map(|a| a.as_str()).unwrap_or("-"),
            minutes = duration_minutes,
            expires = %grant.expires,
            replaced = replaced.is_some(),
            "Grant issued"
        );

        Ok(grant)
    }

    fn arm_and_commit(
        &self,
        txn: Box<dyn GrantTransaction + '_>,
        grant: &Grant,
    ) -> GrantResult<()> {
        self.scheduler.schedule(&grant.subject_id, grant.expires)?;
        txn.commit()?;
        Ok(())
    }

    fn compensate(&self, subject: &SubjectId) {
        match self.privileges.revoke(subject) {
            Ok(()) => warn!(subject_id = %subject, "Issue failed, privilege taken back"),
            Err(e) => warn!(
                subject_id = %subject,
                error = %e,
                "Issue failed and privilege could not be taken back"
            ),
        }
    }

    /// Handle an expiry wake-up for `subject`.
    ///
    /// The stored grant is authoritative: a wake-up for a grant that was
    /// re-issued since, or that arrives early, only re-arms the timer.
    pub fn revoke_if_expired(
        &self,
        subject: &SubjectId,
        now: DateTime<Utc>,
    ) -> GrantResult<RevokeOutcome> {
        let mut txn = self.store.begin()?;
        let mut grants = txn.get_all()?;

        let Some(grant) = grants.get(subject) else {
            debug!(subject_id = %subject, "Wake-up for subject without grant");
            return Ok(RevokeOutcome::NotFound);
        };

        if !grant.is_expired(now) {
            let expires = grant.expires;
            // Re-arm while the transaction still excludes a concurrent re-issue
            self.scheduler.schedule(subject, expires)?;
            drop(txn);
            debug!(
                subject_id = %subject,
                expires = %expires,
                "Grant not yet expired, re-armed"
            );
            return Ok(RevokeOutcome::Rescheduled { expires });
        }

        self.revoke_privilege_if_held(subject)?;
        grants.remove(subject);
        txn.put_all(&grants)?;
        txn.commit()?;

        info!(subject_id = %subject, "Grant expired and revoked");
        Ok(RevokeOutcome::Revoked)
    }

    /// Remove `subject`'s grant now, whatever its expiry.
    ///
    /// Returns the removed grant, or `None` if there was none. Any pending
    /// wake-up is cancelled either way.
    pub fn revoke(&self, subject: &SubjectId) -> GrantResult<Option<Grant>> {
        let mut txn = self.store.begin()?;
        let mut grants = txn.get_all()?;

        let removed = grants.remove(subject);
        if removed.is_some() {
            self.revoke_privilege_if_held(subject)?;
            txn.put_all(&grants)?;
        }

        // Cancel before releasing the transaction, so a re-issue that follows
        // keeps its own wake-up
        self.scheduler.cancel(subject)?;
        txn.commit()?;

        if removed.is_some() {
            info!(subject_id = %subject, "Grant revoked");
        } else {
            debug!(subject_id = %subject, "No grant to revoke");
        }
        Ok(removed)
    }

    /// Remove every grant expired at `now` and take back its privilege.
    ///
    /// Persists once for the whole batch. A grant whose privilege cannot be
    /// taken back stays stored so the next sweep retries it. Returns the
    /// number of grants removed.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> GrantResult<usize> {
        let mut txn = self.store.begin()?;
        let mut grants = txn.get_all()?;

        let expired: Vec<SubjectId> = grants
            .values()
            .filter(|g| g.is_expired(now))
            .map(|g| g.subject_id.clone())
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for subject in expired {
            match self.revoke_privilege_if_held(&subject) {
                Ok(()) => {
                    grants.remove(&subject);
                    removed.push(subject);
                }
                Err(e) => {
                    warn!(
                        subject_id = %subject,
                        error = %e,
                        "Could not revoke expired grant, will retry"
                    );
                }
            }
        }

        if removed.is_empty() {
            return Ok(0);
        }

        txn.put_all(&grants)?;

        for subject in &removed {
            if let Err(e) = self.scheduler.cancel(subject) {
                warn!(subject_id = %subject, error = %e, "Failed to cancel wake-up");
            }
        }
        txn.commit()?;

        for subject in &removed {
            info!(subject_id = %subject, "Expired grant swept");
        }
        Ok(removed.len())
    }

    /// Every stored grant with its remaining time, soonest expiry first.
    ///
    /// Read-only: grants past expiry are listed, not removed.
    pub fn list_active(&self, now: DateTime<Utc>) -> GrantResult<Vec<ActiveGrant>> {
        let mut active: Vec<ActiveGrant> = self
            .store
            .get_all()?
            .into_values()
            .map(|grant| ActiveGrant {
                remaining: grant.remaining(now),
                grant,
            })
            .collect();

        active.sort_by(|a, b| {
            a.grant
                .expires
                .cmp(&b.grant.expires)
                .then_with(|| a.grant.subject_id.cmp(&b.grant.subject_id))
        });
        Ok(active)
    }

    /// The subject's stored grant, if any
    pub fn get(&self, subject: &SubjectId) -> GrantResult<Option<Grant>> {
        Ok(self.store.get_all()?.remove(subject))
    }

    /// Whether the subject currently holds the privilege, granted or not
    pub fn is_elevated(&self, subject: &SubjectId) -> GrantResult<bool> {
        Ok(self.privileges.is_elevated(subject)?)
    }

    fn revoke_privilege_if_held(&self, subject: &SubjectId) -> GrantResult<()> {
        if self.privileges.is_elevated(subject)? {
            self.privileges.revoke(subject)?;
        }
        Ok(())
    }
}
