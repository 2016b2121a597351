//! Expiry service loop

use anyhow::{Context, Result};
use bumper_config::ServiceConfig;
use bumper_core::{GrantManager, RevokeOutcome};
use bumper_host_local::SqliteScheduler;
use bumper_util::format_duration;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::App;

/// Fires due wake-ups and sweeps expired grants until signalled to stop.
///
/// Failures inside an iteration are logged and the loop carries on; a
/// wake-up lost to a failure is picked up by the next sweep.
///
/// Store work runs on the blocking pool. A signal that arrives mid-iteration
/// is handled once the iteration ends, at most one store busy timeout later.
#[derive(Clone)]
pub struct Service {
    manager: Arc<GrantManager>,
    scheduler: Arc<SqliteScheduler>,
    config: ServiceConfig,
}

impl Service {
    pub fn new(app: &App) -> Self {
        Self {
            manager: app.manager.clone(),
            scheduler: app.scheduler.clone(),
            config: app.policy.service.clone(),
        }
    }

    /// Drain wake-ups due at `now`. Returns how many grants were revoked.
    pub fn process_due(&self, now: DateTime<Utc>) -> usize {
        let due = match self.scheduler.take_due(now) {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "Failed to read due wake-ups");
                return 0;
            }
        };

        let mut revoked = 0;
        for wake in due {
            match self.manager.revoke_if_expired(&wake.subject_id, now) {
                Ok(RevokeOutcome::Revoked) => revoked += 1,
                Ok(outcome) => {
                    debug!(subject_id = %wake.subject_id, ?outcome, "Wake-up handled");
                }
                Err(e) => {
                    error!(subject_id = %wake.subject_id, error = %e, "Failed to handle wake-up");
                }
            }
        }
        revoked
    }

    /// Sweep every grant expired at `now`. Returns the number removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        match self.manager.sweep_expired(now) {
            Ok(count) => {
                if count > 0 {
                    info!(count, "Swept expired grants");
                }
                count
            }
            Err(e) => {
                error!(error = %e, "Sweep failed");
                0
            }
        }
    }

    pub async fn run(self) -> Result<()> {
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup =
            signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        if self.config.sweep_on_startup {
            self.blocking(|s| s.sweep(bumper_util::now())).await;
        }

        let mut tick_timer = tokio::time::interval(self.config.tick_interval);
        tick_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let sweep_interval = self.config.sweep_interval;
        let mut sweep_timer =
            tokio::time::interval_at(Instant::now() + sweep_interval, sweep_interval);
        sweep_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            tick_interval = %format_duration(self.config.tick_interval),
            sweep_interval = %format_duration(sweep_interval),
            "Service running"
        );

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                _ = tick_timer.tick() => {
                    self.blocking(|s| s.process_due(bumper_util::now())).await;
                }

                _ = sweep_timer.tick() => {
                    self.blocking(|s| s.sweep(bumper_util::now())).await;
                }
            }
        }

        info!("Service stopped");
        Ok(())
    }

    /// Run synchronous store work off the async executor
    async fn blocking<T, F>(&self, work: F) -> Option<T>
    where
        F: FnOnce(&Service) -> T + Send + 'static,
        T: Send + 'static,
    {
        let service = self.clone();
        match tokio::task::spawn_blocking(move || work(&service)).await {
            Ok(value) => Some(value),
            Err(e) => {
                error!(error = %e, "Service task failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumper_config::Policy;
    use bumper_host_api::{PrivilegeToggle, Scheduler};
    use bumper_util::SubjectId;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn open_app(dir: &tempfile::TempDir) -> App {
        let mut policy = Policy::default();
        policy.service.data_dir = dir.path().to_path_buf();
        App::open(policy).unwrap()
    }

    #[test]
    fn test_process_due_revokes_expired() {
        let dir = tempfile::tempdir().unwrap();
        let app = open_app(&dir);
        let service = Service::new(&app);
        let alice = SubjectId::new("alice");

        app.manager.issue(&alice, None, 5, t0()).unwrap();

        assert_eq!(service.process_due(t0() + chrono::Duration::minutes(4)), 0);
        assert_eq!(service.process_due(t0() + chrono::Duration::minutes(5)), 1);
        assert!(!app.privileges.is_elevated(&alice).unwrap());
        assert!(app.manager.get(&alice).unwrap().is_none());
    }

    #[test]
    fn test_stale_wakeup_is_rearmed() {
        let dir = tempfile::tempdir().unwrap();
        let app = open_app(&dir);
        let service = Service::new(&app);
        let alice = SubjectId::new("alice");

        let grant = app.manager.issue(&alice, None, 30, t0()).unwrap();
        // An early wake-up left behind by some other writer
        app.scheduler.schedule(&alice, t0()).unwrap();

        assert_eq!(service.process_due(t0() + chrono::Duration::minutes(1)), 0);
        assert!(app.privileges.is_elevated(&alice).unwrap());

        let pending = app.scheduler.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].fire_at, grant.expires);
    }

    #[tokio::test]
    async fn test_blocking_work_runs_off_executor() {
        let dir = tempfile::tempdir().unwrap();
        let app = open_app(&dir);
        let service = Service::new(&app);

        app.manager
            .issue(&SubjectId::new("alice"), None, 5, t0())
            .unwrap();

        let swept = service
            .blocking(|s| s.sweep(t0() + chrono::Duration::minutes(5)))
            .await;
        assert_eq!(swept, Some(1));
    }

    #[test]
    fn test_sweep_catches_missed_wakeups() {
        let dir = tempfile::tempdir().unwrap();
        let app = open_app(&dir);
        let service = Service::new(&app);
        let alice = SubjectId::new("alice");

        app.manager.issue(&alice, None, 5, t0()).unwrap();
        // Wake-up lost
        app.scheduler.cancel(&alice).unwrap();

        assert_eq!(service.process_due(t0() + chrono::Duration::minutes(10)), 0);
        assert_eq!(service.sweep(t0() + chrono::Duration::minutes(10)), 1);
        assert!(!app.privileges.is_elevated(&alice).unwrap());
    }
}
