//! Component wiring shared by the commands and the service

use anyhow::{Context, Result, bail};
use bumper_config::Policy;
use bumper_core::GrantManager;
use bumper_host_local::{DirectoryResolver, SqlitePrivileges, SqliteScheduler};
use bumper_store::{GrantStore, SqliteGrantStore};
use std::sync::Arc;
use tracing::info;

/// Opened stores and the grant manager built on them
pub struct App {
    pub policy: Policy,
    pub manager: Arc<GrantManager>,
    pub privileges: Arc<SqlitePrivileges>,
    pub scheduler: Arc<SqliteScheduler>,
    pub directory: DirectoryResolver,
}

impl App {
    pub fn open(policy: Policy) -> Result<Self> {
        let data_dir = &policy.service.data_dir;
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let busy_timeout = policy.store.busy_timeout;

        let grants_path = policy.service.grants_db_path();
        let store = SqliteGrantStore::open(&grants_path, busy_timeout)
            .with_context(|| format!("Failed to open grant database {:?}", grants_path))?
            .with_option_name(policy.store.option_name.clone());
        if !store.is_healthy() {
            bail!("Grant database {:?} is not usable", grants_path);
        }

        let host_path = policy.service.host_db_path();
        let privileges = Arc::new(
            SqlitePrivileges::open(&host_path, busy_timeout)
                .with_context(|| format!("Failed to open host database {:?}", host_path))?,
        );
        let scheduler = Arc::new(
            SqliteScheduler::open(&host_path, busy_timeout)
                .with_context(|| format!("Failed to open host database {:?}", host_path))?,
        );

        info!(
            grants_db = %grants_path.display(),
            host_db = %host_path.display(),
            option_name = store.option_name(),
            "Stores opened"
        );

        let manager = Arc::new(GrantManager::new(
            Arc::new(store),
            privileges.clone(),
            scheduler.clone(),
            policy.limits,
        ));
        let directory = DirectoryResolver::from_policy(&policy.subjects);

        Ok(Self {
            policy,
            manager,
            privileges,
            scheduler,
            directory,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy_in(dir: &tempfile::TempDir) -> Policy {
        let mut policy = Policy::default();
        policy.service.data_dir = dir.path().to_path_buf();
        policy
    }

    #[test]
    fn test_open_creates_databases() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::open(policy_in(&dir)).unwrap();

        assert!(app.policy.service.grants_db_path().exists());
        assert!(app.policy.service.host_db_path().exists());
        assert!(app.directory.is_open());
    }

    #[test]
    fn test_open_rejects_unusable_grant_database() {
        let dir = tempfile::tempdir().unwrap();
        let policy = policy_in(&dir);
        std::fs::write(
            policy.service.grants_db_path(),
            "this is plain text and certainly not an SQLite database file",
        )
        .unwrap();

        assert!(App::open(policy).is_err());
    }
}
