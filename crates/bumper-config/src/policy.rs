//! Validated policy structures

use crate::schema::{RawConfig, RawGrantLimits, RawServiceConfig, RawStoreConfig, RawSubject};
use bumper_util::{SubjectId, default_data_dir};
use std::path::PathBuf;
use std::time::Duration;

/// Default lower bound on a grant, in minutes
pub const DEFAULT_MIN_MINUTES: u32 = 5;

/// Default upper bound on a grant, in minutes
pub const DEFAULT_MAX_MINUTES: u32 = 60;

/// Default grant duration when the operator does not pass one
pub const DEFAULT_GRANT_MINUTES: u32 = 30;

/// Default name of the record holding every grant
pub const DEFAULT_OPTION_NAME: &str = "bumper_grants";

/// Validated policy ready for use by the grant manager and the service
#[derive(Debug, Clone, Default)]
pub struct Policy {
    /// Service loop configuration
    pub service: ServiceConfig,

    /// Grant store configuration
    pub store: StoreConfig,

    /// Grant duration bounds
    pub limits: GrantLimits,

    /// Known subjects
    pub subjects: Vec<SubjectEntry>,
}

impl Policy {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            service: ServiceConfig::from_raw(raw.service),
            store: StoreConfig::from_raw(raw.store),
            limits: GrantLimits::from_raw(&raw.grants),
            subjects: raw.subjects.into_iter().map(SubjectEntry::from_raw).collect(),
        }
    }
}

/// Service loop configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
    pub tick_interval: Duration,
    pub sweep_interval: Duration,
    pub sweep_on_startup: bool,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: raw.data_dir.unwrap_or(defaults.data_dir),
            tick_interval: raw
                .tick_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.tick_interval),
            sweep_interval: raw
                .sweep_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            sweep_on_startup: raw.sweep_on_startup.unwrap_or(defaults.sweep_on_startup),
        }
    }

    /// Path of the grant database inside the data directory
    pub fn grants_db_path(&self) -> PathBuf {
        self.data_dir.join("grants.db")
    }

    /// Path of the host database (privileges and wake-ups)
    pub fn host_db_path(&self) -> PathBuf {
        self.data_dir.join("host.db")
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            tick_interval: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(60),
            sweep_on_startup: true,
        }
    }
}

/// Grant store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub option_name: String,
    pub busy_timeout: Duration,
}

impl StoreConfig {
    fn from_raw(raw: RawStoreConfig) -> Self {
        let defaults = Self::default();
        Self {
            option_name: raw.option_name.unwrap_or(defaults.option_name),
            busy_timeout: raw
                .busy_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.busy_timeout),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            option_name: DEFAULT_OPTION_NAME.to_string(),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Inclusive bounds on grant duration, in minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrantLimits {
    pub min_minutes: u32,
    pub max_minutes: u32,
    pub default_minutes: u32,
}

impl GrantLimits {
    fn from_raw(raw: &RawGrantLimits) -> Self {
        Self {
            min_minutes: raw.min_minutes.unwrap_or(DEFAULT_MIN_MINUTES),
            max_minutes: raw.max_minutes.unwrap_or(DEFAULT_MAX_MINUTES),
            default_minutes: raw.default_minutes.unwrap_or(DEFAULT_GRANT_MINUTES),
        }
    }

    /// Whether a requested duration lies within the bounds
    pub fn allows(&self, minutes: u32) -> bool {
        (self.min_minutes..=self.max_minutes).contains(&minutes)
    }
}

impl Default for GrantLimits {
    fn default() -> Self {
        Self {
            min_minutes: DEFAULT_MIN_MINUTES,
            max_minutes: DEFAULT_MAX_MINUTES,
            default_minutes: DEFAULT_GRANT_MINUTES,
        }
    }
}

/// A known subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectEntry {
    pub id: SubjectId,
    pub login: Option<String>,
    pub email: Option<String>,
    pub admin: bool,
}

impl SubjectEntry {
    fn from_raw(raw: RawSubject) -> Self {
        Self {
            id: SubjectId::new(raw.id),
            login: raw.login,
            email: raw.email,
            admin: raw.admin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let raw: RawConfig = toml::from_str("config_version = 1").unwrap();
        let policy = Policy::from_raw(raw);

        assert_eq!(policy.limits, GrantLimits::default());
        assert_eq!(policy.store.option_name, DEFAULT_OPTION_NAME);
        assert_eq!(policy.service.tick_interval, Duration::from_secs(5));
        assert!(policy.service.sweep_on_startup);
    }

    #[test]
    fn limits_are_inclusive() {
        let limits = GrantLimits::default();
        assert!(!limits.allows(4));
        assert!(limits.allows(5));
        assert!(limits.allows(30));
        assert!(limits.allows(60));
        assert!(!limits.allows(61));
    }

    #[test]
    fn db_paths_live_in_data_dir() {
        let service = ServiceConfig {
            data_dir: PathBuf::from("/srv/bumper"),
            ..Default::default()
        };
        assert_eq!(service.grants_db_path(), PathBuf::from("/srv/bumper/grants.db"));
        assert_eq!(service.host_db_path(), PathBuf::from("/srv/bumper/host.db"));
    }

    #[test]
    fn subjects_from_raw() {
        let raw: RawConfig = toml::from_str(
            r#"
            config_version = 1

            [[subjects]]
            id = "7"
            login = "carol"
        "#,
        )
        .unwrap();
        let policy = Policy::from_raw(raw);

        assert_eq!(policy.subjects.len(), 1);
        let carol = &policy.subjects[0];
        assert_eq!(carol.id, SubjectId::new("7"));
        assert_eq!(carol.login.as_deref(), Some("carol"));
        assert!(carol.email.is_none());
        assert!(!carol.admin);
    }
}
