//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service loop settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Grant store settings
    #[serde(default)]
    pub store: RawStoreConfig,

    /// Duration bounds for grants
    #[serde(default)]
    pub grants: RawGrantLimits,

    /// Known subjects, used to resolve operator input
    #[serde(default)]
    pub subjects: Vec<RawSubject>,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for the grant and host databases
    pub data_dir: Option<PathBuf>,

    /// How often due wake-ups are polled, in seconds
    pub tick_interval_seconds: Option<u64>,

    /// How often the expiry sweep runs, in seconds
    pub sweep_interval_seconds: Option<u64>,

    /// Sweep once when the service starts
    pub sweep_on_startup: Option<bool>,
}

/// Grant store settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawStoreConfig {
    /// Name of the record holding every grant
    pub option_name: Option<String>,

    /// How long a writer waits for another writer's lock, in milliseconds
    pub busy_timeout_ms: Option<u64>,
}

/// Grant duration bounds, in minutes
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawGrantLimits {
    pub min_minutes: Option<u32>,
    pub max_minutes: Option<u32>,
    pub default_minutes: Option<u32>,
}

/// Directory entry for a subject
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawSubject {
    /// Stable subject ID
    pub id: String,

    /// Login name
    pub login: Option<String>,

    /// Email address
    pub email: Option<String>,

    /// Whether the subject is an administrator somewhere on the host
    #[serde(default)]
    pub admin: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
            config_version = 1

            [service]
            data_dir = "/var/lib/bumper"
            tick_interval_seconds = 2
            sweep_on_startup = false

            [store]
            option_name = "site_grants"

            [grants]
            min_minutes = 10
            max_minutes = 90
            default_minutes = 45

            [[subjects]]
            id = "1"
            login = "alice"
            email = "alice@example.org"
            admin = true

            [[subjects]]
            id = "2"
            login = "bob"
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.service.tick_interval_seconds, Some(2));
        assert_eq!(config.service.sweep_on_startup, Some(false));
        assert_eq!(config.store.option_name.as_deref(), Some("site_grants"));
        assert_eq!(config.grants.max_minutes, Some(90));
        assert_eq!(config.subjects.len(), 2);
        assert!(config.subjects[0].admin);
        assert!(!config.subjects[1].admin);
        assert!(config.subjects[1].email.is_none());
    }

    #[test]
    fn parse_minimal_config() {
        let config: RawConfig = toml::from_str("config_version = 1").unwrap();
        assert!(config.subjects.is_empty());
        assert!(config.grants.min_minutes.is_none());
    }
}
