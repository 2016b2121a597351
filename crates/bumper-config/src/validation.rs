//! Configuration validation

use crate::policy::{DEFAULT_GRANT_MINUTES, DEFAULT_MAX_MINUTES, DEFAULT_MIN_MINUTES};
use crate::schema::{RawConfig, RawSubject};
use std::collections::HashSet;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Subject '{subject_id}': {message}")]
    SubjectError { subject_id: String, message: String },

    #[error("Duplicate subject ID: {0}")]
    DuplicateSubjectId(String),

    #[error("Duplicate subject login: {0}")]
    DuplicateLogin(String),

    #[error("Duplicate subject email: {0}")]
    DuplicateEmail(String),

    #[error("Invalid grant limits: {0}")]
    InvalidLimits(String),

    #[error("Global config error: {0}")]
    GlobalError(String),
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_limits(config));

    if config.service.tick_interval_seconds == Some(0) {
        errors.push(ValidationError::GlobalError(
            "tick_interval_seconds must be greater than 0".into(),
        ));
    }
    if config.service.sweep_interval_seconds == Some(0) {
        errors.push(ValidationError::GlobalError(
            "sweep_interval_seconds must be greater than 0".into(),
        ));
    }
    if let Some(name) = &config.store.option_name
        && name.trim().is_empty()
    {
        errors.push(ValidationError::GlobalError(
            "option_name cannot be empty".into(),
        ));
    }

    let mut seen_ids = HashSet::new();
    let mut seen_logins = HashSet::new();
    let mut seen_emails = HashSet::new();
    for subject in &config.subjects {
        if !seen_ids.insert(&subject.id) {
            errors.push(ValidationError::DuplicateSubjectId(subject.id.clone()));
        }
        if let Some(login) = &subject.login
            && !seen_logins.insert(login)
        {
            errors.push(ValidationError::DuplicateLogin(login.clone()));
        }
        if let Some(email) = &subject.email
            && !seen_emails.insert(email.to_lowercase())
        {
            errors.push(ValidationError::DuplicateEmail(email.clone()));
        }
        errors.extend(validate_subject(subject));
    }

    errors
}

fn validate_limits(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let min = config.grants.min_minutes.unwrap_or(DEFAULT_MIN_MINUTES);
    let max = config.grants.max_minutes.unwrap_or(DEFAULT_MAX_MINUTES);
    let default = config.grants.default_minutes.unwrap_or(DEFAULT_GRANT_MINUTES);

    if min == 0 {
        errors.push(ValidationError::InvalidLimits(
            "min_minutes must be at least 1".into(),
        ));
    }
    if min > max {
        errors.push(ValidationError::InvalidLimits(format!(
            "min_minutes ({}) exceeds max_minutes ({})",
            min, max
        )));
    }
    if default < min || default > max {
        errors.push(ValidationError::InvalidLimits(format!(
            "default_minutes ({}) must lie within {}-{}",
            default, min, max
        )));
    }

    errors
}

fn validate_subject(subject: &RawSubject) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if subject.id.trim().is_empty() {
        errors.push(ValidationError::SubjectError {
            subject_id: subject.id.clone(),
            message: "id cannot be empty".into(),
        });
    }
    if let Some(email) = &subject.email
        && !email.contains('@')
    {
        errors.push(ValidationError::SubjectError {
            subject_id: subject.id.clone(),
            message: format!("'{}' is not an email address", email),
        });
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> RawConfig {
        toml::from_str(toml_str).unwrap()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = parse("config_version = 1");
        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn test_inverted_limits() {
        let config = parse(
            r#"
            config_version = 1
            [grants]
            min_minutes = 30
            max_minutes = 10
            default_minutes = 20
        "#,
        );

        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidLimits(_))));
    }

    #[test]
    fn test_default_outside_limits() {
        let config = parse(
            r#"
            config_version = 1
            [grants]
            default_minutes = 90
        "#,
        );

        let errors = validate_config(&config);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("default_minutes (90)"));
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let config = parse(
            r#"
            config_version = 1
            [service]
            tick_interval_seconds = 0
            sweep_interval_seconds = 0
        "#,
        );

        assert_eq!(validate_config(&config).len(), 2);
    }

    #[test]
    fn test_duplicate_subject_detection() {
        let config = parse(
            r#"
            config_version = 1

            [[subjects]]
            id = "1"
            login = "alice"
            email = "alice@example.org"

            [[subjects]]
            id = "1"
            login = "alice"
            email = "ALICE@example.org"
        "#,
        );

        let errors = validate_config(&config);
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DuplicateSubjectId(_))));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DuplicateLogin(_))));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::DuplicateEmail(_))));
    }

    #[test]
    fn test_bad_subject_fields() {
        let config = parse(
            r#"
            config_version = 1

            [[subjects]]
            id = " "
            email = "not-an-email"
        "#,
        );

        let errors = validate_config(&config);
        assert_eq!(errors.len(), 2);
    }
}
