//! Checks a bumper configuration file without starting anything.
//!
//! `validate-config [FILE]` validates FILE, or the default config path when
//! no argument is given. Exit status: 0 valid, 1 invalid or unreadable,
//! 2 bad usage.

use bumper_config::{CURRENT_CONFIG_VERSION, ConfigError, Policy, load_config};
use bumper_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn summarize(policy: &Policy) -> Vec<String> {
    let limits = &policy.limits;
    let mut lines = vec![
        format!("config_version  {}", CURRENT_CONFIG_VERSION),
        format!(
            "grant minutes   {}..={} (default {})",
            limits.min_minutes, limits.max_minutes, limits.default_minutes
        ),
        format!("data dir        {}", policy.service.data_dir.display()),
        format!("grant record    {}", policy.store.option_name),
    ];

    if policy.subjects.is_empty() {
        lines.push("subjects        none (open directory)".to_string());
    }
    for subject in &policy.subjects {
        lines.push(format!(
            "subject         {}{} login={} email={}",
            subject.id,
            if subject.admin { " (admin)" } else { "" },
            subject.login.as_deref().unwrap_or("-"),
            subject.email.as_deref().unwrap_or("-"),
        ));
    }
    lines
}

fn describe(err: &ConfigError) -> Vec<String> {
    match err {
        ConfigError::ValidationFailed { errors } => {
            errors.iter().map(|e| e.to_string()).collect()
        }
        ConfigError::UnsupportedVersion(found) => vec![format!(
            "config_version {} is not supported (this build reads {})",
            found, CURRENT_CONFIG_VERSION
        )],
        other => vec![other.to_string()],
    }
}

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let path = match (args.next(), args.next()) {
        (Some(path), None) => PathBuf::from(path),
        (None, None) => default_config_path(),
        _ => {
            eprintln!("usage: validate-config [FILE]");
            return ExitCode::from(2);
        }
    };

    match load_config(&path) {
        Ok(policy) => {
            println!("{}: ok", path.display());
            for line in summarize(&policy) {
                println!("  {}", line);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: invalid", path.display());
            for line in describe(&e) {
                eprintln!("  {}", line);
            }
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_subjects() {
        let policy = bumper_config::parse_config(
            r#"
            config_version = 1

            [[subjects]]
            id = "1"
            login = "root"
            admin = true
        "#,
        )
        .unwrap();

        let lines = summarize(&policy);
        assert!(lines.iter().any(|l| l == "grant minutes   5..=60 (default 30)"));
        assert!(lines.iter().any(|l| l == "subject         1 (admin) login=root email=-"));
    }

    #[test]
    fn describe_lists_each_validation_error() {
        let err = bumper_config::parse_config(
            r#"
            config_version = 1

            [[subjects]]
            id = "1"

            [[subjects]]
            id = "1"
        "#,
        )
        .unwrap_err();

        assert_eq!(describe(&err), vec!["Duplicate subject ID: 1".to_string()]);
    }
}
