//! The `grant` command surface

use bumper_core::{ActiveGrant, GrantError, GrantManager};
use bumper_host_api::{IdentityResolver, Subject};
use bumper_util::{SubjectId, format_utc};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

/// Errors surfaced to the operator
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Subject not found: {0}")]
    SubjectNotFound(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error(transparent)]
    Grant(#[from] GrantError),
}

/// One message produced by a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    /// Advisory; the command carried on
    Warning(String),
    /// The command was aborted
    Failure(String),
}

/// Everything a command reported, in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandReport {
    pub outcomes: Vec<Outcome>,
}

impl CommandReport {
    fn success(&mut self, message: impl Into<String>) {
        self.outcomes.push(Outcome::Success(message.into()));
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.outcomes.push(Outcome::Warning(message.into()));
    }

    fn failure(&mut self, error: CommandError) {
        self.outcomes.push(Outcome::Failure(error.to_string()));
    }

    pub fn failed(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(o, Outcome::Failure(_)))
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().filter_map(|o| match o {
            Outcome::Warning(m) => Some(m.as_str()),
            _ => None,
        })
    }

    /// 0 on success, with or without warnings; 1 on failure
    pub fn exit_code(&self) -> i32 {
        if self.failed() { 1 } else { 0 }
    }

    /// Successes to stdout; warnings and errors to stderr
    pub fn print(&self) {
        for outcome in &self.outcomes {
            match outcome {
                Outcome::Success(m) => println!("{}", m),
                Outcome::Warning(m) => eprintln!("Warning: {}", m),
                Outcome::Failure(m) => eprintln!("Error: {}", m),
            }
        }
    }
}

/// Operator commands over a grant manager and a subject directory.
///
/// `actor` is the identifier the operator claims to act as. Every command
/// checks it first: with no actor the command only draws a warning, an
/// actor that does not resolve or is not currently elevated is refused.
pub struct GrantCommands<'a> {
    manager: &'a GrantManager,
    directory: &'a dyn IdentityResolver,
}

impl<'a> GrantCommands<'a> {
    pub fn new(manager: &'a GrantManager, directory: &'a dyn IdentityResolver) -> Self {
        Self { manager, directory }
    }

    /// `grant add <subject> [--minutes N]`
    pub fn add(
        &self,
        actor: Option<&str>,
        subject: &str,
        minutes: Option<u32>,
        now: DateTime<Utc>,
    ) -> CommandReport {
        self.run(actor, |report, actor| {
            let subject = self.resolve(subject)?;
            let minutes = minutes.unwrap_or(self.manager.limits().default_minutes);

            if !subject.admin && !self.manager.is_elevated(&subject.id)? {
                report.warning(format!(
                    "{} is not an admin, proceeding anyway.",
                    subject.display_name()
                ));
            }

            let grant = self
                .manager
                .issue(&subject.id, actor.as_ref(), minutes, now)?;

            report.success(format!(
                "Bumped {} (ID {}) for {} minutes. Expires at {} UTC.",
                subject.display_name(),
                subject.id,
                minutes,
                format_utc(&grant.expires)
            ));
            Ok(())
        })
    }

    /// `grant list`
    pub fn list(&self, actor: Option<&str>, now: DateTime<Utc>) -> CommandReport {
        self.run(actor, |report, _| {
            let active = self.manager.list_active(now)?;
            if active.is_empty() {
                report.success("No active grants.");
            } else {
                report.success(format_table(&active));
            }
            Ok(())
        })
    }

    /// `grant clear-expired`
    pub fn clear_expired(&self, actor: Option<&str>, now: DateTime<Utc>) -> CommandReport {
        self.run(actor, |report, _| {
            let cleared = self.manager.sweep_expired(now)?;
            report.success(format!("Cleared {} expired grant(s).", cleared));
            Ok(())
        })
    }

    /// `grant revoke <subject>`
    pub fn revoke(&self, actor: Option<&str>, subject: &str) -> CommandReport {
        self.run(actor, |report, _| {
            let subject = self.resolve(subject)?;
            match self.manager.revoke(&subject.id)? {
                Some(_) => report.success(format!(
                    "Revoked grant for {} (ID {}).",
                    subject.display_name(),
                    subject.id
                )),
                None => report.success(format!(
                    "No grant for {} (ID {}).",
                    subject.display_name(),
                    subject.id
                )),
            }
            Ok(())
        })
    }

    fn run<F>(&self, actor: Option<&str>, body: F) -> CommandReport
    where
        F: FnOnce(&mut CommandReport, Option<SubjectId>) -> Result<(), CommandError>,
    {
        let mut report = CommandReport::default();

        let result = self
            .check_actor(actor, &mut report)
            .and_then(|actor| body(&mut report, actor));

        if let Err(e) = result {
            report.failure(e);
        }
        report
    }

    /// Returns the actor's ID, or `None` when no actor was given
    fn check_actor(
        &self,
        actor: Option<&str>,
        report: &mut CommandReport,
    ) -> Result<Option<SubjectId>, CommandError> {
        let Some(actor) = actor else {
            warn!("No actor given, proceeding");
            report.warning(
                CommandError::NotAuthorized("no actor given, proceeding anyway".into())
                    .to_string(),
            );
            return Ok(None);
        };

        let subject = self
            .directory
            .resolve(actor)
            .ok_or_else(|| CommandError::NotAuthorized(format!("unknown actor {}", actor)))?;

        // Admin rights alone do not allow elevating anyone, oneself included
        if self.manager.is_elevated(&subject.id)? {
            return Ok(Some(subject.id));
        }

        Err(CommandError::NotAuthorized(format!(
            "{} is not elevated",
            subject.display_name()
        )))
    }

    fn resolve(&self, identifier: &str) -> Result<Subject, CommandError> {
        self.directory
            .resolve(identifier)
            .ok_or_else(|| CommandError::SubjectNotFound(identifier.to_string()))
    }
}

fn format_table(active: &[ActiveGrant]) -> String {
    let mut out = format!(
        "{:<16} {:<16} {:<20} {:<20} {}",
        "SUBJECT", "ELEVATED BY", "START (UTC)", "EXPIRES (UTC)", "REMAINING (MIN)"
    );
    for entry in active {
        let grant = &entry.grant;
        out.push('\n');
        out.push_str(&format!(
            "{:<16} {:<16} {:<20} {:<20} {}",
            grant.subject_id,
            grant
                .elevated_by
                .as_ref()
                .map(|a| a.as_str())
                .unwrap_or("-"),
            format_utc(&grant.start),
            format_utc(&grant.expires),
            entry.remaining_minutes()
        ));
    }
    out
}
