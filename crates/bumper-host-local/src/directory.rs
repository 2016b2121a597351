//! Identity resolution against the configured subject list

use bumper_config::SubjectEntry;
use bumper_host_api::{IdentityResolver, Subject};
use bumper_util::SubjectId;

/// Resolves operator input to a subject from configuration.
///
/// Lookup order is exact ID, then login, then email (case-insensitive).
/// With no subjects configured the directory is open: any non-empty
/// identifier resolves to a non-admin subject with that ID.
#[derive(Debug, Clone, Default)]
pub struct DirectoryResolver {
    subjects: Vec<Subject>,
}

impl DirectoryResolver {
    pub fn from_policy(entries: &[SubjectEntry]) -> Self {
        let subjects = entries
            .iter()
            .map(|entry| Subject {
                id: entry.id.clone(),
                login: entry.login.clone(),
                email: entry.email.clone(),
                admin: entry.admin,
            })
            .collect();
        Self { subjects }
    }

    pub fn is_open(&self) -> bool {
        self.subjects.is_empty()
    }
}

impl IdentityResolver for DirectoryResolver {
    fn resolve(&self, identifier: &str) -> Option<Subject> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return None;
        }

        if self.is_open() {
            return Some(Subject {
                id: SubjectId::new(identifier),
                login: None,
                email: None,
                admin: false,
            });
        }

        self.subjects
            .iter()
            .find(|s| s.id.as_str() == identifier)
            .or_else(|| {
                self.subjects
                    .iter()
                    .find(|s| s.login.as_deref() == Some(identifier))
            })
            .or_else(|| {
                self.subjects.iter().find(|s| {
                    s.email
                        .as_deref()
                        .is_some_and(|email| email.eq_ignore_ascii_case(identifier))
                })
            })
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<SubjectEntry> {
        vec![
            SubjectEntry {
                id: SubjectId::new("1"),
                login: Some("alice".into()),
                email: Some("Alice@Example.org".into()),
                admin: true,
            },
            SubjectEntry {
                id: SubjectId::new("2"),
                login: Some("bob".into()),
                email: None,
                admin: false,
            },
            // Login that collides with another subject's ID
            SubjectEntry {
                id: SubjectId::new("3"),
                login: Some("1".into()),
                email: None,
                admin: false,
            },
        ]
    }

    #[test]
    fn test_resolve_by_each_identifier() {
        let directory = DirectoryResolver::from_policy(&entries());

        assert_eq!(directory.resolve("2").unwrap().login.as_deref(), Some("bob"));
        assert_eq!(directory.resolve("bob").unwrap().id.as_str(), "2");
        assert_eq!(directory.resolve("alice@example.org").unwrap().id.as_str(), "1");
        assert!(directory.resolve("carol").is_none());
    }

    #[test]
    fn test_id_wins_over_login() {
        let directory = DirectoryResolver::from_policy(&entries());
        let subject = directory.resolve("1").unwrap();
        assert_eq!(subject.login.as_deref(), Some("alice"));
        assert!(subject.admin);
    }

    #[test]
    fn test_open_directory() {
        let directory = DirectoryResolver::from_policy(&[]);
        assert!(directory.is_open());

        let subject = directory.resolve(" anyone ").unwrap();
        assert_eq!(subject.id.as_str(), "anyone");
        assert!(!subject.admin);

        assert!(directory.resolve("   ").is_none());
    }
}
