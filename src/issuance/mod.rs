//! # Issuance
//!
//! Records that a user has been granted a certificate, with a unique code
//! that the verification page and the `code`/`qrcode` elements show.
//!
//! This sits beside the rendering core rather than inside it: renderers
//! only see the read-only [`IssueLookup`] view.

pub mod email;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::context::User;
use crate::error::{ParchmentError, Result};
use crate::model::Id;

/// One certificate granted to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: Id,
    pub certificate_id: Id,
    pub user_id: Id,
    pub code: String,
    pub time_created: DateTime<Utc>,
    /// Set once the certificate has been emailed. Email runs skip it after.
    pub emailed: bool,
}

pub trait IssueStore {
    fn find(&self, certificate_id: Id, user_id: Id) -> Option<Issue>;
    fn get(&self, id: Id) -> Option<Issue>;
    fn code_exists(&self, code: &str) -> bool;
    fn insert(&mut self, issue: Issue) -> Result<Id>;
    fn mark_emailed(&mut self, id: Id) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryIssueStore {
    issues: BTreeMap<Id, Issue>,
    next_id: Id,
}

impl MemoryIssueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

impl IssueStore for MemoryIssueStore {
    fn find(&self, certificate_id: Id, user_id: Id) -> Option<Issue> {
        self.issues
            .values()
            .find(|i| i.certificate_id == certificate_id && i.user_id == user_id)
            .cloned()
    }

    fn get(&self, id: Id) -> Option<Issue> {
        self.issues.get(&id).cloned()
    }

    fn code_exists(&self, code: &str) -> bool {
        self.issues.values().any(|i| i.code == code)
    }

    fn insert(&mut self, mut issue: Issue) -> Result<Id> {
        self.next_id += 1;
        issue.id = self.next_id;
        self.issues.insert(issue.id, issue);
        Ok(self.next_id)
    }

    fn mark_emailed(&mut self, id: Id) -> Result<()> {
        match self.issues.get_mut(&id) {
            Some(issue) => {
                issue.emailed = true;
                Ok(())
            }
            None => Err(ParchmentError::not_found("issue", id)),
        }
    }
}

/// How issue codes look.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CodeFormat {
    /// Ten characters from `[A-Za-z0-9]`.
    #[default]
    Alphanumeric,
    /// `dddd-dddd-dddd`.
    DigitsWithHyphens,
}

#[derive(Debug, Clone, Copy)]
pub struct CodeGenerator {
    format: CodeFormat,
}

impl CodeGenerator {
    pub fn new(format: CodeFormat) -> Self {
        Self { format }
    }

    pub fn generate(&self) -> String {
        self.generate_with(&mut rand::rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        match self.format {
            CodeFormat::Alphanumeric => (0..10).map(|_| rng.sample(Alphanumeric) as char).collect(),
            CodeFormat::DigitsWithHyphens => (0..3)
                .map(|_| {
                    (0..4)
                        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
                        .collect::<String>()
                })
                .collect::<Vec<_>>()
                .join("-"),
        }
    }
}

/// Issues certificates with codes unique across the store.
pub struct Issuer<'a, S: IssueStore> {
    store: &'a mut S,
    generator: CodeGenerator,
    max_attempts: u32,
}

impl<'a, S: IssueStore> Issuer<'a, S> {
    pub fn new(store: &'a mut S, config: &EngineConfig) -> Self {
        Self {
            store,
            generator: CodeGenerator::new(config.code_format),
            max_attempts: config.max_code_attempts,
        }
    }

    pub fn with_generator(mut self, generator: CodeGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn store(&mut self) -> &mut S {
        &mut *self.store
    }

    /// The user's issue for this certificate, created if there is none yet.
    pub fn issue(&mut self, certificate_id: Id, user: &User) -> Result<Issue> {
        if let Some(existing) = self.store.find(certificate_id, user.id) {
            return Ok(existing);
        }
        let code = self.unique_code(|| self.generator.generate())?;
        self.insert(certificate_id, user, code)
    }

    /// As [`Issuer::issue`] with a caller-supplied code source.
    pub fn issue_with<F: FnMut() -> String>(&mut self, certificate_id: Id, user: &User, next_code: F) -> Result<Issue> {
        if let Some(existing) = self.store.find(certificate_id, user.id) {
            return Ok(existing);
        }
        let code = self.unique_code(next_code)?;
        self.insert(certificate_id, user, code)
    }

    fn unique_code<F: FnMut() -> String>(&self, mut next_code: F) -> Result<String> {
        for _ in 0..self.max_attempts {
            let code = next_code();
            if !self.store.code_exists(&code) {
                return Ok(code);
            }
        }
        Err(ParchmentError::Issuance(format!(
            "no unique code after {} attempts",
            self.max_attempts
        )))
    }

    fn insert(&mut self, certificate_id: Id, user: &User, code: String) -> Result<Issue> {
        let mut issue = Issue {
            id: 0,
            certificate_id,
            user_id: user.id,
            code,
            time_created: Utc::now(),
            emailed: false,
        };
        issue.id = self.store.insert(issue.clone())?;
        log::info!(
            "issued certificate {} to user {} with code {}",
            certificate_id,
            user.id,
            issue.code
        );
        Ok(issue)
    }
}

/// What renderers may know about issues.
pub trait IssueLookup {
    fn issue_code(&self, user: &User) -> Option<String>;
    fn issue_date(&self, user: &User) -> Option<DateTime<Utc>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoIssues;

impl IssueLookup for NoIssues {
    fn issue_code(&self, _user: &User) -> Option<String> {
        None
    }
    fn issue_date(&self, _user: &User) -> Option<DateTime<Utc>> {
        None
    }
}

/// The issues of one certificate, viewed from a store.
pub struct CertificateIssues<'a, S: IssueStore> {
    store: &'a S,
    certificate_id: Id,
}

impl<'a, S: IssueStore> CertificateIssues<'a, S> {
    pub fn new(store: &'a S, certificate_id: Id) -> Self {
        Self {
            store,
            certificate_id,
        }
    }
}

impl<S: IssueStore> IssueLookup for CertificateIssues<'_, S> {
    fn issue_code(&self, user: &User) -> Option<String> {
        self.store.find(self.certificate_id, user.id).map(|i| i.code)
    }

    fn issue_date(&self, user: &User) -> Option<DateTime<Utc>> {
        self.store
            .find(self.certificate_id, user.id)
            .map(|i| i.time_created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_code_formats() {
        let alnum = CodeGenerator::new(CodeFormat::Alphanumeric).generate();
        assert!(Regex::new(r"^[A-Za-z0-9]{10}$").unwrap().is_match(&alnum), "{}", alnum);

        let digits = CodeGenerator::new(CodeFormat::DigitsWithHyphens).generate();
        assert!(Regex::new(r"^\d{4}-\d{4}-\d{4}$").unwrap().is_match(&digits), "{}", digits);
    }

    #[test]
    fn test_issue_is_created_once() {
        let mut store = MemoryIssueStore::new();
        let config = EngineConfig::default();
        let user = User::new(7, "Ada", "Lovelace");
        let mut issuer = Issuer::new(&mut store, &config);
        let first = issuer.issue(1, &user).unwrap();
        let second = issuer.issue(1, &user).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_colliding_codes_are_retried() {
        let mut store = MemoryIssueStore::new();
        let config = EngineConfig::default();
        let mut codes = vec!["B", "A", "A"];
        {
            let mut issuer = Issuer::new(&mut store, &config);
            issuer.issue_with(1, &User::new(1, "A", "A"), || "A".to_string()).unwrap();
            let issue = issuer
                .issue_with(1, &User::new(2, "B", "B"), || codes.pop().unwrap().to_string())
                .unwrap();
            assert_eq!(issue.code, "B");
        }
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_exhausted_attempts_fail() {
        let mut store = MemoryIssueStore::new();
        let config = EngineConfig {
            max_code_attempts: 3,
            ..EngineConfig::default()
        };
        let mut issuer = Issuer::new(&mut store, &config);
        issuer.issue_with(1, &User::new(1, "A", "A"), || "SAME".to_string()).unwrap();
        let mut calls = 0;
        let result = issuer.issue_with(1, &User::new(2, "B", "B"), || {
            calls += 1;
            "SAME".to_string()
        });
        assert!(matches!(result, Err(ParchmentError::Issuance(_))));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_certificate_issue_lookup() {
        let mut store = MemoryIssueStore::new();
        let config = EngineConfig::default();
        let user = User::new(3, "Grace", "Hopper");
        let code = Issuer::new(&mut store, &config).issue(9, &user).unwrap().code;

        let lookup = CertificateIssues::new(&store, 9);
        assert_eq!(lookup.issue_code(&user), Some(code));
        assert!(CertificateIssues::new(&store, 10).issue_code(&user).is_none());
    }
}
