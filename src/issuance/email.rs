//! Batched certificate email.
//!
//! A run walks a bounded slice of the certificates that email their
//! recipients, issues any missing certificates, and sends (or queues) the
//! ones not yet emailed. Where the next run picks up is returned as a
//! [`BatchCursor`] for the caller to persist; nothing is kept globally.
//!
//! Delivery is at least once. The `emailed` flag on an issue is checked
//! before every send, so re-running a batch does not email twice.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::{Issue, IssueStore, Issuer};
use crate::config::EngineConfig;
use crate::context::User;
use crate::error::Result;
use crate::model::Id;

/// Where the next email run starts in the certificate list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCursor {
    pub offset: usize,
}

/// A certificate that emails its recipients, and who they are.
#[derive(Debug, Clone)]
pub struct EmailCandidate {
    pub certificate_id: Id,
    pub recipients: Vec<User>,
}

pub trait Mailer {
    fn send(&mut self, user: &User, issue: &Issue) -> Result<()>;
}

/// A queued send, retried by the queue runner on failure.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailTask {
    pub issue_id: Id,
    pub user: User,
    pub attempts: u32,
}

pub trait TaskQueue {
    fn enqueue(&mut self, task: EmailTask) -> Result<()>;
}

/// How a run hands off each email.
pub enum Dispatch<'a> {
    /// Send now and mark the issue emailed.
    Immediate(&'a mut dyn Mailer),
    /// Queue a task; the queue runner sends and marks.
    Queued(&'a mut dyn TaskQueue),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub certificates: usize,
    pub issued: usize,
    pub emailed: usize,
    pub queued: usize,
    /// Issues already emailed before this run.
    pub skipped: usize,
    pub failed: usize,
    pub next: BatchCursor,
}

pub struct EmailRun {
    batch_size: usize,
}

impl EmailRun {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            batch_size: config.email_batch_size.max(1),
        }
    }

    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Process at most one batch of candidates starting at `cursor`.
    pub fn run<S: IssueStore>(
        &self,
        cursor: BatchCursor,
        candidates: &[EmailCandidate],
        issuer: &mut Issuer<'_, S>,
        mut dispatch: Dispatch<'_>,
    ) -> Result<RunReport> {
        let start = if cursor.offset >= candidates.len() {
            0
        } else {
            cursor.offset
        };
        let end = (start + self.batch_size).min(candidates.len());
        let mut report = RunReport::default();

        for candidate in &candidates[start..end] {
            report.certificates += 1;
            for user in &candidate.recipients {
                let existed = issuer.store().find(candidate.certificate_id, user.id).is_some();
                let issue = issuer.issue(candidate.certificate_id, user)?;
                if !existed {
                    report.issued += 1;
                }
                if issue.emailed {
                    report.skipped += 1;
                    continue;
                }

                match &mut dispatch {
                    Dispatch::Immediate(mailer) => match mailer.send(user, &issue) {
                        Ok(()) => {
                            issuer.store().mark_emailed(issue.id)?;
                            report.emailed += 1;
                        }
                        Err(e) => {
                            log::warn!("emailing issue {} to user {} failed: {}", issue.id, user.id, e);
                            report.failed += 1;
                        }
                    },
                    Dispatch::Queued(queue) => {
                        queue.enqueue(EmailTask {
                            issue_id: issue.id,
                            user: user.clone(),
                            attempts: 0,
                        })?;
                        report.queued += 1;
                    }
                }
            }
        }

        report.next = BatchCursor {
            offset: if end >= candidates.len() { 0 } else { end },
        };
        log::info!(
            "email run: {} certificates from offset {}, {} emailed, {} queued, {} failed",
            report.certificates,
            start,
            report.emailed,
            report.queued,
            report.failed
        );
        Ok(report)
    }
}

/// An in-process task queue with bounded retries.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    tasks: VecDeque<EmailTask>,
    max_attempts: u32,
}

impl MemoryQueue {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            tasks: VecDeque::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run every task queued right now once. Failed tasks go to the back
    /// of the queue until they run out of attempts. Returns how many sent.
    pub fn run_pending<S: IssueStore>(&mut self, mailer: &mut dyn Mailer, store: &mut S) -> Result<usize> {
        let mut sent = 0;
        for _ in 0..self.tasks.len() {
            let Some(mut task) = self.tasks.pop_front() else {
                break;
            };
            let Some(issue) = store.get(task.issue_id) else {
                log::warn!("dropping email task for missing issue {}", task.issue_id);
                continue;
            };
            if issue.emailed {
                continue;
            }
            match mailer.send(&task.user, &issue) {
                Ok(()) => {
                    store.mark_emailed(issue.id)?;
                    sent += 1;
                }
                Err(e) => {
                    task.attempts += 1;
                    if task.attempts < self.max_attempts {
                        self.tasks.push_back(task);
                    } else {
                        log::warn!(
                            "giving up emailing issue {} after {} attempts: {}",
                            issue.id,
                            task.attempts,
                            e
                        );
                    }
                }
            }
        }
        Ok(sent)
    }
}

impl TaskQueue for MemoryQueue {
    fn enqueue(&mut self, task: EmailTask) -> Result<()> {
        self.tasks.push_back(task);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParchmentError;
    use crate::issuance::MemoryIssueStore;

    #[derive(Default)]
    struct CountingMailer {
        sent: Vec<(Id, String)>,
        fail_next: u32,
    }

    impl Mailer for CountingMailer {
        fn send(&mut self, user: &User, issue: &Issue) -> Result<()> {
            if self.fail_next > 0 {
                self.fail_next -= 1;
                return Err(ParchmentError::Issuance("smtp down".to_string()));
            }
            self.sent.push((user.id, issue.code.clone()));
            Ok(())
        }
    }

    fn candidates(n: usize) -> Vec<EmailCandidate> {
        (0..n)
            .map(|i| EmailCandidate {
                certificate_id: i as Id + 1,
                recipients: vec![User::new(100, "Ada", "Lovelace")],
            })
            .collect()
    }

    #[test]
    fn test_cursor_advances_and_wraps() {
        let mut store = MemoryIssueStore::new();
        let config = EngineConfig::default();
        let mut issuer = Issuer::new(&mut store, &config);
        let mut mailer = CountingMailer::default();
        let run = EmailRun::with_batch_size(2);
        let list = candidates(3);

        let report = run
            .run(BatchCursor::default(), &list, &mut issuer, Dispatch::Immediate(&mut mailer))
            .unwrap();
        assert_eq!(report.certificates, 2);
        assert_eq!(report.next, BatchCursor { offset: 2 });

        let report = run
            .run(report.next, &list, &mut issuer, Dispatch::Immediate(&mut mailer))
            .unwrap();
        assert_eq!(report.certificates, 1);
        assert_eq!(report.next, BatchCursor { offset: 0 });
        assert_eq!(mailer.sent.len(), 3);
    }

    #[test]
    fn test_already_emailed_is_skipped() {
        let mut store = MemoryIssueStore::new();
        let config = EngineConfig::default();
        let mut issuer = Issuer::new(&mut store, &config);
        let mut mailer = CountingMailer::default();
        let run = EmailRun::with_batch_size(10);
        let list = candidates(1);

        run.run(BatchCursor::default(), &list, &mut issuer, Dispatch::Immediate(&mut mailer))
            .unwrap();
        let again = run
            .run(BatchCursor::default(), &list, &mut issuer, Dispatch::Immediate(&mut mailer))
            .unwrap();
        assert_eq!(again.skipped, 1);
        assert_eq!(again.issued, 0);
        assert_eq!(mailer.sent.len(), 1);
    }

    #[test]
    fn test_failed_send_is_not_marked() {
        let mut store = MemoryIssueStore::new();
        let config = EngineConfig::default();
        let mut mailer = CountingMailer {
            fail_next: 1,
            ..Default::default()
        };
        {
            let mut issuer = Issuer::new(&mut store, &config);
            let report = EmailRun::with_batch_size(5)
                .run(BatchCursor::default(), &candidates(1), &mut issuer, Dispatch::Immediate(&mut mailer))
                .unwrap();
            assert_eq!(report.failed, 1);
        }
        assert!(!store.find(1, 100).unwrap().emailed);
    }

    #[test]
    fn test_queued_tasks_retry_then_send() {
        let mut store = MemoryIssueStore::new();
        let config = EngineConfig::default();
        let mut queue = MemoryQueue::new(3);
        {
            let mut issuer = Issuer::new(&mut store, &config);
            let report = EmailRun::new(&config)
                .run(BatchCursor::default(), &candidates(2), &mut issuer, Dispatch::Queued(&mut queue))
                .unwrap();
            assert_eq!(report.queued, 2);
        }
        assert_eq!(queue.len(), 2);

        let mut mailer = CountingMailer {
            fail_next: 1,
            ..Default::default()
        };
        assert_eq!(queue.run_pending(&mut mailer, &mut store).unwrap(), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.run_pending(&mut mailer, &mut store).unwrap(), 1);
        assert!(queue.is_empty());
        assert!(store.find(1, 100).unwrap().emailed);
        assert!(store.find(2, 100).unwrap().emailed);
    }
}
