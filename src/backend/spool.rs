//! # Spool beacon: an out-of-process queue for teardown reports.
//!
//! ```text
//! abandon() ──► SpoolBeacon::send_complete ──► append one JSON line ──► fsync
//!                                                     │
//!                       (player/process may die here) │
//!                                                     ▼
//! next start ──► SpoolBeacon::drain(&backend) ──► complete_run per line
//!                                              ├─ delivered / rejected → dropped
//!                                              └─ transport / no auth  → kept for later
//! ```
//!
//! ## Rules
//! - `send_complete` returns only after the record is on disk.
//! - Draining claims the whole spool atomically (rename to `*.draining`), so a
//!   concurrent `send_complete` during a drain lands in a fresh spool file.
//! - The draining file is removed only after undelivered records are back in
//!   the spool; a drain that never finished is picked up by the next one.
//!   Delivery is therefore at-least-once.
//! - Undecodable lines are discarded with a warning.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::BackendError;

use super::traits::{Beacon, RunBackend};
use super::types::CompleteRunRequest;

/// Counts from one [`SpoolBeacon::drain`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Accepted by the backend.
    pub delivered: usize,
    /// Still spooled for a later drain.
    pub kept: usize,
    /// Dropped (unreadable, or refused by the backend).
    pub discarded: usize,
}

/// [`Beacon`] that spools completion records to a local JSON-lines file.
#[derive(Debug)]
pub struct SpoolBeacon {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SpoolBeacon {
    /// Spool at `path`; parent directories are created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of spooled records, including those of an interrupted drain.
    pub fn pending(&self) -> io::Result<usize> {
        let _guard = self.lock.lock();
        Ok(read_records(&self.path)?.len() + read_records(&self.draining_path())?.len())
    }

    /// Replays spooled records against `backend`.
    ///
    /// The claimed records stay on disk until the pass is over, so a drain
    /// cut short (crash, dropped future) is replayed by the next one.
    pub async fn drain<B: RunBackend + ?Sized>(&self, backend: &B) -> io::Result<DrainReport> {
        let records = self.claim()?;
        let mut report = DrainReport::default();
        let mut keep = Vec::new();
        let mut auth_missing = false;

        for line in records {
            let req: CompleteRunRequest = match serde_json::from_str(&line) {
                Ok(req) => req,
                Err(e) => {
                    tracing::warn!(error = %e, "discarding unreadable spooled completion");
                    report.discarded += 1;
                    continue;
                }
            };

            if auth_missing {
                keep.push(line);
                continue;
            }

            match backend.complete_run(&req).await {
                Ok(()) => report.delivered += 1,
                Err(BackendError::MissingAuth) => {
                    auth_missing = true;
                    keep.push(line);
                }
                Err(e @ BackendError::Transport { .. }) => {
                    tracing::warn!(run_id = %req.run_id, error = %e, "spooled completion not delivered");
                    keep.push(line);
                }
                Err(e) => {
                    tracing::warn!(run_id = %req.run_id, error = %e, "spooled completion refused");
                    report.discarded += 1;
                }
            }
        }

        report.kept = keep.len();
        self.settle(&keep)?;
        Ok(report)
    }

    fn draining_path(&self) -> PathBuf {
        self.path.with_extension("draining")
    }

    /// Moves the live spool under the draining name and returns its records.
    ///
    /// A draining file left by an interrupted pass is reused; the live spool
    /// is folded into it first.
    fn claim(&self) -> io::Result<Vec<String>> {
        let _guard = self.lock.lock();
        let draining = self.draining_path();
        if draining.exists() {
            let live = read_records(&self.path)?;
            if !live.is_empty() {
                tracing::info!(path = %draining.display(), "resuming interrupted spool drain");
                append_records(&draining, &live)?;
                fs::remove_file(&self.path)?;
            }
        } else {
            match fs::rename(&self.path, &draining) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(e),
            }
        }
        read_records(&draining)
    }

    /// Puts undelivered records back into the live spool, then drops the
    /// draining file.
    fn settle(&self, keep: &[String]) -> io::Result<()> {
        let _guard = self.lock.lock();
        if !keep.is_empty() {
            append_records(&self.path, keep)?;
        }
        match fs::remove_file(self.draining_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn read_records(path: &Path) -> io::Result<Vec<String>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

fn append_records(path: &Path, lines: &[String]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut buf = String::new();
    for line in lines {
        buf.push_str(line);
        buf.push('\n');
    }
    file.write_all(buf.as_bytes())?;
    file.sync_data()
}

impl Beacon for SpoolBeacon {
    fn send_complete(&self, req: &CompleteRunRequest) -> Result<(), BackendError> {
        let line = serde_json::to_string(req).map_err(|e| BackendError::Decode {
            error: e.to_string(),
        })?;
        let _guard = self.lock.lock();
        append_records(&self.path, &[line])
            .map_err(|e| BackendError::Transport {
                error: format!("spool write failed: {e}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AppendLogsRequest, StartRunRequest, StartRunResponse};
    use crate::session::RunStatus;
    use async_trait::async_trait;

    struct Flaky {
        fail_run: &'static str,
        delivered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RunBackend for Flaky {
        async fn start_run(&self, _req: &StartRunRequest) -> Result<StartRunResponse, BackendError> {
            unreachable!("drain never starts runs")
        }

        async fn complete_run(&self, req: &CompleteRunRequest) -> Result<(), BackendError> {
            if req.run_id == self.fail_run {
                return Err(BackendError::Transport {
                    error: "offline".into(),
                });
            }
            self.delivered.lock().push(req.run_id.clone());
            Ok(())
        }

        async fn append_logs(&self, _: &str, _: &AppendLogsRequest) -> Result<(), BackendError> {
            Ok(())
        }
    }

    /// Never answers; stands in for a process that dies mid-drain.
    struct Stalled;

    #[async_trait]
    impl RunBackend for Stalled {
        async fn start_run(&self, _req: &StartRunRequest) -> Result<StartRunResponse, BackendError> {
            unreachable!("drain never starts runs")
        }

        async fn complete_run(&self, _req: &CompleteRunRequest) -> Result<(), BackendError> {
            std::future::pending().await
        }

        async fn append_logs(&self, _: &str, _: &AppendLogsRequest) -> Result<(), BackendError> {
            Ok(())
        }
    }

    fn record(run_id: &str) -> CompleteRunRequest {
        CompleteRunRequest {
            run_id: run_id.into(),
            capsule_id: "c".into(),
            post_id: "p".into(),
            duration_ms: 40,
            status: RunStatus::Failed,
            error_message: Some("page_unload".into()),
            artifact_id: None,
        }
    }

    #[tokio::test]
    async fn drain_delivers_and_keeps_undelivered() {
        let dir = tempfile::tempdir().unwrap();
        let beacon = SpoolBeacon::new(dir.path().join("spool/completions.jsonl"));

        beacon.send_complete(&record("run-1")).unwrap();
        beacon.send_complete(&record("run-2")).unwrap();
        assert_eq!(beacon.pending().unwrap(), 2);

        let backend = Flaky {
            fail_run: "run-2",
            delivered: Mutex::new(Vec::new()),
        };
        let report = beacon.drain(&backend).await.unwrap();

        assert_eq!(
            report,
            DrainReport {
                delivered: 1,
                kept: 1,
                discarded: 0
            }
        );
        assert_eq!(*backend.delivered.lock(), vec!["run-1".to_string()]);
        assert_eq!(beacon.pending().unwrap(), 1);
    }

    #[tokio::test]
    async fn unreadable_lines_are_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("completions.jsonl");
        fs::write(&path, "not json\n").unwrap();

        let beacon = SpoolBeacon::new(&path);
        let backend = Flaky {
            fail_run: "",
            delivered: Mutex::new(Vec::new()),
        };
        let report = beacon.drain(&backend).await.unwrap();
        assert_eq!(report.discarded, 1);
        assert_eq!(beacon.pending().unwrap(), 0);
    }

    #[tokio::test]
    async fn draining_an_absent_spool_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let beacon = SpoolBeacon::new(dir.path().join("none.jsonl"));
        let backend = Flaky {
            fail_run: "",
            delivered: Mutex::new(Vec::new()),
        };
        assert_eq!(beacon.drain(&backend).await.unwrap(), DrainReport::default());
    }

    #[tokio::test]
    async fn interrupted_drain_keeps_records_for_the_next_one() {
        let dir = tempfile::tempdir().unwrap();
        let beacon = SpoolBeacon::new(dir.path().join("completions.jsonl"));
        beacon.send_complete(&record("run-1")).unwrap();
        beacon.send_complete(&record("run-2")).unwrap();

        let cut = tokio::time::timeout(std::time::Duration::from_millis(20), beacon.drain(&Stalled)).await;
        assert!(cut.is_err());
        assert!(beacon.draining_path().exists());
        assert_eq!(beacon.pending().unwrap(), 2);

        // Written after the interrupted pass; folded into the resumed one.
        beacon.send_complete(&record("run-3")).unwrap();

        let backend = Flaky {
            fail_run: "",
            delivered: Mutex::new(Vec::new()),
        };
        let report = beacon.drain(&backend).await.unwrap();
        assert_eq!(report.delivered, 3);
        assert_eq!(
            *backend.delivered.lock(),
            vec!["run-1".to_string(), "run-2".to_string(), "run-3".to_string()]
        );
        assert!(!beacon.draining_path().exists());
        assert_eq!(beacon.pending().unwrap(), 0);
    }
}
