// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::app::errors::{MyqsError, Result};
use crate::app::ports::{LeaseGuard, LeasePort, ProcessControlPort};

/// Plain-text PID marker file.
#[derive(Clone)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PID recorded in the file. A missing file and unparseable content
    /// both read as `None`; only a real io failure is an error.
    pub fn read_pid(&self) -> Result<Option<i32>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(text.trim().parse::<i32>().ok()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(MyqsError::ReadLock {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Record `pid`, replacing whatever was there.
    pub fn write_pid(&self, pid: i32) -> Result<()> {
        std::fs::write(&self.path, format!("{pid}\n")).map_err(|source| MyqsError::CreateLock {
            path: self.path.clone(),
            source,
        })
    }

    pub fn remove(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(MyqsError::RemoveLock {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Advisory submission lock: a PID file plus a liveness probe.
///
/// Holders do not renew anything. The lease is stale the moment the
/// recorded PID stops answering the probe, and the next acquirer simply
/// overwrites the marker.
pub struct PidFileLease {
    file: PidFile,
    procs: Arc<dyn ProcessControlPort>,
    poll: Duration,
}

impl PidFileLease {
    pub fn new(path: impl Into<PathBuf>, procs: Arc<dyn ProcessControlPort>) -> Self {
        Self {
            file: PidFile::new(path),
            procs,
            poll: Duration::from_secs(1),
        }
    }

    /// Override the retry cadence. Tests shrink it so polling stays fast.
    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }
}

#[async_trait]
impl LeasePort for PidFileLease {
    #[tracing::instrument(name = "lease", level = "debug", skip(self), fields(path = %self.file.path().display()))]
    async fn acquire(&self, timeout: Option<Duration>) -> Result<LeaseGuard> {
        let deadline = timeout.map(|limit| tokio::time::Instant::now() + limit);
        loop {
            match self.file.read_pid()? {
                Some(pid) if self.procs.pid_alive(pid) => {
                    if let Some(deadline) = deadline {
                        if tokio::time::Instant::now() >= deadline {
                            return Err(MyqsError::LockTimeout {
                                path: self.file.path().to_path_buf(),
                            });
                        }
                    }
                    tracing::debug!(holder = pid, "lock held, polling");
                    tokio::time::sleep(self.poll).await;
                }
                _ => {
                    self.file.write_pid(std::process::id() as i32)?;
                    return Ok(LeaseGuard::new(self.file.path().to_path_buf()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeProcs {
        alive: Mutex<Vec<i32>>,
    }

    impl FakeProcs {
        fn with_alive(pids: &[i32]) -> Arc<Self> {
            Arc::new(Self {
                alive: Mutex::new(pids.to_vec()),
            })
        }
    }

    impl ProcessControlPort for FakeProcs {
        fn pid_alive(&self, pid: i32) -> bool {
            self.alive.lock().unwrap().contains(&pid)
        }

        fn pgid_alive(&self, pgid: i32) -> bool {
            self.alive.lock().unwrap().contains(&pgid)
        }

        fn terminate_group(&self, _pgid: i32) -> std::io::Result<()> {
            Ok(())
        }

        fn kill(&self, _pid: i32) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn lock_path(tmp: &TempDir) -> PathBuf {
        tmp.path().join("myqsub.pid")
    }

    #[tokio::test]
    async fn reclaims_a_dead_holder_without_waiting() {
        let tmp = TempDir::new().unwrap();
        let path = lock_path(&tmp);
        std::fs::write(&path, "4242\n").unwrap();

        let lease = PidFileLease::new(&path, FakeProcs::with_alive(&[]));
        let guard = lease.acquire(None).await.unwrap();

        let own = std::process::id().to_string();
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), own);
        guard.release().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn garbage_marker_counts_as_stale() {
        let tmp = TempDir::new().unwrap();
        let path = lock_path(&tmp);
        std::fs::write(&path, "not a pid\n").unwrap();

        let lease = PidFileLease::new(&path, FakeProcs::with_alive(&[4242]));
        let guard = lease.acquire(Some(Duration::ZERO)).await.unwrap();
        guard.release().await.unwrap();
    }

    #[tokio::test]
    async fn times_out_while_the_holder_lives() {
        let tmp = TempDir::new().unwrap();
        let path = lock_path(&tmp);
        std::fs::write(&path, "4242\n").unwrap();

        let lease = PidFileLease::new(&path, FakeProcs::with_alive(&[4242]))
            .with_poll_interval(Duration::from_millis(1));
        let err = lease.acquire(Some(Duration::ZERO)).await.unwrap_err();
        assert!(matches!(err, MyqsError::LockTimeout { .. }));
        // The holder's marker must survive the failed attempt.
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "4242");
    }

    #[tokio::test]
    async fn waits_until_the_holder_dies() {
        let tmp = TempDir::new().unwrap();
        let path = lock_path(&tmp);
        std::fs::write(&path, "4242\n").unwrap();

        let procs = FakeProcs::with_alive(&[4242]);
        let reaper = Arc::clone(&procs);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            reaper.alive.lock().unwrap().clear();
        });

        let lease =
            PidFileLease::new(&path, procs).with_poll_interval(Duration::from_millis(1));
        let guard = lease.acquire(None).await.unwrap();
        guard.release().await.unwrap();
    }

    #[tokio::test]
    async fn dropping_the_guard_clears_the_marker() {
        let tmp = TempDir::new().unwrap();
        let path = lock_path(&tmp);

        let lease = PidFileLease::new(&path, FakeProcs::with_alive(&[]));
        let guard = lease.acquire(None).await.unwrap();
        assert!(path.exists());
        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn pid_file_reads_missing_and_garbage_as_none() {
        let tmp = TempDir::new().unwrap();
        let file = PidFile::new(lock_path(&tmp));

        assert_eq!(file.read_pid().unwrap(), None);
        file.write_pid(77).unwrap();
        assert_eq!(file.read_pid().unwrap(), Some(77));
        std::fs::write(file.path(), "junk\n").unwrap();
        assert_eq!(file.read_pid().unwrap(), None);
        file.remove().unwrap();
        file.remove().unwrap();
    }
}
