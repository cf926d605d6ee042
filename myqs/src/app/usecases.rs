// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Operations behind the user-facing tools, wired to ports.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::app::errors::Result;
use crate::app::ports::{ClockPort, JobStorePort, LeasePort, ProcessControlPort};
use crate::app::types::{
    DeleteOutcome, JobId, JobRecord, JobState, JobStatusRow, NewJob, StatusLabel, SubmitOutcome,
    SubmitRequest,
};
use crate::paths::DAEMON_LOCK_FILE;

/// How many closing log lines the status table shows per running job.
const LOG_TAIL_LINES: usize = 5;

#[derive(Clone)]
pub struct UseCases {
    pub(crate) store: Arc<dyn JobStorePort>,
    pub(crate) lease: Arc<dyn LeasePort>,
    pub(crate) procs: Arc<dyn ProcessControlPort>,
    pub(crate) clock: Arc<dyn ClockPort>,
    queue_dir: PathBuf,
    submit_delay: Duration,
}

impl UseCases {
    pub fn new(
        store: Arc<dyn JobStorePort>,
        lease: Arc<dyn LeasePort>,
        procs: Arc<dyn ProcessControlPort>,
        clock: Arc<dyn ClockPort>,
        queue_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            lease,
            procs,
            clock,
            queue_dir,
            submit_delay: Duration::from_millis(500),
        }
    }

    /// Override the pause between submissions. Tests zero it out.
    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    /// Submit a batch of files, one job each, under the submission lock.
    ///
    /// A file that does not exist is reported and skipped; the rest of
    /// the batch still goes through. Consecutive submissions pause
    /// briefly so each job gets a distinct timestamp ordering.
    pub async fn submit(&self, request: &SubmitRequest) -> Result<Vec<SubmitOutcome>> {
        let guard = self.lease.acquire(None).await?;
        let mut outcomes = Vec::with_capacity(request.files.len());
        for file in &request.files {
            if !Path::new(file).is_file() {
                outcomes.push(SubmitOutcome::MissingFile { file: file.clone() });
                continue;
            }
            let id = self.store.allocate_id().await?;
            let job = NewJob {
                command: file.clone(),
                directory: request.directory.clone(),
                path: request.path.clone(),
                queue: request.queue,
                ncpus: request.ncpus,
            };
            self.store.publish(id, &job).await?;
            tracing::debug!(id = %id, file, "job submitted");
            outcomes.push(SubmitOutcome::Submitted {
                id,
                file: file.clone(),
            });
            tokio::time::sleep(self.submit_delay).await;
        }
        guard.release().await?;
        Ok(outcomes)
    }

    /// Delete jobs by ID. Runners are only touched when `kill` is set:
    /// their whole process group gets SIGTERM and the record goes away
    /// whether or not the group reacts.
    ///
    /// IDs are independent; a storage failure on one is logged and the
    /// batch moves on.
    pub async fn delete(&self, ids: &[JobId], kill: bool) -> Result<Vec<DeleteOutcome>> {
        let mut outcomes = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.delete_one(id, kill).await {
                Ok(Some(outcome)) => outcomes.push(outcome),
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(id = %id, error = %err, "delete failed, moving on");
                }
            }
        }
        Ok(outcomes)
    }

    async fn delete_one(&self, id: JobId, kill: bool) -> Result<Option<DeleteOutcome>> {
        let Some(state) = self.store.find(id).await? else {
            return Ok(Some(DeleteOutcome::NotFound { id }));
        };

        if state == JobState::Running {
            if !kill {
                return Ok(Some(DeleteOutcome::Running { id }));
            }
            let record = self.store.read(id, JobState::Running).await?;
            if let Some(pgid) = record.as_ref().and_then(|r| r.pgid) {
                // Best-effort: the group may already be gone.
                let _ = self.procs.terminate_group(pgid);
            }
            if let Err(err) = self.store.remove(id, JobState::Running).await {
                tracing::debug!(id = %id, error = %err, "record removal failed after kill");
            }
            return Ok(Some(DeleteOutcome::Killed { id }));
        }

        let command = self.store.read(id, state).await?.map(|r| r.command);
        if self.store.remove(id, state).await? {
            Ok(Some(DeleteOutcome::Deleted { id, state, command }))
        } else {
            // Lost a race with another deleter; nothing to report.
            Ok(None)
        }
    }

    /// Remove every completed record, ascending by ID.
    pub async fn purge_finished(&self) -> Result<Vec<DeleteOutcome>> {
        let mut targets = Vec::new();
        for state in [JobState::Done, JobState::Failed] {
            for id in self.store.list(state).await? {
                targets.push((id, state));
            }
        }
        targets.sort_by_key(|(id, _)| *id);

        let mut outcomes = Vec::with_capacity(targets.len());
        for (id, state) in targets {
            let command = match self.store.read(id, state).await {
                Ok(record) => record.map(|r| r.command),
                Err(err) => {
                    tracing::debug!(id = %id, error = %err, "purge read failed");
                    None
                }
            };
            match self.store.remove(id, state).await {
                Ok(true) => outcomes.push(DeleteOutcome::Deleted { id, state, command }),
                Ok(false) => {}
                Err(err) => {
                    tracing::debug!(id = %id, error = %err, "purge failed, moving on");
                }
            }
        }
        Ok(outcomes)
    }

    /// Rows for the status table: queued and running jobs, ascending.
    ///
    /// `home` anchors log lookups for jobs whose directory vanished.
    pub async fn job_table(&self, home: &Path) -> Result<Vec<JobStatusRow>> {
        let mut ids: Vec<JobId> = self.store.list(JobState::Queued).await?;
        ids.extend(self.store.list(JobState::Running).await?);
        ids.sort_unstable();
        ids.dedup();

        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            // Queued shadows running, matching the record lookup order.
            let (record, label) = match self.store.read(id, JobState::Queued).await? {
                Some(record) => (record, StatusLabel::Queue),
                None => match self.store.read(id, JobState::Running).await? {
                    Some(record) => (record, StatusLabel::Run),
                    None => continue,
                },
            };
            rows.push(self.status_row(id, record, label, home).await);
        }
        Ok(rows)
    }

    /// Whether the scheduler daemon's recorded PID is alive. A marker
    /// naming a dead PID is cleared on the way out.
    pub async fn scheduler_alive(&self) -> bool {
        let path = self.queue_dir.join(DAEMON_LOCK_FILE);
        let Ok(text) = std::fs::read_to_string(&path) else {
            return false;
        };
        match text.trim().parse::<i32>() {
            Ok(pid) if self.procs.pid_alive(pid) => true,
            Ok(_) => {
                let _ = std::fs::remove_file(&path);
                false
            }
            Err(_) => false,
        }
    }

    /// Start bookkeeping drives the row: a record with a `START` stamp
    /// reports elapsed minutes even when its file says queued (a requeued
    /// job keeps the stale stamp), and a dead process group downgrades
    /// the row to `STOP`.
    async fn status_row(
        &self,
        id: JobId,
        record: JobRecord,
        label: StatusLabel,
        home: &Path,
    ) -> JobStatusRow {
        let mut state = label;
        let mut elapsed_minutes = None;
        let mut log_tail = Vec::new();

        if let Some(start) = record.start {
            match record.pgid {
                None => elapsed_minutes = Some(0),
                Some(pgid) => {
                    elapsed_minutes = Some((self.clock.now_utc() - start).whole_minutes());
                    if self.procs.pgid_alive(pgid) {
                        log_tail = tail_log(&record.log_file(id, home)).await;
                    } else {
                        state = StatusLabel::Stop;
                    }
                }
            }
        }

        JobStatusRow {
            id,
            queue: record.queue,
            command: record.command,
            ncpus: record.ncpus,
            state,
            elapsed_minutes,
            log_tail,
        }
    }
}

/// Closing lines of a job log; empty when the log is not readable yet.
async fn tail_log(path: &Path) -> Vec<String> {
    let Ok(bytes) = tokio::fs::read(path).await else {
        return Vec::new();
    };
    let text = String::from_utf8_lossy(&bytes);
    let lines: Vec<String> = text.lines().map(|line| line.trim_end().to_string()).collect();
    let keep = lines.len().saturating_sub(LOG_TAIL_LINES);
    lines[keep..].to_vec()
}
