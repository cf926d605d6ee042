// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Slot accounting and queue draining for the scheduler daemon.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::app::errors::Result;
use crate::app::ports::{ClockPort, JobStorePort, ProcessControlPort};
use crate::app::record::render_finish_stamp;
use crate::app::types::{JobId, JobState, QueueName};

/// Tuning for the scheduling pass.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// CPU execution slots shared by all running jobs.
    pub slots: u32,
    /// Settle time before a runner with a dead process group is failed.
    pub grace: Duration,
}

impl SchedulerConfig {
    pub fn new(slots: u32) -> Self {
        Self {
            slots,
            grace: Duration::from_millis(500),
        }
    }

    /// Override the settle time. Tests zero it out.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }
}

/// A job claimed for execution by [`Scheduler::pass`]. The caller launches
/// the executor with the job's output wired to `log_file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchPlan {
    pub id: JobId,
    pub log_file: PathBuf,
}

/// One dispatch decision per polling pass.
///
/// Each pass first reconciles the running set, then claims at most one
/// queued job that fits the free slots. Claiming is the queued-to-running
/// rename, so concurrent deletion simply makes the claim fail and the
/// pass moves on.
pub struct Scheduler {
    store: Arc<dyn JobStorePort>,
    procs: Arc<dyn ProcessControlPort>,
    clock: Arc<dyn ClockPort>,
    config: SchedulerConfig,
    home: PathBuf,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn JobStorePort>,
        procs: Arc<dyn ProcessControlPort>,
        clock: Arc<dyn ClockPort>,
        config: SchedulerConfig,
        home: PathBuf,
    ) -> Self {
        Self {
            store,
            procs,
            clock,
            config,
            home,
        }
    }

    /// Run one scheduling pass and return the job to launch, if any.
    ///
    /// Express jobs dispatch before normal ones, ascending by ID within a
    /// queue. A job dispatches only when its `NCPUS` fits the free slots
    /// whole; anything wider stays queued and the scan keeps looking for
    /// a narrower fit.
    pub async fn pass(&self) -> Result<Option<DispatchPlan>> {
        let free = self.reconcile_runners().await?;
        if free <= 0 {
            return Ok(None);
        }

        for queue in QueueName::SCHEDULING_ORDER {
            for id in self.store.list(JobState::Queued).await? {
                let Some(record) = self.store.read(id, JobState::Queued).await? else {
                    continue;
                };
                if record.queue != queue || i64::from(record.ncpus) > free {
                    continue;
                }
                let log_file = record.log_file(id, &self.home);
                if !self
                    .store
                    .transition(id, JobState::Queued, JobState::Running)
                    .await?
                {
                    continue;
                }
                tracing::info!(id = %id, queue = %queue, ncpus = record.ncpus, "dispatching job");
                return Ok(Some(DispatchPlan { id, log_file }));
            }
        }
        Ok(None)
    }

    /// Requeue runners orphaned by a reboot: their recorded process group
    /// is gone, so the work never finished and should run again.
    pub async fn requeue_orphans(&self) -> Result<Vec<JobId>> {
        let mut requeued = Vec::new();
        for id in self.store.list(JobState::Running).await? {
            let Some(record) = self.store.read(id, JobState::Running).await? else {
                continue;
            };
            let Some(pgid) = record.pgid else {
                continue;
            };
            if self.procs.pgid_alive(pgid) {
                continue;
            }
            if self
                .store
                .transition(id, JobState::Running, JobState::Queued)
                .await?
            {
                tracing::info!(id = %id, "requeueing job after restart");
                requeued.push(id);
            }
        }
        Ok(requeued)
    }

    /// Fail runners whose process group died, then report the free slots.
    ///
    /// A record without a `PGID` line belongs to an executor that has not
    /// stamped in yet; it is left alone. Slots are recounted from the
    /// records seen at the top of the pass, so a runner failed just now
    /// still occupies its slots until the next pass.
    async fn reconcile_runners(&self) -> Result<i64> {
        let mut running: i64 = 0;
        for id in self.store.list(JobState::Running).await? {
            let Some(record) = self.store.read(id, JobState::Running).await? else {
                continue;
            };
            if let Some(pgid) = record.pgid {
                if !self.procs.pgid_alive(pgid) {
                    // Settle time: the executor may be mid-finish, about
                    // to rename or unlink the record itself.
                    tokio::time::sleep(self.config.grace).await;
                    if !self
                        .store
                        .transition(id, JobState::Running, JobState::Failed)
                        .await?
                    {
                        continue;
                    }
                    tracing::warn!(id = %id, pgid, "runner died without finishing, marking failed");
                    let stamp = render_finish_stamp(self.clock.now_utc());
                    let _ = self.store.append(id, JobState::Failed, &stamp).await?;
                }
            }
            running += i64::from(record.ncpus);
        }
        Ok(i64::from(self.config.slots) - running)
    }
}
