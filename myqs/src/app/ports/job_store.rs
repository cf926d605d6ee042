// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use async_trait::async_trait;

use crate::app::errors::Result;
use crate::app::types::{JobId, JobRecord, JobState, NewJob};

/// Storage boundary for the per-host queue of job records.
///
/// The filesystem adapter is the production implementation; the port keeps
/// submit/delete/schedule logic free of storage details so the backing
/// mechanism could be swapped without touching them.
#[async_trait]
pub trait JobStorePort: Send + Sync {
    /// Advance the persistent job counter and return the fresh ID.
    async fn allocate_id(&self) -> Result<JobId>;

    /// Atomically publish a queued record for `id`. Other readers see the
    /// record fully written or not at all.
    async fn publish(&self, id: JobId, job: &NewJob) -> Result<()>;

    /// State the record for `id` currently sits in, if any.
    async fn find(&self, id: JobId) -> Result<Option<JobState>>;

    /// Parsed record for `id` in `state`. A record that is missing,
    /// unreadable, or unparseable yields `None`; per the error taxonomy
    /// those are indistinguishable from a concurrent removal.
    async fn read(&self, id: JobId, state: JobState) -> Result<Option<JobRecord>>;

    /// IDs of every record in `state`, ascending.
    async fn list(&self, state: JobState) -> Result<Vec<JobId>>;

    /// Rename the record for `id` from one state to another. `false` when
    /// the source record is gone (perhaps claimed by a concurrent pass).
    async fn transition(&self, id: JobId, from: JobState, to: JobState) -> Result<bool>;

    /// Unlink the record. `false` when it was already gone.
    async fn remove(&self, id: JobId, state: JobState) -> Result<bool>;

    /// Append pre-rendered `KEY=VALUE` lines to an existing record.
    /// `false` when the record no longer exists; a missing record is never
    /// created.
    async fn append(&self, id: JobId, state: JobState, lines: &str) -> Result<bool>;
}
