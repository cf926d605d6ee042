// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::app::errors::{MyqsError, Result};
use crate::app::ports::JobStorePort;
use crate::app::record::{parse_record, render_new_job};
use crate::app::types::{JobId, JobRecord, JobState, NewJob};

/// Last allocated job ID, one integer line.
const COUNTER_FILE: &str = "myqs.last";

/// Staging name for publish; renamed onto the final `<id>.q` record.
const PUBLISH_TEMP_FILE: &str = "newjob.tmp";

/// Job records as flat files in the per-host queue directory.
///
/// State lives in the filename suffix, so every transition is a single
/// rename and the rename result doubles as the claim on the record.
#[derive(Clone)]
pub struct FsJobStore {
    dir: PathBuf,
}

impl FsJobStore {
    /// Opens the queue directory, creating it user-only on first use.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            std::fs::create_dir_all(&dir).map_err(|source| MyqsError::CreateQueueDir {
                path: dir.clone(),
                source,
            })?;
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700)).map_err(
                |source| MyqsError::CreateQueueDir {
                    path: dir.clone(),
                    source,
                },
            )?;
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: JobId, state: JobState) -> PathBuf {
        self.dir.join(format!("{id}.{}", state.suffix()))
    }
}

#[async_trait]
impl JobStorePort for FsJobStore {
    #[tracing::instrument(name = "store", level = "debug", skip(self), fields(op = "allocate_id"))]
    async fn allocate_id(&self) -> Result<JobId> {
        let path = self.dir.join(COUNTER_FILE);
        // Reads are forgiving: a missing or corrupt counter restarts at 1.
        let id = match std::fs::read_to_string(&path) {
            Ok(text) => text
                .trim()
                .parse::<u16>()
                .ok()
                .and_then(JobId::new)
                .map(JobId::next)
                .unwrap_or(JobId::FIRST),
            Err(_) => JobId::FIRST,
        };
        std::fs::write(&path, format!("{id}\n"))
            .map_err(|source| MyqsError::WriteCounter { path, source })?;
        Ok(id)
    }

    #[tracing::instrument(name = "store", level = "debug", skip(self, job), fields(op = "publish", id = %id))]
    async fn publish(&self, id: JobId, job: &NewJob) -> Result<()> {
        let temp = self.dir.join(PUBLISH_TEMP_FILE);
        std::fs::write(&temp, render_new_job(job)).map_err(|source| MyqsError::WriteTemp {
            path: temp.clone(),
            source,
        })?;
        let target = self.record_path(id, JobState::Queued);
        std::fs::rename(&temp, &target)
            .map_err(|source| MyqsError::Publish { path: target, source })?;
        Ok(())
    }

    #[tracing::instrument(name = "store", level = "debug", skip(self), fields(op = "find", id = %id))]
    async fn find(&self, id: JobId) -> Result<Option<JobState>> {
        for state in JobState::ALL {
            if self.record_path(id, state).is_file() {
                return Ok(Some(state));
            }
        }
        Ok(None)
    }

    #[tracing::instrument(name = "store", level = "debug", skip(self), fields(op = "read", id = %id))]
    async fn read(&self, id: JobId, state: JobState) -> Result<Option<JobRecord>> {
        let path = self.record_path(id, state);
        let Ok(text) = std::fs::read_to_string(&path) else {
            return Ok(None);
        };
        match parse_record(&text) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                tracing::debug!(id = %id, state = ?state, error = %err, "skipping malformed job record");
                Ok(None)
            }
        }
    }

    #[tracing::instrument(name = "store", level = "debug", skip(self), fields(op = "list", state = ?state))]
    async fn list(&self, state: JobState) -> Result<Vec<JobId>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(MyqsError::ScanQueueDir {
                    path: self.dir.clone(),
                    source,
                });
            }
        };
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| MyqsError::ScanQueueDir {
                path: self.dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some((stem, suffix)) = name.rsplit_once('.') else {
                continue;
            };
            if JobState::from_suffix(suffix) != Some(state) {
                continue;
            }
            if let Some(id) = stem.parse::<u16>().ok().and_then(JobId::new) {
                ids.push(id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    #[tracing::instrument(name = "store", level = "debug", skip(self), fields(op = "transition", id = %id))]
    async fn transition(&self, id: JobId, from: JobState, to: JobState) -> Result<bool> {
        let from_path = self.record_path(id, from);
        let to_path = self.record_path(id, to);
        match std::fs::rename(&from_path, &to_path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(MyqsError::Rename {
                from: from_path,
                to: to_path,
                source,
            }),
        }
    }

    #[tracing::instrument(name = "store", level = "debug", skip(self), fields(op = "remove", id = %id))]
    async fn remove(&self, id: JobId, state: JobState) -> Result<bool> {
        let path = self.record_path(id, state);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(MyqsError::RemoveRecord { path, source }),
        }
    }

    #[tracing::instrument(name = "store", level = "debug", skip(self, lines), fields(op = "append", id = %id))]
    async fn append(&self, id: JobId, state: JobState, lines: &str) -> Result<bool> {
        let path = self.record_path(id, state);
        // Never creates: appending to a record that lost a rename race must
        // not resurrect it.
        let mut file = match std::fs::OpenOptions::new().append(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(source) => return Err(MyqsError::WriteRecord { path, source }),
        };
        file.write_all(lines.as_bytes())
            .map_err(|source| MyqsError::WriteRecord { path, source })?;
        Ok(true)
    }
}
