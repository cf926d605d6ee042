// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use time::OffsetDateTime;

/// Highest job ID handed out before the counter wraps back to 1.
pub const MAX_JOB_ID: u16 = 32767;

/// Integer handle for a batch job, in `1..=32767`.
///
/// IDs are allocated in increasing order from the `myqs.last` counter and
/// wrap around; uniqueness only holds among currently-live records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(u16);

impl JobId {
    /// The ID the counter restarts from on wraparound or corruption.
    pub const FIRST: JobId = JobId(1);

    pub fn new(raw: u16) -> Option<Self> {
        if (1..=MAX_JOB_ID).contains(&raw) {
            Some(Self(raw))
        } else {
            None
        }
    }

    pub fn get(self) -> u16 {
        self.0
    }

    /// Successor in allocation order, wrapping back to 1 past the cap.
    pub fn next(self) -> Self {
        if self.0 >= MAX_JOB_ID {
            Self::FIRST
        } else {
            Self(self.0 + 1)
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("job ID must be an integer between 1 and {MAX_JOB_ID}")]
pub struct ParseJobIdError;

impl FromStr for JobId {
    type Err = ParseJobIdError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse::<u16>()
            .ok()
            .and_then(Self::new)
            .ok_or(ParseJobIdError)
    }
}

/// Position of a job in the on-disk state machine, encoded as the record
/// file's suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Failed,
}

impl JobState {
    /// Every state, in the order record lookups scan them.
    pub const ALL: [JobState; 4] = [
        JobState::Done,
        JobState::Failed,
        JobState::Queued,
        JobState::Running,
    ];

    /// Filename suffix for this state (`5.q`, `5.r`, ...).
    pub fn suffix(self) -> &'static str {
        match self {
            JobState::Queued => "q",
            JobState::Running => "r",
            JobState::Done => "d",
            JobState::Failed => "f",
        }
    }

    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "q" => Some(JobState::Queued),
            "r" => Some(JobState::Running),
            "d" => Some(JobState::Done),
            "f" => Some(JobState::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

/// Advisory queue a job is submitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueName {
    Normal,
    Express,
}

impl QueueName {
    /// Order the daemon drains queues in: express jobs dispatch first.
    pub const SCHEDULING_ORDER: [QueueName; 2] = [QueueName::Express, QueueName::Normal];

    pub fn as_str(self) -> &'static str {
        match self {
            QueueName::Normal => "normal",
            QueueName::Express => "express",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot submit to non-existent queue \"{0}\"")]
pub struct ParseQueueError(pub String);

impl FromStr for QueueName {
    type Err = ParseQueueError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "normal" => Ok(QueueName::Normal),
            "express" => Ok(QueueName::Express),
            other => Err(ParseQueueError(other.to_string())),
        }
    }
}

/// Payload for publishing a queued job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    /// Batch script exactly as named on the command line.
    pub command: String,
    /// Submitter's working directory, restored at run time.
    pub directory: PathBuf,
    /// Submitter's PATH, restored at run time.
    pub path: String,
    pub queue: QueueName,
    pub ncpus: u32,
}

/// Parsed job record as stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub command: String,
    pub directory: PathBuf,
    pub path: String,
    pub queue: QueueName,
    pub ncpus: u32,
    /// Process group of the running job; stale once the group dies.
    pub pgid: Option<i32>,
    pub start: Option<OffsetDateTime>,
    pub finish: Option<OffsetDateTime>,
}

impl JobRecord {
    /// Directory the job runs in: `DIRECTORY` while it still exists,
    /// otherwise the user's home.
    pub fn run_dir(&self, home: &Path) -> PathBuf {
        if self.directory.is_dir() {
            self.directory.clone()
        } else {
            home.to_path_buf()
        }
    }

    /// `<basename(COMMAND)>.o<jobid>`
    pub fn log_file_name(&self, id: JobId) -> String {
        let base = Path::new(&self.command)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.command.clone());
        format!("{base}.o{id}")
    }

    /// Full path of the job's output log.
    pub fn log_file(&self, id: JobId, home: &Path) -> PathBuf {
        self.run_dir(home).join(self.log_file_name(id))
    }
}

/// One `myqsub` invocation: a batch of files sharing the submission
/// environment captured at the caller.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Batch files in submission order.
    pub files: Vec<String>,
    pub ncpus: u32,
    pub queue: QueueName,
    /// Caller's working directory.
    pub directory: PathBuf,
    /// Caller's PATH.
    pub path: String,
}

/// Per-file result of a submission batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted { id: JobId, file: String },
    /// The batch file does not exist; the rest of the batch proceeds.
    MissingFile { file: String },
}

/// Per-ID result of a deletion batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Removed without signalling. `command` confirms what was dropped
    /// when the record was still readable.
    Deleted {
        id: JobId,
        state: JobState,
        command: Option<String>,
    },
    /// Running job: its process group was signalled and the record
    /// removed regardless.
    Killed { id: JobId },
    /// Running and no force flag was given; untouched.
    Running { id: JobId },
    NotFound { id: JobId },
}

/// Row state in the status table. Distinct from [`JobState`]: `Stop`
/// flags a runner whose process group is gone but whose record has not
/// been reconciled yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLabel {
    Queue,
    Run,
    Stop,
}

impl StatusLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusLabel::Queue => "QUEUE",
            StatusLabel::Run => "RUN",
            StatusLabel::Stop => "STOP",
        }
    }
}

impl fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One line of the status table.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusRow {
    pub id: JobId,
    pub queue: QueueName,
    pub command: String,
    pub ncpus: u32,
    pub state: StatusLabel,
    /// Whole minutes since the job started, once it has.
    pub elapsed_minutes: Option<i64>,
    /// Closing lines of the log, for jobs still running.
    #[serde(skip)]
    pub log_tail: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_rejects_zero_and_overflow() {
        assert_eq!(JobId::new(0), None);
        assert_eq!(JobId::new(1), Some(JobId::FIRST));
        assert!(JobId::new(MAX_JOB_ID).is_some());
        assert_eq!("32768".parse::<JobId>(), Err(ParseJobIdError));
        assert_eq!("abc".parse::<JobId>(), Err(ParseJobIdError));
        assert_eq!("7".parse::<JobId>().unwrap().get(), 7);
    }

    #[test]
    fn job_id_wraps_at_cap() {
        let last = JobId::new(MAX_JOB_ID).unwrap();
        assert_eq!(last.next(), JobId::FIRST);
        assert_eq!(JobId::new(41).unwrap().next().get(), 42);
    }

    #[test]
    fn state_suffix_round_trips() {
        for state in JobState::ALL {
            assert_eq!(JobState::from_suffix(state.suffix()), Some(state));
        }
        assert_eq!(JobState::from_suffix("x"), None);
    }

    #[test]
    fn queue_name_parses_known_queues_only() {
        assert_eq!("normal".parse::<QueueName>(), Ok(QueueName::Normal));
        assert_eq!("express".parse::<QueueName>(), Ok(QueueName::Express));
        let err = "fast".parse::<QueueName>().unwrap_err();
        assert_eq!(err.to_string(), "cannot submit to non-existent queue \"fast\"");
    }

    #[test]
    fn log_file_name_uses_command_basename() {
        let record = JobRecord {
            command: "/home/user/jobs/batch.sh".to_string(),
            directory: PathBuf::from("/nonexistent"),
            path: String::new(),
            queue: QueueName::Normal,
            ncpus: 1,
            pgid: None,
            start: None,
            finish: None,
        };
        let id = JobId::new(12).unwrap();
        assert_eq!(record.log_file_name(id), "batch.sh.o12");
    }

    #[test]
    fn run_dir_falls_back_to_home() {
        let tmp = tempfile::tempdir().unwrap();
        let record = JobRecord {
            command: "job.sh".to_string(),
            directory: tmp.path().join("gone"),
            path: String::new(),
            queue: QueueName::Normal,
            ncpus: 1,
            pgid: None,
            start: None,
            finish: None,
        };
        assert_eq!(record.run_dir(tmp.path()), tmp.path());

        let record = JobRecord {
            directory: tmp.path().to_path_buf(),
            ..record
        };
        assert_eq!(record.run_dir(Path::new("/elsewhere")), tmp.path());
    }
}
