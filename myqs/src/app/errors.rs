// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced to MyQS users. The binaries render these after the
/// program-name prefix, with the io source appended down the chain.
#[derive(Debug, Error)]
pub enum MyqsError {
    #[error("cannot determine home directory")]
    HomeNotSet,

    #[error("cannot create \"{path}\" MyQS directory")]
    CreateQueueDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot scan \"{path}\" MyQS directory")]
    ScanQueueDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot update \"{path}\" MyQS lastjob file")]
    WriteCounter {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read \"{path}\" MyQS lock file")]
    ReadLock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot create \"{path}\" MyQS lock file")]
    CreateLock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot remove \"{path}\" MyQS lock file")]
    RemoveLock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("timed out waiting for \"{path}\" MyQS lock file")]
    LockTimeout { path: PathBuf },

    #[error("cannot create \"{path}\" temporary file")]
    WriteTemp {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot publish \"{path}\" job record")]
    Publish {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot rename \"{from}\" job record to \"{to}\"")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot update \"{path}\" job record")]
    WriteRecord {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot remove \"{path}\" job record")]
    RemoveRecord {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, MyqsError>;
