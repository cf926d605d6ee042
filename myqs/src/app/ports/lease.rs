// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

use crate::app::errors::{MyqsError, Result};

/// Mutual-exclusion boundary over the queue directory.
///
/// `acquire` polls while a live holder exists. A holder whose liveness
/// cannot be established (dead PID, unreadable marker) is stale and gets
/// reclaimed; the probe deciding liveness is injected, so no real
/// processes are needed to exercise the logic.
#[async_trait]
pub trait LeasePort: Send + Sync {
    /// Block until the lease is ours, or until `timeout` elapses.
    /// `None` waits indefinitely.
    async fn acquire(&self, timeout: Option<Duration>) -> Result<LeaseGuard>;
}

/// A held lease. `release` removes the on-disk marker; dropping without
/// releasing makes a best-effort removal so a panicking holder does not
/// wedge later submitters.
#[derive(Debug)]
pub struct LeaseGuard {
    path: PathBuf,
    released: bool,
}

impl LeaseGuard {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            released: false,
        }
    }

    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(MyqsError::RemoveLock {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
