// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Well-known locations inside the per-host queue directory.

use std::path::PathBuf;

use crate::app::errors::{MyqsError, Result};

/// Lock file taken by a submitter for the duration of a submission run.
pub const SUBMIT_LOCK_FILE: &str = "myqsub.pid";

/// Lock file holding the scheduler daemon's PID.
pub const DAEMON_LOCK_FILE: &str = "myqsd.pid";

/// Per-host queue directory: `$HOME/.config/myqs/<short-hostname>`.
///
/// The path is anchored at `$HOME` directly, not the XDG config override,
/// so that every MyQS process on the host agrees on the location.
pub fn queue_dir() -> Result<PathBuf> {
    Ok(home_dir()?
        .join(".config")
        .join("myqs")
        .join(short_hostname()))
}

pub fn home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map(PathBuf::from)
        .ok_or(MyqsError::HomeNotSet)
}

/// First dot-separated label of the hostname, lowercased.
pub fn short_hostname() -> String {
    hostname::get()
        .ok()
        .map(|name| name.to_string_lossy().into_owned())
        .and_then(|name| name.split('.').next().map(str::to_lowercase))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hostname_is_lowercase_first_label() {
        let name = short_hostname();
        assert!(!name.is_empty());
        assert!(!name.contains('.'));
        assert_eq!(name, name.to_lowercase());
    }
}
