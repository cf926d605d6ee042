// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::io;

/// Liveness and signaling boundary for OS processes.
///
/// Lock reclaim, force-kill, and the scheduler's runner reconciliation
/// all go through this port so they can run against fakes in tests.
pub trait ProcessControlPort: Send + Sync {
    /// Whether a process with `pid` exists.
    fn pid_alive(&self, pid: i32) -> bool;

    /// Whether any process in group `pgid` exists.
    fn pgid_alive(&self, pgid: i32) -> bool;

    /// SIGTERM the whole process group, children included.
    fn terminate_group(&self, pgid: i32) -> io::Result<()>;

    /// SIGKILL a single process.
    fn kill(&self, pid: i32) -> io::Result<()>;
}
