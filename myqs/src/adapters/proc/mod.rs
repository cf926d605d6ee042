// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::io;

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::{self, Pid};

use crate::app::ports::ProcessControlPort;

/// Signal-based process control for the local host.
///
/// Liveness probes deliver signal 0. A probe that fails with `EPERM` still
/// proves the target exists, so it counts as alive.
#[derive(Clone, Default)]
pub struct SystemProcesses;

impl SystemProcesses {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessControlPort for SystemProcesses {
    fn pid_alive(&self, pid: i32) -> bool {
        match signal::kill(Pid::from_raw(pid), None) {
            Ok(()) => true,
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    fn pgid_alive(&self, pgid: i32) -> bool {
        match signal::killpg(Pid::from_raw(pgid), None) {
            Ok(()) => true,
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    fn terminate_group(&self, pgid: i32) -> io::Result<()> {
        signal::killpg(Pid::from_raw(pgid), Signal::SIGTERM).map_err(io::Error::from)
    }

    fn kill(&self, pid: i32) -> io::Result<()> {
        signal::kill(Pid::from_raw(pid), Signal::SIGKILL).map_err(io::Error::from)
    }
}

/// Moves the calling process into its own process group and returns the new
/// group id. Jobs run as group leaders so the whole pipeline can be signalled
/// at once.
pub fn become_group_leader() -> io::Result<i32> {
    unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0)).map_err(io::Error::from)?;
    Ok(unistd::getpgrp().as_raw())
}

/// Drops scheduling priority to the niceness floor. Failure is ignored;
/// the job then just runs at normal priority.
pub fn lower_priority() {
    // SAFETY: nice() touches nothing but this process's scheduling
    // priority.
    unsafe {
        let _ = nix::libc::nice(19);
    }
}

/// Restores the default `SIGPIPE` disposition.
///
/// The Rust runtime ignores `SIGPIPE` on startup; command line tools that
/// write to closed pipes should die quietly instead of reporting EPIPE.
pub fn restore_default_sigpipe() {
    // SAFETY: SigDfl installs no handler, so no Rust code runs in signal
    // context.
    unsafe {
        let _ = signal::signal(Signal::SIGPIPE, signal::SigHandler::SigDfl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_pid_is_alive() {
        let procs = SystemProcesses::new();
        assert!(procs.pid_alive(std::process::id() as i32));
    }

    #[test]
    fn own_group_is_alive() {
        let procs = SystemProcesses::new();
        let pgid = unistd::getpgrp().as_raw();
        assert!(procs.pgid_alive(pgid));
    }

    #[test]
    fn recycled_pid_space_upper_bound_is_dead() {
        let procs = SystemProcesses::new();
        // Linux caps pids below 4 million; i32::MAX is never a live pid.
        assert!(!procs.pid_alive(i32::MAX));
    }
}
