// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Process setup and production wiring shared by the tools.

use std::path::PathBuf;
use std::sync::Arc;

use myqs::adapters::fs::{FsJobStore, PidFileLease};
use myqs::adapters::proc::{SystemProcesses, restore_default_sigpipe};
use myqs::adapters::time::SystemClock;
use myqs::app::ports::ProcessControlPort;
use myqs::app::usecases::UseCases;
use myqs::paths::{self, SUBMIT_LOCK_FILE};

/// Wired use cases plus the resolved queue locations.
pub struct ToolContext {
    pub usecases: UseCases,
    pub queue_dir: PathBuf,
    pub home: PathBuf,
}

/// Builds the production wiring, creating the queue directory on first
/// use. Also restores default SIGPIPE handling so tools die quietly in
/// broken pipelines.
pub fn tool_context() -> myqs::app::errors::Result<ToolContext> {
    restore_default_sigpipe();
    let home = paths::home_dir()?;
    let queue_dir = paths::queue_dir()?;
    let store = Arc::new(FsJobStore::open(&queue_dir)?);
    let procs = Arc::new(SystemProcesses::new());
    let lease = Arc::new(PidFileLease::new(
        queue_dir.join(SUBMIT_LOCK_FILE),
        Arc::clone(&procs) as Arc<dyn ProcessControlPort>,
    ));
    let clock = Arc::new(SystemClock::new());
    let usecases = UseCases::new(store, lease, procs, clock, queue_dir.clone());
    Ok(ToolContext {
        usecases,
        queue_dir,
        home,
    })
}

/// Prints a fatal error the way the tools report them and exits.
pub fn fail(prog: &str, err: &anyhow::Error) -> ! {
    eprintln!("{prog}: {err:#}");
    std::process::exit(1)
}
