// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use myqs::adapters::fs::{FsJobStore, PidFile};
use myqs::adapters::proc::SystemProcesses;
use myqs::adapters::time::SystemClock;
use myqs::app::ports::{ClockPort, JobStorePort, ProcessControlPort};
use myqs::app::scheduler::{DispatchPlan, Scheduler, SchedulerConfig};
use myqs::app::types::JobState;
use myqs::paths::{self, DAEMON_LOCK_FILE};

const ELECTION_SETTLE: Duration = Duration::from_secs(1);

/// Loop settings resolved from flags, environment, and config file.
#[derive(Debug, Clone)]
pub struct Settings {
    pub slots: u32,
    pub poll_interval: Duration,
}

/// Foreground mode: restart the scheduler.
///
/// A live daemon is stopped first. With no live daemon, runners orphaned
/// by a reboot go back into the queue. Either way a fresh daemon is then
/// spawned detached.
pub async fn restart(settings: &Settings, config_path: Option<&Path>, verbose: bool) -> Result<()> {
    let queue_dir = paths::queue_dir()?;
    let store = Arc::new(FsJobStore::open(&queue_dir)?);
    let procs = Arc::new(SystemProcesses::new());
    let lock = PidFile::new(queue_dir.join(DAEMON_LOCK_FILE));

    match lock.read_pid()? {
        Some(pid) if procs.pid_alive(pid) => {
            println!("Stopping MyQS batch job scheduler...");
            // The loop holds no state worth a graceful handoff.
            let _ = procs.kill(pid);
            lock.remove()?;
        }
        _ => {
            let scheduler = build_scheduler(Arc::clone(&store), Arc::clone(&procs), settings.slots)?;
            for id in scheduler.requeue_orphans().await? {
                println!("Batch job with jobid \"{id}\" being requeued after system restart...");
            }
        }
    }

    println!("Starting MyQS batch job scheduler...");
    spawn_detached(settings, config_path, verbose)
}

/// Detached mode: win the lock election, then poll the queue forever.
pub async fn run(settings: &Settings) -> Result<()> {
    let queue_dir = paths::queue_dir()?;
    let store = Arc::new(FsJobStore::open(&queue_dir)?);
    let procs = Arc::new(SystemProcesses::new());

    let lock = PidFile::new(queue_dir.join(DAEMON_LOCK_FILE));
    if !win_election(&lock, ELECTION_SETTLE).await? {
        tracing::info!("another scheduler took the lock, exiting");
        return Ok(());
    }
    tracing::info!(
        slots = settings.slots,
        poll_secs = settings.poll_interval.as_secs(),
        "scheduler running"
    );

    let scheduler = build_scheduler(Arc::clone(&store), Arc::clone(&procs), settings.slots)?;
    let mut ticker = tokio::time::interval(settings.poll_interval);
    loop {
        ticker.tick().await;
        match scheduler.pass().await {
            Ok(Some(plan)) => {
                if let Err(err) = spawn_executor(&plan) {
                    // Put the claim back so the job retries next pass.
                    tracing::warn!(id = %plan.id, "cannot launch executor, requeueing: {err:#}");
                    let _ = store
                        .transition(plan.id, JobState::Running, JobState::Queued)
                        .await;
                }
            }
            Ok(None) => {}
            Err(err) => tracing::warn!("scheduling pass failed: {err}"),
        }
    }
}

/// Last-writer-wins election: write our PID, settle, and keep running
/// only if the file still names us afterwards.
async fn win_election(lock: &PidFile, settle: Duration) -> Result<bool> {
    let own = std::process::id() as i32;
    lock.write_pid(own)?;
    tokio::time::sleep(settle).await;
    // An unreadable file cannot disprove ownership.
    let holder = lock.read_pid().unwrap_or(Some(own));
    Ok(holder == Some(own))
}

fn build_scheduler(
    store: Arc<FsJobStore>,
    procs: Arc<SystemProcesses>,
    slots: u32,
) -> Result<Scheduler> {
    Ok(Scheduler::new(
        store as Arc<dyn JobStorePort>,
        procs as Arc<dyn ProcessControlPort>,
        Arc::new(SystemClock::new()) as Arc<dyn ClockPort>,
        SchedulerConfig::new(slots),
        paths::home_dir()?,
    ))
}

fn spawn_detached(settings: &Settings, config_path: Option<&Path>, verbose: bool) -> Result<()> {
    use std::os::unix::process::CommandExt;

    let exe = std::env::current_exe().context("cannot locate the myqsd executable")?;
    let mut command = std::process::Command::new(exe);
    command
        .arg("--daemon")
        .arg("--poll-interval")
        .arg(settings.poll_interval.as_secs().to_string());
    if let Some(path) = config_path {
        command.arg("--config").arg(path);
    }
    if verbose {
        command.arg("--verbose");
    }
    command
        .arg(settings.slots.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()
        .context("cannot start the scheduler daemon")?;
    Ok(())
}

/// Launch `myqexec -jobid <id>` with the job's output wired to its log
/// file. The child is reaped in the background; the executor itself
/// settles the record when the job finishes.
fn spawn_executor(plan: &DispatchPlan) -> Result<()> {
    let log = std::fs::File::create(&plan.log_file)
        .with_context(|| format!("cannot create \"{}\" log file", plan.log_file.display()))?;
    let log_err = log
        .try_clone()
        .with_context(|| format!("cannot reopen \"{}\" log file", plan.log_file.display()))?;

    let mut child = tokio::process::Command::new(executor_path())
        .arg("-jobid")
        .arg(plan.id.to_string())
        .stdin(Stdio::null())
        .stdout(log)
        .stderr(log_err)
        .spawn()
        .context("cannot start myqexec")?;

    let id = plan.id;
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => tracing::debug!(id = %id, code = status.code(), "executor finished"),
            Err(err) => tracing::warn!(id = %id, "cannot reap executor: {err}"),
        }
    });
    Ok(())
}

/// Prefer the executor installed beside this binary, falling back to a
/// PATH lookup.
fn executor_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("myqexec")))
        .filter(|path| path.is_file())
        .unwrap_or_else(|| PathBuf::from("myqexec"))
}
