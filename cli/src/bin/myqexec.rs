// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Batch job executor. Launched by the scheduler daemon, never by hand.
//!
//! Runs in two stages: `-jobid` prepares the environment and supervises,
//! `-spawn` is the re-invocation that stamps the record and execs the
//! user command in place.

use std::io::Write;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use myqs::adapters::fs::FsJobStore;
use myqs::adapters::proc;
use myqs::adapters::time::SystemClock;
use myqs::app::ports::{ClockPort, JobStorePort};
use myqs::app::record::{render_finish_stamp, render_start_stamp};
use myqs::app::types::{JobId, JobState};
use myqs::paths;
use time::OffsetDateTime;
use time::macros::format_description;

enum Mode {
    Start,
    Spawn,
}

fn parse_args() -> Option<(Mode, JobId)> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        return None;
    }
    let mode = match args[1].as_str() {
        "-jobid" => Mode::Start,
        "-spawn" => Mode::Spawn,
        _ => return None,
    };
    let id = args[2].parse().ok()?;
    Some((mode, id))
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    proc::restore_default_sigpipe();
    let Some((mode, id)) = parse_args() else {
        eprintln!("myqexec: Cannot be started manually. Please run \"myqsd\" command.");
        std::process::exit(1);
    };
    let code = match run(mode, id).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("myqexec: {err:#}");
            1
        }
    };
    std::process::exit(code);
}

async fn run(mode: Mode, id: JobId) -> anyhow::Result<i32> {
    let home = paths::home_dir()?;
    let store = FsJobStore::open(paths::queue_dir()?)?;
    let clock = SystemClock::new();
    match mode {
        Mode::Start => start(&store, &clock, id, &home).await,
        Mode::Spawn => spawn(&store, &clock, id).await,
    }
}

/// Supervising stage: move to the job's directory, drop priority, run
/// the spawn stage as a child, and settle the record by its exit code.
async fn start(
    store: &FsJobStore,
    clock: &SystemClock,
    id: JobId,
    home: &Path,
) -> anyhow::Result<i32> {
    let Some(record) = store.read(id, JobState::Running).await? else {
        // Gone already; a deleted job is not an error.
        return Ok(0);
    };
    std::env::set_current_dir(record.run_dir(home))?;
    proc::lower_priority();

    let exe = std::env::current_exe()?;
    let status = Command::new(exe)
        .arg("-spawn")
        .arg(id.to_string())
        .status()?;

    println!("{}", "-".repeat(80));
    println!("MyQS FINISH = {}", local_stamp(clock.now_local()));
    tokio::time::sleep(Duration::from_secs(1)).await;

    let _ = store
        .append(id, JobState::Running, &render_finish_stamp(clock.now_utc()))
        .await;
    let code = exit_code(status);
    if code == 0 {
        let _ = store.remove(id, JobState::Running).await;
    } else {
        let _ = store
            .transition(id, JobState::Running, JobState::Failed)
            .await;
    }
    Ok(code)
}

/// Final stage: become a process group leader, stamp the record, then
/// exec the user command in place. From the exec on, this OS process IS
/// the job.
async fn spawn(store: &FsJobStore, clock: &SystemClock, id: JobId) -> anyhow::Result<i32> {
    let pgid = proc::become_group_leader()?;
    let stamp = render_start_stamp(pgid, clock.now_utc());
    match store.append(id, JobState::Running, &stamp).await {
        Ok(true) => {}
        // Record gone: the job was deleted under us.
        Ok(false) | Err(_) => return Ok(0),
    }
    let Some(record) = store.read(id, JobState::Running).await? else {
        return Ok(0);
    };

    println!();
    println!(
        "MyQS v{}, My Queuing System batch job exec.",
        env!("CARGO_PKG_VERSION")
    );
    println!();
    println!("MyQS JOBID  = {id}");
    println!("MyQS QUEUE  = {}", record.queue);
    println!("MyQS NCPUS  = {}", record.ncpus);
    println!("MyQS PGID   = {pgid}");
    println!("MyQS START  = {}", local_stamp(clock.now_local()));
    println!("{}", "-".repeat(80));
    let _ = std::io::stdout().flush();

    // The job sees the submitter's PATH, not the daemon's.
    // SAFETY: current-thread runtime, no other threads are running.
    unsafe {
        std::env::set_var("PATH", &record.path);
    }

    let mut command = job_command(&record.command);
    let err = command.exec();
    eprintln!("myqexec: cannot execute \"{}\": {err}", record.command);
    Ok(127)
}

/// Resolve the batch command: an existing file runs by absolute path,
/// anything else goes through PATH lookup. A `#!/bin/sh` first line runs
/// through /bin/sh explicitly, so scripts without an exec bit still work.
fn job_command(raw: &str) -> Command {
    let path = Path::new(raw);
    if path.is_file() {
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        if has_sh_shebang(&absolute) {
            let mut command = Command::new("/bin/sh");
            command.arg(absolute);
            return command;
        }
        return Command::new(absolute);
    }
    Command::new(raw)
}

fn has_sh_shebang(path: &Path) -> bool {
    use std::io::{BufRead, BufReader};
    let Ok(file) = std::fs::File::open(path) else {
        return false;
    };
    let mut line = String::new();
    if BufReader::new(file).read_line(&mut line).is_err() {
        return false;
    }
    line.trim_end() == "#!/bin/sh"
}

/// Wall-clock rendering for the log banner and trailer.
fn local_stamp(now: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day]-[hour]:[minute]:[second]");
    now.format(&format).unwrap_or_default()
}

fn exit_code(status: std::process::ExitStatus) -> i32 {
    status
        .code()
        .unwrap_or_else(|| 128 + status.signal().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shebang_detection_requires_the_exact_sh_line() {
        let tmp = tempfile::TempDir::new().unwrap();
        let sh = tmp.path().join("plain.sh");
        std::fs::write(&sh, "#!/bin/sh\necho hi\n").unwrap();
        assert!(has_sh_shebang(&sh));

        let bash = tmp.path().join("bash.sh");
        std::fs::write(&bash, "#!/bin/bash\necho hi\n").unwrap();
        assert!(!has_sh_shebang(&bash));

        assert!(!has_sh_shebang(&tmp.path().join("missing.sh")));
    }

    #[test]
    fn unknown_commands_fall_back_to_path_lookup() {
        let command = job_command("definitely-not-a-file-here");
        assert_eq!(command.get_program(), "definitely-not-a-file-here");
    }

    #[test]
    fn sh_scripts_run_through_bin_sh() {
        let tmp = tempfile::TempDir::new().unwrap();
        let script = tmp.path().join("job.sh");
        std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();

        let command = job_command(script.to_str().unwrap());
        assert_eq!(command.get_program(), "/bin/sh");
    }
}
