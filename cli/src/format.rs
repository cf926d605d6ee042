// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use myqs::app::types::JobStatusRow;

/// Column layout matches the row format below.
const TABLE_HEADER: &str =
    "JOBID  QUEUENAME  JOBNAME                                     CPUS  STATE  TIME";

/// Heading line for `myqstat`.
pub fn banner(hostname: &str) -> String {
    format!(
        "MyQS v{}, My Queuing System batch job statistics on HOST \"{hostname}\".",
        env!("CARGO_PKG_VERSION")
    )
}

/// The job table. Each running job's row is followed by the tail of its
/// log, unindented, like a screenful of the job's own output.
pub fn format_job_table(rows: &[JobStatusRow]) -> String {
    let mut out = String::new();
    out.push_str(TABLE_HEADER);
    out.push('\n');
    for row in rows {
        out.push_str(&format!(
            "{:>5}  {:<9}  {:<42}  {:>3}   {:<5} {:>5}\n",
            row.id,
            row.queue,
            row.command,
            row.ncpus,
            row.state,
            elapsed_cell(row.elapsed_minutes),
        ));
        for line in &row.log_tail {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Minutes since start, or a dash before the job has started.
fn elapsed_cell(minutes: Option<i64>) -> String {
    match minutes {
        Some(minutes) => minutes.to_string(),
        None => "-".to_string(),
    }
}

pub fn format_jobs_json(rows: &[JobStatusRow]) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(rows)?)
}
