// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use clap::Parser;

use myqs::app::types::{JobId, QueueName};

/// Command line of `myqsub`.
#[derive(Debug, Parser)]
#[command(version, about = "MyQS, My Queuing System batch job submission.")]
pub struct SubmitCli {
    /// Number of CPU core slots the job needs.
    #[arg(
        short = 'n',
        long = "ncpus",
        value_name = "N",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub ncpus: u32,

    /// Queue to submit into ("normal" or "express").
    #[arg(short = 'q', long = "queue", value_name = "QUEUE", default_value = "normal")]
    pub queue: QueueName,

    /// Batch files to submit, one job each.
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<String>,
}

/// Command line of `myqdel`.
#[derive(Debug, Parser)]
#[command(version, about = "MyQS, My Queuing System batch job deletion.")]
pub struct DeleteCli {
    /// Terminate running jobs: SIGTERM to the whole process group.
    #[arg(short = 'k', long = "kill")]
    pub kill: bool,

    /// Also purge every finished job record.
    #[arg(short = 'a', long = "all")]
    pub all: bool,

    /// Job IDs to delete.
    #[arg(value_name = "JOBID", required_unless_present = "all")]
    pub jobids: Vec<JobId>,
}

/// Command line of `myqstat`.
#[derive(Debug, Parser)]
#[command(version, about = "MyQS, My Queuing System batch job statistics.")]
pub struct StatusCli {
    /// Print machine readable JSON instead of the table.
    #[arg(long)]
    pub json: bool,
}
