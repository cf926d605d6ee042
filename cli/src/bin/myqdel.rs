// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Delete job records, optionally killing running jobs.

use clap::Parser;

use cli::args::DeleteCli;
use cli::context;
use myqs::app::types::DeleteOutcome;

#[tokio::main]
async fn main() {
    let args = DeleteCli::parse();
    if let Err(err) = run(args).await {
        context::fail("myqdel", &err);
    }
}

async fn run(args: DeleteCli) -> anyhow::Result<()> {
    let ctx = context::tool_context()?;

    let mut outcomes = ctx.usecases.delete(&args.jobids, args.kill).await?;
    if args.all {
        outcomes.extend(ctx.usecases.purge_finished().await?);
    }

    for outcome in outcomes {
        match outcome {
            DeleteOutcome::Deleted {
                id,
                command: Some(command),
                ..
            } => {
                println!("Batch job with jobid {id} (\"{command}\") has been deleted from MyQS.");
            }
            DeleteOutcome::Deleted { id, .. } => {
                println!("Batch job with jobid {id} has been deleted from MyQS.");
            }
            DeleteOutcome::Killed { id } => {
                println!("Batch job with jobid {id} has been killed and deleted from MyQS.");
            }
            DeleteOutcome::Running { id } => {
                println!("MyQS cannot delete batch job with jobid {id} as it is running.");
            }
            DeleteOutcome::NotFound { id } => {
                println!("MyQS cannot delete batch job with jobid {id} as it does not exist.");
            }
        }
    }
    Ok(())
}
