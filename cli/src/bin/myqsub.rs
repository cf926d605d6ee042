// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Submit batch jobs into the per-host queue.

use clap::Parser;

use cli::args::SubmitCli;
use cli::context;
use myqs::app::types::{SubmitOutcome, SubmitRequest};

#[tokio::main]
async fn main() {
    let args = SubmitCli::parse();
    if let Err(err) = run(args).await {
        context::fail("myqsub", &err);
    }
}

async fn run(args: SubmitCli) -> anyhow::Result<()> {
    let ctx = context::tool_context()?;
    let request = SubmitRequest {
        files: args.files,
        ncpus: args.ncpus,
        queue: args.queue,
        directory: std::env::current_dir()?,
        path: std::env::var("PATH").unwrap_or_default(),
    };

    for outcome in ctx.usecases.submit(&request).await? {
        match outcome {
            SubmitOutcome::Submitted { id, .. } => {
                println!("Batch job with jobid {id} has been submitted into MyQS.");
            }
            SubmitOutcome::MissingFile { file } => {
                println!("MyQS cannot find \"{file}\" batch file.");
            }
        }
    }

    if !ctx.usecases.scheduler_alive().await {
        println!("MyQS batch job scheduler not running. Run \"myqsd\" command.");
    }
    Ok(())
}
