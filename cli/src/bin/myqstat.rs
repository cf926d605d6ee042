// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Show queued and running jobs on this host.

use clap::Parser;

use cli::args::StatusCli;
use cli::context;
use cli::format;
use myqs::paths;

#[tokio::main]
async fn main() {
    let args = StatusCli::parse();
    if let Err(err) = run(args).await {
        context::fail("myqstat", &err);
    }
}

async fn run(args: StatusCli) -> anyhow::Result<()> {
    let ctx = context::tool_context()?;
    let rows = ctx.usecases.job_table(&ctx.home).await?;

    if args.json {
        println!("{}", format::format_jobs_json(&rows)?);
        return Ok(());
    }

    println!();
    println!("{}", format::banner(&paths::short_hostname()));
    println!();
    print!("{}", format::format_job_table(&rows));
    println!();

    if !ctx.usecases.scheduler_alive().await {
        println!("MyQS batch job scheduler not running. Run \"myqsd\" command.");
    }
    Ok(())
}
