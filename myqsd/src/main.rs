// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! MyQS batch job scheduler daemon.
//!
//! Running `myqsd <slots>` restarts the scheduler: a live daemon is
//! stopped, orphaned runners are requeued, and a fresh scheduling loop
//! is spawned detached. The loop itself runs under the hidden
//! `--daemon` flag.

mod cli;
mod config;
mod daemon;
mod logging;

use std::time::Duration;

use anyhow::Context;

#[tokio::main]
async fn main() {
    myqs::adapters::proc::restore_default_sigpipe();
    let parsed = cli::parse_opts();
    if let Err(err) = run(parsed).await {
        eprintln!("myqsd: {err:#}");
        std::process::exit(1);
    }
}

async fn run(parsed: cli::ParsedOpts) -> anyhow::Result<()> {
    let opts = parsed.opts;
    let config::LoadResult { config, report } = config::load_with_report(
        opts.config.clone(),
        config::Overrides {
            slots: opts.slots,
            poll_interval_secs: opts.poll_interval_secs,
            verbose: parsed.verbose_override,
        },
    )?;
    if opts.config_report {
        for line in report_lines(&report) {
            println!("{line}");
        }
        return Ok(());
    }

    let slots = config.slots.context(
        "the number of CPU execution slots must be given on the command line or in the config file",
    )?;
    let settings = daemon::Settings {
        slots,
        poll_interval: Duration::from_secs(config.poll_interval_secs),
    };

    if opts.daemon {
        logging::init(config.verbose);
        for line in report_lines(&report) {
            tracing::info!("{line}");
        }
        daemon::run(&settings).await
    } else {
        daemon::restart(&settings, opts.config.as_deref(), config.verbose).await
    }
}

fn report_lines(report: &config::ConfigReport) -> Vec<String> {
    let mut lines = Vec::new();
    match (&report.config_path, report.config_path_source) {
        (Some(path), Some(source)) => lines.push(format!(
            "config path: {} (source={}, present={})",
            path.display(),
            source.as_str(),
            report.config_file_present
        )),
        (Some(path), None) => lines.push(format!(
            "config path: {} (present={})",
            path.display(),
            report.config_file_present
        )),
        (None, _) => lines.push("config path: (none)".to_string()),
    }
    lines.push(match report.slots.value {
        Some(slots) => format!(
            "config slots: {} (source={})",
            slots,
            report.slots.source.as_str()
        ),
        None => format!(
            "config slots: (unset) (source={})",
            report.slots.source.as_str()
        ),
    });
    lines.push(format!(
        "config poll_interval_secs: {} (source={})",
        report.poll_interval_secs.value,
        report.poll_interval_secs.source.as_str()
    ));
    lines.push(format!(
        "config verbose: {} (source={})",
        report.verbose.value,
        report.verbose.source.as_str()
    ));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn report_lines_name_each_source() {
        let report = config::ConfigReport {
            config_path: Some(PathBuf::from("/tmp/myqsd.toml")),
            config_path_source: Some(config::ConfigSource::Env),
            config_file_present: true,
            slots: config::ConfigValue {
                value: Some(4),
                source: config::ConfigSource::Override,
            },
            poll_interval_secs: config::ConfigValue {
                value: 2,
                source: config::ConfigSource::Default,
            },
            verbose: config::ConfigValue {
                value: false,
                source: config::ConfigSource::ConfigFile,
            },
        };

        let lines = report_lines(&report);
        assert_eq!(
            lines[0],
            "config path: /tmp/myqsd.toml (source=env, present=true)"
        );
        assert_eq!(lines[1], "config slots: 4 (source=override)");
        assert_eq!(lines[2], "config poll_interval_secs: 2 (source=default)");
        assert_eq!(lines[3], "config verbose: false (source=config)");
    }

    #[test]
    fn report_lines_mark_unset_slots() {
        let report = config::ConfigReport {
            config_path: None,
            config_path_source: None,
            config_file_present: false,
            slots: config::ConfigValue {
                value: None,
                source: config::ConfigSource::Default,
            },
            poll_interval_secs: config::ConfigValue {
                value: 2,
                source: config::ConfigSource::Default,
            },
            verbose: config::ConfigValue {
                value: false,
                source: config::ConfigSource::Default,
            },
        };

        let lines = report_lines(&report);
        assert_eq!(lines[0], "config path: (none)");
        assert_eq!(lines[1], "config slots: (unset) (source=default)");
    }
}
