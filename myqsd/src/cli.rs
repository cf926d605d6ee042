// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Command line for the scheduler daemon.

use std::path::PathBuf;

use clap::{ArgAction, CommandFactory, FromArgMatches, Parser};

#[derive(Parser)]
#[command(
    name = "myqsd",
    version,
    about = "MyQS, My Queuing System batch job scheduler daemon.",
    after_help = "Running myqsd stops a live scheduler first, so it doubles as a restart.\n\
\n\
Configuration precedence: defaults < config file < environment < command-line flags.\n\
Config path precedence: defaults < MYQSD_CONFIG_PATH < command-line flags.\n\
If --config is omitted, myqsd tries MYQSD_CONFIG_PATH, then the default config file location; missing default config is OK."
)]
pub struct Opts {
    #[arg(
        value_name = "SLOTS",
        value_parser = clap::value_parser!(u32).range(1..),
        help = "The maximum number of CPU execution slots to create. Overrides `slots` from the config file."
    )]
    pub slots: Option<u32>,
    #[arg(
        long,
        hide = true,
        action = ArgAction::SetTrue,
        help = "Run the scheduling loop in the foreground (internal re-invocation)."
    )]
    pub daemon: bool,
    #[arg(
        short,
        long,
        value_name = "PATH",
        help = "Path to a TOML config file. When omitted, myqsd uses MYQSD_CONFIG_PATH if set, otherwise the default config file location if available."
    )]
    pub config: Option<PathBuf>,
    #[arg(
        long = "poll-interval",
        value_name = "SECS",
        help = "How often to run a scheduling pass. Overrides `poll_interval_secs` from the config file."
    )]
    pub poll_interval_secs: Option<u64>,
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Log at debug level, dependencies included. Overrides `verbose` from the config file."
    )]
    pub verbose: u8,
    #[arg(
        long,
        action = ArgAction::SetTrue,
        help = "Print the effective configuration with the source of each value, then exit."
    )]
    pub config_report: bool,
}

/// The parsed command line plus the verbosity override, `Some` only
/// when the flag was actually given.
pub struct ParsedOpts {
    pub opts: Opts,
    pub verbose_override: Option<bool>,
}

const HELP_TEMPLATE: &str = r#" __  __ __   __  ___   ____
|  \/  |\ \ / / / _ \ / ___|
| |\/| | \ V / | | | |\___ \
| |  | |  | |  | |_| | ___) |
|_|  |_|  |_|   \__\_\|____/

{about-with-newline}{usage-heading} {usage}

{all-args}
{after-help}
"#;

pub fn cli_command() -> clap::Command {
    Opts::command().help_template(HELP_TEMPLATE)
}

pub fn parse_opts() -> ParsedOpts {
    let opts = match Opts::from_arg_matches(&cli_command().get_matches()) {
        Ok(opts) => opts,
        Err(err) => err.exit(),
    };
    let verbose_override = (opts.verbose > 0).then_some(true);
    ParsedOpts {
        opts,
        verbose_override,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts_from(args: &[&str]) -> Opts {
        let matches = cli_command().try_get_matches_from(args).unwrap();
        Opts::from_arg_matches(&matches).unwrap()
    }

    #[test]
    fn slots_positional_parses() {
        let opts = opts_from(&["myqsd", "8"]);
        assert_eq!(opts.slots, Some(8));
        assert!(!opts.daemon);
        assert!(opts.poll_interval_secs.is_none());
    }

    #[test]
    fn slots_are_optional_on_the_command_line() {
        let opts = opts_from(&["myqsd"]);
        assert_eq!(opts.slots, None);
    }

    #[test]
    fn zero_slots_are_rejected() {
        let err = cli_command().try_get_matches_from(["myqsd", "0"]).unwrap_err();
        assert!(err.to_string().contains("invalid value"));
    }

    #[test]
    fn daemon_and_poll_interval_flags_parse() {
        let opts = opts_from(&["myqsd", "--daemon", "--poll-interval", "5", "4"]);
        assert!(opts.daemon);
        assert_eq!(opts.poll_interval_secs, Some(5));
        assert_eq!(opts.slots, Some(4));
    }

    #[test]
    fn verbose_counts_only_when_given() {
        assert_eq!(opts_from(&["myqsd", "4"]).verbose, 0);
        assert_eq!(opts_from(&["myqsd", "-v", "4"]).verbose, 1);
        assert_eq!(opts_from(&["myqsd", "-vv", "4"]).verbose, 2);
    }

    #[test]
    fn config_report_flag_parses() {
        let opts = opts_from(&["myqsd", "--config-report"]);
        assert!(opts.config_report);
    }
}
