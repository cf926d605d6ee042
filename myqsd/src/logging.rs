// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Telemetry wiring for the daemon process.
//!
//! Three environment variables control it: `MYQS_LOG` (an `EnvFilter`
//! directive), `MYQS_LOG_FORMAT` (`compact`, `pretty` or `json`) and
//! `MYQS_LOG_FILE` (an additional plain sink). A detached daemon runs
//! with its stdio nulled, so the file sink is where its lines land.

use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

/// Keeps the non-blocking file writer flushing for the process lifetime.
static SINK_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LogFormat {
    Compact,
    Pretty,
    Json,
}

pub fn init(verbose: bool) {
    let filter = EnvFilter::new(filter_directive(env_trimmed("MYQS_LOG").as_deref(), verbose));
    let format = chosen_format(env_trimmed("MYQS_LOG_FORMAT").as_deref());
    let sink = file_sink(env_trimmed("MYQS_LOG_FILE").as_deref());
    let (writer, guard) = match sink {
        Some(sink) => (Some(sink.writer), Some(sink.guard)),
        None => (None, None),
    };

    let base = Registry::default()
        .with(filter)
        .with(tracing_error::ErrorLayer::default());

    match format {
        LogFormat::Compact => base
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_timer(UtcTime::rfc_3339()),
            )
            .with(writer.map(|writer| {
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_ansi(false)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(writer)
            }))
            .init(),
        LogFormat::Pretty => base
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_timer(UtcTime::rfc_3339()),
            )
            .with(writer.map(|writer| {
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_ansi(false)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(writer)
            }))
            .init(),
        LogFormat::Json => base
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_timer(UtcTime::rfc_3339()),
            )
            .with(writer.map(|writer| {
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_timer(UtcTime::rfc_3339())
                    .with_writer(writer)
            }))
            .init(),
    }

    if let Some(guard) = guard {
        let _ = SINK_GUARD.set(guard);
    }
}

fn env_trimmed(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Filter directive: an explicit one wins; otherwise the verbose flag
/// picks between debug and info.
fn filter_directive(env: Option<&str>, verbose: bool) -> String {
    match env {
        Some(directive) => directive.to_string(),
        None if verbose => "debug".to_string(),
        None => "info".to_string(),
    }
}

fn chosen_format(env: Option<&str>) -> LogFormat {
    match env.map(str::to_ascii_lowercase).as_deref() {
        Some("pretty") => LogFormat::Pretty,
        Some("json") => LogFormat::Json,
        _ => LogFormat::Compact,
    }
}

struct FileSink {
    writer: NonBlocking,
    guard: WorkerGuard,
}

fn file_sink(path: Option<&str>) -> Option<FileSink> {
    let path = Path::new(path?);
    let name = path.file_name()?;
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
    Some(FileSink { writer, guard })
}
