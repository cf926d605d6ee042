// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Flat `KEY=VALUE` job-record codec.

use std::collections::HashMap;
use std::path::PathBuf;

use time::OffsetDateTime;

use crate::app::types::{JobRecord, NewJob};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record is missing required key: {0}")]
    MissingField(&'static str),
    #[error("record has an invalid {field} value: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

/// Split raw record text into key/value pairs.
///
/// Only the first `=` on a line is the delimiter, so PATH values keep any
/// embedded `=` intact. Lines without one are ignored. A key appearing
/// more than once keeps its last value; requeued records carry stale
/// `PGID`/`START` lines that a later run's appends supersede.
pub fn parse_fields(input: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();

    for line in input.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(eq) = line.find('=') {
            let (key, value_with_eq) = line.split_at(eq);
            fields.insert(key.to_string(), value_with_eq[1..].to_string());
        }
    }

    fields
}

pub fn parse_record(input: &str) -> Result<JobRecord, RecordError> {
    let fields = parse_fields(input);
    let required = |key: &'static str| {
        fields
            .get(key)
            .map(String::as_str)
            .ok_or(RecordError::MissingField(key))
    };

    let command = required("COMMAND")?.to_string();
    let directory = PathBuf::from(required("DIRECTORY")?);
    let path = required("PATH")?.to_string();
    let queue = required("QUEUE").and_then(|value| {
        value.parse().map_err(|_| RecordError::InvalidField {
            field: "QUEUE",
            value: value.to_string(),
        })
    })?;
    let ncpus = required("NCPUS").and_then(|value| {
        value.parse().map_err(|_| RecordError::InvalidField {
            field: "NCPUS",
            value: value.to_string(),
        })
    })?;

    Ok(JobRecord {
        command,
        directory,
        path,
        queue,
        ncpus,
        pgid: fields.get("PGID").and_then(|v| v.parse().ok()),
        start: fields.get("START").and_then(|v| parse_unix_seconds(v)),
        finish: fields.get("FINISH").and_then(|v| parse_unix_seconds(v)),
    })
}

/// Unix seconds, tolerating a fractional part.
fn parse_unix_seconds(value: &str) -> Option<OffsetDateTime> {
    let seconds = value.trim().parse::<f64>().ok()?;
    OffsetDateTime::from_unix_timestamp(seconds as i64).ok()
}

/// The five lines a freshly submitted record consists of.
pub fn render_new_job(job: &NewJob) -> String {
    format!(
        "COMMAND={}\nDIRECTORY={}\nPATH={}\nQUEUE={}\nNCPUS={}\n",
        job.command,
        job.directory.display(),
        job.path,
        job.queue,
        job.ncpus
    )
}

/// Lines the executor appends once the job's process group exists.
pub fn render_start_stamp(pgid: i32, start: OffsetDateTime) -> String {
    format!("PGID={pgid}\nSTART={}\n", start.unix_timestamp())
}

/// Line appended when the job leaves the running state.
pub fn render_finish_stamp(finish: OffsetDateTime) -> String {
    format!("FINISH={}\n", finish.unix_timestamp())
}
