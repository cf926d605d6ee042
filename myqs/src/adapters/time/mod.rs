// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Wall clock behind [`ClockPort`].

use time::OffsetDateTime;

use crate::app::ports::ClockPort;

/// Real wall clock. Job records carry UTC stamps; local time exists
/// only for the lines the tools echo to the operator.
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }

    /// Local wall time when the zone is known, UTC otherwise.
    pub fn now_local(&self) -> OffsetDateTime {
        OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
    }
}

impl ClockPort for SystemClock {
    fn now_utc(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
