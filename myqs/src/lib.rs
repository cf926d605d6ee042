// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! MyQS core: job records, the per-host queue-directory store, advisory
//! leases, and the scheduling pass used by the daemon.

pub mod adapters;
pub mod app;
pub mod paths;
