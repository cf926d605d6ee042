// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod clock;
pub mod job_store;
pub mod lease;
pub mod process;

pub use clock::ClockPort;
pub use job_store::JobStorePort;
pub use lease::{LeaseGuard, LeasePort};
pub use process::ProcessControlPort;
