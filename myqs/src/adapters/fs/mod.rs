// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

pub mod lease;
pub mod store;

pub use lease::{PidFile, PidFileLease};
pub use store::FsJobStore;
