// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Shared pieces of the MyQS command line tools.

pub mod args;
pub mod context;
pub mod format;
