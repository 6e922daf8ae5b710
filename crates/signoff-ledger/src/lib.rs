// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run ledger and outcome classification for the timecard sign-off service.
//!
//! This crate provides:
//! - **Classifier**: pure mapping from automation outcomes and errors to a [`RunStatus`](signoff_core::RunStatus)
//! - **Run ledger**: provisional row creation, version correction, and exactly-once finalization

pub mod classify;
pub mod ledger;

pub use classify::{classify_error, classify_failure, classify_outcome};
pub use ledger::{RunHandle, RunLedger, truncate_reason};
