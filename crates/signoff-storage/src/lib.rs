// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the timecard sign-off service.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed operations for users,
//! encrypted credentials, run history, and a crash-safe task queue.

pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use database::{Database, map_tr_err};
pub use models::*;
