// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fortnightly enqueue scheduler for the timecard sign-off service.
//!
//! - [`schedule`]: the pure fixed-anchor calendar predicate
//! - [`enqueue`]: eligible-user fan-out onto the task queue
//! - [`runner`]: the cron-driven background loop

pub mod enqueue;
pub mod runner;
pub mod schedule;

pub use enqueue::{EnqueueReport, enqueue_eligible, enqueue_if_signoff_day};
pub use runner::EnqueueScheduler;
pub use schedule::{is_fortnightly_sunday, next_signoff_sunday};
