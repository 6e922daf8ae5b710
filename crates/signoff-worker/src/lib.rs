// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sign-off task execution: the per-user run, the queue worker pool, and the
//! collaborators the binary wires into them.

pub mod automation;
pub mod notify;
pub mod pool;
pub mod retry;
pub mod shutdown;
pub mod task;

pub use automation::ProcessAutomation;
pub use notify::LogNotifier;
pub use pool::{EntryDisposition, WorkerPool};
pub use retry::RetryPolicy;
pub use shutdown::install_signal_handler;
pub use task::{SignoffContext, TaskOutcome};
