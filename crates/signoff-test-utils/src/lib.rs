// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for sign-off integration tests.
//!
//! Provides mock collaborators and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without AWS or a browser.
//!
//! # Components
//!
//! - [`MockAutomation`] - Scripted portal automation that captures logins
//! - [`RecordingNotifier`] - Admin notifier that captures alerts
//! - [`FlakyDecryptor`] - KMS decryptor that fails a set number of calls
//! - [`TestHarness`] - Temp database, local KMS, and vault services

pub mod flaky_kms;
pub mod harness;
pub mod mock_automation;
pub mod mock_notifier;

pub use flaky_kms::FlakyDecryptor;
pub use harness::TestHarness;
pub use mock_automation::{CapturedLogin, MockAutomation, MockResponse};
pub use mock_notifier::{RecordingNotifier, SentAlert};
