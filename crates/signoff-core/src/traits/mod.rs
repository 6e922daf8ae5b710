// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the sign-off collaborators.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod automation;
pub mod kms;
pub mod notify;

pub use adapter::PluginAdapter;
pub use automation::SignoffAutomation;
pub use kms::{DataKeyDecryptor, DataKeyGenerator};
pub use notify::AdminNotifier;
