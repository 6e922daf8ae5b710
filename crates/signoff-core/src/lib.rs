// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the timecard sign-off service.
//!
//! This crate provides the error type, shared domain types, and the adapter
//! traits for the external collaborators (KMS, portal automation, admin
//! notification).

pub mod error;
pub mod traits;
pub mod types;

pub use error::SignoffError;
pub use types::{
    AdapterType, DEFAULT_SITE, GeneratedDataKey, HealthStatus, PortalLogin, RunStatus,
    SIGNOFF_QUEUE, SignoffTask, SiteOutcome,
};

pub use traits::{
    AdminNotifier, DataKeyDecryptor, DataKeyGenerator, PluginAdapter, SignoffAutomation,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_type_round_trips_through_strum() {
        use std::str::FromStr;

        for variant in [AdapterType::Kms, AdapterType::Automation, AdapterType::Notifier] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn signoff_task_payload_is_plain_json() {
        let task = SignoffTask { user_id: 42 };
        let json = serde_json::to_string(&task).expect("should serialize");
        assert_eq!(json, r#"{"user_id":42}"#);
    }

    #[tokio::test]
    async fn plugin_adapter_defaults_to_healthy() {
        struct Stub;
        impl PluginAdapter for Stub {
            fn name(&self) -> &str {
                "stub"
            }
            fn adapter_type(&self) -> AdapterType {
                AdapterType::Notifier
            }
        }

        assert_eq!(Stub.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_generator<T: DataKeyGenerator>() {}
        fn _assert_decryptor<T: DataKeyDecryptor>() {}
        fn _assert_automation<T: SignoffAutomation>() {}
        fn _assert_notifier<T: AdminNotifier>() {}
    }
}
