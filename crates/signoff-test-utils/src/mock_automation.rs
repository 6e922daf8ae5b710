// SPDX-FileCopyrightText: 2026 Signoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock portal automation for deterministic testing.
//!
//! `MockAutomation` implements `SignoffAutomation` with a script of
//! pre-configured responses and captures every login it is handed.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tokio::sync::Mutex;

use signoff_core::traits::adapter::PluginAdapter;
use signoff_core::traits::automation::SignoffAutomation;
use signoff_core::types::{AdapterType, PortalLogin, SiteOutcome};
use signoff_core::SignoffError;

/// One scripted automation response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return this outcome.
    Outcome(SiteOutcome),
    /// Raise an automation error with the given type name.
    Error { message: String, kind: String },
    /// Sleep, then return the outcome.
    Delayed(Duration, SiteOutcome),
}

/// A login captured by [`MockAutomation`], with secrets exposed for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedLogin {
    pub username: String,
    pub password: String,
    pub domain: String,
    pub email: String,
    pub display_name: Option<String>,
    pub employee_id: String,
}

/// A mock automation collaborator.
///
/// Responses are popped from a FIFO queue. When the queue is empty, a
/// successful "Timecard signed off" outcome is returned.
pub struct MockAutomation {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    logins: Arc<Mutex<Vec<CapturedLogin>>>,
}

impl MockAutomation {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            logins: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock pre-loaded with the given responses.
    pub fn with_responses(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            logins: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn push(&self, response: MockResponse) {
        self.responses.lock().await.push_back(response);
    }

    pub async fn push_outcome(&self, outcome: SiteOutcome) {
        self.push(MockResponse::Outcome(outcome)).await;
    }

    /// All logins passed to `sign_off`, in call order.
    pub async fn logins(&self) -> Vec<CapturedLogin> {
        self.logins.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.logins.lock().await.len()
    }
}

impl Default for MockAutomation {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginAdapter for MockAutomation {
    fn name(&self) -> &str {
        "mock-automation"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Automation
    }
}

#[async_trait]
impl SignoffAutomation for MockAutomation {
    async fn sign_off(&self, login: &PortalLogin) -> Result<SiteOutcome, SignoffError> {
        self.logins.lock().await.push(CapturedLogin {
            username: login.username.expose_secret().to_string(),
            password: login.password.expose_secret().to_string(),
            domain: login.domain.clone(),
            email: login.email.clone(),
            display_name: login.display_name.clone(),
            employee_id: login.employee_id.clone(),
        });

        let next = self.responses.lock().await.pop_front();
        match next {
            None => Ok(SiteOutcome::succeeded("Timecard signed off")),
            Some(MockResponse::Outcome(outcome)) => Ok(outcome),
            Some(MockResponse::Error { message, kind }) => {
                Err(SignoffError::Automation { message, kind })
            }
            Some(MockResponse::Delayed(delay, outcome)) => {
                tokio::time::sleep(delay).await;
                Ok(outcome)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn login() -> PortalLogin {
        PortalLogin {
            username: SecretString::from("jdoe".to_string()),
            password: SecretString::from("pw".to_string()),
            domain: "MC Network".into(),
            email: "jdoe@example.com".into(),
            display_name: None,
            employee_id: "abc".into(),
        }
    }

    #[tokio::test]
    async fn scripted_responses_then_default() {
        let mock = MockAutomation::with_responses(vec![MockResponse::Error {
            message: "target closed".into(),
            kind: "BrowserError".into(),
        }]);
        assert!(mock.sign_off(&login()).await.is_err());
        let outcome = mock.sign_off(&login()).await.unwrap();
        assert!(outcome.success);

        let logins = mock.logins().await;
        assert_eq!(logins.len(), 2);
        assert_eq!(logins[0].username, "jdoe");
        assert_eq!(logins[0].domain, "MC Network");
    }
}
