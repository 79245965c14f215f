//! Demo adapters
//!
//! Demo mode runs the full enforcement pipeline against a separate demo
//! database and an in-process notifier that records messages instead of
//! sending them. The same notifier doubles as the transport fake in tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::domain::{is_valid_address, Account, AccountId, DeliveryError, DeliveryErrorKind};
use crate::ports::Notifier;

/// A message captured by the demo notifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Notifier that records messages in memory
///
/// Individual recipients can be made to fail, and every send can be delayed
/// to simulate a slow transport.
#[derive(Default)]
pub struct DemoNotifier {
    outbox: Mutex<Vec<SentMessage>>,
    failures: Mutex<HashMap<String, DeliveryErrorKind>>,
    delay: Option<Duration>,
}

impl DemoNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every send by `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make every send to `recipient` fail with `kind`
    pub fn fail_recipient(&self, recipient: impl Into<String>, kind: DeliveryErrorKind) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(recipient.into(), kind);
        }
    }

    /// Messages delivered so far, in completion order
    pub fn sent(&self) -> Vec<SentMessage> {
        self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
    }

    /// Messages delivered to one recipient
    pub fn sent_to(&self, recipient: &str) -> Vec<SentMessage> {
        self.sent().into_iter().filter(|m| m.to == recipient).collect()
    }
}

#[async_trait]
impl Notifier for DemoNotifier {
    fn name(&self) -> &str {
        "demo"
    }

    async fn send_message(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), DeliveryError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let injected = self.failures.lock().ok().and_then(|f| f.get(to).copied());
        match injected {
            Some(DeliveryErrorKind::TransientDeliveryFailure) => {
                return Err(DeliveryError::transient("demo transport unavailable"))
            }
            Some(DeliveryErrorKind::PermanentDeliveryFailure) => {
                return Err(DeliveryError::permanent("demo recipient rejected"))
            }
            None => {}
        }
        if !is_valid_address(to) {
            return Err(DeliveryError::permanent("malformed recipient address"));
        }

        let mut outbox = self
            .outbox
            .lock()
            .map_err(|_| DeliveryError::transient("demo outbox poisoned"))?;
        outbox.push(SentMessage {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Generate demo accounts relative to `now`
///
/// Covers every path through a sweep: a fresh check-in, an overdue account,
/// an overdue account with an undeliverable contact, and an account that
/// was sealed by an earlier run.
pub fn generate_demo_accounts(now: DateTime<Utc>) -> Vec<Account> {
    let contacts = |prefix: &str| -> Vec<String> {
        (1..=5).map(|i| format!("{}.contact{}@example.com", prefix, i)).collect()
    };

    let mut diligent = Account::new(
        AccountId(0),
        "diligent",
        "diligent@example.com",
        "I still sleep with a night light",
        contacts("diligent"),
    );
    diligent.created_at = Some(now - ChronoDuration::days(12));
    diligent.last_check_in = Some(now - ChronoDuration::hours(2));
    diligent.fulfilled = true;

    let mut lapsed = Account::new(
        AccountId(0),
        "lapsed",
        "lapsed@example.com",
        "I have never actually read Camus",
        contacts("lapsed"),
    );
    lapsed.created_at = Some(now - ChronoDuration::days(30));
    lapsed.last_check_in = Some(now - ChronoDuration::hours(49));

    let mut unlucky_contacts = contacts("unlucky");
    unlucky_contacts[2] = "not-an-address".to_string();
    let mut unlucky = Account::new(
        AccountId(0),
        "unlucky",
        "unlucky@example.com",
        "I pushed the boulder off the cliff on purpose",
        unlucky_contacts,
    );
    unlucky.created_at = Some(now - ChronoDuration::days(5));
    unlucky.last_check_in = Some(now - ChronoDuration::hours(30));

    let mut sealed = Account::new(
        AccountId(0),
        "sealed",
        "sealed@example.com",
        "Already out in the open",
        contacts("sealed"),
    );
    sealed.active = false;
    sealed.created_at = Some(now - ChronoDuration::days(60));
    sealed.last_check_in = Some(now - ChronoDuration::days(40));

    vec![diligent, lapsed, unlucky, sealed]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_sent_messages() {
        let notifier = DemoNotifier::new();
        notifier
            .send_message("a@example.com", "subject", "body")
            .await
            .unwrap();

        let sent = notifier.sent_to("a@example.com");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "subject");
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let notifier = DemoNotifier::new();
        notifier.fail_recipient("down@example.com", DeliveryErrorKind::TransientDeliveryFailure);

        let err = notifier
            .send_message("down@example.com", "s", "b")
            .await
            .unwrap_err();
        assert_eq!(err.kind, DeliveryErrorKind::TransientDeliveryFailure);

        let err = notifier.send_message("nope", "s", "b").await.unwrap_err();
        assert_eq!(err.kind, DeliveryErrorKind::PermanentDeliveryFailure);
        assert!(notifier.sent().is_empty());
    }

    #[test]
    fn test_demo_accounts_cover_sweep_paths() {
        let accounts = generate_demo_accounts(Utc::now());
        assert_eq!(accounts.len(), 4);
        assert_eq!(accounts.iter().filter(|a| a.active).count(), 3);
        assert!(accounts.iter().all(|a| a.contacts.len() == 5));
    }
}
