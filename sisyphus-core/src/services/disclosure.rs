//! Disclosure fanout - delivers a breached account's secret to its contacts
//!
//! Every recipient gets its own task. A failed or panicked send only affects
//! the outcome for that one recipient.

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::domain::{
    AccountId, BreachRecord, DeliveryError, DeliveryErrorKind, DeliveryOutcome, DisclosureResult,
};
use crate::ports::Notifier;

pub const CONTACT_SUBJECT: &str = "Sisyphus Greets You";
pub const OWNER_SUBJECT: &str = "Your secret is out";

/// Compose the message sent to each designated contact
pub fn compose_contact_message(owner_address: &str, secret: &str) -> String {
    format!(
        "Someone you know with the email {owner} has not upheld a contract.\n\
         The following is something they do not want you to know. I am so, so sorry.\n\n\
         \"{secret}\" -{owner}\n\n\
         Sisyphus Mailer",
        owner = owner_address,
        secret = secret,
    )
}

/// Compose the notice sent to the account owner
pub fn compose_owner_notice() -> String {
    "Your secret is out.\n\n\
     You did not check in before your deadline, so your secret has been sent \
     to your contacts and your account has been deactivated.\n\n\
     Sisyphus Mailer"
        .to_string()
}

enum Recipient {
    Contact(usize),
    Owner,
}

#[derive(Clone)]
pub struct DisclosureFanout {
    notifier: Arc<dyn Notifier>,
}

impl DisclosureFanout {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Send the secret to every contact and the notice to the owner
    ///
    /// All sends run concurrently and the result is returned only once every
    /// one of them has finished. Dropping the returned future aborts the sends
    /// still in flight.
    pub async fn disclose(&self, record: BreachRecord) -> DisclosureResult {
        let account_id = record.account_id;
        let contact_body: Arc<str> =
            compose_contact_message(&record.owner_address, &record.secret).into();

        let mut tasks = JoinSet::new();
        for (index, to) in record.contacts.iter().cloned().enumerate() {
            let notifier = Arc::clone(&self.notifier);
            let body = Arc::clone(&contact_body);
            tasks.spawn(async move {
                let sent = notifier.send_message(&to, CONTACT_SUBJECT, &body).await;
                (Recipient::Contact(index), sent)
            });
        }
        {
            let notifier = Arc::clone(&self.notifier);
            let to = record.owner_address.clone();
            tasks.spawn(async move {
                let sent = notifier
                    .send_message(&to, OWNER_SUBJECT, &compose_owner_notice())
                    .await;
                (Recipient::Owner, sent)
            });
        }

        let mut slots: Vec<Option<DeliveryOutcome>> = vec![None; record.contacts.len()];
        let mut owner: Option<Result<(), DeliveryError>> = None;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((Recipient::Contact(index), sent)) => {
                    let recipient = &record.contacts[index];
                    slots[index] = Some(match sent {
                        Ok(()) => DeliveryOutcome::delivered(recipient.as_str()),
                        Err(e) => {
                            log_failure(account_id, Some(index), &e);
                            DeliveryOutcome::failed(recipient.as_str(), e.kind)
                        }
                    });
                }
                Ok((Recipient::Owner, sent)) => {
                    if let Err(e) = &sent {
                        log_failure(account_id, None, e);
                    }
                    owner = Some(sent);
                }
                Err(e) => {
                    tracing::warn!(account_id = %account_id, error = %e, "delivery task did not complete");
                }
            }
        }

        // A task that panicked leaves its slot empty
        let outcomes = slots
            .into_iter()
            .zip(record.contacts.iter())
            .map(|(slot, recipient)| {
                slot.unwrap_or_else(|| {
                    DeliveryOutcome::failed(
                        recipient.as_str(),
                        DeliveryErrorKind::TransientDeliveryFailure,
                    )
                })
            })
            .collect();

        let (owner_notified, owner_error) = match owner {
            Some(Ok(())) => (true, None),
            Some(Err(e)) => (false, Some(e.kind)),
            None => (false, Some(DeliveryErrorKind::TransientDeliveryFailure)),
        };

        DisclosureResult {
            account_id,
            outcomes,
            owner_notified,
            owner_error,
        }
    }
}

fn log_failure(account_id: AccountId, contact_index: Option<usize>, err: &DeliveryError) {
    match contact_index {
        Some(index) => tracing::warn!(
            account_id = %account_id,
            contact = index + 1,
            kind = err.kind.as_str(),
            detail = %err.detail,
            "disclosure to contact failed"
        ),
        None => tracing::warn!(
            account_id = %account_id,
            kind = err.kind.as_str(),
            detail = %err.detail,
            "owner notice failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::demo::DemoNotifier;
    use async_trait::async_trait;

    fn record(contacts: &[&str]) -> BreachRecord {
        BreachRecord {
            account_id: AccountId(42),
            secret: "I cheated at chess".to_string(),
            contacts: contacts.iter().map(|c| c.to_string()).collect(),
            owner_address: "owner@example.com".to_string(),
        }
    }

    #[test]
    fn test_contact_message_contains_secret_and_owner() {
        let body = compose_contact_message("owner@example.com", "I cheated at chess");
        assert!(body.contains("\"I cheated at chess\" -owner@example.com"));
        assert!(body.starts_with("Someone you know with the email owner@example.com"));
        assert!(body.ends_with("Sisyphus Mailer"));
    }

    #[test]
    fn test_owner_notice_does_not_contain_secret() {
        assert!(compose_owner_notice().starts_with("Your secret is out."));
    }

    #[tokio::test]
    async fn test_one_failed_contact_does_not_affect_others() {
        let contacts = [
            "c1@example.com",
            "c2@example.com",
            "c3@example.com",
            "c4@example.com",
            "c5@example.com",
        ];
        let notifier = Arc::new(DemoNotifier::new());
        notifier.fail_recipient("c3@example.com", DeliveryErrorKind::TransientDeliveryFailure);

        let result = DisclosureFanout::new(notifier.clone())
            .disclose(record(&contacts))
            .await;

        assert_eq!(result.outcomes.len(), 5);
        assert_eq!(result.delivered_count(), 4);
        assert!(!result.outcomes[2].delivered);
        assert_eq!(
            result.outcomes[2].error_kind,
            Some(DeliveryErrorKind::TransientDeliveryFailure)
        );
        // Outcomes keep contact order regardless of completion order
        for (outcome, contact) in result.outcomes.iter().zip(contacts.iter()) {
            assert_eq!(&outcome.recipient, contact);
        }
        assert!(result.owner_notified);

        let owner_mail = notifier.sent_to("owner@example.com");
        assert_eq!(owner_mail.len(), 1);
        assert_eq!(owner_mail[0].subject, OWNER_SUBJECT);
        assert_eq!(notifier.sent_to("c1@example.com")[0].subject, CONTACT_SUBJECT);
    }

    #[tokio::test]
    async fn test_owner_failure_is_reported() {
        let notifier = Arc::new(DemoNotifier::new());
        notifier.fail_recipient("owner@example.com", DeliveryErrorKind::PermanentDeliveryFailure);

        let result = DisclosureFanout::new(notifier)
            .disclose(record(&["c1@example.com"]))
            .await;

        assert!(!result.owner_notified);
        assert_eq!(
            result.owner_error,
            Some(DeliveryErrorKind::PermanentDeliveryFailure)
        );
        assert_eq!(result.delivered_count(), 1);
    }

    struct PanickingNotifier;

    #[async_trait]
    impl Notifier for PanickingNotifier {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn send_message(&self, to: &str, _: &str, _: &str) -> Result<(), DeliveryError> {
            if to == "boom@example.com" {
                panic!("transport bug");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_panicking_send_becomes_transient_outcome() {
        let result = DisclosureFanout::new(Arc::new(PanickingNotifier))
            .disclose(record(&["ok@example.com", "boom@example.com"]))
            .await;

        assert_eq!(result.outcomes.len(), 2);
        assert!(result.outcomes[0].delivered);
        assert_eq!(result.outcomes[1].recipient, "boom@example.com");
        assert!(result.outcomes[1].retry_eligible());
        assert!(result.owner_notified);
    }
}
