//! Delivery outcomes for disclosure notifications

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::account::AccountId;

/// Classification of a failed send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryErrorKind {
    /// Network or server-side failure, safe to retry in a later run
    TransientDeliveryFailure,
    /// Malformed or rejected address, retrying will not help
    PermanentDeliveryFailure,
}

impl DeliveryErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryErrorKind::TransientDeliveryFailure => "transient",
            DeliveryErrorKind::PermanentDeliveryFailure => "permanent",
        }
    }
}

/// Error returned by a notification transport
#[derive(Error, Debug, Clone)]
#[error("{} delivery failure: {detail}", .kind.as_str())]
pub struct DeliveryError {
    pub kind: DeliveryErrorKind,
    pub detail: String,
}

impl DeliveryError {
    pub fn transient(detail: impl Into<String>) -> Self {
        Self {
            kind: DeliveryErrorKind::TransientDeliveryFailure,
            detail: detail.into(),
        }
    }

    pub fn permanent(detail: impl Into<String>) -> Self {
        Self {
            kind: DeliveryErrorKind::PermanentDeliveryFailure,
            detail: detail.into(),
        }
    }
}

/// Result of one send to one recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    pub recipient: String,
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<DeliveryErrorKind>,
}

impl DeliveryOutcome {
    pub fn delivered(recipient: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            delivered: true,
            error_kind: None,
        }
    }

    pub fn failed(recipient: impl Into<String>, kind: DeliveryErrorKind) -> Self {
        Self {
            recipient: recipient.into(),
            delivered: false,
            error_kind: Some(kind),
        }
    }

    /// Whether a later run may usefully try this recipient again
    pub fn retry_eligible(&self) -> bool {
        self.error_kind == Some(DeliveryErrorKind::TransientDeliveryFailure)
    }
}

/// Aggregated disclosure result for one account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisclosureResult {
    pub account_id: AccountId,
    /// One outcome per contact, in contact order
    pub outcomes: Vec<DeliveryOutcome>,
    pub owner_notified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_error: Option<DeliveryErrorKind>,
}

impl DisclosureResult {
    pub fn delivered_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.delivered).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.delivered_count()
    }

    /// Total sends attempted, owner notice included
    pub fn attempted(&self) -> usize {
        self.outcomes.len() + 1
    }

    /// Total failed sends, owner notice included
    pub fn failures(&self) -> usize {
        self.failed_count() + usize::from(!self.owner_notified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_eligibility() {
        let transient =
            DeliveryOutcome::failed("a@example.com", DeliveryErrorKind::TransientDeliveryFailure);
        let permanent =
            DeliveryOutcome::failed("b@example.com", DeliveryErrorKind::PermanentDeliveryFailure);
        assert!(transient.retry_eligible());
        assert!(!permanent.retry_eligible());
        assert!(!DeliveryOutcome::delivered("c@example.com").retry_eligible());
    }

    #[test]
    fn test_disclosure_counts() {
        let result = DisclosureResult {
            account_id: AccountId(1),
            outcomes: vec![
                DeliveryOutcome::delivered("a@example.com"),
                DeliveryOutcome::failed("b@example.com", DeliveryErrorKind::TransientDeliveryFailure),
                DeliveryOutcome::delivered("c@example.com"),
            ],
            owner_notified: false,
            owner_error: Some(DeliveryErrorKind::PermanentDeliveryFailure),
        };
        assert_eq!(result.delivered_count(), 2);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.attempted(), 4);
        assert_eq!(result.failures(), 2);
    }

    #[test]
    fn test_delivery_error_display() {
        let err = DeliveryError::permanent("recipient rejected");
        assert_eq!(err.to_string(), "permanent delivery failure: recipient rejected");
    }
}
