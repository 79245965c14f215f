//! Notification transport port

use async_trait::async_trait;

use crate::domain::DeliveryError;

/// Outbound notification transport
///
/// Exactly one call is made per recipient per sweep; implementations must not
/// retry internally, since retry eligibility is decided by later runs.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Transport name (e.g. "http")
    fn name(&self) -> &str;

    /// Send a plain-text message
    async fn send_message(&self, to: &str, subject: &str, body: &str)
        -> Result<(), DeliveryError>;
}
