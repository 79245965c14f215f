//! SMTP notification transport
//!
//! Sends each message as a plain-text mail through an authenticated STARTTLS
//! relay. Permanent SMTP replies (5xx) are permanent failures; everything
//! else, including connection problems, is worth retrying next run.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::domain::result::{Error, Result};
use crate::domain::{is_valid_address, DeliveryError, DeliveryErrorKind};
use crate::ports::Notifier;

/// Default submission port
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Notifier that delivers through an SMTP relay
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
    from: Mailbox,
}

impl std::fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("host", &self.host)
            .field("from", &self.from.email.to_string())
            .finish_non_exhaustive()
    }
}

impl SmtpNotifier {
    /// Create a notifier for `host:port`
    ///
    /// Credentials are only sent when a password is given; the username
    /// defaults to the sender address.
    pub fn new(
        host: &str,
        port: u16,
        from: &str,
        username: Option<String>,
        password: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let host = host.trim();
        if host.is_empty() {
            return Err(Error::config("SMTP host is empty"));
        }
        if !is_valid_address(from) {
            return Err(Error::config("notifier sender address is invalid"));
        }
        let mailbox: Mailbox = from
            .parse()
            .map_err(|e| Error::config(format!("notifier sender address is invalid: {}", e)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| Error::config(format!("invalid SMTP relay: {}", e)))?
            .port(port)
            .timeout(Some(request_timeout));
        if let Some(password) = password {
            let username = username.unwrap_or_else(|| from.to_string());
            builder = builder.credentials(Credentials::new(username, password));
        }

        Ok(Self {
            transport: builder.build(),
            host: host.to_string(),
            from: mailbox,
        })
    }

    fn build_message(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> std::result::Result<Message, DeliveryError> {
        if !is_valid_address(to) {
            return Err(DeliveryError::permanent("malformed recipient address"));
        }
        let to: Mailbox = to
            .parse()
            .map_err(|_| DeliveryError::permanent("malformed recipient address"))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| DeliveryError::permanent(e.to_string()))
    }
}

fn classify_error(err: &lettre::transport::smtp::Error) -> DeliveryErrorKind {
    if err.is_permanent() {
        DeliveryErrorKind::PermanentDeliveryFailure
    } else {
        DeliveryErrorKind::TransientDeliveryFailure
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send_message(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> std::result::Result<(), DeliveryError> {
        let message = self.build_message(to, subject, body)?;

        self.transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| DeliveryError {
                kind: classify_error(&e),
                detail: e.to_string(),
            })
    }
}
