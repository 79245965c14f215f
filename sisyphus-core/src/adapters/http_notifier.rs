//! HTTP notification transport
//!
//! Posts each message as JSON to a transactional-mail style HTTP endpoint:
//! `POST <endpoint>` with `{ "from", "to", "subject", "text" }` and an optional
//! bearer API key. The response status decides how a failure is classified.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;

use crate::domain::result::{Error, Result};
use crate::domain::{is_valid_address, DeliveryError, DeliveryErrorKind};
use crate::ports::Notifier;

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct OutboundMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Notifier that delivers through an HTTP messaging API
pub struct HttpNotifier {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    from: String,
}

impl std::fmt::Debug for HttpNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpNotifier")
            .field("endpoint", &self.endpoint.as_str())
            .field("from", &self.from)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpNotifier {
    /// Create a new HTTP notifier
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        from: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::config(format!("invalid notifier endpoint: {}", e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::config("notifier endpoint must use http or https"));
        }

        let from = from.into();
        if !is_valid_address(&from) {
            return Err(Error::config("notifier sender address is invalid"));
        }

        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            from,
        })
    }
}

/// Map a non-success HTTP status to a delivery failure kind
///
/// Timeouts, conflicts, throttling and server errors are worth retrying next
/// run; any other client error means the request itself was rejected.
pub fn classify_status(status: StatusCode) -> Option<DeliveryErrorKind> {
    if status.is_success() {
        return None;
    }
    match status.as_u16() {
        408 | 409 | 429 | 500..=599 => Some(DeliveryErrorKind::TransientDeliveryFailure),
        _ => Some(DeliveryErrorKind::PermanentDeliveryFailure),
    }
}

fn classify_error(err: &reqwest::Error) -> DeliveryErrorKind {
    if err.is_builder() {
        DeliveryErrorKind::PermanentDeliveryFailure
    } else {
        DeliveryErrorKind::TransientDeliveryFailure
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    fn name(&self) -> &str {
        "http"
    }

    async fn send_message(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> std::result::Result<(), DeliveryError> {
        if !is_valid_address(to) {
            return Err(DeliveryError::permanent("malformed recipient address"));
        }

        let message = OutboundMessage {
            from: &self.from,
            to,
            subject,
            text: body,
        };

        let mut request = self.client.post(self.endpoint.clone()).json(&message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| DeliveryError {
            kind: classify_error(&e),
            detail: e.without_url().to_string(),
        })?;

        let status = response.status();
        match classify_status(status) {
            None => Ok(()),
            Some(kind) => Err(DeliveryError {
                kind,
                detail: format!("HTTP {}", status),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn notifier_for(server: &MockServer) -> HttpNotifier {
        HttpNotifier::new(
            &format!("{}/v1/messages", server.uri()),
            Some("test-key".to_string()),
            "sisyphus@example.com",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    async fn mount_status(server: &MockServer, status: u16) {
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(status))
            .mount(server)
            .await;
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_status(StatusCode::OK), None);
        assert_eq!(classify_status(StatusCode::ACCEPTED), None);
        for code in [408u16, 409, 429, 500, 502, 503, 504] {
            assert_eq!(
                classify_status(StatusCode::from_u16(code).unwrap()),
                Some(DeliveryErrorKind::TransientDeliveryFailure),
                "status {}",
                code
            );
        }
        for code in [400u16, 401, 403, 404, 422] {
            assert_eq!(
                classify_status(StatusCode::from_u16(code).unwrap()),
                Some(DeliveryErrorKind::PermanentDeliveryFailure),
                "status {}",
                code
            );
        }
    }

    #[test]
    fn test_rejects_bad_configuration() {
        let timeout = Duration::from_secs(1);
        assert!(HttpNotifier::new("not a url", None, "a@example.com", timeout).is_err());
        assert!(HttpNotifier::new("ftp://mail.example.com", None, "a@example.com", timeout).is_err());
        assert!(HttpNotifier::new("https://mail.example.com", None, "nobody", timeout).is_err());
    }

    #[tokio::test]
    async fn test_successful_send_posts_json_with_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "from": "sisyphus@example.com",
                "to": "friend@example.com",
                "subject": "hello",
                "text": "body text"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = notifier_for(&server).await;
        notifier
            .send_message("friend@example.com", "hello", "body text")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        mount_status(&server, 503).await;

        let err = notifier_for(&server)
            .await
            .send_message("friend@example.com", "s", "b")
            .await
            .unwrap_err();
        assert_eq!(err.kind, DeliveryErrorKind::TransientDeliveryFailure);
        assert!(err.detail.contains("503"));
    }

    #[tokio::test]
    async fn test_rejected_recipient_is_permanent() {
        let server = MockServer::start().await;
        mount_status(&server, 422).await;

        let err = notifier_for(&server)
            .await
            .send_message("friend@example.com", "s", "b")
            .await
            .unwrap_err();
        assert_eq!(err.kind, DeliveryErrorKind::PermanentDeliveryFailure);
    }

    #[tokio::test]
    async fn test_malformed_address_is_never_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = notifier_for(&server)
            .await
            .send_message("not-an-address", "s", "b")
            .await
            .unwrap_err();
        assert_eq!(err.kind, DeliveryErrorKind::PermanentDeliveryFailure);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        let notifier = HttpNotifier::new(
            "http://127.0.0.1:1/v1/messages",
            None,
            "sisyphus@example.com",
            Duration::from_secs(2),
        )
        .unwrap();

        let err = notifier
            .send_message("friend@example.com", "s", "b")
            .await
            .unwrap_err();
        assert_eq!(err.kind, DeliveryErrorKind::TransientDeliveryFailure);
    }
}
