//! Brevo (ex-Sendinblue) transactional email API.
//!
//! `POST {base}/v3/smtp/email` with an `api-key` header; a 2xx response carries
//! the provider `messageId`.

use async_trait::async_trait;
use filingwatch_core::config::TransportConfig;
use filingwatch_core::types::{DeliveryId, OutgoingMail};
use filingwatch_core::{Transport, TransportError, TransportErrorKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    sender: &'a Contact,
    to: Vec<Contact>,
    subject: &'a str,
    html_content: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    message_id: Option<String>,
}

/// Brevo HTTP API transport.
pub struct BrevoTransport {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    sender: Contact,
}

impl BrevoTransport {
    pub fn from_config(config: &TransportConfig) -> Result<Self, TransportError> {
        let sender = config
            .sender_address()
            .ok_or_else(|| TransportError::invalid_sender("no sender address configured (EMAIL_FROM)"))?;
        if config.api_key.is_empty() {
            return Err(TransportError::authentication("Brevo API key missing"));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| TransportError::unknown(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/v3/smtp/email", config.api_base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            sender: Contact {
                name: Some(config.sender_name.clone()).filter(|n| !n.is_empty()),
                email: sender.to_string(),
            },
        })
    }
}

#[async_trait]
impl Transport for BrevoTransport {
    fn name(&self) -> &str {
        "brevo"
    }

    async fn send(&self, mail: &OutgoingMail) -> Result<DeliveryId, TransportError> {
        let request = SendRequest {
            sender: &self.sender,
            to: mail
                .recipients
                .iter()
                .map(|email| Contact {
                    name: None,
                    email: email.clone(),
                })
                .collect(),
            subject: &mail.subject,
            html_content: &mail.html_body,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .header("accept", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::new(
                classify_brevo_status(status.as_u16(), &body),
                format!("Brevo API error {status}: {body}"),
            ));
        }

        let message_id = match resp.json::<SendResponse>().await {
            Ok(body) => body.message_id,
            Err(e) => {
                tracing::warn!("⚠️ Brevo accepted the message but its response was unreadable: {e}");
                None
            }
        };
        let id = message_id.unwrap_or_else(|| format!("brevo-{}", uuid::Uuid::new_v4()));
        tracing::info!("📤 Email accepted by Brevo for {} recipient(s): {id}", mail.recipients.len());
        Ok(DeliveryId(id))
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    let kind = if err.is_timeout() || err.is_connect() || err.is_request() {
        TransportErrorKind::Network
    } else {
        TransportErrorKind::Unknown
    };
    TransportError::new(kind, format!("Brevo request failed: {err}"))
}

/// Map a non-2xx Brevo response to a failure class.
pub fn classify_brevo_status(status: u16, body: &str) -> TransportErrorKind {
    match status {
        401 => TransportErrorKind::Authentication,
        429 => TransportErrorKind::RateLimited,
        400 | 403 if body.to_lowercase().contains("sender") => TransportErrorKind::InvalidSender,
        403 => TransportErrorKind::Authentication,
        502..=504 => TransportErrorKind::Network,
        _ => TransportErrorKind::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use std::sync::{Arc, Mutex};

    fn mail() -> OutgoingMail {
        OutgoingMail {
            recipients: vec!["a@x.com".into(), "b@y.com".into()],
            subject: "Filing".into(),
            html_body: "<p>hi</p>".into(),
        }
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        format!("http://{addr}")
    }

    fn transport(base: &str) -> BrevoTransport {
        BrevoTransport::from_config(&TransportConfig {
            provider: filingwatch_core::config::TransportProvider::Brevo,
            api_key: "xkeysib-test".into(),
            api_base_url: base.into(),
            sender: "alerts@example.com".into(),
            timeout_secs: 5,
            ..TransportConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_brevo_status(401, ""), TransportErrorKind::Authentication);
        assert_eq!(classify_brevo_status(429, ""), TransportErrorKind::RateLimited);
        assert_eq!(
            classify_brevo_status(400, r#"{"code":"invalid_parameter","message":"sender is invalid"}"#),
            TransportErrorKind::InvalidSender
        );
        assert_eq!(classify_brevo_status(400, "{}"), TransportErrorKind::Unknown);
        assert_eq!(classify_brevo_status(503, ""), TransportErrorKind::Network);
    }

    #[tokio::test]
    async fn test_send_posts_request() {
        let seen: Arc<Mutex<Option<(String, serde_json::Value)>>> = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&seen);
        let router = Router::new().route(
            "/v3/smtp/email",
            post(move |headers: axum::http::HeaderMap, Json(body): Json<serde_json::Value>| {
                let captured = Arc::clone(&captured);
                async move {
                    let key = headers
                        .get("api-key")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    *captured.lock().unwrap() = Some((key, body));
                    (
                        StatusCode::CREATED,
                        Json(serde_json::json!({"messageId": "<202603021015.1@smtp-relay.brevo.com>"})),
                    )
                }
            }),
        );
        let base = serve(router).await;

        let id = transport(&base).send(&mail()).await.unwrap();
        assert_eq!(id.0, "<202603021015.1@smtp-relay.brevo.com>");

        let (key, body) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(key, "xkeysib-test");
        assert_eq!(body["sender"]["email"], "alerts@example.com");
        assert_eq!(body["to"][1]["email"], "b@y.com");
        assert_eq!(body["htmlContent"], "<p>hi</p>");
    }

    #[tokio::test]
    async fn test_unreadable_success_body_still_delivers() {
        let router = Router::new().route(
            "/v3/smtp/email",
            post(|| async { (StatusCode::CREATED, "<html>queued</html>") }),
        );
        let base = serve(router).await;

        let id = transport(&base).send(&mail()).await.unwrap();
        assert!(id.0.starts_with("brevo-"));
    }

    #[tokio::test]
    async fn test_send_maps_unauthorized() {
        let router = Router::new().route(
            "/v3/smtp/email",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({"code": "unauthorized", "message": "Key not found"})),
                )
            }),
        );
        let base = serve(router).await;

        let err = transport(&base).send(&mail()).await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Authentication);
        assert!(err.message.contains("401"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = transport(&format!("http://{addr}"))
            .send(&mail())
            .await
            .unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Network);
    }
}
