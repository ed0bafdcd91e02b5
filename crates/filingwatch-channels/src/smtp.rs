//! SMTP relay transport: async lettre over STARTTLS, implicit TLS, or plain.

use async_trait::async_trait;
use filingwatch_core::config::{SmtpTls, TransportConfig};
use filingwatch_core::types::{DeliveryId, OutgoingMail};
use filingwatch_core::{Transport, TransportError, TransportErrorKind};
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

/// Authenticated SMTP relay.
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    host: String,
}

impl SmtpTransport {
    pub fn from_config(config: &TransportConfig) -> Result<Self, TransportError> {
        let sender = config
            .sender_address()
            .ok_or_else(|| TransportError::invalid_sender("no sender address configured"))?;
        let address: Address = sender
            .parse()
            .map_err(|e| TransportError::invalid_sender(format!("invalid sender '{sender}': {e}")))?;
        let from = Mailbox::new(Some(config.sender_name.clone()), address);

        let builder = match config.smtp_tls {
            SmtpTls::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                    .map_err(|e| smtp_error("SMTP relay", &e))?
            }
            SmtpTls::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
                .map_err(|e| smtp_error("SMTP relay", &e))?,
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host),
        };

        let mut builder = builder.port(config.smtp_port).timeout(Some(config.timeout()));
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            mailer: builder.build(),
            from,
            host: config.smtp_host.clone(),
        })
    }

    /// Build the MIME message and the id it will be delivered under.
    pub fn build_message(&self, mail: &OutgoingMail) -> Result<(Message, DeliveryId), TransportError> {
        let domain = self.from.email.domain().to_string();
        let message_id = format!("<{}@{}>", uuid::Uuid::new_v4(), domain);

        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(mail.subject.clone())
            .message_id(Some(message_id.clone()))
            .header(ContentType::TEXT_HTML);

        for recipient in &mail.recipients {
            let mailbox: Mailbox = recipient.parse().map_err(|e| {
                TransportError::unknown(format!("invalid recipient '{recipient}': {e}"))
            })?;
            builder = builder.to(mailbox);
        }

        let message = builder
            .body(mail.html_body.clone())
            .map_err(|e| TransportError::unknown(format!("Build email: {e}")))?;
        Ok((message, DeliveryId(message_id)))
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, mail: &OutgoingMail) -> Result<DeliveryId, TransportError> {
        let (message, id) = self.build_message(mail)?;
        self.mailer
            .send(message)
            .await
            .map_err(|e| smtp_error("SMTP send", &e))?;
        tracing::info!("📤 Email sent via {} to {} recipient(s): {id}", self.host, mail.recipients.len());
        Ok(id)
    }
}

fn smtp_error(context: &str, err: &lettre::transport::smtp::Error) -> TransportError {
    TransportError::new(classify_smtp_error(err), format!("{context}: {err}"))
}

fn classify_smtp_error(err: &lettre::transport::smtp::Error) -> TransportErrorKind {
    if let Some(code) = err.status().and_then(|c| c.to_string().parse::<u16>().ok()) {
        return classify_smtp_code(code);
    }
    if err.is_client() {
        return TransportErrorKind::Unknown;
    }
    // No reply code: connection refused, DNS, TLS handshake, timeout.
    TransportErrorKind::Network
}

/// Map an SMTP reply code to a failure class.
pub fn classify_smtp_code(code: u16) -> TransportErrorKind {
    match code {
        454 | 530 | 534 | 535 | 538 => TransportErrorKind::Authentication,
        421 | 450 | 451 | 452 => TransportErrorKind::RateLimited,
        553 | 555 => TransportErrorKind::InvalidSender,
        _ => TransportErrorKind::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TransportConfig {
        TransportConfig {
            smtp_host: "127.0.0.1".into(),
            smtp_port: 2525,
            smtp_tls: SmtpTls::None,
            username: "bot@example.com".into(),
            password: "secret".into(),
            ..TransportConfig::default()
        }
    }

    fn mail(recipients: &[&str]) -> OutgoingMail {
        OutgoingMail {
            recipients: recipients.iter().map(|r| r.to_string()).collect(),
            subject: "BSE Announcement: HDFC Bank - Result".into(),
            html_body: "<p>hello</p>".into(),
        }
    }

    #[test]
    fn test_classify_codes() {
        assert_eq!(classify_smtp_code(535), TransportErrorKind::Authentication);
        assert_eq!(classify_smtp_code(421), TransportErrorKind::RateLimited);
        assert_eq!(classify_smtp_code(553), TransportErrorKind::InvalidSender);
        assert_eq!(classify_smtp_code(550), TransportErrorKind::Unknown);
    }

    #[tokio::test]
    async fn test_build_message_all_recipients() {
        let transport = SmtpTransport::from_config(&config()).unwrap();
        let (message, id) = transport
            .build_message(&mail(&["a@x.com", "b@y.com"]))
            .unwrap();
        assert!(id.0.ends_with("@example.com>"));

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("a@x.com"));
        assert!(raw.contains("b@y.com"));
        assert!(raw.contains("text/html"));
        assert!(raw.contains(&id.0));
    }

    #[tokio::test]
    async fn test_invalid_recipient_rejected() {
        let transport = SmtpTransport::from_config(&config()).unwrap();
        let err = transport.build_message(&mail(&["not an address"])).unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Unknown);
    }

    #[test]
    fn test_invalid_sender_rejected() {
        let mut cfg = config();
        cfg.sender = "no-at-sign".into();
        let err = SmtpTransport::from_config(&cfg).err().unwrap();
        assert_eq!(err.kind, TransportErrorKind::InvalidSender);
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_network_error() {
        let mut cfg = config();
        // Nothing listens on the discard port locally.
        cfg.smtp_port = 9;
        cfg.timeout_secs = 2;
        let transport = SmtpTransport::from_config(&cfg).unwrap();
        let err = transport.send(&mail(&["a@x.com"])).await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Network);
    }
}
