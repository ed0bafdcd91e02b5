//! # FilingWatch Channels
//! Delivery transports behind [`filingwatch_core::Transport`].
//!
//! - [`smtp::SmtpTransport`]: authenticated relay (Gmail, Outlook, any
//!   STARTTLS/TLS server) via async lettre.
//! - [`brevo::BrevoTransport`]: Brevo transactional email HTTP API.
//!
//! Each adapter maps its provider's error surface onto
//! [`filingwatch_core::TransportErrorKind`].

pub mod brevo;
pub mod smtp;

use filingwatch_core::config::{TransportConfig, TransportProvider};
use filingwatch_core::{Transport, TransportError};
use std::sync::Arc;

pub use brevo::BrevoTransport;
pub use smtp::SmtpTransport;

/// Build the transport selected by `config.provider`.
pub fn build_transport(config: &TransportConfig) -> Result<Arc<dyn Transport>, TransportError> {
    let transport: Arc<dyn Transport> = match config.provider {
        TransportProvider::Smtp => Arc::new(SmtpTransport::from_config(config)?),
        TransportProvider::Brevo => Arc::new(BrevoTransport::from_config(config)?),
    };
    tracing::info!("📮 Transport ready: {}", transport.name());
    Ok(transport)
}
