//! Notification dispatcher: claim, render, send, throttle.
//!
//! Delivery is at-most-once: a filing is claimed in the store *before* it is
//! sent, and a failed send is never reverted or retried. Across processes
//! sharing one database, the conditional claim guarantees that exactly one
//! dispatcher sends each filing.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use filingwatch_core::error::Result;
use filingwatch_core::types::{Filing, OutgoingMail};
use filingwatch_core::{FilingStore, Transport};
use serde::Serialize;

use crate::FlagGuard;
use crate::gate::DispatchStage;
use crate::render::Renderer;

/// What happened to one pending filing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent { delivery_id: String },
    Failed { reason: String },
    /// Another dispatcher claimed it first.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryOutcome {
    pub filing_id: String,
    #[serde(flatten)]
    pub status: DeliveryStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchSummary {
    /// Claims this dispatcher won.
    pub claimed: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DispatchSummary {
    fn record(&mut self, filing_id: &str, status: DeliveryStatus) {
        match status {
            DeliveryStatus::Sent { .. } => self.sent += 1,
            DeliveryStatus::Failed { .. } => self.failed += 1,
            DeliveryStatus::Skipped => self.skipped += 1,
        }
        self.outcomes.push(DeliveryOutcome {
            filing_id: filing_id.to_string(),
            status,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// A previous batch in this process is still running.
    Busy,
    NotConfigured { reason: String },
    Completed(DispatchSummary),
}

/// Sends every pending filing once, to all configured recipients.
pub struct NotificationDispatcher {
    store: Arc<dyn FilingStore>,
    transport: Option<Arc<dyn Transport>>,
    recipients: Vec<String>,
    message_delay: Duration,
    renderer: Renderer,
    busy: AtomicBool,
}

impl NotificationDispatcher {
    pub fn new(
        store: Arc<dyn FilingStore>,
        transport: Option<Arc<dyn Transport>>,
        recipients: Vec<String>,
        renderer: Renderer,
    ) -> Self {
        Self {
            store,
            transport,
            recipients,
            message_delay: Duration::from_millis(1000),
            renderer,
            busy: AtomicBool::new(false),
        }
    }

    /// Pause between consecutive sends.
    pub fn with_message_delay(mut self, delay: Duration) -> Self {
        self.message_delay = delay;
        self
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(std::sync::atomic::Ordering::SeqCst)
    }

    pub async fn process_pending(&self) -> Result<DispatchOutcome> {
        let Some(_guard) = FlagGuard::acquire(&self.busy) else {
            tracing::info!("⏭️ Dispatch already in progress, skipping");
            return Ok(DispatchOutcome::Busy);
        };

        let transport = match (&self.transport, self.recipients.is_empty()) {
            (_, true) => return Ok(not_configured("no recipients configured (EMAIL_TO)")),
            (None, _) => return Ok(not_configured("no email transport configured")),
            (Some(t), false) => t,
        };

        let pending = self.store.query_pending().await?;
        if pending.is_empty() {
            tracing::info!("📭 No pending filings");
            return Ok(DispatchOutcome::Completed(DispatchSummary::default()));
        }
        tracing::info!("📬 {} pending filing(s) to dispatch", pending.len());

        let mut summary = DispatchSummary::default();
        let mut sent_before = false;
        for filing in &pending {
            // Throttle before claiming; a won claim is sent immediately.
            if sent_before && !self.message_delay.is_zero() {
                tokio::time::sleep(self.message_delay).await;
            }

            match self.store.mark_dispatched(&filing.id).await {
                Ok(0) => {
                    tracing::info!("⏭️ [{}] already claimed elsewhere", filing.short_id());
                    summary.record(&filing.id, DeliveryStatus::Skipped);
                    continue;
                }
                Ok(_) => summary.claimed += 1,
                Err(e) => {
                    tracing::error!("❌ [{}] claim failed: {e}", filing.short_id());
                    summary.record(&filing.id, DeliveryStatus::Failed { reason: e.to_string() });
                    continue;
                }
            }

            sent_before = true;
            let status = self.deliver(transport.as_ref(), filing).await;
            summary.record(&filing.id, status);
        }

        tracing::info!(
            "📊 Dispatch done: {} sent, {} failed, {} skipped",
            summary.sent,
            summary.failed,
            summary.skipped
        );
        Ok(DispatchOutcome::Completed(summary))
    }

    async fn deliver(&self, transport: &dyn Transport, filing: &Filing) -> DeliveryStatus {
        let rendered = self.renderer.render(filing, Utc::now());
        let mail = OutgoingMail {
            recipients: self.recipients.clone(),
            subject: rendered.subject,
            html_body: rendered.html_body,
        };

        match transport.send(&mail).await {
            Ok(id) => {
                tracing::info!(
                    "✉️ [{}] {} sent via {} ({id})",
                    filing.short_id(),
                    filing.company_name,
                    transport.name()
                );
                DeliveryStatus::Sent { delivery_id: id.0 }
            }
            Err(e) => {
                tracing::error!(
                    "❌ [{}] send failed ({}): {} (hint: {})",
                    filing.short_id(),
                    e.kind,
                    e.message,
                    e.hint()
                );
                DeliveryStatus::Failed { reason: e.to_string() }
            }
        }
    }
}

#[async_trait]
impl DispatchStage for NotificationDispatcher {
    async fn process_pending(&self) -> Result<DispatchOutcome> {
        NotificationDispatcher::process_pending(self).await
    }
}

fn not_configured(reason: &str) -> DispatchOutcome {
    tracing::warn!("⚠️ Dispatch not configured: {reason}");
    DispatchOutcome::NotConfigured {
        reason: reason.to_string(),
    }
}
