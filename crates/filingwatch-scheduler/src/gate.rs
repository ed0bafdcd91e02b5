//! Trigger gate: serializes scrape → settle → dispatch runs.
//!
//! Scheduled ticks and manual triggers both enter through
//! [`TriggerGate::request_run`]. While a run is in flight, further requests
//! return [`GateOutcome::Skipped`] immediately instead of queueing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filingwatch_core::error::Result;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::FlagGuard;
use crate::dispatch::DispatchOutcome;
use crate::history::RunHistory;
use crate::runner::RunOutcome;

/// First stage: refresh the store from the outside world.
#[async_trait]
pub trait ScrapeStage: Send + Sync {
    async fn run(&self) -> RunOutcome;
}

/// Second stage: notify about whatever is pending.
#[async_trait]
pub trait DispatchStage: Send + Sync {
    async fn process_pending(&self) -> Result<DispatchOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Idle,
    Running,
}

impl GateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateState::Idle => "idle",
            GateState::Running => "running",
        }
    }
}

/// One full orchestration run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeReport {
    pub started_at: DateTime<Utc>,
    pub scrape: RunOutcome,
    pub dispatch: Option<DispatchOutcome>,
    pub dispatch_error: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    Skipped,
    Completed(CompositeReport),
}

pub struct TriggerGate {
    scrape: Arc<dyn ScrapeStage>,
    dispatch: Arc<dyn DispatchStage>,
    settle_delay: Duration,
    running: AtomicBool,
    history: Mutex<RunHistory>,
}

impl TriggerGate {
    pub fn new(scrape: Arc<dyn ScrapeStage>, dispatch: Arc<dyn DispatchStage>) -> Self {
        Self {
            scrape,
            dispatch,
            settle_delay: Duration::from_millis(2000),
            running: AtomicBool::new(false),
            history: Mutex::new(RunHistory::new()),
        }
    }

    /// Pause between scrape and dispatch so the scraper's last writes land.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn state(&self) -> GateState {
        if self.running.load(Ordering::SeqCst) {
            GateState::Running
        } else {
            GateState::Idle
        }
    }

    /// Most recent reports first.
    pub async fn history(&self, limit: usize) -> Vec<CompositeReport> {
        self.history.lock().await.recent(limit)
    }

    pub async fn request_run(&self) -> GateOutcome {
        let Some(_guard) = FlagGuard::acquire(&self.running) else {
            tracing::info!("⏭️ Job already running, skipping this trigger");
            return GateOutcome::Skipped;
        };

        let started_at = Utc::now();
        let started = Instant::now();
        tracing::info!("🚀 Job started");

        let scrape = self.scrape.run().await;
        if !scrape.is_success() {
            tracing::warn!("⚠️ Scrape stage did not succeed ({scrape:?}), dispatching anyway");
        }

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let (dispatch, dispatch_error) = match self.dispatch.process_pending().await {
            Ok(outcome) => (Some(outcome), None),
            Err(e) => {
                tracing::error!("❌ Dispatch stage failed: {e}");
                (None, Some(e.to_string()))
            }
        };

        let report = CompositeReport {
            started_at,
            scrape,
            dispatch,
            dispatch_error,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!("🏁 Job finished in {}ms", report.duration_ms);
        self.history.lock().await.record(report.clone());
        GateOutcome::Completed(report)
    }
}
