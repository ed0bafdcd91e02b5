//! Scheduler loop: fires the gate on a fixed interval.
//! The first tick fires at startup; a slow run makes later ticks skip.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::gate::{GateOutcome, TriggerGate};

/// Cheap handle for triggering runs outside the schedule.
#[derive(Clone)]
pub struct SchedulerHandle {
    gate: Arc<TriggerGate>,
}

impl SchedulerHandle {
    pub fn new(gate: Arc<TriggerGate>) -> Self {
        Self { gate }
    }

    pub fn gate(&self) -> &Arc<TriggerGate> {
        &self.gate
    }

    /// Start a run in the background and return at once.
    pub fn trigger_now(&self) -> JoinHandle<GateOutcome> {
        tracing::info!("👆 Manual trigger");
        let gate = Arc::clone(&self.gate);
        tokio::spawn(async move { gate.request_run().await })
    }
}

/// Start the interval loop. Each tick runs in its own task so the loop never
/// waits on a run.
pub fn spawn_scheduler(gate: Arc<TriggerGate>, interval: Duration) -> SchedulerHandle {
    let period = interval.max(Duration::from_secs(1));
    tracing::info!("⏰ Scheduler started (every {}s)", period.as_secs());

    let loop_gate = Arc::clone(&gate);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let gate = Arc::clone(&loop_gate);
            tokio::spawn(async move {
                if let GateOutcome::Skipped = gate.request_run().await {
                    tracing::debug!("scheduled tick skipped, previous job still running");
                }
            });
        }
    });

    SchedulerHandle::new(gate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{DispatchOutcome, DispatchSummary};
    use crate::gate::{DispatchStage, ScrapeStage};
    use crate::runner::RunOutcome;
    use async_trait::async_trait;
    use filingwatch_core::error::Result;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingScrape {
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl ScrapeStage for CountingScrape {
        async fn run(&self) -> RunOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            RunOutcome::Completed {
                exit_code: 0,
                duration_ms: self.delay.as_millis() as u64,
            }
        }
    }

    struct NoopDispatch;

    #[async_trait]
    impl DispatchStage for NoopDispatch {
        async fn process_pending(&self) -> Result<DispatchOutcome> {
            Ok(DispatchOutcome::Completed(DispatchSummary::default()))
        }
    }

    fn gate(delay: Duration) -> (Arc<TriggerGate>, Arc<CountingScrape>) {
        let scrape = Arc::new(CountingScrape {
            calls: AtomicUsize::new(0),
            delay,
        });
        let gate = TriggerGate::new(scrape.clone(), Arc::new(NoopDispatch))
            .with_settle_delay(Duration::ZERO);
        (Arc::new(gate), scrape)
    }

    #[tokio::test]
    async fn test_first_tick_fires_immediately() {
        let (gate, scrape) = gate(Duration::ZERO);
        let _handle = spawn_scheduler(gate.clone(), Duration::from_secs(3600));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(scrape.calls.load(Ordering::SeqCst), 1);
        assert_eq!(gate.history(10).await.len(), 1);
    }

    #[tokio::test]
    async fn test_trigger_now_runs_outside_schedule() {
        let (gate, scrape) = gate(Duration::ZERO);
        let handle = SchedulerHandle::new(gate);

        let outcome = handle.trigger_now().await.unwrap();
        assert!(matches!(outcome, GateOutcome::Completed(_)));
        assert_eq!(scrape.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_trigger_during_run_is_skipped() {
        let (gate, scrape) = gate(Duration::from_millis(400));
        let handle = spawn_scheduler(gate, Duration::from_secs(3600));

        tokio::time::sleep(Duration::from_millis(100)).await;
        let outcome = handle.trigger_now().await.unwrap();
        assert_eq!(outcome, GateOutcome::Skipped);
        assert_eq!(scrape.calls.load(Ordering::SeqCst), 1);
    }
}
