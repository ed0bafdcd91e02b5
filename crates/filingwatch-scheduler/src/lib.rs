//! # FilingWatch Scheduler
//!
//! Job orchestration and the at-most-once notification pipeline.
//!
//! ## Architecture
//! ```text
//! Scheduler (tokio interval, first tick at startup)
//!   └── TriggerGate::request_run   ← also POST /api/admin/trigger
//!         ├── ScraperRunner        external process, own overlap guard
//!         ├── settle delay         (2s)
//!         └── NotificationDispatcher
//!               ├── query_pending  newest first
//!               ├── claim          UPDATE ... WHERE dispatched = 0
//!               ├── render         subject + HTML, no network
//!               ├── send           SMTP relay | Brevo API
//!               └── throttle       (1s between sends)
//! ```
//!
//! Every busy flag is an `AtomicBool` owned by its component and released by
//! a drop guard, so errors and panics always return it to idle.

pub mod dispatch;
pub mod engine;
pub mod gate;
pub mod history;
pub mod render;
pub mod runner;

use std::sync::atomic::{AtomicBool, Ordering};

pub use dispatch::{DeliveryOutcome, DeliveryStatus, DispatchOutcome, DispatchSummary, NotificationDispatcher};
pub use engine::{SchedulerHandle, spawn_scheduler};
pub use gate::{CompositeReport, DispatchStage, GateOutcome, GateState, ScrapeStage, TriggerGate};
pub use history::RunHistory;
pub use render::{RenderedMail, Renderer};
pub use runner::{RunOutcome, ScraperRunner};

/// Holds a busy flag set; clears it on drop.
pub(crate) struct FlagGuard<'a>(&'a AtomicBool);

impl<'a> FlagGuard<'a> {
    /// `None` when the flag was already set.
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_guard_is_exclusive() {
        let flag = AtomicBool::new(false);
        let guard = FlagGuard::acquire(&flag);
        assert!(guard.is_some());
        assert!(FlagGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(!flag.load(Ordering::SeqCst));
        assert!(FlagGuard::acquire(&flag).is_some());
    }
}
