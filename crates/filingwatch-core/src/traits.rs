//! Seams between the dispatch pipeline and its external collaborators.

use async_trait::async_trait;

use crate::error::{Result, TransportError};
use crate::types::{DeliveryId, Filing, FilingQuery, OutgoingMail};

/// Relational store holding filings written by the scraper.
///
/// Implementations must make [`FilingStore::mark_dispatched`] a single atomic
/// conditional update: other process instances may race the same rows.
#[async_trait]
pub trait FilingStore: Send + Sync {
    /// All filings with `dispatched = false`, newest `filed_at` first.
    async fn query_pending(&self) -> Result<Vec<Filing>>;

    /// Set `dispatched = true` only if it is currently false.
    /// Returns the number of rows affected (0 or 1).
    async fn mark_dispatched(&self, id: &str) -> Result<u64>;

    /// Paged, filtered listing, newest first.
    async fn query(&self, query: &FilingQuery) -> Result<Vec<Filing>>;

    /// Insert a new filing; an existing id is left untouched.
    /// Returns whether a row was written.
    async fn insert(&self, filing: &Filing) -> Result<bool>;

    /// Reachability probe for health reporting.
    async fn ping(&self) -> Result<()>;
}

/// A delivery provider (SMTP relay, transactional HTTP API, ...).
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, mail: &OutgoingMail) -> std::result::Result<DeliveryId, TransportError>;
}
