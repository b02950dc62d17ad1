use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{Datelike, Utc};
use tracing::debug;

use crate::clients::profiles::ProfileStore;
use crate::clients::BackendError;
use crate::models::{ExtractionCounter, PlanTier};
use crate::session::SessionContext;

/// Sentinel for "counter never loaded this session".
const COUNT_UNLOADED: i64 = -1;

#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    #[error("extraction counter store error: {0}")]
    Store(#[from] BackendError),
}

/// True iff one more extraction is permitted under the tier's monthly limit.
/// Advisory only: the authoritative store re-checks nothing, so two
/// concurrent submissions from one user may both pass (accepted race).
pub fn can_submit(current_count: i64, tier: PlanTier) -> bool {
    current_count < tier.monthly_extraction_limit()
}

/// Session-scoped quota accounting. Holds a cached, possibly stale copy of
/// the current month's counter; the external store is the source of truth.
/// Counters reset implicitly via the (month, year) row key.
pub struct QuotaTracker {
    session: Arc<SessionContext>,
    store: Arc<ProfileStore>,
    cached_count: AtomicI64,
}

impl QuotaTracker {
    pub fn new(session: Arc<SessionContext>, store: Arc<ProfileStore>) -> Self {
        Self {
            session,
            store,
            cached_count: AtomicI64::new(COUNT_UNLOADED),
        }
    }

    /// Cached count for the current session; zero when never loaded.
    pub fn cached_count(&self) -> i64 {
        self.cached_count.load(Ordering::SeqCst).max(0)
    }

    /// Whether a new submission is permitted against the locally cached count.
    pub fn can_submit_now(&self) -> bool {
        can_submit(self.cached_count(), self.session.plan())
    }

    /// Re-read the authoritative counter row for the current calendar month.
    pub async fn refresh(&self) -> Result<i64, QuotaError> {
        let now = Utc::now();
        let count = self
            .store
            .get_extraction_count(
                &self.session.access_token(),
                self.session.user_id,
                now.month(),
                now.year(),
            )
            .await?;
        self.cached_count.store(count, Ordering::SeqCst);
        debug!(user_id = %self.session.user_id, count, "extraction counter refreshed");
        Ok(count)
    }

    /// Record one unit of usage: upsert the (user, month, year) row to
    /// cached count + 1. A fresh month has no row yet and lands on 1. Not
    /// idempotent per call; calling twice legitimately increments twice.
    pub async fn record_extraction(&self) -> Result<i64, QuotaError> {
        let new_count = self.cached_count() + 1;
        let counter = ExtractionCounter::current_period(self.session.user_id, new_count);
        self.store
            .upsert_extraction_count(&self.session.access_token(), &counter)
            .await?;
        self.cached_count.store(new_count, Ordering::SeqCst);
        Ok(new_count)
    }
}
