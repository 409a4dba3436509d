use chrono::NaiveDate;
use dashmap::DashMap;
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};
use tokio::sync::Mutex;

use crate::{
    errors::{AppError, Result},
    services::clock::Clock,
    storage::Store,
};

pub const DEFAULT_DAILY_LIMIT: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed { count: u32 },
    Denied,
}

/// Per-identity critical section plus the number of admitted turns that have
/// not been committed to storage yet.
#[derive(Default)]
struct Slot {
    gate: Mutex<()>,
    in_flight: AtomicU32,
}

/// Free-tier daily message counter.
///
/// Callers for the same identity serialize on that identity's slot; different
/// identities never share a lock here. Admission counts both stored turns and
/// outstanding reservations, so concurrent callers can never push the stored
/// count past the limit.
#[derive(Clone)]
pub struct QuotaTracker {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    limit: u32,
    slots: Arc<DashMap<String, Arc<Slot>>>,
}

impl QuotaTracker {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, limit: u32) -> Self {
        Self {
            store,
            clock,
            limit,
            slots: Arc::new(DashMap::new()),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    fn slot(&self, identity: &str) -> Arc<Slot> {
        self.slots.entry(identity.to_string()).or_default().clone()
    }

    /// Turns consumed today.
    pub async fn count(&self, identity: &str) -> Result<u32> {
        self.store.daily_count(identity, self.clock.today()).await
    }

    pub async fn remaining(&self, identity: &str) -> Result<u32> {
        Ok(self.limit.saturating_sub(self.count(identity).await?))
    }

    /// Holds one unit of today's allowance. Nothing is written until
    /// [`QuotaReservation::commit`]; dropping the reservation returns the unit.
    pub async fn reserve(&self, identity: &str) -> Result<QuotaReservation> {
        let slot = self.slot(identity);
        let day = self.clock.today();

        let _guard = slot.gate.lock().await;
        let stored = self.store.daily_count(identity, day).await?;
        let in_flight = slot.in_flight.load(Ordering::SeqCst);

        if stored.saturating_add(in_flight) >= self.limit {
            tracing::debug!(identity, stored, in_flight, "Daily quota exhausted");
            return Err(AppError::LimitReached(self.limit));
        }

        slot.in_flight.fetch_add(1, Ordering::SeqCst);

        Ok(QuotaReservation {
            store: Arc::clone(&self.store),
            slot: Arc::clone(&slot),
            identity: identity.to_string(),
            day,
            limit: self.limit,
            settled: false,
        })
    }

    /// Reads today's count and, if below the limit, increments it.
    pub async fn try_consume(&self, identity: &str) -> Result<QuotaDecision> {
        match self.reserve(identity).await {
            Ok(reservation) => Ok(QuotaDecision::Allowed {
                count: reservation.commit().await?,
            }),
            Err(AppError::LimitReached(_)) => Ok(QuotaDecision::Denied),
            Err(e) => Err(e),
        }
    }
}

pub struct QuotaReservation {
    store: Arc<dyn Store>,
    slot: Arc<Slot>,
    identity: String,
    day: NaiveDate,
    limit: u32,
    settled: bool,
}

impl QuotaReservation {
    /// Writes the reserved unit to storage and returns the new count.
    pub async fn commit(mut self) -> Result<u32> {
        let slot = Arc::clone(&self.slot);
        let _guard = slot.gate.lock().await;

        let result = self
            .store
            .increment_daily(&self.identity, self.day, self.limit)
            .await;
        self.release();

        match result? {
            Some(count) => Ok(count),
            None => Err(AppError::LimitReached(self.limit)),
        }
    }

    fn release(&mut self) {
        if !self.settled {
            self.settled = true;
            self.slot.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for QuotaReservation {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::FixedClock;
    use crate::storage::MemoryStore;
    use chrono::{TimeZone, Utc};

    fn tracker(limit: u32) -> (QuotaTracker, Arc<MemoryStore>, Arc<FixedClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap(),
        ));
        let tracker = QuotaTracker::new(store.clone(), clock.clone(), limit);
        (tracker, store, clock)
    }

    #[tokio::test]
    async fn test_exactly_limit_allowed_sequentially() {
        let (tracker, _, _) = tracker(DEFAULT_DAILY_LIMIT);

        for i in 1..=DEFAULT_DAILY_LIMIT {
            assert_eq!(
                tracker.try_consume("a@x.com").await.unwrap(),
                QuotaDecision::Allowed { count: i }
            );
        }
        for _ in 0..5 {
            assert_eq!(tracker.try_consume("a@x.com").await.unwrap(), QuotaDecision::Denied);
        }

        assert_eq!(tracker.count("a@x.com").await.unwrap(), DEFAULT_DAILY_LIMIT);
        assert_eq!(tracker.remaining("a@x.com").await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_no_over_admission_under_concurrency() {
        let (tracker, _, _) = tracker(DEFAULT_DAILY_LIMIT);

        let handles: Vec<_> = (0..260)
            .map(|_| {
                let tracker = tracker.clone();
                tokio::spawn(async move { tracker.try_consume("a@x.com").await.unwrap() })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if let QuotaDecision::Allowed { .. } = handle.await.unwrap() {
                allowed += 1;
            }
        }

        assert_eq!(allowed, DEFAULT_DAILY_LIMIT);
        assert_eq!(tracker.count("a@x.com").await.unwrap(), DEFAULT_DAILY_LIMIT);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_held_reservations_never_over_admit() {
        let (tracker, _, _) = tracker(DEFAULT_DAILY_LIMIT);

        // Each task holds its reservation across an await, the way a chat
        // turn does while waiting on the provider; every fifth one fails.
        let handles: Vec<_> = (0..400)
            .map(|i| {
                let tracker = tracker.clone();
                tokio::spawn(async move {
                    let reservation = match tracker.reserve("a@x.com").await {
                        Ok(reservation) => reservation,
                        Err(AppError::LimitReached(_)) => return false,
                        Err(e) => panic!("unexpected error: {}", e),
                    };
                    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
                    if i % 5 == 0 {
                        drop(reservation);
                        return false;
                    }
                    reservation.commit().await.unwrap();
                    true
                })
            })
            .collect();

        let mut committed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                committed += 1;
            }
        }

        let stored = tracker.count("a@x.com").await.unwrap();
        assert!(committed > 0);
        assert!(stored <= DEFAULT_DAILY_LIMIT);
        assert_eq!(stored, committed);

        // Nothing is left in flight once every task has finished.
        let remaining = DEFAULT_DAILY_LIMIT - stored;
        for _ in 0..remaining {
            tracker.reserve("a@x.com").await.unwrap().commit().await.unwrap();
        }
        assert!(matches!(
            tracker.reserve("a@x.com").await,
            Err(AppError::LimitReached(_))
        ));
    }

    #[tokio::test]
    async fn test_dropped_reservation_is_returned() {
        let (tracker, _, _) = tracker(1);

        let reservation = tracker.reserve("a@x.com").await.unwrap();
        assert!(matches!(
            tracker.reserve("a@x.com").await,
            Err(AppError::LimitReached(1))
        ));

        drop(reservation);
        assert_eq!(tracker.count("a@x.com").await.unwrap(), 0);
        assert!(tracker.reserve("a@x.com").await.is_ok());
    }

    #[tokio::test]
    async fn test_identities_are_independent() {
        let (tracker, _, _) = tracker(1);

        assert_eq!(
            tracker.try_consume("a@x.com").await.unwrap(),
            QuotaDecision::Allowed { count: 1 }
        );
        assert_eq!(
            tracker.try_consume("b@x.com").await.unwrap(),
            QuotaDecision::Allowed { count: 1 }
        );
        assert_eq!(tracker.try_consume("a@x.com").await.unwrap(), QuotaDecision::Denied);
    }

    #[tokio::test]
    async fn test_new_utc_day_resets_allowance() {
        let (tracker, store, clock) = tracker(2);

        tracker.try_consume("a@x.com").await.unwrap();
        tracker.try_consume("a@x.com").await.unwrap();
        assert_eq!(tracker.try_consume("a@x.com").await.unwrap(), QuotaDecision::Denied);

        clock.advance(chrono::Duration::hours(12));
        assert_eq!(
            tracker.try_consume("a@x.com").await.unwrap(),
            QuotaDecision::Allowed { count: 1 }
        );

        // Yesterday's entry is left as it was.
        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.daily_counts.len(), 2);
        assert_eq!(snapshot.daily_counts[0].count, 2);
    }

    #[tokio::test]
    async fn test_denied_does_not_create_entry() {
        let (tracker, store, _) = tracker(0);

        assert_eq!(tracker.try_consume("a@x.com").await.unwrap(), QuotaDecision::Denied);
        assert!(store.snapshot().await.daily_counts.is_empty());
    }
}
