use crate::domain::snapshot::{RiskSnapshot, ScoreBreakdown};
use crate::engine::RiskEngine;
use crate::source::SignalSource;
use crate::storage::SnapshotStore;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Computes scores and persists them, one snapshot per `(entity_id, score_date)`.
///
/// A snapshot is written only after its scores are fully computed, so a failed computation never
/// leaves a partial row behind. Re-running a key replaces the stored row.
pub struct SnapshotManager<S: ?Sized, T: ?Sized> {
    engine: RiskEngine<S>,
    store: Arc<T>,
}

impl<S: ?Sized, T: ?Sized> Clone for SnapshotManager<S, T> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            store: Arc::clone(&self.store),
        }
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub written: Vec<RiskSnapshot>,
    pub failed: Vec<(i64, anyhow::Error)>,
}

impl<S, T> SnapshotManager<S, T>
where
    S: SignalSource + ?Sized + 'static,
    T: SnapshotStore + ?Sized + 'static,
{
    pub fn new(engine: RiskEngine<S>, store: Arc<T>) -> Self {
        Self { engine, store }
    }

    pub fn engine(&self) -> &RiskEngine<S> {
        &self.engine
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    pub async fn compute_composite(
        &self,
        entity_id: i64,
        as_of: NaiveDate,
        lookback_days: u32,
    ) -> anyhow::Result<ScoreBreakdown> {
        self.engine
            .compute_composite(entity_id, as_of, lookback_days)
            .await
    }

    /// Score `entity_id` as of `as_of` with the configured lookback and write-or-replace its
    /// snapshot for that date.
    pub async fn upsert_snapshot(
        &self,
        entity_id: i64,
        as_of: NaiveDate,
    ) -> anyhow::Result<RiskSnapshot> {
        let lookback_days = self.engine.config().lookback_days;
        let scores = self
            .engine
            .compute_composite(entity_id, as_of, lookback_days)
            .await?;

        let snapshot = RiskSnapshot {
            entity_id,
            score_date: as_of,
            scores,
        };
        self.store.upsert(&snapshot).await?;

        tracing::info!(
            entity_id,
            score_date = %as_of,
            composite = scores.composite_score,
            "upserted risk snapshot"
        );
        Ok(snapshot)
    }

    /// Upsert every tracked entity for one date, `concurrency` entities at a time.
    ///
    /// A failure for one entity, including a panic in its task, is collected in the summary and
    /// does not stop the others.
    pub async fn upsert_all(&self, as_of: NaiveDate) -> anyhow::Result<RunSummary> {
        let entities = self.engine.source().list_entities().await?;
        let permits = Arc::new(Semaphore::new(self.engine.config().concurrency));

        let mut tasks = JoinSet::new();
        let mut task_entities = HashMap::new();
        for entity in entities {
            let manager = self.clone();
            let permits = Arc::clone(&permits);
            let handle = tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                manager.upsert_snapshot(entity.id, as_of).await
            });
            task_entities.insert(handle.id(), entity.id);
        }

        let mut summary = RunSummary::default();
        while let Some(joined) = tasks.join_next_with_id().await {
            let (task_id, res) = match joined {
                Ok((id, res)) => (id, res),
                Err(err) => (err.id(), Err(anyhow::anyhow!("scoring task failed: {err}"))),
            };
            let Some(entity_id) = task_entities.remove(&task_id) else {
                continue;
            };
            match res {
                Ok(snapshot) => summary.written.push(snapshot),
                Err(err) => {
                    tracing::warn!(entity_id, score_date = %as_of, error = %err, "entity scoring failed");
                    summary.failed.push((entity_id, err));
                }
            }
        }

        summary.written.sort_by_key(|s| s.entity_id);
        summary.failed.sort_by_key(|(id, _)| *id);
        Ok(summary)
    }

    /// Composite change against the snapshot stored for the previous day, if any.
    pub async fn day_over_day_change(&self, snapshot: &RiskSnapshot) -> anyhow::Result<Option<f64>> {
        let Some(prev_date) = snapshot.score_date.pred_opt() else {
            return Ok(None);
        };
        let prev = self.store.get(snapshot.entity_id, prev_date).await?;
        Ok(prev.map(|p| {
            crate::scoring::composite::round1(
                snapshot.scores.composite_score - p.scores.composite_score,
            )
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signals::SentimentCategory;
    use crate::scoring::ScoringConfig;
    use crate::source::memory::InMemorySignalSource;
    use crate::storage::memory::InMemorySnapshotStore;
    use chrono::{Duration, TimeZone, Utc};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn banks() -> InMemorySignalSource {
        InMemorySignalSource::default()
            .with_entity(1, "Bank One", "ONE")
            .with_entity(2, "Bank Two", "TWO")
            .with_entity(3, "Bank Three", "THR")
            .with_sentiment(
                2,
                SentimentCategory::News,
                Utc.with_ymd_and_hms(2026, 3, 20, 9, 0, 0).unwrap(),
                -0.6,
            )
            .with_complaint(3, d(2026, 3, 12), Some(-0.2))
            .with_market_point(1, d(2026, 3, 3), 50.0, Some(1.1))
            .with_market_point(1, d(2026, 3, 30), 47.0, Some(1.4))
    }

    fn manager(
        src: InMemorySignalSource,
        store: Arc<InMemorySnapshotStore>,
    ) -> SnapshotManager<InMemorySignalSource, InMemorySnapshotStore> {
        let engine = RiskEngine::new(Arc::new(src), ScoringConfig::default()).unwrap();
        SnapshotManager::new(engine, store)
    }

    #[tokio::test]
    async fn upsert_twice_is_idempotent() {
        let store = Arc::new(InMemorySnapshotStore::default());
        let m = manager(banks(), Arc::clone(&store));
        let as_of = d(2026, 3, 31);

        let first = m.upsert_snapshot(1, as_of).await.unwrap();
        let stored_first = store.get(1, as_of).await.unwrap().unwrap();
        let second = m.upsert_snapshot(1, as_of).await.unwrap();
        let stored_second = store.get(1, as_of).await.unwrap().unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(first, second);
        assert_eq!(stored_first, stored_second);
        assert_eq!(
            stored_first.scores.composite_score.to_bits(),
            stored_second.scores.composite_score.to_bits()
        );
    }

    #[tokio::test]
    async fn recompute_with_new_data_replaces_in_place() {
        let store = Arc::new(InMemorySnapshotStore::default());
        let as_of = d(2026, 3, 31);

        let before = manager(banks(), Arc::clone(&store))
            .upsert_snapshot(1, as_of)
            .await
            .unwrap();

        let updated = banks().with_sentiment(
            1,
            SentimentCategory::News,
            Utc.with_ymd_and_hms(2026, 3, 31, 8, 0, 0).unwrap(),
            -1.0,
        );
        let after = manager(updated, Arc::clone(&store))
            .upsert_snapshot(1, as_of)
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        assert!(after.scores.composite_score > before.scores.composite_score);
        assert_eq!(store.get(1, as_of).await.unwrap(), Some(after));
    }

    #[tokio::test]
    async fn backfill_leaves_other_dates_untouched() {
        let store = Arc::new(InMemorySnapshotStore::default());
        let m = manager(banks(), Arc::clone(&store));

        let today = m.upsert_snapshot(1, d(2026, 3, 31)).await.unwrap();
        let past = m.upsert_snapshot(1, d(2026, 3, 10)).await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(1, d(2026, 3, 31)).await.unwrap(), Some(today));
        // Only the March 3 close is visible from March 10: flat return, 1.1% volatility.
        let expected_market = crate::scoring::normalize::market_risk(
            Some(50.0),
            Some(50.0),
            Some(1.1),
            &crate::scoring::Calibration::default(),
        );
        assert_eq!(
            past.scores.market_score,
            crate::scoring::composite::round1(expected_market)
        );
        assert_ne!(past.scores.market_score, today.scores.market_score);

        let history = store
            .history(1, d(2026, 3, 1), d(2026, 3, 31))
            .await
            .unwrap();
        let dates: Vec<_> = history.iter().map(|s| s.score_date).collect();
        assert_eq!(dates, vec![d(2026, 3, 10), d(2026, 3, 31)]);
    }

    #[tokio::test]
    async fn upsert_all_scores_every_entity() {
        let store = Arc::new(InMemorySnapshotStore::default());
        let m = manager(banks(), Arc::clone(&store));

        let summary = m.upsert_all(d(2026, 3, 31)).await.unwrap();
        let ids: Vec<_> = summary.written.iter().map(|s| s.entity_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(summary.failed.is_empty());
        assert_eq!(store.len(), 3);

        // Same result as scoring one at a time.
        let single = m.upsert_snapshot(2, d(2026, 3, 31)).await.unwrap();
        assert_eq!(summary.written[1], single);
    }

    #[tokio::test]
    async fn failed_computation_writes_nothing() {
        let store = Arc::new(InMemorySnapshotStore::default());
        let m = manager(banks().unavailable(), Arc::clone(&store));

        assert!(m.upsert_snapshot(1, d(2026, 3, 31)).await.is_err());
        assert!(m.upsert_all(d(2026, 3, 31)).await.is_err());
        assert!(store.is_empty());
    }

    /// Delegates to the in-memory source but panics on one entity's market read.
    struct PanicsOnMarket {
        inner: InMemorySignalSource,
        entity_id: i64,
    }

    #[async_trait::async_trait]
    impl SignalSource for PanicsOnMarket {
        fn source_name(&self) -> &'static str {
            "panics_on_market"
        }

        async fn list_entities(&self) -> anyhow::Result<Vec<crate::domain::signals::Entity>> {
            self.inner.list_entities().await
        }

        async fn mean_sentiment(
            &self,
            entity_id: i64,
            category: SentimentCategory,
            window: crate::domain::signals::Window,
        ) -> anyhow::Result<Option<f64>> {
            self.inner.mean_sentiment(entity_id, category, window).await
        }

        async fn complaint_summary(
            &self,
            entity_id: i64,
            window: crate::domain::signals::Window,
        ) -> anyhow::Result<crate::domain::signals::ComplaintSummary> {
            self.inner.complaint_summary(entity_id, window).await
        }

        async fn market_series(
            &self,
            entity_id: i64,
            window: crate::domain::signals::Window,
        ) -> anyhow::Result<Vec<crate::domain::signals::MarketPoint>> {
            if entity_id == self.entity_id {
                panic!("market feed exploded for entity {entity_id}");
            }
            self.inner.market_series(entity_id, window).await
        }

        async fn enforcement_events(
            &self,
            entity_id: i64,
            window: crate::domain::signals::Window,
        ) -> anyhow::Result<Vec<crate::domain::signals::EnforcementEvent>> {
            self.inner.enforcement_events(entity_id, window).await
        }
    }

    #[tokio::test]
    async fn panicked_entity_is_a_failure_not_a_lost_run() {
        let store = Arc::new(InMemorySnapshotStore::default());
        let src = PanicsOnMarket {
            inner: banks(),
            entity_id: 2,
        };
        let engine = RiskEngine::new(Arc::new(src), ScoringConfig::default()).unwrap();
        let m = SnapshotManager::new(engine, Arc::clone(&store));

        let summary = m.upsert_all(d(2026, 3, 31)).await.unwrap();
        let written: Vec<_> = summary.written.iter().map(|s| s.entity_id).collect();
        let failed: Vec<_> = summary.failed.iter().map(|(id, _)| *id).collect();
        assert_eq!(written, vec![1, 3]);
        assert_eq!(failed, vec![2]);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn day_over_day_change_uses_previous_snapshot() {
        let store = Arc::new(InMemorySnapshotStore::default());
        let m = manager(banks(), Arc::clone(&store));
        let as_of = d(2026, 3, 31);

        let first = m.upsert_snapshot(1, as_of).await.unwrap();
        assert_eq!(m.day_over_day_change(&first).await.unwrap(), None);

        let yesterday = m.upsert_snapshot(1, as_of - Duration::days(1)).await.unwrap();
        let delta = m.day_over_day_change(&first).await.unwrap().unwrap();
        assert_eq!(
            delta,
            crate::scoring::composite::round1(
                first.scores.composite_score - yesterday.scores.composite_score
            )
        );
    }
}
