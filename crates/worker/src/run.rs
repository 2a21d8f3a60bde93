use chrono::NaiveDate;
use reprisk_core::domain::snapshot::RiskSnapshot;
use reprisk_core::snapshot::{RunSummary, SnapshotManager};
use reprisk_core::source::SignalSource;
use reprisk_core::storage::SnapshotStore;

pub type Manager = SnapshotManager<dyn SignalSource, dyn SnapshotStore>;

#[derive(Debug, Default)]
pub struct DateOutcome {
    pub scored: usize,
    pub failed: usize,
    pub first_error: Option<String>,
}

/// Score one date: every tracked entity, or just `entity_id`.
///
/// In dry-run mode scores are computed and logged but nothing is written.
pub async fn score_date(
    manager: &Manager,
    as_of: NaiveDate,
    entity_id: Option<i64>,
    dry_run: bool,
) -> anyhow::Result<DateOutcome> {
    if dry_run {
        return preview_date(manager, as_of, entity_id).await;
    }

    let summary = match entity_id {
        Some(id) => {
            let snapshot = manager.upsert_snapshot(id, as_of).await?;
            RunSummary {
                written: vec![snapshot],
                failed: Vec::new(),
            }
        }
        None => manager.upsert_all(as_of).await?,
    };

    for snapshot in &summary.written {
        log_trend(manager, snapshot).await;
    }

    Ok(DateOutcome {
        scored: summary.written.len(),
        failed: summary.failed.len(),
        first_error: summary.failed.first().map(|(id, e)| format!("entity_id={id}: {e:#}")),
    })
}

async fn preview_date(
    manager: &Manager,
    as_of: NaiveDate,
    entity_id: Option<i64>,
) -> anyhow::Result<DateOutcome> {
    let lookback_days = manager.engine().config().lookback_days;
    let entities = manager.engine().source().list_entities().await?;

    let mut outcome = DateOutcome::default();
    for entity in entities
        .iter()
        .filter(|e| entity_id.map_or(true, |id| id == e.id))
    {
        match manager.compute_composite(entity.id, as_of, lookback_days).await {
            Ok(scores) => {
                outcome.scored += 1;
                tracing::info!(
                    entity_id = entity.id,
                    ticker = %entity.ticker,
                    %as_of,
                    dry_run = true,
                    scores = %serde_json::to_string(&scores).unwrap_or_default(),
                    "computed composite (dry-run)"
                );
            }
            Err(err) => {
                outcome.failed += 1;
                if outcome.first_error.is_none() {
                    outcome.first_error = Some(format!("entity_id={}: {err:#}", entity.id));
                }
                tracing::warn!(entity_id = entity.id, %as_of, error = %err, "dry-run scoring failed");
            }
        }
    }
    Ok(outcome)
}

async fn log_trend(manager: &Manager, snapshot: &RiskSnapshot) {
    let change = match manager.day_over_day_change(snapshot).await {
        Ok(change) => change,
        Err(err) => {
            tracing::warn!(entity_id = snapshot.entity_id, error = %err, "previous snapshot lookup failed");
            None
        }
    };

    let drivers: Vec<String> = snapshot
        .scores
        .top_drivers(3)
        .into_iter()
        .map(|(name, score)| format!("{name}={score}"))
        .collect();

    tracing::info!(
        entity_id = snapshot.entity_id,
        score_date = %snapshot.score_date,
        composite = snapshot.scores.composite_score,
        change = ?change,
        top_drivers = %drivers.join(","),
        "risk trend"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use reprisk_core::engine::RiskEngine;
    use reprisk_core::scoring::ScoringConfig;
    use reprisk_core::source::memory::InMemorySignalSource;
    use reprisk_core::storage::memory::InMemorySnapshotStore;
    use std::sync::Arc;

    fn manager(store: Arc<InMemorySnapshotStore>) -> Manager {
        let source: Arc<dyn SignalSource> = Arc::new(
            InMemorySignalSource::default()
                .with_entity(1, "Bank One", "ONE")
                .with_entity(2, "Bank Two", "TWO"),
        );
        let store: Arc<dyn SnapshotStore> = store;
        SnapshotManager::new(RiskEngine::new(source, ScoringConfig::default()).unwrap(), store)
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let store = Arc::new(InMemorySnapshotStore::default());
        let outcome = score_date(&manager(Arc::clone(&store)), as_of(), None, true)
            .await
            .unwrap();
        assert_eq!(outcome.scored, 2);
        assert_eq!(outcome.failed, 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn single_entity_run_writes_one_snapshot() {
        let store = Arc::new(InMemorySnapshotStore::default());
        let outcome = score_date(&manager(Arc::clone(&store)), as_of(), Some(2), false)
            .await
            .unwrap();
        assert_eq!(outcome.scored, 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn bundled_fixture_scores_every_bank() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/banks.json");
        let source: Arc<dyn SignalSource> =
            Arc::new(InMemorySignalSource::from_json_file(&path).unwrap());
        let store: Arc<dyn SnapshotStore> = Arc::new(InMemorySnapshotStore::default());
        let m = SnapshotManager::new(RiskEngine::new(source, ScoringConfig::default()).unwrap(), store);

        let outcome = score_date(&m, as_of(), None, false).await.unwrap();
        assert_eq!(outcome.scored, 3);
        let wfc = m.store().get(2, as_of()).await.unwrap().unwrap();
        let usb = m.store().get(1, as_of()).await.unwrap().unwrap();
        assert!(wfc.scores.composite_score > usb.scores.composite_score);
    }
}
