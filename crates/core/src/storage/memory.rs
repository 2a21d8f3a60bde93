use crate::domain::snapshot::RiskSnapshot;
use crate::storage::SnapshotStore;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Snapshot store held in process memory, keyed exactly like the `risk_snapshots` table.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    rows: Mutex<BTreeMap<(i64, NaiveDate), RiskSnapshot>>,
}

impl InMemorySnapshotStore {
    pub fn len(&self) -> usize {
        self.rows.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn rows(
        &self,
    ) -> anyhow::Result<std::sync::MutexGuard<'_, BTreeMap<(i64, NaiveDate), RiskSnapshot>>> {
        self.rows
            .lock()
            .map_err(|_| anyhow::anyhow!("snapshot store lock poisoned"))
    }
}

#[async_trait::async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn upsert(&self, snapshot: &RiskSnapshot) -> anyhow::Result<()> {
        self.rows()?
            .insert((snapshot.entity_id, snapshot.score_date), *snapshot);
        Ok(())
    }

    async fn get(
        &self,
        entity_id: i64,
        score_date: NaiveDate,
    ) -> anyhow::Result<Option<RiskSnapshot>> {
        Ok(self.rows()?.get(&(entity_id, score_date)).copied())
    }

    async fn history(
        &self,
        entity_id: i64,
        since: NaiveDate,
        until: NaiveDate,
    ) -> anyhow::Result<Vec<RiskSnapshot>> {
        if since > until {
            return Ok(Vec::new());
        }
        Ok(self
            .rows()?
            .range((entity_id, since)..=(entity_id, until))
            .map(|(_, s)| *s)
            .collect())
    }
}
