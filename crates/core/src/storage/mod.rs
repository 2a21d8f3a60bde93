pub mod lock;
pub mod memory;
pub mod runs;
pub mod snapshots;

use crate::domain::snapshot::RiskSnapshot;
use anyhow::Context;
use chrono::NaiveDate;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// Persistence for snapshots keyed by `(entity_id, score_date)`.
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Insert, or replace every score of an existing row with the same key.
    async fn upsert(&self, snapshot: &RiskSnapshot) -> anyhow::Result<()>;

    async fn get(&self, entity_id: i64, score_date: NaiveDate)
        -> anyhow::Result<Option<RiskSnapshot>>;

    /// Snapshots with `since <= score_date <= until`, oldest first.
    async fn history(
        &self,
        entity_id: i64,
        since: NaiveDate,
        until: NaiveDate,
    ) -> anyhow::Result<Vec<RiskSnapshot>>;
}
