use crate::domain::snapshot::{RiskSnapshot, ScoreBreakdown};
use crate::storage::SnapshotStore;
use anyhow::Context;
use chrono::NaiveDate;

const SELECT_COLUMNS: &str = "entity_id, score_date, composite_score, media_sentiment_score, \
     complaint_score, market_score, regulatory_score, peer_relative_score, \
     social_sentiment_score, employee_score";

type SnapshotRow = (
    i64,
    NaiveDate,
    f64,
    f64,
    f64,
    f64,
    f64,
    f64,
    Option<f64>,
    Option<f64>,
);

fn from_row(row: SnapshotRow) -> RiskSnapshot {
    let (
        entity_id,
        score_date,
        composite_score,
        media_sentiment_score,
        complaint_score,
        market_score,
        regulatory_score,
        peer_relative_score,
        social_sentiment_score,
        employee_score,
    ) = row;

    RiskSnapshot {
        entity_id,
        score_date,
        scores: ScoreBreakdown {
            composite_score,
            media_sentiment_score,
            complaint_score,
            market_score,
            regulatory_score,
            peer_relative_score,
            social_sentiment_score,
            employee_score,
        },
    }
}

#[derive(Debug, Clone)]
pub struct PgSnapshotStore {
    pool: sqlx::PgPool,
}

impl PgSnapshotStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn upsert(&self, snapshot: &RiskSnapshot) -> anyhow::Result<()> {
        let s = &snapshot.scores;
        sqlx::query(
            "INSERT INTO risk_snapshots (entity_id, score_date, composite_score, media_sentiment_score, \
                 complaint_score, market_score, regulatory_score, peer_relative_score, \
                 social_sentiment_score, employee_score) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (entity_id, score_date) DO UPDATE \
               SET composite_score = EXCLUDED.composite_score, \
                   media_sentiment_score = EXCLUDED.media_sentiment_score, \
                   complaint_score = EXCLUDED.complaint_score, \
                   market_score = EXCLUDED.market_score, \
                   regulatory_score = EXCLUDED.regulatory_score, \
                   peer_relative_score = EXCLUDED.peer_relative_score, \
                   social_sentiment_score = EXCLUDED.social_sentiment_score, \
                   employee_score = EXCLUDED.employee_score",
        )
        .persistent(false)
        .bind(snapshot.entity_id)
        .bind(snapshot.score_date)
        .bind(s.composite_score)
        .bind(s.media_sentiment_score)
        .bind(s.complaint_score)
        .bind(s.market_score)
        .bind(s.regulatory_score)
        .bind(s.peer_relative_score)
        .bind(s.social_sentiment_score)
        .bind(s.employee_score)
        .execute(&self.pool)
        .await
        .with_context(|| {
            format!(
                "upsert risk_snapshots failed (entity_id={}, score_date={})",
                snapshot.entity_id, snapshot.score_date
            )
        })?;

        Ok(())
    }

    async fn get(
        &self,
        entity_id: i64,
        score_date: NaiveDate,
    ) -> anyhow::Result<Option<RiskSnapshot>> {
        let row = sqlx::query_as::<_, SnapshotRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM risk_snapshots WHERE entity_id = $1 AND score_date = $2"
        ))
        .persistent(false)
        .bind(entity_id)
        .bind(score_date)
        .fetch_optional(&self.pool)
        .await
        .context("select risk_snapshots failed")?;

        Ok(row.map(from_row))
    }

    async fn history(
        &self,
        entity_id: i64,
        since: NaiveDate,
        until: NaiveDate,
    ) -> anyhow::Result<Vec<RiskSnapshot>> {
        let rows = sqlx::query_as::<_, SnapshotRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM risk_snapshots \
             WHERE entity_id = $1 AND score_date BETWEEN $2 AND $3 \
             ORDER BY score_date ASC"
        ))
        .persistent(false)
        .bind(entity_id)
        .bind(since)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .context("select risk_snapshots history failed")?;

        Ok(rows.into_iter().map(from_row).collect())
    }
}
