use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Partial,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Error => "error",
        }
    }
}

/// One row in `score_runs`, recorded after every worker pass over a score date.
#[derive(Debug, Clone)]
pub struct ScoreRunRecord<'a> {
    pub as_of_date: NaiveDate,
    pub source: &'a str,
    pub status: RunStatus,
    pub entities_scored: usize,
    pub entities_failed: usize,
    pub error: Option<&'a str>,
}

pub async fn record_score_run(
    pool: &sqlx::PgPool,
    run: &ScoreRunRecord<'_>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let generated_at: DateTime<Utc> = Utc::now();

    sqlx::query(
        "INSERT INTO score_runs (id, as_of_date, generated_at, source, status, entities_scored, entities_failed, error) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .persistent(false)
    .bind(id)
    .bind(run.as_of_date)
    .bind(generated_at)
    .bind(run.source)
    .bind(run.status.as_str())
    .bind(i32::try_from(run.entities_scored).unwrap_or(i32::MAX))
    .bind(i32::try_from(run.entities_failed).unwrap_or(i32::MAX))
    .bind(run.error)
    .execute(pool)
    .await
    .context("insert score_runs failed")?;

    Ok(id)
}
