use anyhow::Context;
use chrono::{Datelike, NaiveDate};
use sqlx::pool::PoolConnection;
use sqlx::Postgres;

// Advisory locks belong to the session that took them, so the lock keeps its connection checked
// out of the pool until it is released.
const LOCK_NAMESPACE: i64 = 0x5245_5052_4953; // "REPRIS"

fn lock_key_for_date(score_date: NaiveDate) -> i64 {
    LOCK_NAMESPACE ^ i64::from(score_date.num_days_from_ce())
}

/// Exclusive claim on one score date, held for as long as this value lives.
///
/// Dropping it without [`ScoreDateLock::release`] returns the connection to the pool with the
/// lock still held; Postgres frees it when that session closes.
pub struct ScoreDateLock {
    conn: PoolConnection<Postgres>,
    score_date: NaiveDate,
    key: i64,
}

impl ScoreDateLock {
    /// `Ok(None)` when another session already holds the date.
    pub async fn try_acquire(
        pool: &sqlx::PgPool,
        score_date: NaiveDate,
    ) -> anyhow::Result<Option<Self>> {
        let key = lock_key_for_date(score_date);
        let mut conn = pool
            .acquire()
            .await
            .context("failed to check out a connection for the score date lock")?;

        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .persistent(false)
            .bind(key)
            .fetch_one(&mut *conn)
            .await
            .with_context(|| format!("failed to acquire advisory lock (key={key})"))?;

        Ok(acquired.then_some(Self {
            conn,
            score_date,
            key,
        }))
    }

    pub fn score_date(&self) -> NaiveDate {
        self.score_date
    }

    /// Unlocks on the same session that locked.
    pub async fn release(mut self) -> anyhow::Result<()> {
        let key = self.key;
        let released: bool = sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
            .persistent(false)
            .bind(key)
            .fetch_one(&mut *self.conn)
            .await
            .with_context(|| format!("failed to release advisory lock (key={key})"))?;
        anyhow::ensure!(released, "advisory lock was not held (key={key})");
        Ok(())
    }
}
