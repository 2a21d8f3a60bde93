use crate::domain::signals::{
    ComplaintSummary, EnforcementEvent, Entity, MarketPoint, SentimentCategory, Window,
};
use crate::source::error::SourceUnavailableError;
use crate::source::SignalSource;
use anyhow::Result;
use chrono::NaiveDate;

const SOURCE_NAME: &str = "postgres";

// Out-of-domain sentiment (including NaN, which sorts above every number in Postgres) is
// excluded by the BETWEEN filters, so it counts as missing rather than skewing the mean.
const NEWS_SENTIMENT_SQL: &str = "SELECT AVG(sentiment_score) FROM signals \
     WHERE bank_id = $1 AND source = 'news' \
       AND (published_at AT TIME ZONE 'UTC')::date BETWEEN $2 AND $3 \
       AND sentiment_score BETWEEN -1 AND 1";

const FILING_SENTIMENT_SQL: &str = "SELECT AVG(sentiment_score) FROM sec_filings \
     WHERE bank_id = $1 AND filed_date BETWEEN $2 AND $3 \
       AND sentiment_score BETWEEN -1 AND 1";

const NARRATIVE_SENTIMENT_SQL: &str = "SELECT AVG(sentiment_score) FROM cfpb_complaints \
     WHERE bank_id = $1 AND date_received BETWEEN $2 AND $3 \
       AND sentiment_score BETWEEN -1 AND 1";

#[derive(Debug, Clone)]
pub struct PgSignalSource {
    pool: sqlx::PgPool,
}

impl PgSignalSource {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

fn unavailable(stage: &'static str) -> impl FnOnce(sqlx::Error) -> anyhow::Error {
    move |err| SourceUnavailableError::new(SOURCE_NAME, stage, err).into()
}

#[async_trait::async_trait]
impl SignalSource for PgSignalSource {
    fn source_name(&self) -> &'static str {
        SOURCE_NAME
    }

    async fn list_entities(&self) -> Result<Vec<Entity>> {
        let rows = sqlx::query_as::<_, (i64, String, String)>(
            "SELECT id, name, ticker FROM banks ORDER BY id ASC",
        )
        .persistent(false)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable("list_entities"))?;

        Ok(rows
            .into_iter()
            .map(|(id, name, ticker)| Entity { id, name, ticker })
            .collect())
    }

    async fn mean_sentiment(
        &self,
        entity_id: i64,
        category: SentimentCategory,
        window: Window,
    ) -> Result<Option<f64>> {
        let sql = match category {
            SentimentCategory::News => NEWS_SENTIMENT_SQL,
            SentimentCategory::Filing => FILING_SENTIMENT_SQL,
            SentimentCategory::ComplaintNarrative => NARRATIVE_SENTIMENT_SQL,
        };

        let avg: Option<f64> = sqlx::query_scalar(sql)
            .persistent(false)
            .bind(entity_id)
            .bind(window.start())
            .bind(window.as_of)
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable("mean_sentiment"))?;

        Ok(avg)
    }

    async fn complaint_summary(&self, entity_id: i64, window: Window) -> Result<ComplaintSummary> {
        let (count, avg) = sqlx::query_as::<_, (i64, Option<f64>)>(
            "SELECT COUNT(*), AVG(sentiment_score) FILTER (WHERE sentiment_score BETWEEN -1 AND 1) \
             FROM cfpb_complaints \
             WHERE bank_id = $1 AND date_received BETWEEN $2 AND $3",
        )
        .persistent(false)
        .bind(entity_id)
        .bind(window.start())
        .bind(window.as_of)
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable("complaint_summary"))?;

        Ok(ComplaintSummary {
            count: u64::try_from(count).unwrap_or(0),
            mean_narrative_sentiment: avg,
        })
    }

    async fn market_series(&self, entity_id: i64, window: Window) -> Result<Vec<MarketPoint>> {
        let rows = sqlx::query_as::<_, (NaiveDate, Option<f64>, Option<f64>)>(
            "SELECT date, close_price, volatility_30d FROM market_data \
             WHERE bank_id = $1 AND date BETWEEN $2 AND $3 \
             ORDER BY date ASC",
        )
        .persistent(false)
        .bind(entity_id)
        .bind(window.start())
        .bind(window.as_of)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable("market_series"))?;

        Ok(rows
            .into_iter()
            .map(|(date, close, volatility)| MarketPoint {
                date,
                close,
                volatility,
            })
            .collect())
    }

    async fn enforcement_events(
        &self,
        entity_id: i64,
        window: Window,
    ) -> Result<Vec<EnforcementEvent>> {
        let rows = sqlx::query_as::<_, (NaiveDate, Option<i32>)>(
            "SELECT action_date, severity FROM enforcement_actions \
             WHERE bank_id = $1 AND action_date BETWEEN $2 AND $3 \
             ORDER BY action_date ASC",
        )
        .persistent(false)
        .bind(entity_id)
        .bind(window.start())
        .bind(window.as_of)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable("enforcement_events"))?;

        Ok(rows
            .into_iter()
            .map(|(occurred_on, severity)| EnforcementEvent {
                occurred_on,
                severity,
            })
            .collect())
    }
}
