use crate::domain::signals::{
    ComplaintSummary, EnforcementEvent, Entity, MarketPoint, SentimentCategory, Window,
};
use crate::source::error::SourceUnavailableError;
use crate::source::SignalSource;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentRecord {
    pub entity_id: i64,
    pub category: SentimentCategory,
    pub observed_at: DateTime<Utc>,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplaintRecord {
    pub entity_id: i64,
    pub date_received: NaiveDate,
    pub sentiment: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketRecord {
    pub entity_id: i64,
    #[serde(flatten)]
    pub point: MarketPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcementRecord {
    pub entity_id: i64,
    #[serde(flatten)]
    pub event: EnforcementEvent,
}

/// Signal source backed by plain vectors. Loadable from a JSON fixture, and used by tests.
///
/// Applies the same window and validity rules as the Postgres source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemorySignalSource {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub sentiments: Vec<SentimentRecord>,
    #[serde(default)]
    pub complaints: Vec<ComplaintRecord>,
    #[serde(default)]
    pub market: Vec<MarketRecord>,
    #[serde(default)]
    pub enforcement: Vec<EnforcementRecord>,
    #[serde(skip)]
    unavailable: bool,
}

impl InMemorySignalSource {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read fixture {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("fixture {} is not a valid signal dataset", path.display()))
    }

    pub fn with_entity(mut self, id: i64, name: &str, ticker: &str) -> Self {
        self.entities.push(Entity {
            id,
            name: name.to_string(),
            ticker: ticker.to_string(),
        });
        self
    }

    pub fn with_sentiment(
        mut self,
        entity_id: i64,
        category: SentimentCategory,
        observed_at: DateTime<Utc>,
        score: f64,
    ) -> Self {
        self.sentiments.push(SentimentRecord {
            entity_id,
            category,
            observed_at,
            score,
        });
        self
    }

    pub fn with_complaint(
        mut self,
        entity_id: i64,
        date_received: NaiveDate,
        sentiment: Option<f64>,
    ) -> Self {
        self.complaints.push(ComplaintRecord {
            entity_id,
            date_received,
            sentiment,
        });
        self
    }

    pub fn with_market_point(
        mut self,
        entity_id: i64,
        date: NaiveDate,
        close: f64,
        volatility: Option<f64>,
    ) -> Self {
        self.market.push(MarketRecord {
            entity_id,
            point: MarketPoint {
                date,
                close: Some(close),
                volatility,
            },
        });
        self
    }

    pub fn with_enforcement(
        mut self,
        entity_id: i64,
        occurred_on: NaiveDate,
        severity: Option<i32>,
    ) -> Self {
        self.enforcement.push(EnforcementRecord {
            entity_id,
            event: EnforcementEvent {
                occurred_on,
                severity,
            },
        });
        self
    }

    /// Makes every read fail as if the backing store were down.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    fn check(&self, stage: &'static str) -> Result<()> {
        if self.unavailable {
            return Err(SourceUnavailableError::new("memory", stage, "source marked unavailable").into());
        }
        Ok(())
    }
}

fn usable_sentiment(s: f64) -> bool {
    s.is_finite() && (-1.0..=1.0).contains(&s)
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

#[async_trait::async_trait]
impl SignalSource for InMemorySignalSource {
    fn source_name(&self) -> &'static str {
        "memory"
    }

    async fn list_entities(&self) -> Result<Vec<Entity>> {
        self.check("list_entities")?;
        let mut out = self.entities.clone();
        out.sort_by_key(|e| e.id);
        Ok(out)
    }

    async fn mean_sentiment(
        &self,
        entity_id: i64,
        category: SentimentCategory,
        window: Window,
    ) -> Result<Option<f64>> {
        self.check("mean_sentiment")?;

        if category == SentimentCategory::ComplaintNarrative {
            return Ok(mean(
                self.complaints
                    .iter()
                    .filter(|c| c.entity_id == entity_id && window.contains(c.date_received))
                    .filter_map(|c| c.sentiment)
                    .filter(|s| usable_sentiment(*s)),
            ));
        }

        Ok(mean(
            self.sentiments
                .iter()
                .filter(|r| {
                    r.entity_id == entity_id
                        && r.category == category
                        && window.contains(r.observed_at.date_naive())
                })
                .map(|r| r.score)
                .filter(|s| usable_sentiment(*s)),
        ))
    }

    async fn complaint_summary(&self, entity_id: i64, window: Window) -> Result<ComplaintSummary> {
        self.check("complaint_summary")?;

        let in_window: Vec<&ComplaintRecord> = self
            .complaints
            .iter()
            .filter(|c| c.entity_id == entity_id && window.contains(c.date_received))
            .collect();

        Ok(ComplaintSummary {
            count: in_window.len() as u64,
            mean_narrative_sentiment: mean(
                in_window
                    .iter()
                    .filter_map(|c| c.sentiment)
                    .filter(|s| usable_sentiment(*s)),
            ),
        })
    }

    async fn market_series(&self, entity_id: i64, window: Window) -> Result<Vec<MarketPoint>> {
        self.check("market_series")?;

        let mut out: Vec<MarketPoint> = self
            .market
            .iter()
            .filter(|m| m.entity_id == entity_id && window.contains(m.point.date))
            .map(|m| m.point)
            .collect();
        out.sort_by_key(|p| p.date);
        Ok(out)
    }

    async fn enforcement_events(
        &self,
        entity_id: i64,
        window: Window,
    ) -> Result<Vec<EnforcementEvent>> {
        self.check("enforcement_events")?;

        Ok(self
            .enforcement
            .iter()
            .filter(|e| e.entity_id == entity_id && window.contains(e.event.occurred_on))
            .map(|e| e.event)
            .collect())
    }
}
