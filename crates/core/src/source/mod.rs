pub mod error;
pub mod memory;
pub mod postgres;

use crate::domain::signals::{
    ComplaintSummary, EnforcementEvent, Entity, MarketPoint, SentimentCategory, Window,
};
use anyhow::Result;

/// Read-only view of the historical data the engine scores from.
///
/// Implementations return "no data" as `None` or an empty collection, never as zero. A source
/// that cannot answer at all returns an error wrapping [`error::SourceUnavailableError`].
#[async_trait::async_trait]
pub trait SignalSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn list_entities(&self) -> Result<Vec<Entity>>;

    async fn mean_sentiment(
        &self,
        entity_id: i64,
        category: SentimentCategory,
        window: Window,
    ) -> Result<Option<f64>>;

    async fn complaint_summary(&self, entity_id: i64, window: Window) -> Result<ComplaintSummary>;

    /// Points within the window, ordered by date ascending.
    async fn market_series(&self, entity_id: i64, window: Window) -> Result<Vec<MarketPoint>>;

    async fn enforcement_events(
        &self,
        entity_id: i64,
        window: Window,
    ) -> Result<Vec<EnforcementEvent>>;
}
