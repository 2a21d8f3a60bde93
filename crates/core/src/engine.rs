use crate::domain::signals::{Entity, SentimentCategory, Window};
use crate::domain::snapshot::ScoreBreakdown;
use crate::scoring::composite::{raw_score, ScoringInputs};
use crate::scoring::peer::{peer_raw_scores, PeerProxyInputs};
use crate::scoring::ScoringConfig;
use crate::source::SignalSource;
use anyhow::Context;
use chrono::NaiveDate;
use std::sync::Arc;

/// Reads an entity's signals and peers' proxy signals, then scores them.
///
/// Every read happens before any math. A source failure therefore surfaces as an error before
/// scoring starts, and scoring itself cannot fail.
pub struct RiskEngine<S: ?Sized> {
    source: Arc<S>,
    config: ScoringConfig,
}

impl<S: ?Sized> Clone for RiskEngine<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            config: self.config,
        }
    }
}

impl<S: SignalSource + ?Sized> RiskEngine<S> {
    pub fn new(source: Arc<S>, config: ScoringConfig) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self { source, config })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn compute_composite(
        &self,
        entity_id: i64,
        as_of: NaiveDate,
        lookback_days: u32,
    ) -> anyhow::Result<ScoreBreakdown> {
        anyhow::ensure!(lookback_days >= 1, "lookback_days must be >= 1");

        let entities = self.source.list_entities().await?;
        anyhow::ensure!(
            entities.iter().any(|e| e.id == entity_id),
            "unknown entity_id {entity_id}"
        );

        let window = Window::new(as_of, lookback_days);
        let inputs = self.read_inputs(entity_id, window).await?;
        let peers = self.read_peer_inputs(entity_id, &entities, window).await?;

        let cfg = &self.config;
        let peer_raws = peer_raw_scores(entity_id, &peers, &cfg.peer_proxy, &cfg.calibration);
        let raw = raw_score(&inputs, cfg);
        let scores = raw.with_peer(&peer_raws, cfg);

        tracing::debug!(
            entity_id,
            %as_of,
            lookback_days,
            peers = peer_raws.len(),
            raw_normalized = raw.normalized,
            composite = scores.composite_score,
            "computed composite"
        );

        Ok(scores)
    }

    async fn read_inputs(&self, entity_id: i64, window: Window) -> anyhow::Result<ScoringInputs> {
        let src = &self.source;
        let regulatory_window = window.widened(self.config.calibration.regulatory_lookback_multiplier);

        let mean_news_sentiment = src
            .mean_sentiment(entity_id, SentimentCategory::News, window)
            .await
            .with_context(|| format!("read news sentiment (entity_id={entity_id})"))?;
        let complaints = src
            .complaint_summary(entity_id, window)
            .await
            .with_context(|| format!("read complaints (entity_id={entity_id})"))?;
        let market_series = src
            .market_series(entity_id, window)
            .await
            .with_context(|| format!("read market series (entity_id={entity_id})"))?;
        let mean_filing_sentiment = src
            .mean_sentiment(entity_id, SentimentCategory::Filing, regulatory_window)
            .await
            .with_context(|| format!("read filing sentiment (entity_id={entity_id})"))?;
        let enforcement_events = src
            .enforcement_events(entity_id, regulatory_window)
            .await
            .with_context(|| format!("read enforcement events (entity_id={entity_id})"))?;

        Ok(ScoringInputs {
            as_of: window.as_of,
            mean_news_sentiment,
            complaints,
            market_series,
            mean_filing_sentiment,
            enforcement_events,
            regulatory_lookback_days: regulatory_window.lookback_days,
        })
    }

    async fn read_peer_inputs(
        &self,
        entity_id: i64,
        entities: &[Entity],
        window: Window,
    ) -> anyhow::Result<Vec<PeerProxyInputs>> {
        let mut out = Vec::with_capacity(entities.len().saturating_sub(1));
        for peer in entities.iter().filter(|e| e.id != entity_id) {
            let mean_news_sentiment = self
                .source
                .mean_sentiment(peer.id, SentimentCategory::News, window)
                .await
                .with_context(|| format!("read peer news sentiment (peer_id={})", peer.id))?;
            let complaints = self
                .source
                .complaint_summary(peer.id, window)
                .await
                .with_context(|| format!("read peer complaints (peer_id={})", peer.id))?;

            out.push(PeerProxyInputs {
                entity_id: peer.id,
                mean_news_sentiment,
                complaint_count: complaints.count,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::composite::round1;
    use crate::source::error::SourceUnavailableError;
    use crate::source::memory::InMemorySignalSource;
    use chrono::{TimeZone, Utc};

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()
    }

    fn engine(src: InMemorySignalSource) -> RiskEngine<InMemorySignalSource> {
        RiskEngine::new(Arc::new(src), ScoringConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn lone_entity_with_no_data_scores_34() {
        let e = engine(InMemorySignalSource::default().with_entity(1, "Bank One", "ONE"));
        let s = e.compute_composite(1, as_of(), 30).await.unwrap();
        assert_eq!(s.composite_score, 34.0);
        assert_eq!(s.regulatory_score, 26.0);
        assert_eq!(s.peer_relative_score, 50.0);
    }

    #[tokio::test]
    async fn negative_news_against_silent_peer() {
        let src = InMemorySignalSource::default()
            .with_entity(1, "Bank One", "ONE")
            .with_entity(2, "Bank Two", "TWO")
            .with_sentiment(
                1,
                SentimentCategory::News,
                Utc.with_ymd_and_hms(2026, 3, 30, 9, 0, 0).unwrap(),
                -1.0,
            )
            .with_market_point(1, NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(), 40.0, Some(0.0))
            .with_market_point(1, as_of(), 40.0, Some(0.0));

        let s = engine(src).compute_composite(1, as_of(), 30).await.unwrap();
        assert_eq!(s.media_sentiment_score, 100.0);
        assert_eq!(s.complaint_score, 0.0);
        assert_eq!(s.market_score, 30.0);
        assert_eq!(s.regulatory_score, 26.0);
        // Silent peer proxy is 35; entity raw is 36 / 0.85.
        let expected_peer: f64 = ((36.0 / 0.85 - 35.0) / 35.0 + 0.5) * 100.0;
        assert_eq!(s.peer_relative_score, round1(expected_peer));
    }

    #[tokio::test]
    async fn peer_average_excludes_the_entity_itself() {
        // Entity 1 is the only noisy one; if it counted as its own peer its score would drop.
        let mut src = InMemorySignalSource::default()
            .with_entity(1, "Bank One", "ONE")
            .with_entity(2, "Bank Two", "TWO")
            .with_entity(3, "Bank Three", "THR");
        for day in 1..=28 {
            src = src.with_complaint(1, NaiveDate::from_ymd_opt(2026, 3, day).unwrap(), None);
        }

        let s = engine(src).compute_composite(1, as_of(), 30).await.unwrap();
        let complaints = 28.0 / 500.0 * 100.0;
        let raw = (12.5 + 6.5 + 0.2 * complaints + 7.5) / 0.85;
        let expected_peer: f64 = ((raw - 35.0) / 35.0 + 0.5) * 100.0;
        assert_eq!(s.peer_relative_score, round1(expected_peer));
    }

    #[tokio::test]
    async fn regulatory_reads_a_wider_window() {
        // 60 days old: outside the 30-day composite window, inside the 90-day regulatory one.
        let src = InMemorySignalSource::default()
            .with_entity(1, "Bank One", "ONE")
            .with_enforcement(1, NaiveDate::from_ymd_opt(2026, 1, 30).unwrap(), Some(5));

        let s = engine(src).compute_composite(1, as_of(), 30).await.unwrap();
        // recency = 1 - 60/90; enforcement = 5 * recency / 15 * 100
        let enforcement = 5.0 * (1.0 - 60.0 / 90.0) / 15.0 * 100.0;
        let expected: f64 = 50.0 * 0.4 + enforcement * 0.6;
        assert_eq!(s.regulatory_score, round1(expected));
    }

    #[tokio::test]
    async fn future_data_is_not_visible_to_a_backfill() {
        let src = InMemorySignalSource::default()
            .with_entity(1, "Bank One", "ONE")
            .with_sentiment(
                1,
                SentimentCategory::News,
                Utc.with_ymd_and_hms(2026, 4, 2, 9, 0, 0).unwrap(),
                -1.0,
            );

        let s = engine(src).compute_composite(1, as_of(), 30).await.unwrap();
        assert_eq!(s.media_sentiment_score, 50.0);
    }

    #[tokio::test]
    async fn huge_lookback_scores_without_overflow() {
        let src = InMemorySignalSource::default()
            .with_entity(1, "Bank One", "ONE")
            .with_complaint(1, NaiveDate::from_ymd_opt(1990, 6, 1).unwrap(), None)
            .with_enforcement(1, NaiveDate::from_ymd_opt(2001, 2, 3).unwrap(), Some(4));

        let s = engine(src)
            .compute_composite(1, as_of(), u32::MAX)
            .await
            .unwrap();
        // The 1990 complaint is inside the window: 1 / 500 of the cap.
        assert_eq!(s.complaint_score, 0.2);
        assert!((0.0..=100.0).contains(&s.composite_score));
    }

    #[tokio::test]
    async fn unknown_entity_is_rejected() {
        let e = engine(InMemorySignalSource::default().with_entity(1, "Bank One", "ONE"));
        let err = e.compute_composite(9, as_of(), 30).await.unwrap_err();
        assert!(err.to_string().contains("unknown entity_id 9"));
    }

    #[tokio::test]
    async fn unavailable_source_fails_before_scoring() {
        let e = engine(
            InMemorySignalSource::default()
                .with_entity(1, "Bank One", "ONE")
                .unavailable(),
        );
        let err = e.compute_composite(1, as_of(), 30).await.unwrap_err();
        assert!(err.downcast_ref::<SourceUnavailableError>().is_some());
    }
}
