//! Composite aggregation.
//!
//! The peer-relative sub-score needs a raw score to compare against peers, and that raw score
//! cannot include the peer term. Scoring therefore runs in two phases: [`raw_score`] combines the
//! four independent sub-scores and renormalizes by the weight they cover, then
//! [`RawScore::with_peer`] derives the peer sub-score from that value and folds it back in.

use crate::domain::signals::{market_endpoints, ComplaintSummary, EnforcementEvent, MarketPoint};
use crate::domain::snapshot::ScoreBreakdown;
use crate::scoring::config::ScoringConfig;
use crate::scoring::normalize::{
    complaint_risk, market_risk, peer_relative_risk, regulatory_risk, sentiment_to_risk,
};
use chrono::NaiveDate;

/// Everything read for one entity before scoring. `None` and empty collections mean "no data".
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringInputs {
    pub as_of: NaiveDate,
    pub mean_news_sentiment: Option<f64>,
    pub complaints: ComplaintSummary,
    /// Date-ordered closes within the composite lookback.
    pub market_series: Vec<MarketPoint>,
    pub mean_filing_sentiment: Option<f64>,
    pub enforcement_events: Vec<EnforcementEvent>,
    pub regulatory_lookback_days: u32,
}

impl ScoringInputs {
    pub fn empty(as_of: NaiveDate, regulatory_lookback_days: u32) -> Self {
        Self {
            as_of,
            mean_news_sentiment: None,
            complaints: ComplaintSummary::default(),
            market_series: Vec::new(),
            mean_filing_sentiment: None,
            enforcement_events: Vec::new(),
            regulatory_lookback_days,
        }
    }
}

/// Phase one: the four sub-scores that do not depend on other entities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawScore {
    pub media_sentiment: f64,
    pub regulatory: f64,
    pub complaints: f64,
    pub market: f64,
    /// Weighted sum of the four, divided by `1 - weight_peer`.
    pub normalized: f64,
}

pub fn raw_score(inputs: &ScoringInputs, cfg: &ScoringConfig) -> RawScore {
    let cal = &cfg.calibration;
    let w = &cfg.weights;

    let media_sentiment = sentiment_to_risk(inputs.mean_news_sentiment);
    let complaints = complaint_risk(
        inputs.complaints.count,
        inputs.complaints.mean_narrative_sentiment,
        cal,
    );
    let market = match market_endpoints(&inputs.market_series) {
        Some((earliest, latest, vol)) => market_risk(Some(earliest), Some(latest), vol, cal),
        None => market_risk(None, None, None, cal),
    };
    let regulatory = regulatory_risk(
        inputs.mean_filing_sentiment,
        &inputs.enforcement_events,
        inputs.as_of,
        inputs.regulatory_lookback_days,
        cal,
    );

    let raw = w.media_sentiment * media_sentiment
        + w.regulatory * regulatory
        + w.complaints * complaints
        + w.market * market;

    RawScore {
        media_sentiment,
        regulatory,
        complaints,
        market,
        normalized: raw / (1.0 - w.peer_relative),
    }
}

impl RawScore {
    /// Phase two: compare against peer proxies and produce the rounded breakdown.
    pub fn with_peer(self, peer_raw_scores: &[f64], cfg: &ScoringConfig) -> ScoreBreakdown {
        let w = &cfg.weights;
        let peer_relative = peer_relative_risk(self.normalized, peer_raw_scores, &cfg.calibration);

        let composite = w.media_sentiment * self.media_sentiment
            + w.regulatory * self.regulatory
            + w.complaints * self.complaints
            + w.market * self.market
            + w.peer_relative * peer_relative;

        ScoreBreakdown {
            composite_score: round1(composite),
            media_sentiment_score: round1(self.media_sentiment),
            complaint_score: round1(self.complaints),
            market_score: round1(self.market),
            regulatory_score: round1(self.regulatory),
            peer_relative_score: round1(peer_relative),
            social_sentiment_score: None,
            employee_score: None,
        }
    }
}

pub fn score(inputs: &ScoringInputs, peer_raw_scores: &[f64], cfg: &ScoringConfig) -> ScoreBreakdown {
    raw_score(inputs, cfg).with_peer(peer_raw_scores, cfg)
}

/// One decimal place, halves away from zero.
pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
