use crate::scoring::config::{Calibration, PeerProxyWeights};
use crate::scoring::normalize::{complaint_risk, sentiment_to_risk};
use serde::{Deserialize, Serialize};

/// The cheap signals read for one peer. Market and regulatory data are never fetched for peers,
/// and neither is the peer's own peer-relative score.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PeerProxyInputs {
    pub entity_id: i64,
    pub mean_news_sentiment: Option<f64>,
    pub complaint_count: u64,
}

/// Raw proxy for one peer: media and complaint risk plus a fixed filler for the unread slot.
///
/// Narrative sentiment is deliberately left out of the complaint term.
pub fn peer_raw_score(
    inputs: &PeerProxyInputs,
    weights: &PeerProxyWeights,
    cal: &Calibration,
) -> f64 {
    sentiment_to_risk(inputs.mean_news_sentiment) * weights.media_sentiment
        + complaint_risk(inputs.complaint_count, None, cal) * weights.complaints
        + weights.filler_score * weights.filler
}

/// Proxies for every peer except `entity_id`.
pub fn peer_raw_scores(
    entity_id: i64,
    peers: &[PeerProxyInputs],
    weights: &PeerProxyWeights,
    cal: &Calibration,
) -> Vec<f64> {
    peers
        .iter()
        .filter(|p| p.entity_id != entity_id)
        .map(|p| peer_raw_score(p, weights, cal))
        .collect()
}
