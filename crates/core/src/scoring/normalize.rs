//! Sub-score normalizers. Each maps one category of raw evidence onto the 0..=100 risk scale and
//! is total: missing or malformed input yields the category's documented default.

use crate::domain::signals::EnforcementEvent;
use crate::scoring::config::{Calibration, NEUTRAL_RISK};
use chrono::NaiveDate;

fn clamp_risk(v: f64) -> f64 {
    v.clamp(0.0, 100.0)
}

fn valid_sentiment(s: Option<f64>) -> Option<f64> {
    s.filter(|s| s.is_finite() && (-1.0..=1.0).contains(s))
}

/// Mean sentiment in [-1, 1] to risk: +1 is 0, 0 is 50, -1 is 100.
pub fn sentiment_to_risk(mean_sentiment: Option<f64>) -> f64 {
    match valid_sentiment(mean_sentiment) {
        Some(s) => clamp_risk((1.0 - s) * 50.0),
        None => NEUTRAL_RISK,
    }
}

/// Complaint volume (saturating at the cap), blended with narrative sentiment when known.
pub fn complaint_risk(
    count: u64,
    mean_narrative_sentiment: Option<f64>,
    cal: &Calibration,
) -> f64 {
    let cap = cal.complaint_volume_cap.max(1) as f64;
    let volume = (count as f64 / cap).clamp(0.0, 1.0) * 100.0;

    match valid_sentiment(mean_narrative_sentiment) {
        Some(s) => {
            volume * cal.complaint_volume_share
                + sentiment_to_risk(Some(s)) * (1.0 - cal.complaint_volume_share)
        }
        None => volume,
    }
}

/// Window return plus latest trailing volatility.
///
/// `None` prices, or prices that are not finite and positive, mean the series is unusable and
/// the whole sub-score falls back to neutral.
pub fn market_risk(
    earliest_close: Option<f64>,
    latest_close: Option<f64>,
    latest_volatility: Option<f64>,
    cal: &Calibration,
) -> f64 {
    let usable = |p: Option<f64>| p.filter(|p| p.is_finite() && *p > 0.0);
    let (Some(earliest), Some(latest)) = (usable(earliest_close), usable(latest_close)) else {
        return NEUTRAL_RISK;
    };

    let return_pct = (latest - earliest) / earliest * 100.0;
    let span = cal.market_return_span_pct;
    let return_risk = clamp_risk((-return_pct + span) / (2.0 * span) * 100.0);

    let vol_risk = match latest_volatility.filter(|v| v.is_finite() && *v >= 0.0) {
        Some(v) => clamp_risk(v / cal.market_volatility_cap * 100.0),
        None => NEUTRAL_RISK,
    };

    return_risk * cal.market_return_share + vol_risk * (1.0 - cal.market_return_share)
}

/// Filing sentiment blended with recency- and severity-weighted enforcement history.
///
/// Events outside `[as_of - lookback_days, as_of]` are ignored.
pub fn regulatory_risk(
    filing_sentiment_mean: Option<f64>,
    events: &[EnforcementEvent],
    as_of: NaiveDate,
    lookback_days: u32,
    cal: &Calibration,
) -> f64 {
    let filing = sentiment_to_risk(filing_sentiment_mean);
    let enforcement = enforcement_component(events, as_of, lookback_days, cal);
    filing * cal.filing_share + enforcement * (1.0 - cal.filing_share)
}

fn enforcement_component(
    events: &[EnforcementEvent],
    as_of: NaiveDate,
    lookback_days: u32,
    cal: &Calibration,
) -> f64 {
    let lookback = i64::from(lookback_days.max(1));
    let mut in_window = 0usize;
    let mut total = 0.0;

    for ev in events {
        let days_since = (as_of - ev.occurred_on).num_days();
        if !(0..=lookback).contains(&days_since) {
            continue;
        }
        in_window += 1;

        let severity = ev
            .severity
            .filter(|s| (1..=5).contains(s))
            .unwrap_or(cal.default_severity);
        let recency = (1.0 - days_since as f64 / lookback as f64).max(cal.enforcement_recency_floor);
        total += f64::from(severity) * recency;
    }

    // No action on record scores the baseline, not neutral.
    if in_window == 0 {
        return cal.enforcement_baseline;
    }

    clamp_risk(total / cal.enforcement_saturation * 100.0)
}

/// Entity raw score relative to the peer average: equal is 50, `peer_deviation_span` worse
/// saturates at 100, the same amount better at 0.
pub fn peer_relative_risk(entity_raw_score: f64, peer_raw_scores: &[f64], cal: &Calibration) -> f64 {
    let peers: Vec<f64> = peer_raw_scores.iter().copied().filter(|s| s.is_finite()).collect();
    if peers.is_empty() || !entity_raw_score.is_finite() {
        return NEUTRAL_RISK;
    }

    let peer_avg = peers.iter().sum::<f64>() / peers.len() as f64;
    if peer_avg == 0.0 {
        return NEUTRAL_RISK;
    }

    let deviation = (entity_raw_score - peer_avg) / peer_avg;
    let span = cal.peer_deviation_span;
    clamp_risk((deviation + span) / (2.0 * span) * 100.0)
}
