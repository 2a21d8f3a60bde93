use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// A monitored bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: i64,
    pub name: String,
    pub ticker: String,
}

/// Which stream a sentiment observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentCategory {
    News,
    Filing,
    ComplaintNarrative,
}

/// Trailing date range `[as_of - lookback_days, as_of]`, both ends inclusive.
///
/// Nothing dated after `as_of` is ever read, which keeps back-fills and concurrent runs
/// reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub as_of: NaiveDate,
    pub lookback_days: u32,
}

impl Window {
    pub fn new(as_of: NaiveDate, lookback_days: u32) -> Self {
        Self {
            as_of,
            lookback_days,
        }
    }

    /// First day in the window. Saturates at the earliest representable date.
    pub fn start(&self) -> NaiveDate {
        self.as_of
            .checked_sub_days(Days::new(u64::from(self.lookback_days)))
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start() && date <= self.as_of
    }

    /// Same end date, lookback scaled by `factor`.
    pub fn widened(&self, factor: u32) -> Self {
        Self::new(self.as_of, self.lookback_days.saturating_mul(factor))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ComplaintSummary {
    pub count: u64,
    pub mean_narrative_sentiment: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketPoint {
    pub date: NaiveDate,
    pub close: Option<f64>,
    /// Trailing 30-day volatility, in percent.
    pub volatility: Option<f64>,
}

impl MarketPoint {
    fn usable_close(&self) -> Option<f64> {
        self.close.filter(|c| c.is_finite() && *c > 0.0)
    }
}

/// First and last usable points of a date-ordered series.
///
/// Points with a missing, non-finite or non-positive close are skipped.
pub fn market_endpoints(series: &[MarketPoint]) -> Option<(f64, f64, Option<f64>)> {
    let earliest = series.iter().find_map(MarketPoint::usable_close)?;
    let latest = series.iter().rev().find(|p| p.usable_close().is_some())?;
    let latest_close = latest.usable_close()?;
    Some((earliest, latest_close, latest.volatility))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcementEvent {
    pub occurred_on: NaiveDate,
    /// 1..=5, higher is more severe. Sources do not always grade actions.
    pub severity: Option<i32>,
}
