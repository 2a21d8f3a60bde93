use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One composite score and the sub-scores it was built from, each on a 0..=100 scale.
///
/// `social_sentiment_score` and `employee_score` are reserved for sources that do not feed the
/// engine yet. `None` means "not measured", never zero risk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub composite_score: f64,
    pub media_sentiment_score: f64,
    pub complaint_score: f64,
    pub market_score: f64,
    pub regulatory_score: f64,
    pub peer_relative_score: f64,
    pub social_sentiment_score: Option<f64>,
    pub employee_score: Option<f64>,
}

impl ScoreBreakdown {
    /// Sub-scores ordered from highest to lowest risk, ties kept in display order.
    pub fn top_drivers(&self, n: usize) -> Vec<(&'static str, f64)> {
        let mut drivers = vec![
            ("media_sentiment", self.media_sentiment_score),
            ("complaints", self.complaint_score),
            ("market", self.market_score),
            ("regulatory", self.regulatory_score),
            ("peer_relative", self.peer_relative_score),
        ];
        drivers.sort_by(|a, b| b.1.total_cmp(&a.1));
        drivers.truncate(n);
        drivers
    }
}

/// The persisted score for one `(entity_id, score_date)` key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskSnapshot {
    pub entity_id: i64,
    pub score_date: NaiveDate,
    #[serde(flatten)]
    pub scores: ScoreBreakdown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ScoreBreakdown {
        ScoreBreakdown {
            composite_score: 34.0,
            media_sentiment_score: 50.0,
            complaint_score: 0.0,
            market_score: 50.0,
            regulatory_score: 26.0,
            peer_relative_score: 50.0,
            social_sentiment_score: None,
            employee_score: None,
        }
    }

    #[test]
    fn reserved_scores_serialize_as_null() {
        let v = serde_json::to_value(sample()).unwrap();
        assert_eq!(v["social_sentiment_score"], json!(null));
        assert_eq!(v["employee_score"], json!(null));
        assert_eq!(v["composite_score"], json!(34.0));
    }

    #[test]
    fn top_drivers_are_highest_first_and_stable() {
        let top = sample().top_drivers(3);
        assert_eq!(
            top,
            vec![("media_sentiment", 50.0), ("market", 50.0), ("peer_relative", 50.0)]
        );
    }

    #[test]
    fn snapshot_flattens_scores() {
        let snap = RiskSnapshot {
            entity_id: 7,
            score_date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            scores: sample(),
        };
        let v = serde_json::to_value(snap).unwrap();
        assert_eq!(v["entity_id"], json!(7));
        assert_eq!(v["score_date"], json!("2026-03-02"));
        assert_eq!(v["regulatory_score"], json!(26.0));
    }
}
