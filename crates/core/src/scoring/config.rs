use anyhow::ensure;

/// Score used whenever a category has no usable data.
pub const NEUTRAL_RISK: f64 = 50.0;

const DEFAULT_LOOKBACK_DAYS: u32 = 30;
const DEFAULT_CONCURRENCY: usize = 4;
const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Production weights of the five sub-scores. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeWeights {
    pub media_sentiment: f64,
    pub regulatory: f64,
    pub complaints: f64,
    pub market: f64,
    pub peer_relative: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            media_sentiment: 0.25,
            regulatory: 0.25,
            complaints: 0.20,
            market: 0.15,
            peer_relative: 0.15,
        }
    }
}

impl CompositeWeights {
    pub fn sum(&self) -> f64 {
        self.media_sentiment + self.regulatory + self.complaints + self.market + self.peer_relative
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, w) in [
            ("media_sentiment", self.media_sentiment),
            ("regulatory", self.regulatory),
            ("complaints", self.complaints),
            ("market", self.market),
            ("peer_relative", self.peer_relative),
        ] {
            ensure!(
                w.is_finite() && (0.0..=1.0).contains(&w),
                "weight {name} must be within 0..=1 (got {w})"
            );
        }
        ensure!(
            (self.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE,
            "composite weights must sum to 1.0 (got {})",
            self.sum()
        );
        ensure!(
            self.peer_relative < 1.0,
            "peer_relative weight must be below 1.0"
        );
        Ok(())
    }
}

/// Weights of the cheap per-peer proxy. The filler term stands in for the categories the proxy
/// does not read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeerProxyWeights {
    pub media_sentiment: f64,
    pub complaints: f64,
    pub filler: f64,
    pub filler_score: f64,
}

impl Default for PeerProxyWeights {
    fn default() -> Self {
        Self {
            media_sentiment: 0.5,
            complaints: 0.3,
            filler: 0.2,
            filler_score: NEUTRAL_RISK,
        }
    }
}

/// Calibration curves of the normalizers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// Complaint count at which the volume component saturates.
    pub complaint_volume_cap: u64,
    pub complaint_volume_share: f64,
    /// Window return (percent) that maps to 0 risk; its negation maps to 100.
    pub market_return_span_pct: f64,
    /// Daily volatility (percent) that maps to 100 risk.
    pub market_volatility_cap: f64,
    pub market_return_share: f64,
    pub filing_share: f64,
    /// Enforcement component when the window holds no action at all.
    pub enforcement_baseline: f64,
    /// Recency-weighted severity sum that maps to 100 risk.
    pub enforcement_saturation: f64,
    pub enforcement_recency_floor: f64,
    pub default_severity: i32,
    /// Relative deviation from the peer average that saturates the peer score.
    pub peer_deviation_span: f64,
    /// Regulatory lookback as a multiple of the composite lookback.
    pub regulatory_lookback_multiplier: u32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            complaint_volume_cap: 500,
            complaint_volume_share: 0.7,
            market_return_span_pct: 10.0,
            market_volatility_cap: 3.0,
            market_return_share: 0.6,
            filing_share: 0.4,
            enforcement_baseline: 10.0,
            enforcement_saturation: 15.0,
            enforcement_recency_floor: 0.1,
            default_severity: 2,
            peer_deviation_span: 0.5,
            regulatory_lookback_multiplier: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringConfig {
    pub weights: CompositeWeights,
    pub peer_proxy: PeerProxyWeights,
    pub calibration: Calibration,
    pub lookback_days: u32,
    /// Entities scored in parallel by a full run.
    pub concurrency: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: CompositeWeights::default(),
            peer_proxy: PeerProxyWeights::default(),
            calibration: Calibration::default(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl ScoringConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut out = Self::default();

        if let Some(n) = env_parse::<u32>("SCORE_LOOKBACK_DAYS") {
            out.lookback_days = n;
        }
        if let Some(n) = env_parse::<usize>("SCORE_CONCURRENCY") {
            out.concurrency = n;
        }
        if let Some(n) = env_parse::<u64>("SCORE_COMPLAINT_VOLUME_CAP") {
            out.calibration.complaint_volume_cap = n;
        }

        let w = &mut out.weights;
        for (var, slot) in [
            ("SCORE_WEIGHT_MEDIA", &mut w.media_sentiment),
            ("SCORE_WEIGHT_REGULATORY", &mut w.regulatory),
            ("SCORE_WEIGHT_COMPLAINTS", &mut w.complaints),
            ("SCORE_WEIGHT_MARKET", &mut w.market),
            ("SCORE_WEIGHT_PEER", &mut w.peer_relative),
        ] {
            if let Some(v) = env_parse::<f64>(var) {
                *slot = v;
            }
        }

        out.validate()?;
        Ok(out)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.weights.validate()?;
        ensure!(self.lookback_days >= 1, "SCORE_LOOKBACK_DAYS must be >= 1");
        ensure!(self.concurrency >= 1, "SCORE_CONCURRENCY must be >= 1");
        ensure!(
            self.calibration.complaint_volume_cap >= 1,
            "SCORE_COMPLAINT_VOLUME_CAP must be >= 1"
        );
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|s| s.trim().parse::<T>().ok())
}
