pub mod composite;
pub mod config;
pub mod normalize;
pub mod peer;

pub use config::{Calibration, CompositeWeights, PeerProxyWeights, ScoringConfig, NEUTRAL_RISK};
