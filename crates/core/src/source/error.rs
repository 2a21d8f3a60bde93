use std::fmt;

/// The data layer could not answer. Distinct from "no data", which is never an error.
#[derive(Debug, Clone)]
pub struct SourceUnavailableError {
    pub source: &'static str,
    pub stage: &'static str,
    pub detail: String,
}

impl SourceUnavailableError {
    pub fn new(source: &'static str, stage: &'static str, detail: impl fmt::Display) -> Self {
        Self {
            source,
            stage,
            detail: detail.to_string(),
        }
    }
}

impl fmt::Display for SourceUnavailableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "signal source unavailable (source={}, stage={}): {}",
            self.source, self.stage, self.detail
        )
    }
}

impl std::error::Error for SourceUnavailableError {}
