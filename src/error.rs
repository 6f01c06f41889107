use thiserror::Error;

/// Failures surfaced by the series source and the analysis stages.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("data unavailable: {0}")]
    DataUnavailable(String),
}

impl AnalysisError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        AnalysisError::InvalidInput(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        AnalysisError::DataUnavailable(msg.into())
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        AnalysisError::DataUnavailable(err.to_string())
    }
}
