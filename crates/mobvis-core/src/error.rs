use polars::error::PolarsError;
use thiserror::Error;

use crate::engine::EngineError;

pub const NO_GAIT_PARAMETERS_MESSAGE: &str = "No gait parameters could be extracted. Please check inputs such as: sampling rate, input CSV data format (presence of 'samples' column?), conversion to m/s² checkbox (if needed?).";

const INTERPOLATION_RANGE_SIGNATURE: &str =
    "x_new is below the interpolation range's minimum value";
const SAMPLING_RATE_TOO_HIGH_MESSAGE: &str = "The sampling rate may be too high.";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Format(String),

    #[error("{}", NO_GAIT_PARAMETERS_MESSAGE)]
    EmptyResult,

    #[error("{0}")]
    Engine(String),
}

impl ExtractionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::Validation(_) => "validation",
            ExtractionError::Format(_) => "format",
            ExtractionError::EmptyResult => "empty_result",
            ExtractionError::Engine(_) => "engine",
        }
    }

    /// Message shown to API clients. Known engine failure signatures are
    /// rewritten; everything else passes through verbatim.
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        if message.contains(INTERPOLATION_RANGE_SIGNATURE) {
            SAMPLING_RATE_TOO_HIGH_MESSAGE.to_string()
        } else {
            message
        }
    }
}

impl From<EngineError> for ExtractionError {
    fn from(err: EngineError) -> Self {
        ExtractionError::Engine(err.to_string())
    }
}

impl From<PolarsError> for ExtractionError {
    fn from(err: PolarsError) -> Self {
        ExtractionError::Format(err.to_string())
    }
}

impl From<csv::Error> for ExtractionError {
    fn from(err: csv::Error) -> Self {
        ExtractionError::Format(format!("failed to read CSV: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, ExtractionError>;
