use crate::core::simulation::SimulationFailure;
use crate::core::system_spec::SystemSpecError;
use crate::core::weather_validator::SchemaError;
use crate::input::ConfigError;
use crate::weather::SeriesError;
use std::path::PathBuf;
use thiserror::Error;

/// A fatal failure of one pipeline run. Each variant stops the run at the
/// stage where it occurred; no partial result is produced.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration is invalid: {0}")]
    ConfigValidation(#[from] ConfigError),
    #[error("Could not obtain weather data: {0}")]
    Fetch(#[from] FetchError),
    #[error("{0}")]
    Schema(#[from] SchemaError),
    #[error("Could not assemble the PV system: {0}")]
    SystemSpec(#[from] SystemSpecError),
    #[error("An unexpected error occurred during the PV simulation: {0}")]
    Simulation(#[from] SimulationFailure),
}

/// Weather data could not be acquired from a source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("weather file not found at {0}")]
    FileNotFound(PathBuf),
    #[error("could not read weather data: {0}")]
    Io(#[from] std::io::Error),
    #[error("request to weather service failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("weather service responded with status {0}")]
    Status(reqwest::StatusCode),
    #[error("weather data is malformed: {0}")]
    Malformed(String),
    #[error("weather data is not a valid series: {0}")]
    InvalidSeries(#[from] SeriesError),
    #[error("weather source is not configured: {0}")]
    NotConfigured(String),
}

impl From<csv::Error> for FetchError {
    fn from(error: csv::Error) -> Self {
        FetchError::Malformed(error.to_string())
    }
}

impl FetchError {
    /// Whether another attempt at the same request might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Transport(error) => !error.is_builder() && !error.is_decode(),
            FetchError::Status(status) => status.is_server_error() || status.as_u16() == 429,
            _ => false,
        }
    }
}
