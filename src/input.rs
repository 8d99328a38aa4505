use crate::core::hardware_catalog::ThermalModelFamily;
use crate::weather::Location;
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Deserialize;
use serde_valid::Validate;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Configuration could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Configuration failed validation: {0}")]
    Validation(String),
}

pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    ingest_config(BufReader::new(file))
}

/// Parse and validate a configuration document. Nothing downstream sees a
/// configuration that has not passed both field and cross-field checks.
pub fn ingest_config(json: impl Read) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = serde_json::from_reader(json)?;
    config
        .validate()
        .map_err(|errors| ConfigError::Validation(errors.to_string()))?;

    let problems = config.cross_field_problems();
    if !problems.is_empty() {
        return Err(ConfigError::Validation(problems.join("; ")));
    }

    Ok(config)
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[validate]
    pub location: LocationConfig,
    #[validate]
    pub data_sources: DataSourcesConfig,
    #[validate]
    pub pv_system: PvSystemConfig,
    #[validate]
    #[serde(default)]
    pub simulation_window: SimulationWindowConfig,
}

impl AppConfig {
    fn cross_field_problems(&self) -> Vec<String> {
        let mut problems = vec![];
        let LocationConfig {
            latitude,
            longitude,
            ..
        } = self.location;

        if !(-90. ..=90.).contains(&latitude) {
            problems.push(format!(
                "location.latitude: {latitude} is not between -90 and 90"
            ));
        }
        if !(-180. ..=180.).contains(&longitude) {
            problems.push(format!(
                "location.longitude: {longitude} is not between -180 and 180"
            ));
        }

        match (
            self.simulation_window.start_date,
            self.simulation_window.end_date,
        ) {
            (Some(start), Some(end)) if end < start => problems.push(format!(
                "simulation_window: end_date {end} is before start_date {start}"
            )),
            (Some(_), None) | (None, Some(_)) => problems.push(
                "simulation_window: start_date and end_date must be given together".to_string(),
            ),
            _ => {}
        }

        problems
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct LocationConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    /// IANA timezone name, e.g. "America/Sao_Paulo"
    #[cfg_attr(feature = "schemars", schemars(with = "String"))]
    pub tz: Tz,
    pub name: Option<String>,
}

impl From<&LocationConfig> for Location {
    fn from(config: &LocationConfig) -> Self {
        Location::new(
            config.latitude,
            config.longitude,
            config.tz,
            config.altitude,
            config.name.clone(),
        )
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct DataSourcesConfig {
    /// PVGIS typical meteorological year CSV export
    pub tmy_path: Option<PathBuf>,
    #[validate]
    #[serde(default)]
    pub forecast_api: ForecastApiConfig,
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct ForecastApiConfig {
    #[validate(pattern = r"^https?://")]
    #[serde(default = "default_forecast_url")]
    pub url: String,
    #[validate(minimum = 1)]
    #[validate(maximum = 300)]
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[validate(minimum = 1)]
    #[validate(maximum = 10)]
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[validate(maximum = 60000)]
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_forecast_url() -> String {
    DEFAULT_FORECAST_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

impl Default for ForecastApiConfig {
    fn default() -> Self {
        Self {
            url: default_forecast_url(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Validate)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct PvSystemConfig {
    /// degrees from horizontal
    #[validate(minimum = 0.0)]
    #[validate(maximum = 90.0)]
    pub surface_tilt: f64,
    /// degrees, 180 = facing the equator in the northern hemisphere convention
    #[validate(minimum = 0.0)]
    #[validate(maximum = 360.0)]
    pub surface_azimuth: f64,
    #[validate(minimum = 1)]
    #[validate(maximum = 1000)]
    pub modules_per_string: u32,
    #[validate(minimum = 1)]
    #[validate(maximum = 1000)]
    pub strings_per_inverter: u32,
    #[validate(min_length = 1)]
    pub module_name: String,
    #[validate(min_length = 1)]
    pub inverter_name: String,
    pub temperature_model_type: ThermalModelFamily,
    #[validate(min_length = 1)]
    pub rack_type: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Validate)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct SimulationWindowConfig {
    #[validate(minimum = 1)]
    #[validate(maximum = 16)]
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u32,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

fn default_forecast_days() -> u32 {
    7
}

impl Default for SimulationWindowConfig {
    fn default() -> Self {
        Self {
            forecast_days: default_forecast_days(),
            start_date: None,
            end_date: None,
        }
    }
}
