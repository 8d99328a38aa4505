//! Weather sources and the Open-Meteo forecast client.

use crate::errors::FetchError;
use crate::input::{ForecastApiConfig, SimulationWindowConfig};
use crate::weather::{Location, RawWeatherSeries, WeatherField, WeatherValue};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use indexmap::IndexMap;
use itertools::Itertools;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

/// Anything that can produce a raw weather series for a location and window.
pub trait WeatherSource {
    /// short label used in logs and report names
    fn name(&self) -> &str;

    fn fetch(
        &self,
        location: &Location,
        window: &SimulationWindowConfig,
    ) -> Result<RawWeatherSeries, FetchError>;
}

impl<T: WeatherSource + ?Sized> WeatherSource for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(
        &self,
        location: &Location,
        window: &SimulationWindowConfig,
    ) -> Result<RawWeatherSeries, FetchError> {
        (**self).fetch(location, window)
    }
}

const HOURLY_FIELDS: [(&str, WeatherField); 5] = [
    ("temperature_2m", WeatherField::TempAir),
    ("wind_speed_10m", WeatherField::WindSpeed),
    ("shortwave_radiation", WeatherField::Ghi),
    ("direct_normal_irradiance", WeatherField::Dni),
    ("diffuse_radiation", WeatherField::Dhi),
];

/// Open-Meteo hourly forecast client.
pub struct OpenMeteoSource {
    client: Client,
    url: String,
    max_attempts: u32,
    initial_backoff: Duration,
}

impl OpenMeteoSource {
    pub fn new(config: &ForecastApiConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
        })
    }

    fn request_once(&self, query: &[(&'static str, String)]) -> Result<String, FetchError> {
        let response = self.client.get(&self.url).query(query).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        Ok(response.text()?)
    }
}

impl WeatherSource for OpenMeteoSource {
    fn name(&self) -> &str {
        "forecast"
    }

    fn fetch(
        &self,
        location: &Location,
        window: &SimulationWindowConfig,
    ) -> Result<RawWeatherSeries, FetchError> {
        info!(
            "fetching Open-Meteo forecast for lat={}, lon={}",
            location.latitude(),
            location.longitude()
        );
        let query = forecast_query(location, window);

        let body = with_retries(self.max_attempts, self.initial_backoff, |_| {
            self.request_once(&query)
        })
        .inspect_err(|e| error!("failed to fetch Open-Meteo forecast: {e}"))?;

        let series = parse_forecast_response(&body, location.timezone())
            .inspect_err(|e| error!("unusable Open-Meteo response: {e}"))?;
        info!(rows = series.len(), "Open-Meteo forecast fetched");

        Ok(series)
    }
}

fn forecast_query(
    location: &Location,
    window: &SimulationWindowConfig,
) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("latitude", location.latitude().to_string()),
        ("longitude", location.longitude().to_string()),
        ("timezone", location.timezone().name().to_string()),
        (
            "hourly",
            HOURLY_FIELDS.iter().map(|(name, _)| *name).join(","),
        ),
        ("wind_speed_unit", "ms".to_string()),
        ("timeformat", "unixtime".to_string()),
    ];
    match (window.start_date, window.end_date) {
        (Some(start), Some(end)) => {
            query.push(("start_date", start.format("%Y-%m-%d").to_string()));
            query.push(("end_date", end.format("%Y-%m-%d").to_string()));
        }
        _ => query.push(("forecast_days", window.forecast_days.to_string())),
    }

    query
}

/// Run `operation` until it succeeds, fails with a non-transient error, or has
/// been tried `max_attempts` times. The wait before attempt `n + 1` is
/// `initial_backoff * 2^(n - 1)`.
pub(crate) fn with_retries<T>(
    max_attempts: u32,
    initial_backoff: Duration,
    mut operation: impl FnMut(u32) -> Result<T, FetchError>,
) -> Result<T, FetchError> {
    let mut attempt = 1;
    loop {
        match operation(attempt) {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = backoff_delay(initial_backoff, attempt);
                warn!(
                    "attempt {attempt} of {max_attempts} failed ({e}); retrying in {} ms",
                    delay.as_millis()
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn backoff_delay(initial_backoff: Duration, attempt: u32) -> Duration {
    initial_backoff.saturating_mul(1 << (attempt - 1).min(16))
}

#[derive(Deserialize)]
struct ForecastResponse {
    hourly: HourlyData,
}

#[derive(Deserialize)]
struct HourlyData {
    time: Vec<i64>,
    #[serde(flatten)]
    fields: IndexMap<String, Vec<Value>>,
}

/// Map an Open-Meteo JSON response onto the canonical weather fields.
///
/// A response without an `hourly.time` array is malformed. Individual fields
/// the response lacks are simply absent from the series.
pub fn parse_forecast_response(body: &str, tz: Tz) -> Result<RawWeatherSeries, FetchError> {
    let ForecastResponse { hourly } = serde_json::from_str(body)
        .map_err(|e| FetchError::Malformed(format!("unexpected response shape: {e}")))?;
    let HourlyData { time, mut fields } = hourly;

    let timestamps = time
        .iter()
        .map(|secs| {
            Utc.timestamp_opt(*secs, 0)
                .single()
                .map(|t: DateTime<Utc>| t.with_timezone(&tz))
                .ok_or_else(|| FetchError::Malformed(format!("invalid timestamp {secs}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut columns = IndexMap::new();
    for (source_name, field) in HOURLY_FIELDS {
        if let Some(values) = fields.shift_remove(source_name) {
            columns.insert(
                field.to_string(),
                values.into_iter().map(json_to_weather_value).collect(),
            );
        }
    }

    Ok(RawWeatherSeries::new(timestamps, columns)?)
}

fn json_to_weather_value(value: Value) -> WeatherValue {
    match value {
        Value::Null => WeatherValue::Null,
        Value::Number(number) => number.as_f64().into(),
        Value::String(text) => WeatherValue::Text(text),
        other => WeatherValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};
    use chrono_tz::America::Sao_Paulo;
    use pretty_assertions::assert_eq;
    use reqwest::StatusCode;
    use rstest::*;
    use serde_json::json;

    #[fixture]
    fn location() -> Location {
        Location::new(-15.79, -47.91, Sao_Paulo, None, Some("Brasilia".into()))
    }

    #[fixture]
    fn response() -> Value {
        // 2025-01-01T12:00Z and 13:00Z
        json!({
            "latitude": -15.75,
            "longitude": -47.875,
            "hourly": {
                "time": [1735732800, 1735736400],
                "temperature_2m": [24.1, null],
                "wind_speed_10m": [2.2, 2.5],
                "shortwave_radiation": [650.0, 700.0],
                "direct_normal_irradiance": [500.0, 520.0],
                "diffuse_radiation": [150.0, 160.0]
            }
        })
    }

    #[rstest]
    fn test_parse_maps_fields_to_canonical_names(response: Value) {
        let series = parse_forecast_response(&response.to_string(), Sao_Paulo).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(
            series.column_names().collect::<Vec<_>>(),
            vec!["temp_air", "wind_speed", "ghi", "dni", "dhi"]
        );
        assert_eq!(series.column("temp_air").unwrap()[1], WeatherValue::Null);
        assert_eq!(series.column("ghi").unwrap()[0], WeatherValue::Number(650.));
        assert_eq!(series.timestamps()[0].hour(), 9);
        assert_eq!(series.timezone(), Some(Sao_Paulo));
    }

    #[rstest]
    fn test_parse_leaves_out_missing_fields(mut response: Value) {
        response["hourly"]
            .as_object_mut()
            .unwrap()
            .remove("direct_normal_irradiance");
        let series = parse_forecast_response(&response.to_string(), Sao_Paulo).unwrap();

        assert!(!series.has_column("dni"));
    }

    #[rstest]
    fn test_parse_without_hourly_block_is_malformed() {
        let body = json!({"error": true, "reason": "Cannot initialize"}).to_string();

        assert!(matches!(
            parse_forecast_response(&body, Sao_Paulo),
            Err(FetchError::Malformed(_))
        ));
    }

    #[rstest]
    fn test_parse_rejects_ragged_columns(mut response: Value) {
        response["hourly"]["wind_speed_10m"] = json!([1.0]);

        assert!(matches!(
            parse_forecast_response(&response.to_string(), Sao_Paulo),
            Err(FetchError::InvalidSeries(_))
        ));
    }

    #[rstest]
    fn test_query_uses_forecast_days_by_default(location: Location) {
        let query = forecast_query(&location, &SimulationWindowConfig::default());

        assert!(query.contains(&("timezone", "America/Sao_Paulo".to_string())));
        assert!(query.contains(&("forecast_days", "7".to_string())));
        assert!(query.contains(&("wind_speed_unit", "ms".to_string())));
    }

    #[rstest]
    fn test_query_uses_explicit_dates(location: Location) {
        let window = SimulationWindowConfig {
            forecast_days: 7,
            start_date: NaiveDate::from_ymd_opt(2025, 2, 1),
            end_date: NaiveDate::from_ymd_opt(2025, 2, 3),
        };
        let query = forecast_query(&location, &window);

        assert!(query.contains(&("start_date", "2025-02-01".to_string())));
        assert!(query.contains(&("end_date", "2025-02-03".to_string())));
        assert!(!query.iter().any(|(key, _)| *key == "forecast_days"));
    }

    #[rstest]
    fn test_retries_transient_failures_until_success() {
        let mut calls = 0;
        let result = with_retries(3, Duration::ZERO, |attempt| {
            calls += 1;
            if attempt < 3 {
                Err(FetchError::Status(StatusCode::SERVICE_UNAVAILABLE))
            } else {
                Ok("body")
            }
        });

        assert_eq!(result.unwrap(), "body");
        assert_eq!(calls, 3);
    }

    #[rstest]
    fn test_gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<(), _> = with_retries(2, Duration::ZERO, |_| {
            calls += 1;
            Err(FetchError::Status(StatusCode::BAD_GATEWAY))
        });

        assert!(matches!(result, Err(FetchError::Status(StatusCode::BAD_GATEWAY))));
        assert_eq!(calls, 2);
    }

    #[rstest]
    fn test_client_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<(), _> = with_retries(5, Duration::ZERO, |_| {
            calls += 1;
            Err(FetchError::Status(StatusCode::BAD_REQUEST))
        });

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[rstest]
    #[case(1, 500)]
    #[case(2, 1000)]
    #[case(4, 4000)]
    fn test_backoff_doubles(#[case] attempt: u32, #[case] expected_ms: u64) {
        assert_eq!(
            backoff_delay(Duration::from_millis(500), attempt),
            Duration::from_millis(expected_ms)
        );
    }
}
