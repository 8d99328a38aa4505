//! Weather time series types.
//!
//! A [`RawWeatherSeries`] is what a weather source hands over: named columns of
//! untrusted cells that may be null or non-numeric, and possibly missing whole
//! fields. A [`WeatherSeries`] is what the validator hands on: every required
//! field present and numeric at every timestamp.

use crate::core::units::SECONDS_PER_HOUR;
use chrono::{DateTime, TimeDelta};
use chrono_tz::Tz;
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

/// Fields every weather series needs before it can be simulated.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    Eq,
    Hash,
    IntoStaticStr,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WeatherField {
    /// global horizontal irradiance, W/m2
    Ghi,
    /// direct normal irradiance, W/m2
    Dni,
    /// diffuse horizontal irradiance, W/m2
    Dhi,
    /// air temperature, degrees C
    TempAir,
    /// wind speed, m/s
    WindSpeed,
}

impl WeatherField {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }
}

/// A single cell of a raw weather column.
#[derive(Clone, Debug, PartialEq)]
pub enum WeatherValue {
    Null,
    Number(f64),
    Text(String),
}

impl WeatherValue {
    /// Numeric reading of this cell, or `None` when it is null or cannot be parsed.
    pub fn coerce(&self) -> Option<f64> {
        match self {
            WeatherValue::Null => None,
            WeatherValue::Number(value) => value.is_finite().then_some(*value),
            WeatherValue::Text(text) => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, WeatherValue::Null)
            || matches!(self, WeatherValue::Number(value) if value.is_nan())
    }
}

impl From<f64> for WeatherValue {
    fn from(value: f64) -> Self {
        WeatherValue::Number(value)
    }
}

impl From<Option<f64>> for WeatherValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(WeatherValue::Null, WeatherValue::Number)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("Timestamps must be strictly increasing; found {previous} followed by {next}")]
    NotStrictlyIncreasing { previous: String, next: String },
    #[error("Timestamps must share one timezone; found both {first} and {other}")]
    MixedTimezones { first: Tz, other: Tz },
    #[error("Column '{column}' has {actual} values but the series has {expected} timestamps")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
}

fn check_timestamps(timestamps: &[DateTime<Tz>]) -> Result<(), SeriesError> {
    if let Some(first) = timestamps.first() {
        let tz = first.timezone();
        if let Some(other) = timestamps.iter().map(|t| t.timezone()).find(|other| *other != tz) {
            return Err(SeriesError::MixedTimezones { first: tz, other });
        }
    }
    for (previous, next) in timestamps.iter().tuple_windows() {
        if next <= previous {
            return Err(SeriesError::NotStrictlyIncreasing {
                previous: previous.to_rfc3339(),
                next: next.to_rfc3339(),
            });
        }
    }

    Ok(())
}

/// Weather data as acquired from a source, before any checking or repair.
#[derive(Clone, Debug, PartialEq)]
pub struct RawWeatherSeries {
    timestamps: Vec<DateTime<Tz>>,
    columns: IndexMap<String, Vec<WeatherValue>>,
}

impl RawWeatherSeries {
    pub fn new(
        timestamps: Vec<DateTime<Tz>>,
        columns: IndexMap<String, Vec<WeatherValue>>,
    ) -> Result<Self, SeriesError> {
        check_timestamps(&timestamps)?;
        for (column, values) in &columns {
            if values.len() != timestamps.len() {
                return Err(SeriesError::ColumnLengthMismatch {
                    column: column.clone(),
                    expected: timestamps.len(),
                    actual: values.len(),
                });
            }
        }

        Ok(Self {
            timestamps,
            columns,
        })
    }

    pub fn timestamps(&self) -> &[DateTime<Tz>] {
        &self.timestamps
    }

    pub fn column(&self, name: &str) -> Option<&[WeatherValue]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn timezone(&self) -> Option<Tz> {
        self.timestamps.first().map(|t| t.timezone())
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// One fully populated timestep of weather.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WeatherObservation {
    pub ghi: f64,
    pub dni: f64,
    pub dhi: f64,
    pub temp_air: f64,
    pub wind_speed: f64,
}

impl WeatherObservation {
    pub fn get(&self, field: WeatherField) -> f64 {
        match field {
            WeatherField::Ghi => self.ghi,
            WeatherField::Dni => self.dni,
            WeatherField::Dhi => self.dhi,
            WeatherField::TempAir => self.temp_air,
            WeatherField::WindSpeed => self.wind_speed,
        }
    }

    fn set(&mut self, field: WeatherField, value: f64) {
        match field {
            WeatherField::Ghi => self.ghi = value,
            WeatherField::Dni => self.dni = value,
            WeatherField::Dhi => self.dhi = value,
            WeatherField::TempAir => self.temp_air = value,
            WeatherField::WindSpeed => self.wind_speed = value,
        }
    }
}

/// A validated weather series: strictly increasing timestamps in a single
/// timezone, with every required field populated.
#[derive(Clone, Debug, PartialEq)]
pub struct WeatherSeries {
    timestamps: Vec<DateTime<Tz>>,
    observations: Vec<WeatherObservation>,
}

impl WeatherSeries {
    pub fn new(
        timestamps: Vec<DateTime<Tz>>,
        observations: Vec<WeatherObservation>,
    ) -> Result<Self, SeriesError> {
        check_timestamps(&timestamps)?;
        if observations.len() != timestamps.len() {
            return Err(SeriesError::ColumnLengthMismatch {
                column: "observations".into(),
                expected: timestamps.len(),
                actual: observations.len(),
            });
        }

        Ok(Self {
            timestamps,
            observations,
        })
    }

    /// Assemble a series from per-field columns that already have one value per timestamp.
    pub(crate) fn from_columns(
        timestamps: Vec<DateTime<Tz>>,
        columns: &IndexMap<WeatherField, Vec<f64>>,
    ) -> Self {
        let mut observations = vec![WeatherObservation::default(); timestamps.len()];
        for (field, values) in columns {
            for (observation, value) in observations.iter_mut().zip(values) {
                observation.set(*field, *value);
            }
        }

        Self {
            timestamps,
            observations,
        }
    }

    pub fn timestamps(&self) -> &[DateTime<Tz>] {
        &self.timestamps
    }

    pub fn observations(&self) -> &[WeatherObservation] {
        &self.observations
    }

    pub fn column(&self, field: WeatherField) -> Vec<f64> {
        self.observations.iter().map(|o| o.get(field)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DateTime<Tz>, &WeatherObservation)> {
        self.timestamps.iter().zip(self.observations.iter())
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Duration in hours that each sample of a series stands for.
///
/// Each sample covers the interval up to the next timestamp; the last sample
/// repeats the interval before it. A lone sample is taken to cover one hour.
pub fn step_durations_hours(timestamps: &[DateTime<Tz>]) -> Vec<f64> {
    let hours = |delta: TimeDelta| delta.num_seconds() as f64 / SECONDS_PER_HOUR as f64;

    let mut durations: Vec<f64> = timestamps
        .iter()
        .tuple_windows()
        .map(|(current, next)| hours(next.signed_duration_since(current)))
        .collect();
    match durations.last().copied() {
        Some(last) => durations.push(last),
        None if timestamps.len() == 1 => durations.push(1.),
        None => {}
    }

    durations
}

/// Site at which a system is simulated.
#[derive(Clone, Debug, PartialEq)]
pub struct Location {
    latitude: f64,
    longitude: f64,
    timezone: Tz,
    altitude: Option<f64>,
    name: Option<String>,
}

impl Location {
    pub fn new(
        latitude: f64,
        longitude: f64,
        timezone: Tz,
        altitude: Option<f64>,
        name: Option<String>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            timezone,
            altitude,
            name,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn altitude(&self) -> Option<f64> {
        self.altitude
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::Sao_Paulo;
    use chrono_tz::UTC;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn hourly(count: u32) -> Vec<DateTime<Tz>> {
        (0..count)
            .map(|h| UTC.with_ymd_and_hms(2025, 1, 1, h, 0, 0).unwrap())
            .collect()
    }

    #[rstest]
    #[case(WeatherValue::Number(3.5), Some(3.5))]
    #[case(WeatherValue::Text(" 12.25 ".into()), Some(12.25))]
    #[case(WeatherValue::Text("n/a".into()), None)]
    #[case(WeatherValue::Number(f64::NAN), None)]
    #[case(WeatherValue::Null, None)]
    fn test_coerce(#[case] value: WeatherValue, #[case] expected: Option<f64>) {
        assert_eq!(value.coerce(), expected);
    }

    #[rstest]
    fn test_field_names_are_snake_case() {
        assert_eq!(WeatherField::TempAir.as_str(), "temp_air");
        assert_eq!(WeatherField::WindSpeed.to_string(), "wind_speed");
        assert_eq!("dni".parse::<WeatherField>().unwrap(), WeatherField::Dni);
    }

    #[rstest]
    fn test_raw_series_rejects_duplicate_timestamps() {
        let mut timestamps = hourly(2);
        timestamps.push(timestamps[1]);
        let result = RawWeatherSeries::new(timestamps, IndexMap::new());

        assert!(matches!(
            result,
            Err(SeriesError::NotStrictlyIncreasing { .. })
        ));
    }

    #[rstest]
    fn test_raw_series_rejects_mixed_timezones() {
        let timestamps = vec![
            UTC.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            Sao_Paulo.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        ];
        let result = RawWeatherSeries::new(timestamps, IndexMap::new());

        assert!(matches!(result, Err(SeriesError::MixedTimezones { .. })));
    }

    #[rstest]
    fn test_raw_series_rejects_short_column() {
        let columns = IndexMap::from([("ghi".to_string(), vec![WeatherValue::Number(1.)])]);
        let result = RawWeatherSeries::new(hourly(2), columns);

        assert_eq!(
            result,
            Err(SeriesError::ColumnLengthMismatch {
                column: "ghi".into(),
                expected: 2,
                actual: 1
            })
        );
    }

    #[rstest]
    fn test_step_durations_follow_the_series_cadence() {
        let timestamps = vec![
            UTC.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            UTC.with_ymd_and_hms(2025, 1, 1, 0, 30, 0).unwrap(),
            UTC.with_ymd_and_hms(2025, 1, 1, 2, 30, 0).unwrap(),
        ];

        assert_eq!(step_durations_hours(&timestamps), vec![0.5, 2., 2.]);
        assert_eq!(step_durations_hours(&hourly(1)), vec![1.]);
        assert_eq!(step_durations_hours(&[]), Vec::<f64>::new());
    }
}
