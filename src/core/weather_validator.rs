//! Checks raw weather data for completeness and repairs gaps.
//!
//! A series missing any required field is rejected outright. Otherwise every
//! cell is coerced to a number (unparseable text becomes null), and the nulls
//! are repaired by linear interpolation weighted by elapsed time between the
//! nearest valid neighbours. Nulls with no valid neighbour on one side are
//! filled with zero.

use crate::weather::{RawWeatherSeries, WeatherField, WeatherSeries, WeatherValue};
use chrono::DateTime;
use chrono_tz::Tz;
use indexmap::IndexMap;
use interp::{interp_slice, InterpMode};
use itertools::Itertools;
use std::fmt::{Display, Formatter};
use strum::IntoEnumIterator;
use thiserror::Error;
use tracing::{error, warn};

/// Required fields are absent from the weather data altogether.
#[derive(Clone, Debug, Error, PartialEq)]
#[error(
    "Critical error: the following required fields are missing from the weather data: {}",
    .missing.iter().join(", ")
)]
pub struct SchemaError {
    pub missing: Vec<WeatherField>,
}

/// A non-fatal data-quality finding, reported alongside a repaired series.
#[derive(Clone, Debug, PartialEq)]
pub enum DataQualityWarning {
    /// Null values were found and repaired; counts are per field, fields with none omitted.
    NullsRepaired { counts: IndexMap<WeatherField, usize> },
    /// Values that could not be read as numbers were treated as nulls and repaired.
    NonNumericCoerced { counts: IndexMap<WeatherField, usize> },
}

fn format_counts(counts: &IndexMap<WeatherField, usize>) -> String {
    counts
        .iter()
        .map(|(field, count)| format!("{field}: {count}"))
        .join(", ")
}

impl Display for DataQualityWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DataQualityWarning::NullsRepaired { counts } => write!(
                f,
                "Warning: null values found and repaired. Count per field: {{{}}}",
                format_counts(counts)
            ),
            DataQualityWarning::NonNumericCoerced { counts } => write!(
                f,
                "Warning: non-numeric values treated as null and repaired. Count per field: {{{}}}",
                format_counts(counts)
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedWeather {
    pub series: WeatherSeries,
    pub warnings: Vec<DataQualityWarning>,
}

pub fn validate(raw: &RawWeatherSeries) -> Result<ValidatedWeather, SchemaError> {
    let missing: Vec<WeatherField> = WeatherField::iter()
        .filter(|field| !raw.has_column(field.as_str()))
        .collect();
    if !missing.is_empty() {
        let schema_error = SchemaError { missing };
        error!("{schema_error}");
        return Err(schema_error);
    }

    let elapsed = elapsed_seconds(raw.timestamps());
    let mut null_counts = IndexMap::new();
    let mut coerced_counts = IndexMap::new();
    let mut repaired = IndexMap::new();

    for field in WeatherField::iter() {
        let cells = raw.column(field.as_str()).unwrap_or_default();
        let nulls = cells.iter().filter(|cell| cell.is_null()).count();
        let values: Vec<Option<f64>> = cells.iter().map(WeatherValue::coerce).collect();
        let unparseable = values.iter().filter(|v| v.is_none()).count() - nulls;

        if nulls > 0 {
            null_counts.insert(field, nulls);
        }
        if unparseable > 0 {
            coerced_counts.insert(field, unparseable);
        }
        repaired.insert(field, interpolate_time_weighted(&elapsed, &values));
    }

    let mut warnings = vec![];
    if !null_counts.is_empty() {
        warnings.push(DataQualityWarning::NullsRepaired {
            counts: null_counts,
        });
    }
    if !coerced_counts.is_empty() {
        warnings.push(DataQualityWarning::NonNumericCoerced {
            counts: coerced_counts,
        });
    }
    for warning in &warnings {
        warn!("{warning}");
    }

    Ok(ValidatedWeather {
        series: WeatherSeries::from_columns(raw.timestamps().to_vec(), &repaired),
        warnings,
    })
}

fn elapsed_seconds(timestamps: &[DateTime<Tz>]) -> Vec<f64> {
    match timestamps.first() {
        Some(first) => timestamps
            .iter()
            .map(|t| t.signed_duration_since(first).num_milliseconds() as f64 / 1000.)
            .collect(),
        None => vec![],
    }
}

/// Fill gaps by linear interpolation against `times`, so unevenly spaced samples
/// are weighted by the real time between them. Gaps at either end of the
/// series are filled with zero.
fn interpolate_time_weighted(times: &[f64], values: &[Option<f64>]) -> Vec<f64> {
    let (valid_times, valid_values): (Vec<f64>, Vec<f64>) = times
        .iter()
        .zip(values)
        .filter_map(|(time, value)| value.map(|value| (*time, value)))
        .unzip();
    let null_times: Vec<f64> = times
        .iter()
        .zip(values)
        .filter(|(_, value)| value.is_none())
        .map(|(time, _)| *time)
        .collect();

    // with fewer than two valid points every gap lies at a boundary
    let mut fills = if valid_times.len() < 2 {
        vec![0.; null_times.len()]
    } else {
        interp_slice(
            &valid_times,
            &valid_values,
            &null_times,
            &InterpMode::Constant(0.),
        )
    }
    .into_iter();

    values
        .iter()
        .map(|value| value.unwrap_or_else(|| fills.next().unwrap_or(0.)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeDelta, TimeZone};
    use chrono_tz::America::Sao_Paulo;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn hours(offsets: &[i64]) -> Vec<DateTime<Tz>> {
        let start = Sao_Paulo.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        offsets
            .iter()
            .map(|h| start + TimeDelta::hours(*h))
            .collect()
    }

    fn series_with(
        timestamps: Vec<DateTime<Tz>>,
        overrides: Vec<(WeatherField, Vec<WeatherValue>)>,
        drop: &[WeatherField],
    ) -> RawWeatherSeries {
        let len = timestamps.len();
        let mut columns: IndexMap<String, Vec<WeatherValue>> = WeatherField::iter()
            .filter(|field| !drop.contains(field))
            .map(|field| (field.to_string(), vec![WeatherValue::Number(1.); len]))
            .collect();
        for (field, values) in overrides {
            columns.insert(field.to_string(), values);
        }
        RawWeatherSeries::new(timestamps, columns).unwrap()
    }

    #[rstest]
    fn test_missing_dni_is_fatal() {
        let raw = series_with(hours(&[0, 1, 2]), vec![], &[WeatherField::Dni]);
        let error = validate(&raw).unwrap_err();

        assert_eq!(error.missing, vec![WeatherField::Dni]);
        assert!(error.to_string().contains("dni"));
    }

    #[rstest]
    fn test_missing_fields_are_all_named() {
        let raw = series_with(
            hours(&[0]),
            vec![],
            &[WeatherField::TempAir, WeatherField::Ghi],
        );
        let error = validate(&raw).unwrap_err();

        assert_eq!(error.missing, vec![WeatherField::Ghi, WeatherField::TempAir]);
        assert!(error.to_string().ends_with("ghi, temp_air"));
    }

    #[rstest]
    fn test_interpolates_single_gap() {
        let raw = series_with(
            hours(&[0, 1, 2]),
            vec![(
                WeatherField::Ghi,
                vec![100.0.into(), WeatherValue::Null, 300.0.into()],
            )],
            &[],
        );
        let validated = validate(&raw).unwrap();

        assert_eq!(validated.series.column(WeatherField::Ghi), vec![100., 200., 300.]);
        assert_eq!(
            validated.warnings,
            vec![DataQualityWarning::NullsRepaired {
                counts: IndexMap::from([(WeatherField::Ghi, 1)])
            }]
        );
    }

    #[rstest]
    fn test_interpolation_is_weighted_by_elapsed_time() {
        // the gap sits one hour after 0 W/m2 and three hours before 400 W/m2
        let raw = series_with(
            hours(&[0, 1, 4]),
            vec![(
                WeatherField::Ghi,
                vec![0.0.into(), WeatherValue::Null, 400.0.into()],
            )],
            &[],
        );
        let validated = validate(&raw).unwrap();

        assert_relative_eq!(validated.series.column(WeatherField::Ghi)[1], 100.);
    }

    #[rstest]
    fn test_boundary_nulls_are_zero() {
        let raw = series_with(
            hours(&[0, 1, 2, 3]),
            vec![(
                WeatherField::TempAir,
                vec![
                    WeatherValue::Null,
                    21.0.into(),
                    23.0.into(),
                    WeatherValue::Null,
                ],
            )],
            &[],
        );
        let validated = validate(&raw).unwrap();

        assert_eq!(
            validated.series.column(WeatherField::TempAir),
            vec![0., 21., 23., 0.]
        );
    }

    #[rstest]
    fn test_all_null_column_becomes_zero() {
        let raw = series_with(
            hours(&[0, 1]),
            vec![(WeatherField::WindSpeed, vec![WeatherValue::Null; 2])],
            &[],
        );
        let validated = validate(&raw).unwrap();

        assert_eq!(validated.series.column(WeatherField::WindSpeed), vec![0., 0.]);
    }

    #[rstest]
    fn test_counts_match_original_nulls_per_field() {
        let raw = series_with(
            hours(&[0, 1, 2, 3, 4]),
            vec![
                (
                    WeatherField::Dhi,
                    vec![
                        10.0.into(),
                        WeatherValue::Null,
                        WeatherValue::Null,
                        40.0.into(),
                        50.0.into(),
                    ],
                ),
                (
                    WeatherField::Dni,
                    vec![
                        WeatherValue::Number(f64::NAN),
                        1.0.into(),
                        1.0.into(),
                        1.0.into(),
                        1.0.into(),
                    ],
                ),
            ],
            &[],
        );
        let validated = validate(&raw).unwrap();

        assert_eq!(
            validated.warnings,
            vec![DataQualityWarning::NullsRepaired {
                counts: IndexMap::from([(WeatherField::Dni, 1), (WeatherField::Dhi, 2)])
            }]
        );
        assert_eq!(
            validated.series.column(WeatherField::Dhi),
            vec![10., 20., 30., 40., 50.]
        );
        assert_eq!(
            validated.warnings[0].to_string(),
            "Warning: null values found and repaired. Count per field: {dni: 1, dhi: 2}"
        );
    }

    #[rstest]
    fn test_non_numeric_values_are_coerced_before_repair() {
        let raw = series_with(
            hours(&[0, 1, 2]),
            vec![(
                WeatherField::Ghi,
                vec![
                    WeatherValue::Text("100".into()),
                    WeatherValue::Text("---".into()),
                    300.0.into(),
                ],
            )],
            &[],
        );
        let validated = validate(&raw).unwrap();

        assert_eq!(validated.series.column(WeatherField::Ghi), vec![100., 200., 300.]);
        assert_eq!(
            validated.warnings,
            vec![DataQualityWarning::NonNumericCoerced {
                counts: IndexMap::from([(WeatherField::Ghi, 1)])
            }]
        );
    }

    #[rstest]
    fn test_clean_series_has_no_warnings() {
        let raw = series_with(hours(&[0, 1, 2]), vec![], &[]);
        let validated = validate(&raw).unwrap();

        assert!(validated.warnings.is_empty());
        assert_eq!(validated.series.timestamps(), raw.timestamps());
    }

    #[rstest]
    fn test_interpolated_values_lie_between_neighbours() {
        let times = [0., 600., 1800., 5400., 7200.];
        let values = [Some(-4.), None, None, None, Some(12.)];
        let result = interpolate_time_weighted(&times, &values);

        for value in &result {
            assert!((-4. ..=12.).contains(value));
        }
        assert!(result.iter().tuple_windows().all(|(a, b)| a <= b));
    }

    #[rstest]
    #[case(&[None, Some(7.), None], vec![0., 7., 0.])]
    #[case(&[None, None], vec![0., 0.])]
    fn test_lone_or_missing_values_fill_with_zero(
        #[case] values: &[Option<f64>],
        #[case] expected: Vec<f64>,
    ) {
        let times: Vec<f64> = (0..values.len()).map(|i| i as f64 * 3600.).collect();

        assert_eq!(interpolate_time_weighted(&times, values), expected);
    }
}
