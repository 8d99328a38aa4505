//! Reader for PVGIS typical meteorological year (TMY) CSV exports.

use crate::errors::FetchError;
use crate::fetch_weather::WeatherSource;
use crate::input::SimulationWindowConfig;
use crate::weather::{Location, RawWeatherSeries, WeatherField, WeatherValue};
use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use csv::{ReaderBuilder as CsvReaderBuilder, Trim};
use indexmap::IndexMap;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::{error, info};

const HEADER_LINES: usize = 17;
const MAX_ROWS: usize = 8760; // one year of hourly rows
const COLUMN_TIME: &str = "time(UTC)";
const TIME_FORMAT: &str = "%Y%m%d:%H%M";

const COLUMN_FIELDS: [(&str, WeatherField); 5] = [
    ("T2m", WeatherField::TempAir),    // 2 m air temperature in degrees C
    ("G(h)", WeatherField::Ghi),       // global horizontal irradiance in W/m2
    ("Gb(n)", WeatherField::Dni),      // beam normal irradiance in W/m2
    ("Gd(h)", WeatherField::Dhi),      // diffuse horizontal irradiance in W/m2
    ("WS10m", WeatherField::WindSpeed), // 10 m wind speed in m/s
];

/// Read a PVGIS TMY CSV export into a raw series in the given timezone.
///
/// Timestamps in the file are UTC and are all placed in the year of the first
/// row. Columns the file lacks are left out of the
/// result rather than treated as an error here.
pub fn tmy_data_to_series(file: impl Read, tz: Tz) -> Result<RawWeatherSeries, FetchError> {
    let mut reader = BufReader::new(file);
    let mut line = String::new();
    for _ in 0..HEADER_LINES {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
    }

    let mut reader = CsvReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let time_idx = headers
        .iter()
        .position(|h| h == COLUMN_TIME)
        .ok_or_else(|| FetchError::Malformed(format!("no '{COLUMN_TIME}' column")))?;
    let field_indices: Vec<(WeatherField, usize)> = COLUMN_FIELDS
        .iter()
        .filter_map(|(column, field)| {
            headers
                .iter()
                .position(|h| h == *column)
                .map(|idx| (*field, idx))
        })
        .collect();

    let mut timestamps = vec![];
    let mut reference_year = None;
    let mut columns: IndexMap<String, Vec<WeatherValue>> = field_indices
        .iter()
        .map(|(field, _)| (field.to_string(), vec![]))
        .collect();

    for (row, result) in reader.records().take(MAX_ROWS).enumerate() {
        let record = result?;
        let time = record.get(time_idx).unwrap_or_default();
        timestamps.push(
            parse_utc_timestamp(time, &mut reference_year, tz).ok_or_else(|| {
                FetchError::Malformed(format!("row {}: unreadable timestamp '{time}'", row + 1))
            })?,
        );

        for (field, idx) in &field_indices {
            let cell = record.get(*idx).unwrap_or_default();
            if let Some(values) = columns.get_mut(field.as_str()) {
                values.push(parse_cell(cell));
            }
        }
    }

    Ok(RawWeatherSeries::new(timestamps, columns)?)
}

/// Each month of a TMY file is drawn from its own source year, so every row is
/// moved onto the year of the first row.
fn parse_utc_timestamp(
    cell: &str,
    reference_year: &mut Option<i32>,
    tz: Tz,
) -> Option<DateTime<Tz>> {
    let naive = NaiveDateTime::parse_from_str(cell, TIME_FORMAT).ok()?;
    let year = *reference_year.get_or_insert(naive.year());
    let naive = naive.with_year(year)?;

    Some(Utc.from_utc_datetime(&naive).with_timezone(&tz))
}

fn parse_cell(cell: &str) -> WeatherValue {
    if cell.is_empty() {
        WeatherValue::Null
    } else {
        cell.parse()
            .map(WeatherValue::Number)
            .unwrap_or_else(|_| WeatherValue::Text(cell.to_string()))
    }
}

pub fn load_pvgis_tmy(path: impl AsRef<Path>, tz: Tz) -> Result<RawWeatherSeries, FetchError> {
    let path = path.as_ref();
    info!("loading PVGIS TMY data from {}", path.display());

    let file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => FetchError::FileNotFound(path.to_path_buf()),
        _ => FetchError::Io(e),
    })?;
    let series = tmy_data_to_series(file, tz).inspect_err(|e| error!("{e}"))?;
    info!(rows = series.len(), "PVGIS TMY data loaded");

    Ok(series)
}

/// Weather source backed by a PVGIS TMY file. The file covers a whole
/// typical year, so the requested window is not applied.
#[derive(Clone, Debug)]
pub struct TmyFileSource {
    path: PathBuf,
}

impl TmyFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl WeatherSource for TmyFileSource {
    fn name(&self) -> &str {
        "tmy"
    }

    fn fetch(
        &self,
        location: &Location,
        _window: &SimulationWindowConfig,
    ) -> Result<RawWeatherSeries, FetchError> {
        load_pvgis_tmy(&self.path, location.timezone())
    }
}
