#![no_main]

use chrono_tz::Tz;
use libfuzzer_sys::fuzz_target;
use pvcast::core::weather_validator::validate;
use pvcast::read_weather_file::tmy_data_to_series;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = tmy_data_to_series(Cursor::new(data), Tz::UTC) {
        let _ = validate(&raw);
    }
});
