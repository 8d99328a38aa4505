#![no_main]

use chrono_tz::Tz;
use libfuzzer_sys::fuzz_target;
use pvcast::core::weather_validator::validate;
use pvcast::fetch_weather::parse_forecast_response;

fuzz_target!(|body: &str| {
    if let Ok(raw) = parse_forecast_response(body, Tz::Europe__Berlin) {
        let _ = validate(&raw);
    }
});
