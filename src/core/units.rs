pub const WATTS_PER_KILOWATT: u32 = 1_000;
pub const SECONDS_PER_HOUR: u32 = 3_600;

/// irradiance at standard test conditions, W/m2
pub const STC_IRRADIANCE: f64 = 1_000.;
/// cell temperature at standard test conditions, degrees C
pub const STC_CELL_TEMPERATURE: f64 = 25.;

pub const MAX_SURFACE_TILT: f64 = 90.;
pub const MAX_SURFACE_AZIMUTH: f64 = 360.;

pub(crate) fn watts_to_kilowatts(watts: f64) -> f64 {
    watts / WATTS_PER_KILOWATT as f64
}

pub(crate) fn is_valid_tilt(tilt: f64) -> bool {
    (0. ..=MAX_SURFACE_TILT).contains(&tilt)
}

pub(crate) fn is_valid_azimuth(azimuth: f64) -> bool {
    (0. ..=MAX_SURFACE_AZIMUTH).contains(&azimuth)
}
