pub mod hardware_catalog;
pub mod metrics;
pub mod simulation;
pub mod system_spec;
pub mod units;
pub mod weather_validator;
