use crate::core::system_spec::PVSystemSpec;
use crate::core::units::{STC_CELL_TEMPERATURE, STC_IRRADIANCE};
use crate::weather::{Location, WeatherSeries};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SimulationFailure {
    #[error("Simulation engine failed: {0}")]
    Engine(String),
    #[error("Simulation result is not aligned with its weather input: {0}")]
    Misaligned(String),
}

/// Output of a simulation, indexed by the timestamps of the weather it was run on.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationResult {
    weather: WeatherSeries,
    ac_power: Vec<f64>,
    dc_power: Option<Vec<f64>>,
    poa_global: Option<Vec<f64>>,
}

impl SimulationResult {
    /// Every series given must have exactly one value per weather timestep.
    pub fn new(
        weather: WeatherSeries,
        ac_power: Vec<f64>,
        dc_power: Option<Vec<f64>>,
        poa_global: Option<Vec<f64>>,
    ) -> Result<Self, SimulationFailure> {
        let expected = weather.len();
        let series = [
            ("ac_power", Some(&ac_power)),
            ("dc_power", dc_power.as_ref()),
            ("poa_global", poa_global.as_ref()),
        ];
        for (name, values) in series {
            if let Some(values) = values {
                if values.len() != expected {
                    return Err(SimulationFailure::Misaligned(format!(
                        "{name} has {} values for {expected} timesteps",
                        values.len()
                    )));
                }
            }
        }

        Ok(Self {
            weather,
            ac_power,
            dc_power,
            poa_global,
        })
    }

    pub fn timestamps(&self) -> &[chrono::DateTime<chrono_tz::Tz>] {
        self.weather.timestamps()
    }

    /// AC power per timestep, W
    pub fn ac_power(&self) -> &[f64] {
        &self.ac_power
    }

    /// DC power per timestep, W
    pub fn dc_power(&self) -> Option<&[f64]> {
        self.dc_power.as_deref()
    }

    /// plane-of-array global irradiance per timestep, W/m2
    pub fn poa_global(&self) -> Option<&[f64]> {
        self.poa_global.as_deref()
    }

    /// The weather the simulation actually ran on, after repair.
    pub fn weather(&self) -> &WeatherSeries {
        &self.weather
    }

    pub fn len(&self) -> usize {
        self.ac_power.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ac_power.is_empty()
    }
}

/// A physical PV simulation, used as a black box.
///
/// Implementations must be deterministic, return one value per input timestep
/// in input order, keep AC power within `0..=Paco`, and yield zero power when
/// there is no irradiance.
pub trait SimulationEngine {
    fn simulate(
        &self,
        spec: &PVSystemSpec,
        location: &Location,
        weather: &WeatherSeries,
    ) -> Result<SimulationResult, SimulationFailure>;
}

impl<T: SimulationEngine + ?Sized> SimulationEngine for &T {
    fn simulate(
        &self,
        spec: &PVSystemSpec,
        location: &Location,
        weather: &WeatherSeries,
    ) -> Result<SimulationResult, SimulationFailure> {
        (**self).simulate(spec, location, weather)
    }
}

/// Balance-of-system performance factor for a moderately ventilated array.
const DEFAULT_PERFORMANCE_FACTOR: f64 = 0.85;

/// A lightweight engine that treats global horizontal irradiance as the
/// irradiance on the array and applies the array's thermal model, a linear
/// power temperature coefficient, a fixed performance factor and inverter
/// start-up threshold and clipping.
///
/// It does no solar geometry or transposition, so tilt and azimuth do not
/// affect its output.
#[derive(Clone, Copy, Debug)]
pub struct PerformanceFactorEngine {
    performance_factor: f64,
}

impl PerformanceFactorEngine {
    pub fn new(performance_factor: f64) -> Self {
        Self { performance_factor }
    }
}

impl Default for PerformanceFactorEngine {
    fn default() -> Self {
        Self::new(DEFAULT_PERFORMANCE_FACTOR)
    }
}

impl SimulationEngine for PerformanceFactorEngine {
    fn simulate(
        &self,
        spec: &PVSystemSpec,
        _location: &Location,
        weather: &WeatherSeries,
    ) -> Result<SimulationResult, SimulationFailure> {
        if !(0. ..=1.).contains(&self.performance_factor) {
            return Err(SimulationFailure::Engine(format!(
                "performance factor {} must be between 0 and 1",
                self.performance_factor
            )));
        }

        let nameplate = spec.nameplate_dc_power_w();
        let gamma = spec.module().gamma_pdc;
        let thermal_model = spec.thermal_model();
        let inverter = spec.inverter();
        let efficiency = inverter.nominal_efficiency();

        let mut poa_global = Vec::with_capacity(weather.len());
        let mut dc_power = Vec::with_capacity(weather.len());
        let mut ac_power = Vec::with_capacity(weather.len());

        for observation in weather.observations() {
            let poa = observation.ghi.max(0.);
            let cell_temperature =
                thermal_model.cell_temperature(poa, observation.temp_air, observation.wind_speed.max(0.));
            let temperature_factor = 1. + gamma * (cell_temperature - STC_CELL_TEMPERATURE);
            let dc = (nameplate * poa / STC_IRRADIANCE
                * temperature_factor
                * self.performance_factor)
                .max(0.);
            let ac = if dc <= inverter.pso {
                0.
            } else {
                (dc * efficiency).clamp(0., inverter.paco)
            };

            poa_global.push(poa);
            dc_power.push(dc);
            ac_power.push(ac);
        }

        SimulationResult::new(weather.clone(), ac_power, Some(dc_power), Some(poa_global))
    }
}
