use crate::core::hardware_catalog::{
    HardwareCatalog, InverterParameters, ModuleParameters, ThermalModelFamily,
    ThermalModelParameters,
};
use crate::core::units::{is_valid_azimuth, is_valid_tilt};
use crate::input::PvSystemConfig;
use thiserror::Error;
use tracing::debug;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum SystemSpecError {
    #[error("Unknown component: module '{0}' is not in the hardware catalog")]
    UnknownModule(String),
    #[error("Unknown component: inverter '{0}' is not in the hardware catalog")]
    UnknownInverter(String),
    #[error("Unknown component: no thermal model parameters for family '{family}' with mounting '{mounting}'")]
    UnknownThermalModel {
        family: ThermalModelFamily,
        mounting: String,
    },
    #[error("Surface tilt of {0} degrees is outside the range 0 to 90")]
    TiltOutOfRange(f64),
    #[error("Surface azimuth of {0} degrees is outside the range 0 to 360")]
    AzimuthOutOfRange(f64),
    #[error("Array topology needs at least one module per string and one string per inverter")]
    EmptyTopology,
}

impl SystemSpecError {
    /// Whether this error means a named component could not be resolved.
    pub fn is_unknown_component(&self) -> bool {
        matches!(
            self,
            SystemSpecError::UnknownModule(_)
                | SystemSpecError::UnknownInverter(_)
                | SystemSpecError::UnknownThermalModel { .. }
        )
    }
}

/// A fully resolved PV system: geometry, hardware parameters and array topology.
#[derive(Clone, Debug, PartialEq)]
pub struct PVSystemSpec {
    surface_tilt: f64,
    surface_azimuth: f64,
    module: ModuleParameters,
    inverter: InverterParameters,
    thermal_model: ThermalModelParameters,
    modules_per_string: u32,
    strings_per_inverter: u32,
}

impl PVSystemSpec {
    /// surface tilt from horizontal, degrees
    pub fn surface_tilt(&self) -> f64 {
        self.surface_tilt
    }

    /// surface azimuth, degrees, 180 = north-referenced south facing
    pub fn surface_azimuth(&self) -> f64 {
        self.surface_azimuth
    }

    pub fn module(&self) -> &ModuleParameters {
        &self.module
    }

    pub fn inverter(&self) -> &InverterParameters {
        &self.inverter
    }

    pub fn thermal_model(&self) -> ThermalModelParameters {
        self.thermal_model
    }

    pub fn modules_per_string(&self) -> u32 {
        self.modules_per_string
    }

    pub fn strings_per_inverter(&self) -> u32 {
        self.strings_per_inverter
    }

    pub fn module_count(&self) -> u64 {
        u64::from(self.modules_per_string) * u64::from(self.strings_per_inverter)
    }

    /// Rated DC power of the whole array at standard test conditions, W
    pub fn nameplate_dc_power_w(&self) -> f64 {
        self.module.pmp() * self.module_count() as f64
    }
}

/// Assembles [`PVSystemSpec`] values from configuration and a borrowed catalog.
pub struct SystemSpecBuilder<'a> {
    catalog: &'a HardwareCatalog,
}

impl<'a> SystemSpecBuilder<'a> {
    pub fn new(catalog: &'a HardwareCatalog) -> Self {
        Self { catalog }
    }

    pub fn build(&self, config: &PvSystemConfig) -> Result<PVSystemSpec, SystemSpecError> {
        if !is_valid_tilt(config.surface_tilt) {
            return Err(SystemSpecError::TiltOutOfRange(config.surface_tilt));
        }
        if !is_valid_azimuth(config.surface_azimuth) {
            return Err(SystemSpecError::AzimuthOutOfRange(config.surface_azimuth));
        }
        if config.modules_per_string == 0 || config.strings_per_inverter == 0 {
            return Err(SystemSpecError::EmptyTopology);
        }

        let module = self
            .catalog
            .module(&config.module_name)
            .ok_or_else(|| SystemSpecError::UnknownModule(config.module_name.clone()))?;
        let inverter = self
            .catalog
            .inverter(&config.inverter_name)
            .ok_or_else(|| SystemSpecError::UnknownInverter(config.inverter_name.clone()))?;
        let thermal_model = self
            .catalog
            .thermal_model(config.temperature_model_type, &config.rack_type)
            .ok_or_else(|| SystemSpecError::UnknownThermalModel {
                family: config.temperature_model_type,
                mounting: config.rack_type.clone(),
            })?;

        debug!(
            module = config.module_name.as_str(),
            inverter = config.inverter_name.as_str(),
            "resolved PV system components"
        );

        Ok(PVSystemSpec {
            surface_tilt: config.surface_tilt,
            surface_azimuth: config.surface_azimuth,
            module: module.clone(),
            inverter: inverter.clone(),
            thermal_model,
            modules_per_string: config.modules_per_string,
            strings_per_inverter: config.strings_per_inverter,
        })
    }
}
