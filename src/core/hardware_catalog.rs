//! Lookup of module, inverter and thermal-model parameters by name.
//!
//! The catalog is built once and then only read, so a single instance can be
//! shared by reference between every pipeline run in the process.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use strum::{Display, EnumString};
use thiserror::Error;

/// Electrical parameters of a PV module at standard test conditions.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModuleParameters {
    /// current at maximum power point, A
    #[serde(rename = "Impo")]
    pub impo: f64,
    /// voltage at maximum power point, V
    #[serde(rename = "Vmpo")]
    pub vmpo: f64,
    /// relative change in maximum power per degree C of cell temperature
    #[serde(rename = "gamma_pdc", default = "default_gamma_pdc")]
    pub gamma_pdc: f64,
    /// module area, m2
    #[serde(rename = "Area", default)]
    pub area: Option<f64>,
}

fn default_gamma_pdc() -> f64 {
    -0.004
}

impl ModuleParameters {
    /// maximum power at standard test conditions, W
    pub fn pmp(&self) -> f64 {
        self.impo * self.vmpo
    }
}

/// Electrical parameters of an inverter.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct InverterParameters {
    /// rated AC output, W
    #[serde(rename = "Paco")]
    pub paco: f64,
    /// DC input at which rated AC output is reached, W
    #[serde(rename = "Pdco")]
    pub pdco: f64,
    /// DC power needed to start inversion, W
    #[serde(rename = "Pso", default)]
    pub pso: f64,
}

impl InverterParameters {
    pub fn nominal_efficiency(&self) -> f64 {
        if self.pdco > 0. {
            self.paco / self.pdco
        } else {
            0.
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ThermalModelFamily {
    Sapm,
    Pvsyst,
}

/// Parameters for estimating cell temperature from weather.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ThermalModelParameters {
    /// Sandia array performance model: module temperature `E·exp(a + b·WS) + Ta`,
    /// cell temperature adds `E/1000·deltaT`.
    Sapm { a: f64, b: f64, delta_t: f64 },
    /// PVsyst heat loss model: `Ta + E·alpha·(1 - eta)/(u_c + u_v·WS)`.
    Pvsyst { u_c: f64, u_v: f64 },
}

const PVSYST_ABSORPTION: f64 = 0.9;
const PVSYST_MODULE_EFFICIENCY: f64 = 0.1;

impl ThermalModelParameters {
    /// Cell temperature in degrees C for the given plane irradiance (W/m2),
    /// air temperature (degrees C) and wind speed (m/s).
    pub fn cell_temperature(&self, irradiance: f64, temp_air: f64, wind_speed: f64) -> f64 {
        match *self {
            ThermalModelParameters::Sapm { a, b, delta_t } => {
                let module_temperature = irradiance * (a + b * wind_speed).exp() + temp_air;
                module_temperature + irradiance / 1000. * delta_t
            }
            ThermalModelParameters::Pvsyst { u_c, u_v } => {
                let heat_loss = u_c + u_v * wind_speed;
                temp_air
                    + irradiance * PVSYST_ABSORPTION * (1. - PVSYST_MODULE_EFFICIENCY) / heat_loss
            }
        }
    }
}

// Published SAPM and PVsyst mounting configurations.
const THERMAL_MODEL_TABLE: [(ThermalModelFamily, &str, ThermalModelParameters); 6] = [
    (
        ThermalModelFamily::Sapm,
        "open_rack_glass_glass",
        ThermalModelParameters::Sapm {
            a: -3.47,
            b: -0.0594,
            delta_t: 3.,
        },
    ),
    (
        ThermalModelFamily::Sapm,
        "close_mount_glass_glass",
        ThermalModelParameters::Sapm {
            a: -2.98,
            b: -0.0471,
            delta_t: 1.,
        },
    ),
    (
        ThermalModelFamily::Sapm,
        "open_rack_glass_polymer",
        ThermalModelParameters::Sapm {
            a: -3.56,
            b: -0.075,
            delta_t: 3.,
        },
    ),
    (
        ThermalModelFamily::Sapm,
        "insulated_back_glass_polymer",
        ThermalModelParameters::Sapm {
            a: -2.81,
            b: -0.0455,
            delta_t: 0.,
        },
    ),
    (
        ThermalModelFamily::Pvsyst,
        "freestanding",
        ThermalModelParameters::Pvsyst { u_c: 29., u_v: 0. },
    ),
    (
        ThermalModelFamily::Pvsyst,
        "insulated",
        ThermalModelParameters::Pvsyst { u_c: 15., u_v: 0. },
    ),
];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Could not parse hardware catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Could not read hardware catalog: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogDocument {
    #[serde(default)]
    modules: IndexMap<String, ModuleParameters>,
    #[serde(default)]
    inverters: IndexMap<String, InverterParameters>,
}

#[derive(Clone, Debug)]
pub struct HardwareCatalog {
    modules: IndexMap<String, ModuleParameters>,
    inverters: IndexMap<String, InverterParameters>,
}

impl HardwareCatalog {
    pub fn new(
        modules: IndexMap<String, ModuleParameters>,
        inverters: IndexMap<String, InverterParameters>,
    ) -> Self {
        Self { modules, inverters }
    }

    /// Load a catalog from a JSON document of the form
    /// `{"modules": {name: {...}}, "inverters": {name: {...}}}`.
    pub fn from_reader(reader: impl Read) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_reader(reader)?;

        Ok(Self::new(document.modules, document.inverters))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// A small catalog of reference components, used when no catalog file is given.
    pub fn builtin() -> Self {
        Self::new(
            IndexMap::from([
                (
                    "Canadian_Solar_CS5P_220M___2009_".to_string(),
                    ModuleParameters {
                        impo: 4.54629,
                        vmpo: 48.3156,
                        gamma_pdc: -0.0043,
                        area: Some(1.701),
                    },
                ),
                (
                    "Canadian_Solar_CS6K_275M".to_string(),
                    ModuleParameters {
                        impo: 8.9,
                        vmpo: 31.0,
                        gamma_pdc: -0.0041,
                        area: Some(1.62),
                    },
                ),
            ]),
            IndexMap::from([
                (
                    "SMA_America__SB5000TL_US_22__240V_".to_string(),
                    InverterParameters {
                        paco: 5000.,
                        pdco: 5180.94,
                        pso: 24.16,
                    },
                ),
                (
                    "ABB__MICRO_0_25_I_OUTD_US_208__208V_".to_string(),
                    InverterParameters {
                        paco: 250.,
                        pdco: 259.52,
                        pso: 2.09,
                    },
                ),
            ]),
        )
    }

    pub fn module(&self, name: &str) -> Option<&ModuleParameters> {
        self.modules.get(name)
    }

    pub fn inverter(&self, name: &str) -> Option<&InverterParameters> {
        self.inverters.get(name)
    }

    pub fn thermal_model(
        &self,
        family: ThermalModelFamily,
        mounting: &str,
    ) -> Option<ThermalModelParameters> {
        THERMAL_MODEL_TABLE
            .iter()
            .find(|(f, m, _)| *f == family && *m == mounting)
            .map(|(_, _, parameters)| *parameters)
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    pub fn inverter_names(&self) -> impl Iterator<Item = &str> {
        self.inverters.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::*;
    use std::io::Cursor;

    #[fixture]
    fn catalog() -> HardwareCatalog {
        HardwareCatalog::builtin()
    }

    #[rstest]
    fn test_builtin_lookup(catalog: HardwareCatalog) {
        assert!(catalog.module("Canadian_Solar_CS5P_220M___2009_").is_some());
        assert!(catalog
            .inverter("SMA_America__SB5000TL_US_22__240V_")
            .is_some());
        assert!(catalog.module("No_Such_Module").is_none());
    }

    #[rstest]
    #[case(ThermalModelFamily::Sapm, "open_rack_glass_glass", true)]
    #[case(ThermalModelFamily::Sapm, "insulated_back_glass_polymer", true)]
    #[case(ThermalModelFamily::Pvsyst, "freestanding", true)]
    #[case(ThermalModelFamily::Pvsyst, "open_rack_glass_glass", false)]
    #[case(ThermalModelFamily::Sapm, "rooftop", false)]
    fn test_thermal_model_lookup(
        catalog: HardwareCatalog,
        #[case] family: ThermalModelFamily,
        #[case] mounting: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(catalog.thermal_model(family, mounting).is_some(), expected);
    }

    #[rstest]
    fn test_sapm_cell_temperature() {
        let parameters = ThermalModelParameters::Sapm {
            a: -3.47,
            b: -0.0594,
            delta_t: 3.,
        };
        // module: 800 * exp(-3.47 - 0.0594) + 20, cell adds 0.8 * 3
        assert_relative_eq!(
            parameters.cell_temperature(800., 20., 1.),
            800. * (-3.5294f64).exp() + 20. + 2.4,
            max_relative = 1e-12
        );
        assert_eq!(parameters.cell_temperature(0., 12.5, 3.), 12.5);
    }

    #[rstest]
    fn test_pvsyst_cell_temperature() {
        let parameters = ThermalModelParameters::Pvsyst { u_c: 29., u_v: 0. };
        assert_relative_eq!(
            parameters.cell_temperature(1000., 25., 2.),
            25. + 1000. * 0.9 * 0.9 / 29.,
            max_relative = 1e-12
        );
    }

    #[rstest]
    fn test_from_reader() {
        let json = r#"{
            "modules": {"Test_Module": {"Impo": 5.0, "Vmpo": 40.0}},
            "inverters": {"Test_Inverter": {"Paco": 3000.0, "Pdco": 3100.0, "Pso": 20.0}}
        }"#;
        let catalog = HardwareCatalog::from_reader(Cursor::new(json)).unwrap();

        let module = catalog.module("Test_Module").unwrap();
        assert_eq!(module.pmp(), 200.);
        assert_eq!(module.gamma_pdc, -0.004);
        assert_eq!(
            catalog.inverter_names().collect::<Vec<_>>(),
            vec!["Test_Inverter"]
        );
    }

    #[rstest]
    fn test_from_reader_rejects_unknown_fields() {
        let json = r#"{"modules": {"M": {"Impo": 1.0, "Vmpo": 1.0, "Colour": "blue"}}}"#;

        assert!(matches!(
            HardwareCatalog::from_reader(Cursor::new(json)),
            Err(CatalogError::Parse(_))
        ));
    }
}
