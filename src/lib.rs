pub mod core;
pub mod errors;
pub mod fetch_weather;
pub mod input;
pub mod output;
pub mod read_weather_file;
pub mod weather;

use crate::core::hardware_catalog::HardwareCatalog;
use crate::core::metrics::{summarize, PerformanceSummary};
use crate::core::simulation::{SimulationEngine, SimulationFailure, SimulationResult};
use crate::core::system_spec::{PVSystemSpec, SystemSpecBuilder};
use crate::core::weather_validator::{validate, DataQualityWarning, ValidatedWeather};
use crate::errors::PipelineError;
use crate::fetch_weather::WeatherSource;
use crate::input::AppConfig;
use crate::output::Output;
use crate::weather::Location;
use csv::WriterBuilder;
use tracing::{error, info};

/// Everything produced by one successful pipeline run.
#[derive(Debug)]
pub struct PipelineRun {
    /// label of the weather source the run used
    pub source: String,
    pub spec: PVSystemSpec,
    pub result: SimulationResult,
    pub summary: PerformanceSummary,
    /// data-quality findings on the weather, none of which stopped the run
    pub warnings: Vec<DataQualityWarning>,
}

/// Build the PV system, acquire and repair weather, simulate, and summarise.
///
/// The system is assembled before any weather is requested, so an unknown
/// component fails the run without touching the network. Any fatal error is
/// logged here with its context and returned; nothing partial is returned.
pub fn run_pipeline(
    config: &AppConfig,
    catalog: &HardwareCatalog,
    source: impl WeatherSource,
    engine: impl SimulationEngine,
) -> Result<PipelineRun, PipelineError> {
    let source_name = source.name().to_string();
    info!(source = source_name.as_str(), "starting pipeline run");

    run_stages(config, catalog, &source, &engine).inspect_err(|e| {
        error!(source = source_name.as_str(), "pipeline run failed: {e}");
    })
}

fn run_stages(
    config: &AppConfig,
    catalog: &HardwareCatalog,
    source: &impl WeatherSource,
    engine: &impl SimulationEngine,
) -> Result<PipelineRun, PipelineError> {
    let location = Location::from(&config.location);

    let spec = SystemSpecBuilder::new(catalog).build(&config.pv_system)?;
    info!(
        nameplate_dc_power_w = spec.nameplate_dc_power_w(),
        "PV system assembled"
    );

    let raw = source.fetch(&location, &config.simulation_window)?;
    let ValidatedWeather { series, warnings } = validate(&raw)?;

    info!("starting simulation with {} timesteps", series.len());
    let result = engine.simulate(&spec, &location, &series)?;
    if result.timestamps() != series.timestamps() {
        return Err(SimulationFailure::Misaligned(format!(
            "engine returned {} timesteps for {} inputs or reordered them",
            result.len(),
            series.len()
        ))
        .into());
    }
    info!("simulation complete");

    let summary = summarize(&result, spec.nameplate_dc_power_w());
    info!(
        "total AC energy for '{}': {:.2} kWh",
        source.name(),
        summary.total_energy_kwh
    );

    Ok(PipelineRun {
        source: source.name().to_string(),
        spec,
        result,
        summary,
        warnings,
    })
}

/// Write the AC power series and the summary figures of a run as CSV.
pub fn write_report(output: impl Output, run: &PipelineRun) -> anyhow::Result<()> {
    if output.is_noop() {
        return Ok(());
    }

    let ac_key = format!("{}_ac_power", run.source);
    info!("writing out to {ac_key}");
    let mut writer =
        WriterBuilder::new().from_writer(output.writer_for_location_key(&ac_key, "csv")?);
    writer.write_record(["timestamp", "ac_power_w"])?;
    for (timestamp, power) in run.result.timestamps().iter().zip(run.result.ac_power()) {
        writer.write_record([timestamp.to_rfc3339(), power.to_string()])?;
    }
    writer.flush()?;

    let summary_key = format!("{}_summary", run.source);
    info!("writing out to {summary_key}");
    let mut writer =
        WriterBuilder::new().from_writer(output.writer_for_location_key(&summary_key, "csv")?);
    let PerformanceSummary {
        total_energy_kwh,
        peak_power_kw,
        performance_ratio,
    } = run.summary;
    writer.write_record(["metric", "value", "unit"])?;
    let rows = [
        ("total_energy", format!("{total_energy_kwh:.3}"), "kWh"),
        ("peak_power", format!("{peak_power_kw:.3}"), "kW"),
        (
            "performance_ratio",
            performance_ratio.map_or("N/A".to_string(), |pr| format!("{pr:.1}")),
            "%",
        ),
    ];
    for (metric, value, unit) in rows {
        writer.write_record([metric, value.as_str(), unit])?;
    }
    writer.flush()?;

    Ok(())
}
