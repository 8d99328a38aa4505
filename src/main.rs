use clap::Parser;
use pvcast::core::hardware_catalog::HardwareCatalog;
use pvcast::core::simulation::PerformanceFactorEngine;
use pvcast::errors::{FetchError, PipelineError};
use pvcast::fetch_weather::OpenMeteoSource;
use pvcast::input::{load_config, AppConfig};
use pvcast::output::FileOutput;
use pvcast::read_weather_file::TmyFileSource;
use pvcast::{run_pipeline, write_report, PipelineRun};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct PvcastArgs {
    /// pipeline configuration JSON
    #[arg(long, short, default_value = "config/config.json")]
    config: PathBuf,
    /// hardware catalog JSON; the built-in catalog is used when absent
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// directory to write CSV reports into; nothing is written when absent
    #[arg(long, short)]
    output_dir: Option<PathBuf>,
    /// run the typical meteorological year scenario
    #[arg(long, default_value_t = false)]
    tmy: bool,
    /// run the weather forecast scenario
    #[arg(long, default_value_t = false)]
    forecast: bool,
    #[arg(long, short, default_value_t = false)]
    verbose: bool,
}

#[derive(Clone, Copy, Debug)]
enum Scenario {
    Tmy,
    Forecast,
}

fn main() -> anyhow::Result<ExitCode> {
    let args = PvcastArgs::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&args.config)
        .inspect_err(|e| error!("could not load {}: {e}", args.config.display()))?;
    let catalog = match &args.catalog {
        Some(path) => HardwareCatalog::load(path)
            .inspect_err(|e| error!("could not load {}: {e}", path.display()))?,
        None => HardwareCatalog::builtin(),
    };

    // with no scenario flag, run both
    let scenarios = match (args.tmy, args.forecast) {
        (false, false) | (true, true) => vec![Scenario::Tmy, Scenario::Forecast],
        (true, false) => vec![Scenario::Tmy],
        (false, true) => vec![Scenario::Forecast],
    };

    if let Some(dir) = &args.output_dir {
        fs::create_dir_all(dir)?;
    }

    let mut failures = 0;
    for scenario in scenarios {
        match run_scenario(scenario, &config, &catalog) {
            Ok(run) => {
                print_run(&run);
                if let Some(dir) = &args.output_dir {
                    let output = FileOutput::new(dir.clone(), "{}.{}".to_string());
                    if let Err(e) = write_report(&output, &run) {
                        error!("could not write report for '{}': {e:#}", run.source);
                        failures += 1;
                    }
                }
            }
            Err(e) => {
                eprintln!("{scenario:?} scenario failed: {e}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        info!("{failures} scenario(s) failed");
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

fn run_scenario(
    scenario: Scenario,
    config: &AppConfig,
    catalog: &HardwareCatalog,
) -> Result<PipelineRun, PipelineError> {
    let engine = PerformanceFactorEngine::default();
    match scenario {
        Scenario::Tmy => {
            let path = config.data_sources.tmy_path.as_ref().ok_or_else(|| {
                FetchError::NotConfigured("data_sources.tmy_path is not set".into())
            })?;
            run_pipeline(config, catalog, TmyFileSource::new(path), engine)
        }
        Scenario::Forecast => {
            let source = OpenMeteoSource::new(&config.data_sources.forecast_api)?;
            run_pipeline(config, catalog, source, engine)
        }
    }
}

fn print_run(run: &PipelineRun) {
    for warning in &run.warnings {
        println!("{warning}");
    }
    println!("--- {} ---", run.source);
    println!("Total energy: {:.2} kWh", run.summary.total_energy_kwh);
    println!("Peak power: {:.2} kW", run.summary.peak_power_kw);
    match run.summary.performance_ratio {
        Some(pr) => println!("Performance ratio: {pr:.1} %"),
        None => println!("Performance ratio: N/A"),
    }
}
