use crate::core::simulation::SimulationResult;
use crate::core::units::watts_to_kilowatts;
use crate::weather::step_durations_hours;
use fsum::FSum;

/// Headline performance figures for one simulation run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PerformanceSummary {
    /// AC energy over the run, kWh
    pub total_energy_kwh: f64,
    /// highest AC power sample, kW
    pub peak_power_kw: f64,
    /// percent; `None` when plane-of-array irradiance is unavailable or sums to zero
    pub performance_ratio: Option<f64>,
}

/// Reduce a simulation result to its summary figures.
///
/// Energies are integrated over the real timestep of each sample, so the
/// figures hold for any cadence and not only hourly data.
pub fn summarize(result: &SimulationResult, nameplate_dc_power_w: f64) -> PerformanceSummary {
    let durations = step_durations_hours(result.timestamps());

    // Wh
    let ac_energy = integrate(result.ac_power(), &durations);
    let total_energy_kwh = watts_to_kilowatts(ac_energy);

    let peak_power_kw = watts_to_kilowatts(
        result
            .ac_power()
            .iter()
            .copied()
            .reduce(f64::max)
            .unwrap_or(0.),
    );

    let performance_ratio = result.poa_global().and_then(|poa| {
        // kWh/m2
        let poa_irradiation = watts_to_kilowatts(integrate(poa, &durations));
        let reference_yield = poa_irradiation * watts_to_kilowatts(nameplate_dc_power_w);
        (poa_irradiation > 0. && reference_yield > 0.)
            .then(|| total_energy_kwh / reference_yield * 100.)
    });

    PerformanceSummary {
        total_energy_kwh,
        peak_power_kw,
        performance_ratio,
    }
}

fn integrate(values: &[f64], durations: &[f64]) -> f64 {
    FSum::with_all(
        values
            .iter()
            .zip(durations)
            .map(|(value, hours)| value * hours),
    )
    .value()
}
