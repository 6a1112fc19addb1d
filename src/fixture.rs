//! Fixtures for tests

use crate::demand::DemandSeries;
use crate::model::{Model, ModelParameters};
use crate::technology::{TechnologyID, TechnologyProfiles};
use rstest::fixture;
use std::f64::consts::PI;
use std::path::PathBuf;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!($result.unwrap_err().to_string(), $msg);
    };
}
pub(crate) use assert_error;

/// A daily cycle between 60% and 100% of `peak`, reaching the peak at `peak_hour`
fn daily_cycle(peak: f64, peak_hour: u32, n_hours: u32) -> Vec<f64> {
    (0..n_hours)
        .map(|hour| {
            let phase = 2.0 * PI * (f64::from(hour) - f64::from(peak_hour)) / 24.0;
            peak * (0.6 + 0.4 * phase.cos())
        })
        .collect()
}

/// A day of demand with peaks of 10 MW heat, 5 MW light and 100 kg/h CO2
#[fixture]
pub fn demand() -> DemandSeries {
    const N_HOURS: u32 = 24;
    DemandSeries::new(
        (0..N_HOURS).collect(),
        daily_cycle(10.0, 0, N_HOURS),
        daily_cycle(5.0, 12, N_HOURS),
        daily_cycle(100.0, 12, N_HOURS),
    )
    .unwrap()
}

/// The same demand as [`demand`] but with no need for heat
#[fixture]
pub fn demand_without_heat(demand: DemandSeries) -> DemandSeries {
    let n_hours = demand.len();
    DemandSeries::new(
        demand.hours,
        vec![0.0; n_hours],
        demand.light,
        demand.co2,
    )
    .unwrap()
}

#[fixture]
pub fn profiles(demand: DemandSeries) -> TechnologyProfiles {
    TechnologyProfiles::new(&demand, &[], ModelParameters::default().capacity_margin)
}

/// Profiles where only CHP and the grid may be used
#[fixture]
pub fn chp_and_grid_profiles(demand: DemandSeries) -> TechnologyProfiles {
    let disabled = [
        TechnologyID::Geothermal,
        TechnologyID::Gshp,
        TechnologyID::Solar,
        TechnologyID::WasteHeat,
        TechnologyID::Boiler,
        TechnologyID::Co2Import,
    ];
    TechnologyProfiles::new(&demand, &disabled, ModelParameters::default().capacity_margin)
}

/// A model with short annealing runs
#[fixture]
pub fn model(demand: DemandSeries) -> Model {
    Model {
        model_path: PathBuf::from("model"),
        parameters: ModelParameters {
            max_iterations: 10,
            ..ModelParameters::default()
        },
        demand,
    }
}
