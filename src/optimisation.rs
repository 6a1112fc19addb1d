//! Code for choosing the capacity of each technology.
//!
//! The search space is a [`CapacityVector`] with one dimension per technology. Each candidate is
//! scored by a penalised objective (annualised cost plus quadratic penalties for unmet peak
//! demand) and the space is explored by repeated runs of simulated annealing from hand-picked
//! starting mixes.
use crate::model::Model;
use crate::output::metadata::write_metadata;
use crate::output::{DataWriter, Results, TIMESTAMP_FORMAT, write_results};
use crate::technology::{
    BOILER_FUEL_TO_HEAT_EFFICIENCY, CARBON_CAPTURE_EFFICIENCY, CHP_CARBON_CAPTURE_POWER,
    CHP_FUEL_TO_ELECTRIC_EFFICIENCY, CHP_HEAT_TO_ELECTRIC_RATIO, GAS_CO2_PER_MWH, N_TECHNOLOGIES,
    SOLAR_CAPACITY_FACTOR, TechnologyID, WASTE_HEAT_EXCHANGER_EFFICIENCY,
};
use anyhow::{Context, Result};
use chrono::Local;
use indexmap::IndexMap;
use log::{info, warn};
use search::{BestResult, Optimiser};
use serde::Serialize;
use std::ops::{Index, IndexMut};
use std::path::Path;
use strum::IntoEnumIterator;

pub mod annealing;
pub mod convergence;
pub mod cost;
pub mod objective;
pub mod search;

/// The capacity of each technology, in [`TechnologyID`] order.
///
/// Capacities are in MW, except for CO2 import which is in kg/h.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CapacityVector(pub [f64; N_TECHNOLOGIES]);

impl CapacityVector {
    /// Iterate over technologies and their capacities
    pub fn iter(&self) -> impl Iterator<Item = (TechnologyID, f64)> + '_ {
        TechnologyID::iter().zip(self.0.iter().copied())
    }

    /// Capacities keyed by technology
    pub fn to_map(&self) -> IndexMap<TechnologyID, f64> {
        self.iter().collect()
    }

    /// Clamp each capacity into the given bounds
    pub fn clamp(&self, bounds: &[(f64, f64); N_TECHNOLOGIES]) -> Self {
        let mut clamped = *self;
        for (x, (lower, upper)) in clamped.0.iter_mut().zip(bounds) {
            *x = x.clamp(*lower, *upper);
        }

        clamped
    }
}

impl FromIterator<(TechnologyID, f64)> for CapacityVector {
    fn from_iter<I: IntoIterator<Item = (TechnologyID, f64)>>(iter: I) -> Self {
        let mut capacities = Self::default();
        for (id, capacity) in iter {
            capacities[id] = capacity;
        }

        capacities
    }
}

impl Index<TechnologyID> for CapacityVector {
    type Output = f64;

    fn index(&self, id: TechnologyID) -> &f64 {
        &self.0[id.index()]
    }
}

impl IndexMut<TechnologyID> for CapacityVector {
    fn index_mut(&mut self, id: TechnologyID) -> &mut f64 {
        &mut self.0[id.index()]
    }
}

/// Peak heat, light and CO2 delivered by a capacity vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SupplyTotals {
    /// Heat (MW)
    pub heat: f64,
    /// Electricity for lighting (MW)
    pub light: f64,
    /// CO2 delivered to the greenhouse (kg/h)
    pub co2: f64,
}

/// Calculate the heat, light and CO2 supplied by the given capacities
pub fn aggregate_supply(capacities: &CapacityVector) -> SupplyTotals {
    let c = |id: TechnologyID| capacities[id];

    let heat = c(TechnologyID::Chp) * CHP_HEAT_TO_ELECTRIC_RATIO
        + c(TechnologyID::Geothermal)
        + c(TechnologyID::Gshp)
        + c(TechnologyID::WasteHeat) * WASTE_HEAT_EXCHANGER_EFFICIENCY
        + c(TechnologyID::Boiler);
    let light = c(TechnologyID::Chp) * (1.0 - CHP_CARBON_CAPTURE_POWER)
        + c(TechnologyID::Solar) * SOLAR_CAPACITY_FACTOR
        + c(TechnologyID::Grid);
    let co2 = c(TechnologyID::Chp) / CHP_FUEL_TO_ELECTRIC_EFFICIENCY
        * GAS_CO2_PER_MWH
        * CARBON_CAPTURE_EFFICIENCY
        + c(TechnologyID::Boiler) * GAS_CO2_PER_MWH * BOILER_FUEL_TO_HEAT_EFFICIENCY
        + c(TechnologyID::Co2Import);

    SupplyTotals { heat, light, co2 }
}

/// Weights of the quadratic penalties applied to unmet peak demand
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenaltyWeights {
    /// Weight for heat
    pub heat: f64,
    /// Weight for light
    pub light: f64,
    /// Weight for CO2
    pub co2: f64,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            heat: 1e12,
            light: 1e12,
            co2: 1e10,
        }
    }
}

/// Find the cheapest capacity vector for the model and write the results to `output_path`.
///
/// # Arguments
///
/// * `model` - The model to optimise
/// * `output_path` - The folder to which output files will be written
/// * `debug_model` - Whether to write the hourly dispatch of the best solution
pub fn run(model: &Model, output_path: &Path, debug_model: bool) -> Result<BestResult> {
    let profiles = model.technology_profiles();
    for profile in profiles.iter().filter(|profile| profile.enabled) {
        info!(
            "{}: rated power {:.4}, upper bound {:.4}",
            profile.id, profile.rated_power, profile.upper_bound
        );
    }

    let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
    write_metadata(output_path, &model.model_path, model.parameters.seed)
        .context("Failed to write metadata")?;

    let mut optimiser = Optimiser::new(model, &profiles);
    let best = optimiser.optimise();
    let state = optimiser.into_state();

    let results = Results::new(&best, &profiles, model.demand.requirements());
    if !results.feasible {
        warn!("The best solution found does not meet peak demand");
    }
    for (id, capacity) in best.capacities.iter().filter(|(_, capacity)| *capacity > 0.0) {
        info!("{id}: {capacity:.4}");
    }

    let mut writer = DataWriter::create(output_path, &timestamp, debug_model)?;
    writer.write_local_minima(state.local_minima())?;
    writer.write_evaluations(&state.evaluations)?;
    writer.write_dispatch(&model.demand, &profiles, &best.capacities)?;
    writer.flush()?;
    write_results(output_path, &results)?;

    Ok(best)
}
