//! Technologies which can supply the greenhouse with heat, light and CO2.
//!
//! Each technology has a profile which is computed once from the demand series: how big it needs
//! to be to meet peak demand on its own, how far the optimiser may size it and what it produces,
//! burns and emits per year when running at that rated power.
use crate::demand::DemandSeries;
use crate::optimisation::cost::EvaluationError;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::ops::Index;
use strum::{EnumCount, EnumIter, IntoEnumIterator};

pub mod cost;
pub mod supply;

/// The upper bound given to the capacity of a disabled technology.
///
/// Disabled technologies stay in the search space so that the capacity vector always has the same
/// shape, but they can only be given a negligible capacity.
pub const DISABLED_CAPACITY_BOUND: f64 = 1e-6;

/// CO2 emitted per MWh of natural gas burned (kg)
pub const GAS_CO2_PER_MWH: f64 = 184.0;
/// CO2 emitted per MWh of electricity taken from the grid (kg)
pub const GRID_CO2_PER_MWH: f64 = 332.0;
/// Fraction of the flue gas CO2 recovered by carbon capture
pub const CARBON_CAPTURE_EFFICIENCY: f64 = 0.96;

/// MWh of heat produced by CHP per MWh of electricity
pub const CHP_HEAT_TO_ELECTRIC_RATIO: f64 = 1.51;
/// MWh of electricity produced by CHP per MWh of gas
pub const CHP_FUEL_TO_ELECTRIC_EFFICIENCY: f64 = 0.333;
/// MWh of heat produced by CHP per MWh of gas
pub const CHP_FUEL_TO_HEAT_EFFICIENCY: f64 =
    CHP_HEAT_TO_ELECTRIC_RATIO * CHP_FUEL_TO_ELECTRIC_EFFICIENCY;
/// Fraction of CHP electricity consumed by carbon capture
pub const CHP_CARBON_CAPTURE_POWER: f64 = 0.16;

/// Coefficient of performance of geothermal heating
pub const GEOTHERMAL_COP: f64 = 5.5;
/// Coefficient of performance of the ground-source heat pump
pub const GSHP_COP: f64 = 3.5;
/// Efficiency of the waste heat exchanger
pub const WASTE_HEAT_EXCHANGER_EFFICIENCY: f64 = 0.93;
/// Annual capacity factor of solar PV
pub const SOLAR_CAPACITY_FACTOR: f64 = 0.127;
/// MWh of heat produced by the gas boiler per MWh of gas
pub const BOILER_FUEL_TO_HEAT_EFFICIENCY: f64 = 0.775;

/// The number of technologies, i.e. the dimension of the search space
pub const N_TECHNOLOGIES: usize = TechnologyID::COUNT;

/// Identifies one of the supply technologies.
///
/// The order of the variants is the order of the dimensions of a capacity vector.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumCount,
    EnumIter,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TechnologyID {
    /// Gas-fired combined heat and power with carbon capture
    Chp,
    /// Geothermal heating
    Geothermal,
    /// Ground-source heat pump
    Gshp,
    /// Solar photovoltaics
    Solar,
    /// Heat recovered from a nearby industrial process
    WasteHeat,
    /// Electricity bought from the grid
    Grid,
    /// Gas boiler with carbon capture
    Boiler,
    /// Bought-in CO2
    Co2Import,
}

impl TechnologyID {
    /// The position of this technology in a capacity vector
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether this technology runs on electricity drawn from the grid
    pub fn uses_grid_electricity(self) -> bool {
        matches!(self, Self::Geothermal | Self::Gshp | Self::Grid)
    }
}

/// What a technology produces, consumes and emits over a year
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AnnualOperation {
    /// Useful output (MWh of heat or electricity, or kg of CO2)
    pub energy_output: f64,
    /// Fuel or other input (MWh of gas, electricity or steam, or kg of CO2)
    pub fuel_requirement: f64,
    /// Direct CO2 emissions (kg)
    pub direct_emissions: f64,
}

impl AnnualOperation {
    /// Scale every figure by the same factor
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            energy_output: self.energy_output * factor,
            fuel_requirement: self.fuel_requirement * factor,
            direct_emissions: self.direct_emissions * factor,
        }
    }
}

/// The capabilities of a single technology given the demand it has to serve
#[derive(Debug, Clone, PartialEq)]
pub struct TechnologyProfile {
    /// Which technology this is
    pub id: TechnologyID,
    /// Whether the user has allowed this technology
    pub enabled: bool,
    /// The power needed for this technology to cover peak demand by itself
    pub rated_power: f64,
    /// The largest capacity the optimiser may choose
    pub upper_bound: f64,
    /// Hourly useful output when running at rated power
    pub max_supply: Vec<f64>,
    /// Annual totals when running at rated power
    pub reference: AnnualOperation,
}

impl TechnologyProfile {
    /// Create a profile for the given technology.
    ///
    /// A technology with no demand to serve gets an upper bound of zero, which pins it there.
    pub fn new(id: TechnologyID, demand: &DemandSeries, enabled: bool, capacity_margin: f64) -> Self {
        let max_supply = supply::max_supply(id, demand);
        let upper_bound = if max_supply.rated_power <= 0.0 {
            debug!("{id} has no demand to serve and will not be sized");
            0.0
        } else if enabled {
            max_supply.rated_power * (1.0 + capacity_margin)
        } else {
            DISABLED_CAPACITY_BOUND
        };

        Self {
            id,
            enabled,
            rated_power: max_supply.rated_power,
            upper_bound,
            max_supply: max_supply.hourly_output,
            reference: max_supply.reference,
        }
    }

    /// Annual operation at the given capacity.
    ///
    /// Every figure scales linearly with capacity as a fraction of rated power.
    pub fn operation(&self, capacity: f64) -> Result<AnnualOperation, EvaluationError> {
        if self.rated_power <= 0.0 {
            return Err(EvaluationError::ZeroRatedPower(self.id));
        }

        Ok(self.reference.scaled(capacity / self.rated_power))
    }

    /// CO2 emitted by power stations to generate the grid electricity used in a year (kg).
    ///
    /// This isn't taxed. Only direct emissions are.
    pub fn related_emissions(&self, capacity: f64) -> Result<f64, EvaluationError> {
        if !self.id.uses_grid_electricity() {
            return Ok(0.0);
        }

        Ok(self.operation(capacity)?.fuel_requirement * GRID_CO2_PER_MWH)
    }

    /// Hourly useful output at the given capacity
    pub fn hourly_output(&self, capacity: f64) -> impl Iterator<Item = f64> + '_ {
        let factor = if self.rated_power > 0.0 {
            capacity / self.rated_power
        } else {
            0.0
        };
        self.max_supply.iter().map(move |output| output * factor)
    }
}

/// The profiles of all technologies, in capacity vector order
#[derive(Debug, Clone, PartialEq)]
pub struct TechnologyProfiles {
    profiles: IndexMap<TechnologyID, TechnologyProfile>,
    chp_co2_power: f64,
}

impl TechnologyProfiles {
    /// Build profiles for every technology from the demand series
    pub fn new(
        demand: &DemandSeries,
        disabled: &[TechnologyID],
        capacity_margin: f64,
    ) -> Self {
        let profiles = TechnologyID::iter()
            .map(|id| {
                let enabled = !disabled.contains(&id);
                (id, TechnologyProfile::new(id, demand, enabled, capacity_margin))
            })
            .collect();

        Self {
            profiles,
            chp_co2_power: supply::chp_co2_power(demand),
        }
    }

    /// The CHP capacity which would just cover peak CO2 demand
    pub fn chp_co2_power(&self) -> f64 {
        self.chp_co2_power
    }

    /// Iterate over the profiles in capacity vector order
    pub fn iter(&self) -> impl Iterator<Item = &TechnologyProfile> {
        self.profiles.values()
    }

    /// Search bounds for each dimension of the capacity vector
    pub fn bounds(&self) -> [(f64, f64); N_TECHNOLOGIES] {
        let mut bounds = [(0.0, 0.0); N_TECHNOLOGIES];
        for profile in self.iter() {
            bounds[profile.id.index()] = (0.0, profile.upper_bound);
        }

        bounds
    }
}

impl Index<TechnologyID> for TechnologyProfiles {
    type Output = TechnologyProfile;

    fn index(&self, id: TechnologyID) -> &Self::Output {
        &self.profiles[&id]
    }
}
