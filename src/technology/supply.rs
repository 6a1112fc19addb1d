//! Supply models for each technology.
//!
//! A technology's supply model says how big it would have to be to meet the greenhouse's peak
//! demand on its own, and what it would produce and burn each hour when built to that size.
use super::*;

/// A technology's supply when built at its rated power
#[derive(Debug, Clone, PartialEq)]
pub struct MaxSupply {
    /// The power needed to cover peak demand
    pub rated_power: f64,
    /// Useful output for each hour
    pub hourly_output: Vec<f64>,
    /// Annual totals
    pub reference: AnnualOperation,
}

impl MaxSupply {
    fn new(
        rated_power: f64,
        hourly_output: Vec<f64>,
        hourly_fuel: impl Iterator<Item = f64>,
        co2_per_unit_fuel: f64,
    ) -> Self {
        let energy_output = hourly_output.iter().sum();
        let fuel_requirement: f64 = hourly_fuel.sum();

        Self {
            rated_power,
            hourly_output,
            reference: AnnualOperation {
                energy_output,
                fuel_requirement,
                direct_emissions: fuel_requirement * co2_per_unit_fuel,
            },
        }
    }
}

/// Compute the maximum supply of the given technology for a demand series
pub fn max_supply(id: TechnologyID, demand: &DemandSeries) -> MaxSupply {
    match id {
        TechnologyID::Chp => chp(demand),
        TechnologyID::Geothermal => heat_pump(demand, GEOTHERMAL_COP),
        TechnologyID::Gshp => heat_pump(demand, GSHP_COP),
        TechnologyID::Solar => solar(demand),
        TechnologyID::WasteHeat => waste_heat(demand),
        TechnologyID::Grid => grid(demand),
        TechnologyID::Boiler => boiler(demand),
        TechnologyID::Co2Import => co2_import(demand),
    }
}

/// The CHP capacity which would just cover peak CO2 demand by itself
pub fn chp_co2_power(demand: &DemandSeries) -> f64 {
    peak(demand.co2.iter().map(|&co2| gas_for_co2(co2))) * CHP_FUEL_TO_ELECTRIC_EFFICIENCY
}

/// The largest value in a series of non-negative numbers (zero if empty)
fn peak(values: impl IntoIterator<Item = f64>) -> f64 {
    values.into_iter().fold(0.0, f64::max)
}

/// MWh of gas which must be burned to capture the given mass of CO2
fn gas_for_co2(co2: f64) -> f64 {
    co2 / GAS_CO2_PER_MWH / CARBON_CAPTURE_EFFICIENCY
}

/// CHP follows whichever of heat, light and CO2 demand needs the most gas in each hour
fn chp(demand: &DemandSeries) -> MaxSupply {
    let fuel: Vec<f64> = itertools::izip!(&demand.heat, &demand.light, &demand.co2)
        .map(|(&heat, &light, &co2)| {
            let for_heat = heat / CHP_FUEL_TO_HEAT_EFFICIENCY;
            let for_light = light / CHP_FUEL_TO_ELECTRIC_EFFICIENCY * (1.0 + CHP_CARBON_CAPTURE_POWER);
            let for_co2 = gas_for_co2(co2);
            for_heat.max(for_light).max(for_co2)
        })
        .collect();
    let rated_power = peak(fuel.iter().copied()) * CHP_FUEL_TO_ELECTRIC_EFFICIENCY;
    let electricity = fuel
        .iter()
        .map(|gas| gas * CHP_FUEL_TO_ELECTRIC_EFFICIENCY)
        .collect();

    MaxSupply::new(rated_power, electricity, fuel.into_iter(), GAS_CO2_PER_MWH)
}

/// Geothermal and ground-source heat pumps meet heat demand with grid electricity
fn heat_pump(demand: &DemandSeries, cop: f64) -> MaxSupply {
    MaxSupply::new(
        peak(demand.heat.iter().copied()),
        demand.heat.clone(),
        demand.heat.iter().map(|heat| heat / cop),
        0.0,
    )
}

fn waste_heat(demand: &DemandSeries) -> MaxSupply {
    MaxSupply::new(
        peak(demand.heat.iter().copied()) / WASTE_HEAT_EXCHANGER_EFFICIENCY,
        demand.heat.clone(),
        demand
            .heat
            .iter()
            .map(|heat| heat / WASTE_HEAT_EXCHANGER_EFFICIENCY),
        0.0,
    )
}

/// Solar is sized on its capacity factor and has no fuel
fn solar(demand: &DemandSeries) -> MaxSupply {
    MaxSupply::new(
        peak(demand.light.iter().copied()) / SOLAR_CAPACITY_FACTOR,
        demand.light.clone(),
        std::iter::empty(),
        0.0,
    )
}

fn grid(demand: &DemandSeries) -> MaxSupply {
    MaxSupply::new(
        peak(demand.light.iter().copied()),
        demand.light.clone(),
        demand.light.iter().copied(),
        0.0,
    )
}

/// The boiler follows whichever of heat and CO2 demand needs more gas in each hour
fn boiler(demand: &DemandSeries) -> MaxSupply {
    let fuel: Vec<f64> = demand
        .heat
        .iter()
        .zip(&demand.co2)
        .map(|(&heat, &co2)| (heat / BOILER_FUEL_TO_HEAT_EFFICIENCY).max(gas_for_co2(co2)))
        .collect();
    let rated_power = peak(fuel.iter().copied()) * BOILER_FUEL_TO_HEAT_EFFICIENCY;
    let heat = fuel
        .iter()
        .map(|gas| gas * BOILER_FUEL_TO_HEAT_EFFICIENCY)
        .collect();

    MaxSupply::new(rated_power, heat, fuel.into_iter(), GAS_CO2_PER_MWH)
}

fn co2_import(demand: &DemandSeries) -> MaxSupply {
    MaxSupply::new(
        peak(demand.co2.iter().copied()),
        demand.co2.clone(),
        demand.co2.iter().copied(),
        0.0,
    )
}
