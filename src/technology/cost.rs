//! Cost curves for each technology.
use super::*;
use crate::finance::CostInputs;
use crate::units::{MoneyPerPower, Power};

/// How the cost of a technology depends on its size and use
struct CostCurve {
    /// Capital cost per MW as a function of capacity
    capital_cost: fn(f64) -> f64,
    /// Annual fixed operating cost per MW, spread over annual output
    fixed_operating_cost: f64,
    /// Operating cost per unit of output
    variable_operating_cost: f64,
    /// Price per unit of fuel
    fuel_cost: f64,
    /// Lifetime in years
    lifetime: u32,
    /// Fraction of output lost to carbon capture
    carbon_capture_fraction: f64,
}

/// Price of natural gas (per MWh)
const GAS_PRICE: f64 = 90.1;
/// Price of grid electricity (per MWh)
const ELECTRICITY_PRICE: f64 = 228.1;
/// Price of steam for waste heat, discounted against gas (per MWh)
const STEAM_PRICE: f64 = GAS_PRICE * 0.9;
/// Price of bought-in CO2 (per kg)
const CO2_PRICE: f64 = 0.14678;

fn no_capital_cost(_: f64) -> f64 {
    0.0
}

fn cost_curve(id: TechnologyID) -> CostCurve {
    let curve = CostCurve {
        capital_cost: no_capital_cost,
        fixed_operating_cost: 0.0,
        variable_operating_cost: 0.0,
        fuel_cost: 0.0,
        lifetime: 50,
        carbon_capture_fraction: 0.0,
    };

    match id {
        TechnologyID::Chp => CostCurve {
            capital_cost: |x| 1.2e6 * x.powf(-0.4),
            variable_operating_cost: 9.3,
            fuel_cost: GAS_PRICE,
            lifetime: 25,
            carbon_capture_fraction: CHP_CARBON_CAPTURE_POWER,
            ..curve
        },
        TechnologyID::Geothermal => CostCurve {
            capital_cost: |x| 2.89e6 * x.powf(-0.45) + 1.2e6,
            fixed_operating_cost: 11_000.0,
            fuel_cost: ELECTRICITY_PRICE,
            lifetime: 30,
            ..curve
        },
        TechnologyID::Gshp => CostCurve {
            capital_cost: |x| 1_297_000.0 * x.powf(-0.21557),
            fixed_operating_cost: 8000.0,
            fuel_cost: ELECTRICITY_PRICE,
            lifetime: 25,
            ..curve
        },
        TechnologyID::Solar => CostCurve {
            capital_cost: |x| 1.572e6 * x.powf(-0.15) - 1.5e5,
            fixed_operating_cost: 12_000.0,
            lifetime: 30,
            ..curve
        },
        TechnologyID::WasteHeat => CostCurve {
            fuel_cost: STEAM_PRICE,
            ..curve
        },
        TechnologyID::Grid => CostCurve {
            fuel_cost: ELECTRICITY_PRICE,
            ..curve
        },
        TechnologyID::Boiler => CostCurve {
            capital_cost: |x| 103_000.0 * x.powf(-0.17),
            fixed_operating_cost: 3900.0,
            fuel_cost: GAS_PRICE,
            lifetime: 25,
            ..curve
        },
        TechnologyID::Co2Import => CostCurve {
            fuel_cost: CO2_PRICE,
            ..curve
        },
    }
}

/// Get the inputs to the cost model for a technology running at the given capacity.
///
/// Fixed operating costs are charged per unit of output, so a technology with a fixed operating
/// cost but no output can't be costed.
pub fn cost_inputs(
    id: TechnologyID,
    capacity: f64,
    operation: &AnnualOperation,
) -> Result<CostInputs, EvaluationError> {
    let curve = cost_curve(id);

    let mut operating_cost = curve.variable_operating_cost;
    if curve.fixed_operating_cost > 0.0 {
        if operation.energy_output <= 0.0 {
            return Err(EvaluationError::ZeroOutput(id));
        }
        operating_cost += curve.fixed_operating_cost * capacity / operation.energy_output;
    }

    Ok(CostInputs {
        capital_cost: MoneyPerPower((curve.capital_cost)(capacity)),
        operating_cost,
        fuel_cost: curve.fuel_cost,
        power: Power(capacity),
        energy_output: operation.energy_output,
        fuel_requirement: operation.fuel_requirement,
        carbon_capture_fraction: curve.carbon_capture_fraction,
        lifetime: curve.lifetime,
        co2_emissions: operation.direct_emissions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finance::annualised_cost;
    use crate::fixture::assert_error;
    use crate::units::Money;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn operation(energy_output: f64) -> AnnualOperation {
        AnnualOperation {
            energy_output,
            fuel_requirement: 2.0 * energy_output,
            direct_emissions: 0.0,
        }
    }

    #[rstest]
    #[case(TechnologyID::Chp, 1.2e6)]
    #[case(TechnologyID::Geothermal, 2.89e6 + 1.2e6)]
    #[case(TechnologyID::Gshp, 1_297_000.0)]
    #[case(TechnologyID::Solar, 1.572e6 - 1.5e5)]
    #[case(TechnologyID::WasteHeat, 0.0)]
    #[case(TechnologyID::Grid, 0.0)]
    #[case(TechnologyID::Boiler, 103_000.0)]
    #[case(TechnologyID::Co2Import, 0.0)]
    fn test_capital_cost_at_one_mw(#[case] id: TechnologyID, #[case] expected: f64) {
        let inputs = cost_inputs(id, 1.0, &operation(100.0)).unwrap();
        assert_approx_eq!(f64, inputs.capital_cost.0, expected, epsilon = 1e-6);
    }

    #[test]
    fn test_fixed_operating_cost_is_spread_over_output() {
        // 11000 per MW over 2 MW and 4400 MWh is 5 per MWh
        let inputs = cost_inputs(TechnologyID::Geothermal, 2.0, &operation(4400.0)).unwrap();
        assert_approx_eq!(f64, inputs.operating_cost, 5.0);

        let cost = annualised_cost(&inputs);
        assert_approx_eq!(Money, cost.opex, Money(22_000.0), epsilon = 1e-6);
        assert_approx_eq!(Money, cost.fuel, Money(8800.0 * ELECTRICITY_PRICE), epsilon = 1e-6);
    }

    #[rstest]
    #[case(TechnologyID::Geothermal)]
    #[case(TechnologyID::Gshp)]
    #[case(TechnologyID::Solar)]
    #[case(TechnologyID::Boiler)]
    fn test_zero_output_is_an_error(#[case] id: TechnologyID) {
        assert_error!(
            cost_inputs(id, 1.0, &operation(0.0)),
            format!("{id} produces no output, so its operating cost is undefined")
        );
    }

    #[rstest]
    #[case(TechnologyID::Chp)]
    #[case(TechnologyID::Grid)]
    #[case(TechnologyID::Co2Import)]
    fn test_zero_output_without_fixed_cost(#[case] id: TechnologyID) {
        assert!(cost_inputs(id, 1.0, &operation(0.0)).is_ok());
    }
}
