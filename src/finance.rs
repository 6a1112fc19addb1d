//! General functions related to finance.
//!
//! This is where the annualised cost of a single technology is calculated. The optimiser only
//! sees this through [`annualised_cost`].
use crate::units::{Dimensionless, Money, MoneyPerPower, Power};
use serde::Serialize;

/// The discount rate used to annualise capital costs
pub const DISCOUNT_RATE: Dimensionless = Dimensionless(0.05);

/// The tax levied on each kg of CO2 emitted directly by a technology
pub const CARBON_TAX_PER_KG: f64 = 0.056;

/// Calculates the capital recovery factor (CRF) for a given lifetime and discount rate.
///
/// The CRF is used to annualize capital costs over the lifetime of an asset.
pub fn capital_recovery_factor(lifetime: u32, discount_rate: Dimensionless) -> Dimensionless {
    if lifetime == 0 {
        return Dimensionless(0.0);
    }
    if discount_rate == Dimensionless(0.0) {
        return Dimensionless(1.0) / Dimensionless(lifetime as f64);
    }
    let factor = (Dimensionless(1.0) + discount_rate).powf(lifetime as f64);
    (discount_rate * factor) / (factor - Dimensionless(1.0))
}

/// Calculates the annual capital cost for an up-front capital outlay
pub fn annual_capital_cost(capex: Money, lifetime: u32, discount_rate: Dimensionless) -> Money {
    let crf = capital_recovery_factor(lifetime, discount_rate);
    capex * crf
}

/// Inputs to the cost model for a single technology at a single capacity.
///
/// Output, fuel and emissions are annual totals. Their units depend on the technology (MWh of
/// electricity, heat or steam, or kg of CO2), which is why they are plain `f64`s.
#[derive(Debug, Clone, PartialEq)]
pub struct CostInputs {
    /// Capital cost per unit of rated power
    pub capital_cost: MoneyPerPower,
    /// Operating cost per unit of annual output
    pub operating_cost: f64,
    /// Cost per unit of fuel (or other input)
    pub fuel_cost: f64,
    /// Rated power
    pub power: Power,
    /// Annual output
    pub energy_output: f64,
    /// Annual fuel requirement
    pub fuel_requirement: f64,
    /// Fraction of output diverted to carbon capture
    pub carbon_capture_fraction: f64,
    /// Lifetime in years
    pub lifetime: u32,
    /// Annual direct CO2 emissions (kg)
    pub co2_emissions: f64,
}

/// The annual cost of running a single technology, split by component
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostBreakdown {
    /// Annualised capital expenditure
    pub capex: Money,
    /// Operating cost
    pub opex: Money,
    /// Fuel cost
    pub fuel: Money,
    /// Tax on direct CO2 emissions
    pub co2_tax: Money,
    /// Sum of the other components
    pub total: Money,
}

impl CostBreakdown {
    /// Names of the components, in the order given by [`CostBreakdown::components`]
    pub const COMPONENT_NAMES: [&str; 5] = ["capex", "opex", "fuel", "co2_tax", "total"];

    /// Every component, ending with the total
    pub fn components(&self) -> [Money; 5] {
        [self.capex, self.opex, self.fuel, self.co2_tax, self.total]
    }

    /// Whether every component is a finite number
    pub fn is_finite(&self) -> bool {
        self.components().iter().all(|x| x.is_finite())
    }
}

/// Calculate the annualised cost of a technology.
///
/// The up-front capital cost is spread across the technology's lifetime with the capital recovery
/// factor at [`DISCOUNT_RATE`]. Operating and fuel costs scale with annual output and fuel use
/// and carbon tax with direct emissions.
pub fn annualised_cost(inputs: &CostInputs) -> CostBreakdown {
    let capex = annual_capital_cost(
        inputs.capital_cost * inputs.power,
        inputs.lifetime,
        DISCOUNT_RATE,
    );
    let opex = Money(inputs.operating_cost * inputs.energy_output);
    let fuel = Money(inputs.fuel_requirement * inputs.fuel_cost);
    let co2_tax = Money(inputs.co2_emissions * CARBON_TAX_PER_KG);

    CostBreakdown {
        capex,
        opex,
        fuel,
        co2_tax,
        total: capex + opex + fuel + co2_tax,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0.05, 0.0)] // Edge case: lifetime==0
    #[case(10, 0.0, 0.1)] // Other edge case: discount_rate==0
    #[case(10, 0.05, 0.1295045749654567)]
    #[case(5, 0.03, 0.2183545714005762)]
    fn test_capital_recovery_factor(
        #[case] lifetime: u32,
        #[case] discount_rate: f64,
        #[case] expected: f64,
    ) {
        let result = capital_recovery_factor(lifetime, Dimensionless(discount_rate));
        assert_approx_eq!(f64, result.0, expected, epsilon = 1e-10);
    }

    #[rstest]
    #[case(25)]
    #[case(30)]
    #[case(50)]
    fn test_capital_recovery_factor_matches_annuity_form(#[case] lifetime: u32) {
        // r / (1 - (1 + r)^-n)
        let r = DISCOUNT_RATE.0;
        let expected = r / (1.0 - (1.0 + r).powf(-(lifetime as f64)));
        let result = capital_recovery_factor(lifetime, DISCOUNT_RATE);
        assert_approx_eq!(f64, result.0, expected, epsilon = 1e-12);
    }

    #[rstest]
    #[case(1000.0, 10, 0.05, 129.5045749654567)]
    #[case(500.0, 5, 0.03, 109.17728570028798)]
    #[case(1000.0, 0, 0.05, 0.0)] // Zero lifetime
    #[case(2000.0, 20, 0.0, 100.0)] // Zero discount rate
    fn test_annual_capital_cost(
        #[case] capex: f64,
        #[case] lifetime: u32,
        #[case] discount_rate: f64,
        #[case] expected: f64,
    ) {
        let result = annual_capital_cost(Money(capex), lifetime, Dimensionless(discount_rate));
        assert_approx_eq!(Money, result, Money(expected), epsilon = 1e-8);
    }

    #[test]
    fn test_annualised_cost() {
        let inputs = CostInputs {
            capital_cost: MoneyPerPower(1000.0),
            operating_cost: 2.0,
            fuel_cost: 3.0,
            power: Power(10.0),
            energy_output: 100.0,
            fuel_requirement: 50.0,
            carbon_capture_fraction: 0.0,
            lifetime: 10,
            co2_emissions: 1000.0,
        };
        let cost = annualised_cost(&inputs);

        assert_approx_eq!(Money, cost.capex, Money(1295.045749654567), epsilon = 1e-8);
        assert_eq!(cost.opex, Money(200.0));
        assert_eq!(cost.fuel, Money(150.0));
        assert_approx_eq!(Money, cost.co2_tax, Money(56.0), epsilon = 1e-10);
        assert_approx_eq!(
            Money,
            cost.total,
            Money(1295.045749654567 + 200.0 + 150.0 + 56.0),
            epsilon = 1e-8
        );
        assert!(cost.is_finite());
    }

    #[test]
    fn test_annualised_cost_zero_power() {
        let inputs = CostInputs {
            capital_cost: MoneyPerPower(0.0),
            operating_cost: 0.0,
            fuel_cost: 228.1,
            power: Power(0.0),
            energy_output: 0.0,
            fuel_requirement: 0.0,
            carbon_capture_fraction: 0.0,
            lifetime: 50,
            co2_emissions: 0.0,
        };
        assert_eq!(annualised_cost(&inputs), CostBreakdown::default());
    }
}
