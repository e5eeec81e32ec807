use serde::Serialize;

use crate::{
    core::record::ParticipantInterval,
    quantity::{cost::Cost, energy::KilowattHours},
};

/// Sums of participant interval quantities.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, derive_more::AddAssign)]
pub struct EnergyTotals {
    pub consumption: KilowattHours,
    pub allocated: KilowattHours,
    pub autoconsumption: KilowattHours,
    pub storage_absorbed: KilowattHours,
    pub storage_delivered: KilowattHours,
    pub grid_import: KilowattHours,
    pub surplus_compensated: KilowattHours,
    pub surplus_curtailed: KilowattHours,
    pub import_cost: Cost,
    pub export_income: Cost,

    /// Cost of the whole consumption at the import price, as without the community.
    pub baseline_cost: Cost,
}

impl From<&ParticipantInterval> for EnergyTotals {
    fn from(record: &ParticipantInterval) -> Self {
        Self {
            consumption: record.consumption,
            allocated: record.allocated,
            autoconsumption: record.autoconsumption,
            storage_absorbed: record.storage_absorbed,
            storage_delivered: record.storage_delivered,
            grid_import: record.grid_import,
            surplus_compensated: record.surplus_compensated,
            surplus_curtailed: record.surplus_curtailed,
            import_cost: record.grid_import * record.import_price,
            export_income: record.surplus_compensated * record.export_price,
            baseline_cost: record.consumption * record.import_price,
        }
    }
}

impl EnergyTotals {
    /// Share of the allocated generation used locally, directly or through storage, percent.
    pub fn self_consumption_ratio(&self) -> Option<f64> {
        percentage(self.autoconsumption + self.storage_absorbed, self.allocated)
    }

    /// Share of the consumption covered locally, directly or through storage, percent.
    pub fn self_sufficiency_ratio(&self) -> Option<f64> {
        percentage(self.autoconsumption + self.storage_delivered, self.consumption)
    }

    /// Energy that did not have to come from the grid thanks to the community.
    pub fn locally_covered(&self) -> KilowattHours {
        self.autoconsumption + self.storage_delivered
    }
}

fn percentage(numerator: KilowattHours, denominator: KilowattHours) -> Option<f64> {
    (denominator > KilowattHours::ZERO).then(|| numerator / denominator * 100.0)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    /// Self-consumption and self-sufficiency use different denominators.
    #[test]
    fn test_ratios() {
        let totals = EnergyTotals {
            consumption: KilowattHours::from(10.0),
            autoconsumption: KilowattHours::from(4.0),
            storage_delivered: KilowattHours::from(2.0),
            allocated: KilowattHours::from(8.0),
            storage_absorbed: KilowattHours::from(3.0),
            ..EnergyTotals::default()
        };
        assert_abs_diff_eq!(totals.self_sufficiency_ratio().unwrap(), 60.0, epsilon = 1e-9);
        assert_abs_diff_eq!(totals.self_consumption_ratio().unwrap(), 87.5, epsilon = 1e-9);
    }

    #[test]
    fn test_ratios_without_energy() {
        let totals = EnergyTotals::default();
        assert!(totals.self_consumption_ratio().is_none());
        assert!(totals.self_sufficiency_ratio().is_none());
    }
}
