use serde::Serialize;

use crate::{
    core::aggregate::{
        asset::GenerationAssetResult,
        participant::{ParticipantResult, savings_percentage},
        totals::EnergyTotals,
    },
    quantity::{cost::Cost, energy::KilowattHours, time_range::TimeRange},
};

/// Grid emissions avoided per kilowatt-hour of local generation, kg CO₂.
pub const GRID_EMISSION_FACTOR: f64 = 0.25;

#[derive(Clone, Debug, Serialize)]
pub struct GlobalResult {
    pub totals: EnergyTotals,
    pub generated: KilowattHours,
    pub bill: Cost,
    pub baseline_bill: Cost,
    pub savings: Cost,
    pub savings_percentage: f64,
    pub self_consumption_ratio: Option<f64>,
    pub self_sufficiency_ratio: Option<f64>,
    pub investment: Cost,

    /// Savings extrapolated to 365 days.
    pub annual_savings: Cost,

    /// Years, undefined without savings.
    pub payback_period: Option<f64>,

    /// Annual savings over the investment, percent, undefined without investment.
    pub return_on_investment: Option<f64>,

    /// Kilograms.
    pub co2_avoided: f64,
}

impl GlobalResult {
    pub fn aggregate(
        participants: &[ParticipantResult],
        generation: &[GenerationAssetResult],
        investment: Cost,
        window: TimeRange,
    ) -> Self {
        let totals = participants.iter().fold(EnergyTotals::default(), |mut totals, participant| {
            totals += participant.totals;
            totals
        });
        let bill: Cost = participants.iter().map(|participant| participant.bill).sum();
        let baseline_bill: Cost =
            participants.iter().map(|participant| participant.baseline_bill).sum();
        let savings: Cost = participants.iter().map(|participant| participant.savings).sum();

        let days = window.days();
        let annual_savings = if days > 0.0 { savings / days * 365.0 } else { Cost::ZERO };
        let payback_period = (annual_savings > Cost::ZERO).then(|| investment / annual_savings);
        let return_on_investment =
            (investment > Cost::ZERO).then(|| annual_savings / investment * 100.0);
        let co2_avoided =
            (totals.locally_covered() + totals.surplus_compensated).0 * GRID_EMISSION_FACTOR;

        Self {
            totals,
            generated: generation.iter().map(|asset| asset.generated).sum(),
            bill,
            baseline_bill,
            savings,
            savings_percentage: savings_percentage(savings, baseline_bill),
            self_consumption_ratio: totals.self_consumption_ratio(),
            self_sufficiency_ratio: totals.self_sufficiency_ratio(),
            investment,
            annual_savings,
            payback_period,
            return_on_investment,
            co2_avoided,
        }
    }
}
