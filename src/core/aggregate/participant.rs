use std::collections::BTreeMap;

use itertools::Itertools;
use serde::Serialize;

use crate::{
    core::{
        aggregate::{
            billing::{Bill, Month, power_term},
            totals::EnergyTotals,
        },
        community::{Contract, Participant, ParticipantId},
        record::ParticipantInterval,
    },
    quantity::{cost::Cost, time_range::TimeRange},
};

#[derive(Clone, Debug, Serialize)]
pub struct MonthlyBill {
    pub month: Month,
    pub totals: EnergyTotals,
    pub bill: Bill,

    /// The same month without the community.
    pub baseline: Bill,
}

impl MonthlyBill {
    fn new(month: Month, totals: EnergyTotals, contract: &Contract) -> Self {
        let power_term = power_term(contract, f64::from(month.days()));
        Self {
            month,
            totals,
            bill: Bill::new(totals.import_cost - totals.export_income, power_term),
            baseline: Bill::new(totals.baseline_cost, power_term),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ParticipantResult {
    pub participant_id: ParticipantId,
    pub name: String,
    pub totals: EnergyTotals,
    pub months: Vec<MonthlyBill>,
    pub bill: Cost,
    pub baseline_bill: Cost,
    pub savings: Cost,
    pub savings_percentage: f64,
    pub self_consumption_ratio: Option<f64>,
    pub self_sufficiency_ratio: Option<f64>,
}

impl ParticipantResult {
    pub fn aggregate(
        participant: &Participant,
        contract: &Contract,
        records: &[&ParticipantInterval],
        window: TimeRange,
    ) -> Self {
        let totals = records.iter().fold(EnergyTotals::default(), |mut totals, record| {
            totals += EnergyTotals::from(*record);
            totals
        });
        let buckets = records.iter().fold(BTreeMap::<Month, EnergyTotals>::new(), |mut buckets, record| {
            *buckets.entry(Month::from(record.timestamp)).or_default() += EnergyTotals::from(*record);
            buckets
        });
        let months = buckets
            .into_iter()
            .map(|(month, totals)| MonthlyBill::new(month, totals, contract))
            .collect_vec();

        let (bill, baseline_bill) = if months.is_empty() {
            let power_term = power_term(contract, window.days());
            (
                Bill::new(totals.import_cost - totals.export_income, power_term).total,
                Bill::new(totals.baseline_cost, power_term).total,
            )
        } else {
            (
                months.iter().map(|month| month.bill.total).sum(),
                months.iter().map(|month| month.baseline.total).sum(),
            )
        };
        let savings = (baseline_bill - bill).max(Cost::ZERO);

        Self {
            participant_id: participant.id,
            name: participant.name.clone(),
            totals,
            months,
            bill,
            baseline_bill,
            savings,
            savings_percentage: savings_percentage(savings, baseline_bill),
            self_consumption_ratio: totals.self_consumption_ratio(),
            self_sufficiency_ratio: totals.self_sufficiency_ratio(),
        }
    }
}

/// Savings relative to the baseline, percent within `[0, 100]`.
pub fn savings_percentage(savings: Cost, baseline: Cost) -> f64 {
    if baseline > Cost::ZERO { (savings / baseline * 100.0).clamp(0.0, 100.0) } else { 0.0 }
}
