use std::cmp::Reverse;

use chrono::{NaiveDateTime, TimeDelta};
use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::{
    core::{
        community::StorageAsset,
        record::StorageInterval,
        storage::{Flow, StorageUnit},
    },
    prelude::*,
    quantity::energy::KilowattHours,
};

/// Outcome of a single dispatch.
#[derive(Clone, Debug, PartialEq)]
pub struct Dispatch {
    /// Taken from the surplus.
    pub absorbed: KilowattHours,

    /// Handed over to the deficit.
    pub delivered: KilowattHours,

    /// Per unit, in the same order as [`Dispatcher::units`].
    pub flows: Vec<Flow>,
}

impl Dispatch {
    /// Positive when storage charged, negative when it discharged.
    pub fn net(&self) -> KilowattHours {
        self.absorbed - self.delivered
    }
}

/// Energy a unit may still move within the current interval.
#[derive(Copy, Clone, Debug, Default)]
struct Budget {
    charge: KilowattHours,
    discharge: KilowattHours,
}

impl Budget {
    fn full(unit: &StorageUnit, duration: TimeDelta) -> Self {
        Self {
            charge: unit.asset.max_charge_power * duration,
            discharge: unit.asset.max_discharge_power * duration,
        }
    }
}

/// Owns the state of every storage asset for the duration of a run.
pub struct Dispatcher {
    /// Sorted by asset ID.
    units: Vec<StorageUnit>,

    /// Same order as the units, zero until the first interval begins.
    budgets: Vec<Budget>,
}

impl Dispatcher {
    pub fn new(assets: impl IntoIterator<Item = StorageAsset>) -> Self {
        let units = assets
            .into_iter()
            .map(StorageUnit::new)
            .sorted_by_key(|unit| unit.asset.id)
            .collect_vec();
        let budgets = vec![Budget::default(); units.len()];
        Self { units, budgets }
    }

    pub fn units(&self) -> &[StorageUnit] {
        &self.units
    }

    /// Zero flow for every unit, the starting point for merging dispatches within an interval.
    pub fn idle_flows(&self) -> Vec<Flow> {
        vec![Flow::default(); self.units.len()]
    }

    /// Restore the full power budget of every unit for a new interval.
    ///
    /// All dispatches until the next call share this budget.
    pub fn begin_interval(&mut self, duration: TimeDelta) {
        self.budgets = self.units.iter().map(|unit| Budget::full(unit, duration)).collect();
    }

    /// Charge the surplus (positive `net`) or cover the deficit (negative `net`).
    ///
    /// Charging fills the emptiest units first, discharging drains the fullest units first.
    /// A unit that has charged within the interval does not discharge until the next one,
    /// and vice versa.
    #[instrument(skip_all, level = "trace", fields(net = ?net))]
    pub fn dispatch(&mut self, net: KilowattHours) -> Dispatch {
        let mut flows = self.idle_flows();
        let mut absorbed = KilowattHours::ZERO;
        let mut delivered = KilowattHours::ZERO;

        if net > KilowattHours::ZERO {
            let order = (0..self.units.len())
                .sorted_by_key(|&index| {
                    (OrderedFloat(self.units[index].fill_ratio()), self.units[index].asset.id)
                })
                .collect_vec();
            for index in order {
                let remaining = net - absorbed;
                if remaining <= KilowattHours::ZERO {
                    break;
                }
                let budget = &mut self.budgets[index];
                let flow = self.units[index].charge(remaining, budget.charge);
                if flow.charged > KilowattHours::ZERO {
                    budget.charge -= flow.charged;
                    budget.discharge = KilowattHours::ZERO;
                }
                absorbed += flow.absorbed;
                flows[index] = flow;
            }
        } else if net < KilowattHours::ZERO {
            let deficit = -net;
            let order = (0..self.units.len())
                .sorted_by_key(|&index| {
                    (Reverse(OrderedFloat(self.units[index].fill_ratio())), self.units[index].asset.id)
                })
                .collect_vec();
            for index in order {
                let remaining = deficit - delivered;
                if remaining <= KilowattHours::ZERO {
                    break;
                }
                let budget = &mut self.budgets[index];
                let flow = self.units[index].discharge(remaining, budget.discharge);
                if flow.discharged > KilowattHours::ZERO {
                    budget.discharge -= flow.discharged;
                    budget.charge = KilowattHours::ZERO;
                }
                delivered += flow.delivered;
                flows[index] = flow;
            }
        }

        trace!(?absorbed, ?delivered, "dispatched");
        Dispatch { absorbed, delivered, flows }
    }

    /// One record per unit with the merged flows of an interval.
    pub fn records(&self, timestamp: NaiveDateTime, flows: &[Flow]) -> Vec<StorageInterval> {
        self.units
            .iter()
            .zip_eq(flows)
            .map(|(unit, flow)| StorageInterval {
                timestamp,
                asset_id: unit.asset.id,
                charged: flow.charged,
                discharged: flow.discharged,
                losses: flow.losses(),
                state_of_charge: unit.state.state_of_charge,
                equivalent_cycles: unit.state.equivalent_cycles,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    use super::*;
    use crate::core::community::tests::battery;

    fn timestamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn dispatcher_with_charges(charges: &[f64]) -> Dispatcher {
        let assets = charges.iter().zip(1..).map(|(charge, id)| StorageAsset {
            initial_state_of_charge: KilowattHours::from(*charge),
            ..battery(id)
        });
        Dispatcher::new(assets)
    }

    /// Dispatch a single flow within a fresh one-hour interval.
    fn dispatch_hour(dispatcher: &mut Dispatcher, net: f64) -> Dispatch {
        dispatcher.begin_interval(TimeDelta::hours(1));
        dispatcher.dispatch(KilowattHours::from(net))
    }

    /// 10 kWh, 2 kW, 90 %, empty, 5 kWh surplus over one hour.
    #[test]
    fn test_charge_limited_dispatch() {
        let mut dispatcher = dispatcher_with_charges(&[0.0]);
        let dispatch = dispatch_hour(&mut dispatcher, 5.0);
        assert_abs_diff_eq!(dispatch.flows[0].charged.0, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(dispatch.absorbed.0, 2.108, epsilon = 1e-3);
        assert_abs_diff_eq!((KilowattHours::from(5.0) - dispatch.absorbed).0, 2.892, epsilon = 1e-3);
        assert_abs_diff_eq!(dispatcher.units()[0].state.state_of_charge.0, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_charge_emptiest_first() {
        let mut dispatcher = dispatcher_with_charges(&[6.0, 3.0]);
        let dispatch = dispatch_hour(&mut dispatcher, 1.0);
        assert_eq!(dispatch.flows[0], Flow::default());
        assert_abs_diff_eq!(dispatch.flows[1].absorbed.0, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(dispatch.absorbed.0, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_charge_spills_over() {
        let mut dispatcher = dispatcher_with_charges(&[0.0, 0.0]);
        let dispatch = dispatch_hour(&mut dispatcher, 3.0);
        assert_abs_diff_eq!(dispatch.flows[0].charged.0, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(dispatch.absorbed.0, 3.0, epsilon = 1e-12);
        assert!(dispatch.flows[1].charged > KilowattHours::ZERO);
    }

    #[test]
    fn test_discharge_fullest_first() {
        let mut dispatcher = dispatcher_with_charges(&[3.0, 6.0]);
        let dispatch = dispatch_hour(&mut dispatcher, -1.0);
        assert_eq!(dispatch.flows[0], Flow::default());
        assert_abs_diff_eq!(dispatch.flows[1].delivered.0, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(dispatch.flows[1].discharged.0, 1.0 / 0.9_f64.sqrt(), epsilon = 1e-9);
        assert_abs_diff_eq!(dispatch.net().0, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_idle() {
        let mut dispatcher = dispatcher_with_charges(&[3.0, 6.0]);
        let dispatch = dispatch_hour(&mut dispatcher, 0.0);
        assert_eq!(dispatch.flows, vec![Flow::default(); 2]);
        let records = dispatcher.records(timestamp(), &dispatch.flows);
        assert_eq!(records.len(), 2);
        assert_abs_diff_eq!(records[0].state_of_charge.0, 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(records[1].state_of_charge.0, 6.0, epsilon = 1e-9);
    }

    /// Verify that the power limit holds for the interval, not for each dispatch.
    #[test]
    fn test_power_budget_shared_within_interval() {
        let mut dispatcher = dispatcher_with_charges(&[0.0]);
        dispatcher.begin_interval(TimeDelta::hours(1));
        let first = dispatcher.dispatch(KilowattHours::from(1.5));
        let second = dispatcher.dispatch(KilowattHours::from(5.0));
        let third = dispatcher.dispatch(KilowattHours::from(5.0));

        assert_abs_diff_eq!(first.absorbed.0, 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(
            (first.flows[0].charged + second.flows[0].charged).0,
            2.0,
            epsilon = 1e-9,
        );
        assert_eq!(third.flows[0], Flow::default());
        assert_abs_diff_eq!(dispatcher.units()[0].state.state_of_charge.0, 2.0, epsilon = 1e-9);

        dispatcher.begin_interval(TimeDelta::hours(1));
        let next = dispatcher.dispatch(KilowattHours::from(5.0));
        assert_abs_diff_eq!(next.flows[0].charged.0, 2.0, epsilon = 1e-9);
    }

    /// Verify that the budget scales with the interval duration.
    #[test]
    fn test_power_budget_quarter_hour() {
        let mut dispatcher = dispatcher_with_charges(&[8.0]);
        dispatcher.begin_interval(TimeDelta::minutes(15));
        let first = dispatcher.dispatch(KilowattHours::from(-5.0));
        let second = dispatcher.dispatch(KilowattHours::from(-5.0));
        assert_abs_diff_eq!(first.flows[0].discharged.0, 0.5, epsilon = 1e-9);
        assert_eq!(second.flows[0], Flow::default());
    }

    #[test]
    fn test_single_direction_within_interval() {
        let mut dispatcher = dispatcher_with_charges(&[5.0]);
        dispatcher.begin_interval(TimeDelta::hours(1));
        let charge = dispatcher.dispatch(KilowattHours::from(1.0));
        let discharge = dispatcher.dispatch(KilowattHours::from(-1.0));
        assert!(charge.flows[0].charged > KilowattHours::ZERO);
        assert_eq!(discharge.flows[0], Flow::default());

        dispatcher.begin_interval(TimeDelta::hours(1));
        let discharge = dispatcher.dispatch(KilowattHours::from(-1.0));
        let charge = dispatcher.dispatch(KilowattHours::from(1.0));
        assert!(discharge.flows[0].discharged > KilowattHours::ZERO);
        assert_eq!(charge.flows[0], Flow::default());
    }

    /// Verify that a deficit spills over to a unit that has not charged within the interval.
    #[test]
    fn test_direction_is_per_unit() {
        let mut dispatcher = dispatcher_with_charges(&[4.0, 4.5]);
        dispatcher.begin_interval(TimeDelta::hours(1));
        let charge = dispatcher.dispatch(KilowattHours::from(0.7));
        assert!(charge.flows[0].charged > KilowattHours::ZERO);
        assert_eq!(charge.flows[1], Flow::default());
        assert!(dispatcher.units()[0].fill_ratio() > dispatcher.units()[1].fill_ratio());

        let discharge = dispatcher.dispatch(KilowattHours::from(-1.0));
        assert_eq!(discharge.flows[0], Flow::default());
        assert_abs_diff_eq!(discharge.flows[1].delivered.0, 1.0, epsilon = 1e-12);
    }

    /// Without an interval the units have no budget.
    #[test]
    fn test_no_interval_no_flow() {
        let mut dispatcher = dispatcher_with_charges(&[5.0]);
        let dispatch = dispatcher.dispatch(KilowattHours::from(3.0));
        assert_eq!(dispatch.flows[0], Flow::default());
    }

    /// Run a charge-discharge sequence and check every step for conservation and wear.
    #[test]
    fn test_conservation_and_wear() {
        let mut dispatcher = dispatcher_with_charges(&[0.0, 5.0]);
        let nets = [5.0, -3.0, 1.5, -4.0, 0.0, 6.0, -6.0, -2.0, 3.0, -1.0];
        let mut cycles = vec![0.0; 2];

        for net in nets.into_iter().cycle().take(500) {
            let before: Vec<_> =
                dispatcher.units().iter().map(|unit| unit.state.state_of_charge).collect();
            let dispatch = dispatch_hour(&mut dispatcher, net);
            for ((unit, flow), soc_before) in dispatcher.units().iter().zip(&dispatch.flows).zip(before) {
                assert_abs_diff_eq!(
                    unit.state.state_of_charge.0,
                    (soc_before + flow.charged - flow.discharged).0,
                    epsilon = 1e-9,
                );
                if flow.charged > KilowattHours::ZERO {
                    assert!(unit.state.state_of_charge.0 <= unit.ceiling().0 + 1e-9);
                }
                if flow.discharged > KilowattHours::ZERO {
                    assert!(unit.state.state_of_charge.0 >= unit.floor().0 - 1e-9);
                }
                assert!(flow.charged.0 <= unit.asset.max_charge_power.0 + 1e-9);
                assert!(flow.discharged.0 <= unit.asset.max_discharge_power.0 + 1e-9);
                assert!(flow.losses() >= KilowattHours::from(-1e-12));
            }
            for (unit, previous) in dispatcher.units().iter().zip(&mut cycles) {
                assert!(unit.state.equivalent_cycles >= *previous);
                assert!(unit.degradation().fraction() <= 0.8);
                *previous = unit.state.equivalent_cycles;
            }
            assert!(dispatch.absorbed.0 <= net.max(0.0) + 1e-9);
            assert!(dispatch.delivered.0 <= (-net).max(0.0) + 1e-9);
        }
    }
}
