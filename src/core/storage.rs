pub mod degradation;
pub mod dispatcher;

use crate::{
    core::{community::StorageAsset, storage::degradation::Degradation},
    quantity::energy::KilowattHours,
};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StorageState {
    pub state_of_charge: KilowattHours,

    /// Discharged energy over the nominal capacity, never decreases.
    pub equivalent_cycles: f64,
}

/// Energy moved by one storage asset.
#[derive(Copy, Clone, Debug, Default, PartialEq, derive_more::AddAssign)]
pub struct Flow {
    /// Taken from the surplus, conversion losses included.
    pub absorbed: KilowattHours,

    /// Added to the state of charge.
    pub charged: KilowattHours,

    /// Removed from the state of charge.
    pub discharged: KilowattHours,

    /// Handed over to the deficit.
    pub delivered: KilowattHours,
}

impl Flow {
    pub fn losses(&self) -> KilowattHours {
        (self.absorbed - self.charged) + (self.discharged - self.delivered)
    }
}

/// Storage asset together with its run-time state.
#[derive(Clone, Debug)]
pub struct StorageUnit {
    pub asset: StorageAsset,
    pub state: StorageState,
}

impl StorageUnit {
    pub const fn new(asset: StorageAsset) -> Self {
        let state = StorageState {
            state_of_charge: asset.initial_state_of_charge,
            equivalent_cycles: 0.0,
        };
        Self { asset, state }
    }

    pub fn degradation(&self) -> Degradation {
        Degradation::from_cycles(self.state.equivalent_cycles)
    }

    /// Usable capacity after degradation.
    pub fn ceiling(&self) -> KilowattHours {
        self.asset.capacity * self.degradation().capacity_factor()
    }

    /// Lowest state of charge a discharge may reach.
    pub fn floor(&self) -> KilowattHours {
        self.ceiling() * (1.0 - self.asset.max_depth_of_discharge / 100.0)
    }

    /// Efficiency of a single conversion, the round trip being split evenly between both.
    pub fn one_way_efficiency(&self) -> f64 {
        (self.asset.efficiency / 100.0 * self.degradation().efficiency_factor()).sqrt()
    }

    /// State of charge relative to the nominal capacity.
    pub fn fill_ratio(&self) -> f64 {
        self.state.state_of_charge / self.asset.capacity
    }

    /// Store as much of the surplus as the limits allow, adding at most `limit` to the state of charge.
    pub fn charge(&mut self, surplus: KilowattHours, limit: KilowattHours) -> Flow {
        let efficiency = self.one_way_efficiency();
        let headroom = (self.ceiling() - self.state.state_of_charge).max(KilowattHours::ZERO);
        let charged = (surplus * efficiency)
            .min(headroom)
            .min(limit)
            .max(KilowattHours::ZERO);
        if charged == KilowattHours::ZERO {
            return Flow::default();
        }
        self.state.state_of_charge += charged;
        Flow { absorbed: (charged / efficiency).min(surplus), charged, ..Flow::default() }
    }

    /// Cover as much of the deficit as the limits allow, removing at most `limit` from the state of charge.
    pub fn discharge(&mut self, deficit: KilowattHours, limit: KilowattHours) -> Flow {
        let efficiency = self.one_way_efficiency();
        let available = (self.state.state_of_charge - self.floor()).max(KilowattHours::ZERO);
        let discharged = (deficit / efficiency)
            .min(available)
            .min(limit)
            .max(KilowattHours::ZERO);
        if discharged == KilowattHours::ZERO {
            return Flow::default();
        }
        self.state.state_of_charge -= discharged;
        self.state.equivalent_cycles += discharged / self.asset.capacity;
        Flow { discharged, delivered: (discharged * efficiency).min(deficit), ..Flow::default() }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::{core::community::tests::battery, quantity::Quantity};

    /// Energy the test battery moves at full power over one hour.
    const HOUR_LIMIT: KilowattHours = Quantity(2.0);

    #[test]
    fn test_limits_without_degradation() {
        let unit = StorageUnit::new(battery(1));
        assert_abs_diff_eq!(unit.ceiling().0, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(unit.floor().0, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(unit.one_way_efficiency(), 0.9_f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_limits_with_degradation() {
        let mut unit = StorageUnit::new(battery(1));
        unit.state.equivalent_cycles = 50.0;
        assert_abs_diff_eq!(unit.ceiling().0, 8.0, epsilon = 1e-9);
        assert_abs_diff_eq!(unit.floor().0, 1.6, epsilon = 1e-12);
        assert_abs_diff_eq!(unit.one_way_efficiency(), (0.9_f64 * 0.9).sqrt(), epsilon = 1e-9);
    }

    /// Verify the power-limited charge.
    #[test]
    fn test_charge_power_limited() {
        let mut unit = StorageUnit::new(battery(1));
        let flow = unit.charge(KilowattHours::from(5.0), HOUR_LIMIT);
        assert_abs_diff_eq!(flow.charged.0, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(flow.absorbed.0, 2.0 / 0.9_f64.sqrt(), epsilon = 1e-9);
        assert_abs_diff_eq!(unit.state.state_of_charge.0, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(unit.state.equivalent_cycles, 0.0, epsilon = 1e-9);
    }

    /// Verify that the surplus is never overdrawn.
    #[test]
    fn test_charge_surplus_limited() {
        let mut unit = StorageUnit::new(battery(1));
        let flow = unit.charge(KilowattHours::from(1.0), HOUR_LIMIT);
        assert_abs_diff_eq!(flow.absorbed.0, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(flow.charged.0, 0.9_f64.sqrt(), epsilon = 1e-9);
    }

    /// Verify capping at the degraded capacity.
    #[test]
    fn test_charge_above_ceiling() {
        let mut unit = StorageUnit::new(battery(1));
        unit.state.state_of_charge = KilowattHours::from(9.0);
        unit.state.equivalent_cycles = 50.0;
        let flow = unit.charge(KilowattHours::from(5.0), HOUR_LIMIT);
        assert_eq!(flow, Flow::default());
        assert_abs_diff_eq!(unit.state.state_of_charge.0, 9.0, epsilon = 1e-9);
    }

    /// Verify that the discharge stops at the depth-of-discharge floor.
    #[test]
    fn test_discharge_floor_limited() {
        let mut unit = StorageUnit::new(battery(1));
        unit.state.state_of_charge = KilowattHours::from(3.0);
        let flow = unit.discharge(KilowattHours::from(5.0), HOUR_LIMIT);
        assert_abs_diff_eq!(flow.discharged.0, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(flow.delivered.0, 0.9_f64.sqrt(), epsilon = 1e-9);
        assert_abs_diff_eq!(unit.state.state_of_charge.0, 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(unit.state.equivalent_cycles, 0.1, epsilon = 1e-9);
        assert_abs_diff_eq!(flow.losses().0, 1.0 - 0.9_f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_discharge_deficit_limited() {
        let mut unit = StorageUnit::new(battery(1));
        unit.state.state_of_charge = KilowattHours::from(8.0);
        let flow = unit.discharge(KilowattHours::from(0.9), HOUR_LIMIT);
        assert_abs_diff_eq!(flow.delivered.0, 0.9, epsilon = 1e-12);
        assert_abs_diff_eq!(flow.discharged.0, 0.9 / 0.9_f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_below_floor_does_not_discharge() {
        let mut unit = StorageUnit::new(battery(1));
        let flow = unit.discharge(KilowattHours::from(1.0), HOUR_LIMIT);
        assert_eq!(flow, Flow::default());
    }
}
