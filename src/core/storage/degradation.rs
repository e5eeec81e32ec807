/// Capacity lost per equivalent full cycle.
pub const DEGRADATION_PER_CYCLE: f64 = 0.004;

/// Degradation never exceeds this fraction.
pub const MAX_DEGRADATION: f64 = 0.8;

/// Fraction of the nominal capacity lost to wear.
#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub struct Degradation(f64);

impl Degradation {
    pub fn from_cycles(equivalent_cycles: f64) -> Self {
        Self((equivalent_cycles * DEGRADATION_PER_CYCLE).clamp(0.0, MAX_DEGRADATION))
    }

    pub const fn fraction(self) -> f64 {
        self.0
    }

    pub fn capacity_factor(self) -> f64 {
        1.0 - self.0
    }

    /// Efficiency degrades at half the rate of the capacity.
    pub fn efficiency_factor(self) -> f64 {
        1.0 - self.0 / 2.0
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_new_asset() {
        let degradation = Degradation::from_cycles(0.0);
        assert_abs_diff_eq!(degradation.capacity_factor(), 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(degradation.efficiency_factor(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_worn_asset() {
        let degradation = Degradation::from_cycles(100.0);
        assert_abs_diff_eq!(degradation.fraction(), 0.4, epsilon = 1e-9);
        assert_abs_diff_eq!(degradation.capacity_factor(), 0.6, epsilon = 1e-9);
        assert_abs_diff_eq!(degradation.efficiency_factor(), 0.8, epsilon = 1e-9);
    }

    /// Verify capping at the maximum.
    #[test]
    fn test_cap() {
        assert_abs_diff_eq!(Degradation::from_cycles(1000.0).fraction(), MAX_DEGRADATION, epsilon = 1e-9);
    }

    #[test]
    fn test_monotonic() {
        let fractions: Vec<_> =
            (0..300).map(|cycles| Degradation::from_cycles(f64::from(cycles)).fraction()).collect();
        assert!(fractions.windows(2).all(|pair| pair[0] <= pair[1]));
    }
}
