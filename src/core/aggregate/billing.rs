use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::{core::community::Contract, quantity::cost::Cost};

/// Spanish electricity tax, applied to the energy and power terms.
pub const ELECTRICITY_TAX_RATE: f64 = 0.051_127;

/// Value-added tax, applied on top of the electricity tax.
pub const VAT_RATE: f64 = 0.21;

#[derive(Copy, Clone, Debug, Eq, Ord, PartialEq, PartialOrd, Serialize, derive_more::Display)]
#[display("{year}-{month:02}")]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

impl From<NaiveDateTime> for Month {
    fn from(timestamp: NaiveDateTime) -> Self {
        Self { year: timestamp.year(), month: timestamp.month() }
    }
}

impl Month {
    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn days(self) -> u32 {
        let next = if self.month == 12 {
            NaiveDate::from_ymd_opt(self.year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(self.year, self.month + 1, 1)
        };
        match (self.first_day(), next) {
            (Some(first), Some(next)) => u32::try_from((next - first).num_days()).unwrap_or(0),
            _ => 0,
        }
    }
}

/// Fixed term for the contracted power over the given number of days.
pub fn power_term(contract: &Contract, days: f64) -> Cost {
    Cost::from(contract.contracted_power.0 * contract.power_price * days)
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Bill {
    /// Import cost minus export income, never negative.
    pub energy_term: Cost,

    pub power_term: Cost,
    pub electricity_tax: Cost,
    pub vat: Cost,
    pub total: Cost,
}

impl Bill {
    pub fn new(energy_term: Cost, power_term: Cost) -> Self {
        let energy_term = energy_term.max(Cost::ZERO);
        let taxable = energy_term + power_term;
        let electricity_tax = taxable * ELECTRICITY_TAX_RATE;
        let vat = (taxable + electricity_tax) * VAT_RATE;
        Self { energy_term, power_term, electricity_tax, vat, total: taxable + electricity_tax + vat }
    }
}
