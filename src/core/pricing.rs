use std::collections::BTreeMap;

use chrono::{DurationRound, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::{
    core::community::{Contract, ContractKind},
    prelude::*,
    quantity::rate::KilowattHourRate,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    Import,
    Export,
}

/// Hourly market price for both directions.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DynamicPrice {
    pub import: KilowattHourRate,

    /// Missing when the market did not publish a feed-in price.
    pub export: Option<KilowattHourRate>,
}

pub trait PriceLookup {
    fn resolve_dynamic_price(&self, at: NaiveDateTime) -> Result<Option<DynamicPrice>>;
}

/// Hourly dynamic prices keyed by the start of the hour.
#[derive(Clone, Debug, Default)]
pub struct PriceSeries(BTreeMap<NaiveDateTime, DynamicPrice>);

impl PriceSeries {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(NaiveDateTime, DynamicPrice)> for PriceSeries {
    fn from_iter<T: IntoIterator<Item = (NaiveDateTime, DynamicPrice)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<(NaiveDateTime, DynamicPrice)> for PriceSeries {
    fn extend<T: IntoIterator<Item = (NaiveDateTime, DynamicPrice)>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl IntoIterator for PriceSeries {
    type Item = (NaiveDateTime, DynamicPrice);
    type IntoIter = std::collections::btree_map::IntoIter<NaiveDateTime, DynamicPrice>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl PriceLookup for PriceSeries {
    fn resolve_dynamic_price(&self, at: NaiveDateTime) -> Result<Option<DynamicPrice>> {
        let hour = at.duration_trunc(TimeDelta::hours(1))?;
        Ok(self.0.get(&hour).copied())
    }
}

/// Resolve the price a participant pays or receives at the given moment.
///
/// Dynamic prices fall back to the contract's fixed price when the lookup has no entry or fails.
pub fn resolve_price(
    contract: &Contract,
    at: NaiveDateTime,
    direction: Direction,
    lookup: &impl PriceLookup,
) -> KilowattHourRate {
    let fixed = match direction {
        Direction::Import => contract.import_price,
        Direction::Export => contract.export_price,
    };
    match contract.kind {
        ContractKind::FixedMarket => fixed,
        ContractKind::DynamicPvpc => match lookup.resolve_dynamic_price(at) {
            Ok(Some(price)) => match direction {
                Direction::Import => price.import,
                Direction::Export => price.export.unwrap_or(fixed),
            },
            Ok(None) => {
                warn!(%at, ?direction, "no dynamic price, falling back to the fixed price");
                fixed
            }
            Err(error) => {
                warn!(%at, ?direction, "dynamic price lookup failed, falling back to the fixed price: {error:#}");
                fixed
            }
        },
        ContractKind::Unknown => {
            debug!(%at, ?direction, "unrecognised contract type, using the import price");
            contract.import_price
        }
    }
}
