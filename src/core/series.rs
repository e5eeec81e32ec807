use std::{collections::BTreeMap, ops::Bound};

use chrono::{NaiveDateTime, TimeDelta};
use itertools::Itertools;

use crate::quantity::{energy::KilowattHours, time_range::TimeRange};

/// Energy over the period starting at each key.
pub type Series = BTreeMap<NaiveDateTime, KilowattHours>;

/// Smallest distance between consecutive timestamps.
pub fn infer_step(series: &Series) -> Option<TimeDelta> {
    series.keys().tuple_windows().map(|(left, right)| *right - *left).min()
}

/// Spread the energy of a series over the simulation grid.
///
/// Each source sample covers `[timestamp, timestamp + source step)` and contributes in proportion to
/// its overlap with every grid slot. Slots that no sample overlaps are absent from the result.
pub fn resample(series: &Series, grid: TimeRange, step: TimeDelta) -> Series {
    let source_step = infer_step(series).unwrap_or(step);
    grid.steps(step)
        .filter_map(|start| {
            let slot = TimeRange::new(start, start + step);
            let lower = Bound::Excluded(start - source_step);
            let upper = Bound::Excluded(slot.end);
            let mut overlaps = series
                .range((lower, upper))
                .map(|(timestamp, energy)| {
                    let overlap = TimeRange::new(*timestamp, *timestamp + source_step).overlap(slot);
                    (overlap, *energy)
                })
                .filter(|(overlap, _)| *overlap > TimeDelta::zero())
                .peekable();
            overlaps.peek()?;
            let energy = overlaps
                .map(|(overlap, energy)| {
                    energy * (overlap.as_seconds_f64() / source_step.as_seconds_f64())
                })
                .sum::<KilowattHours>();
            Some((start, energy))
        })
        .collect()
}
