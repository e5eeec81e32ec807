//! File-backed collaborators.

mod consumption;
mod directory;
mod prices;

pub use self::{consumption::ConsumptionCsv, directory::DirectorySink, prices::PriceCsv};
