mod client;
mod pvgis;
mod ree;

pub use self::{pvgis::Api as Pvgis, ree::Api as Ree};
