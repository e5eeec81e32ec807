pub mod aggregate;
pub mod allocation;
pub mod community;
pub mod generation;
pub mod orchestrator;
pub mod pricing;
pub mod provider;
pub mod record;
pub mod retry;
pub mod series;
pub mod simulation;
pub mod storage;
