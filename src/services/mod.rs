pub mod aggregator;
pub mod analyzer;
pub mod orchestrator;
pub mod registry;
pub mod visit;
