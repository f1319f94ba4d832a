//! Application layer
//!
//! Orchestration of the harvest run over the domain service traits.

pub mod orchestrator;

pub use orchestrator::{RunOrchestrator, RunState};
