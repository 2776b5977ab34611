pub mod generator;
pub mod genres;
pub mod llm;
pub mod orchestrator;
pub mod persistence;
pub mod session;
pub mod setup;
pub mod snapshot;
pub mod workflow;
