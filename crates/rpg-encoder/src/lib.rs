//! RPG encoding pipeline: semantic lifting, hierarchy construction, grounding, dependency
//! injection, and incremental evolution.
//!
//! [`orchestrator::encode`] runs the full pipeline over a repository; [`evolution::evolve`] runs
//! the incremental update algorithm against a commit range.

pub mod batch;
pub mod cache;
pub mod dependency_injector;
pub mod diff;
pub mod embedding_providers;
pub mod evolution;
pub mod grounder;
pub mod llm;
pub mod orchestrator;
pub mod reorganizer;
pub mod router;
pub mod semantic;
pub mod symbols;
pub mod types;
