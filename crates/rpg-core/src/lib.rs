//! Core types and storage for the Repository Planning Graph (RPG).
//!
//! Provides the graph data model ([`graph::RpGraph`]), the LLM and embedding client contracts,
//! the `ContextStore` persistence traits, JSON schema versioning, and LCA-based directory
//! grounding.

pub mod config;
pub mod embedding;
pub mod error;
pub mod graph;
pub mod lca;
pub mod llm;
pub mod schema;
pub mod store;
