//! Versioned JSON persistence for [`RpGraph`](crate::graph::RpGraph).
//!
//! The on-disk format wraps the graph in an envelope carrying a schema version so that future
//! format changes can be detected before deserialization runs. Nodes and edges are already kept
//! in stable order by construction (`nodes` is a `BTreeMap` keyed by id; `edges` is sorted by
//! `(source, target)` on every mutation via [`crate::graph::RpGraph::sort_edges`]), so two
//! encodes of the same graph produce byte-identical JSON.

use crate::graph::RpGraph;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Current on-disk schema version. Bump whenever the persisted shape changes in a way that
/// requires a migration.
pub const CURRENT_VERSION: &str = "1.0.0";

/// Versioned envelope around a persisted [`RpGraph`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedGraph {
    pub schema_version: String,
    pub graph: RpGraph,
}

/// Validate a persisted envelope's schema version against [`CURRENT_VERSION`].
///
/// Versions are compared for exact equality — there is no forward-compatibility story for this
/// format, so any drift is treated as a hard error rather than a best-effort migration.
pub fn validate_version(persisted: &PersistedGraph) -> Result<()> {
    if persisted.schema_version != CURRENT_VERSION {
        anyhow::bail!(
            "RPG schema version mismatch: expected {}, found {}",
            CURRENT_VERSION,
            persisted.schema_version
        );
    }
    Ok(())
}

/// Serialize an `RpGraph` to a pretty-printed, version-stamped JSON string.
pub fn to_json(graph: &RpGraph) -> Result<String> {
    let mut graph = graph.clone();
    graph.sort_edges();
    let envelope = PersistedGraph {
        schema_version: CURRENT_VERSION.to_string(),
        graph,
    };
    serde_json::to_string_pretty(&envelope).context("failed to serialize RPG to JSON")
}

/// Deserialize an `RpGraph` from a version-stamped JSON string, rebuilding its in-memory
/// indexes (which are never persisted).
pub fn from_json(json: &str) -> Result<RpGraph> {
    let envelope: PersistedGraph =
        serde_json::from_str(json).context("failed to deserialize RPG from JSON")?;
    validate_version(&envelope)?;
    let mut graph = envelope.graph;
    graph.rebuild_indexes();
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Config;

    #[test]
    fn round_trips_empty_graph() {
        let graph = RpGraph::new(Config::new("demo"));
        let json = to_json(&graph).unwrap();
        let restored = from_json(&json).unwrap();
        assert_eq!(restored.node_count(), graph.node_count());
    }

    #[test]
    fn rejects_wrong_schema_version() {
        let graph = RpGraph::new(Config::new("demo"));
        let envelope = PersistedGraph {
            schema_version: "0.9.0".to_string(),
            graph,
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(from_json(&json).is_err());
    }

    #[test]
    fn json_contains_schema_version_field() {
        let graph = RpGraph::new(Config::new("demo"));
        let json = to_json(&graph).unwrap();
        assert!(json.contains("\"schema_version\": \"1.0.0\""));
    }
}
