//! Artifact Grounder — anchors every `HighLevelNode` to the directories its leaf descendants
//! actually live in, via [`rpg_core::lca::compute_lca`].

use rpg_core::graph::{Node, RpGraph};
use rpg_core::lca::compute_lca;
use std::path::PathBuf;

/// Ground every `HighLevelNode` in `graph`: `metadata.path` becomes the alphabetically-first LCA
/// of its transitive leaf descendants' paths, and `metadata.paths` carries the full LCA set when
/// there is more than one. Pre-existing `metadata.extra` entries are untouched. A node with no
/// groundable descendants is left as-is.
pub fn ground_hierarchy(graph: &mut RpGraph) {
    let high_ids: Vec<String> = graph
        .get_nodes(|n| matches!(n, Node::High(_)))
        .into_iter()
        .map(|n| n.id().to_string())
        .collect();

    for id in high_ids {
        let mut paths = Vec::new();
        collect_leaf_paths(graph, &id, &mut paths);
        let lcas = compute_lca(&paths);
        if lcas.is_empty() {
            continue;
        }

        let primary = lcas[0].display().to_string();
        let extra: Vec<String> = if lcas.len() > 1 {
            lcas.iter().map(|p| p.display().to_string()).collect()
        } else {
            Vec::new()
        };

        if let Some(Node::High(node)) = graph.get_node_mut(&id) {
            node.metadata.path = Some(primary);
            node.metadata.paths = extra;
        }
    }
}

/// Walk `id`'s functional children, collecting every `LowLevelNode`'s `metadata.path` (skipping
/// blank paths) and recursing into nested `HighLevelNode`s.
fn collect_leaf_paths(graph: &RpGraph, id: &str, out: &mut Vec<PathBuf>) {
    for child_id in graph.children_of(id).to_vec() {
        match graph.get_node(&child_id) {
            Some(Node::Low(low)) => {
                if !low.metadata.path.is_empty() {
                    out.push(PathBuf::from(&low.metadata.path));
                }
            }
            Some(Node::High(_)) => collect_leaf_paths(graph, &child_id, out),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpg_core::graph::{Config, EntityType, Feature, HighLevelNode, HighMetadata, LowLevelNode, LowMetadata};

    fn low(id: &str, path: &str) -> Node {
        Node::Low(LowLevelNode {
            id: id.to_string(),
            feature: Feature { description: "x".to_string(), keywords: vec![], sub_features: None },
            metadata: LowMetadata {
                entity_type: EntityType::File,
                path: path.to_string(),
                start_line: None,
                end_line: None,
                qualified_name: None,
                language: None,
                extra: Default::default(),
            },
            source_code: None,
            embedding: None,
        })
    }

    fn high(id: &str) -> Node {
        Node::High(HighLevelNode {
            id: id.to_string(),
            feature: Feature { description: "area".to_string(), keywords: vec![], sub_features: None },
            directory_path: None,
            metadata: HighMetadata { path: None, paths: vec![], extra: Default::default() },
            embedding: None,
        })
    }

    #[test]
    fn single_directory_children_ground_to_that_directory() {
        let mut graph = RpGraph::new(Config::new("repo"));
        graph.add_node(high("area:core")).unwrap();
        graph.add_node(low("src/a.rs:fileA", "src/a.rs")).unwrap();
        graph.add_node(low("src/b.rs:fileB", "src/b.rs")).unwrap();
        graph.add_functional_edge("area:core", "src/a.rs:fileA", None, None).unwrap();
        graph.add_functional_edge("area:core", "src/b.rs:fileB", None, None).unwrap();

        ground_hierarchy(&mut graph);

        let Some(Node::High(node)) = graph.get_node("area:core") else { panic!("missing node") };
        assert_eq!(node.metadata.path.as_deref(), Some("src"));
        assert!(node.metadata.paths.is_empty());
    }

    #[test]
    fn divergent_directories_populate_paths() {
        let mut graph = RpGraph::new(Config::new("repo"));
        graph.add_node(high("area:core")).unwrap();
        graph.add_node(low("src/a/x.rs:fa", "src/a/x.rs")).unwrap();
        graph.add_node(low("src/b/y.rs:fb", "src/b/y.rs")).unwrap();
        graph.add_functional_edge("area:core", "src/a/x.rs:fa", None, None).unwrap();
        graph.add_functional_edge("area:core", "src/b/y.rs:fb", None, None).unwrap();

        ground_hierarchy(&mut graph);

        let Some(Node::High(node)) = graph.get_node("area:core") else { panic!("missing node") };
        assert_eq!(node.metadata.path.as_deref(), Some("src/a"));
        assert_eq!(node.metadata.paths.len(), 2);
    }

    #[test]
    fn node_with_no_children_is_left_ungrounded() {
        let mut graph = RpGraph::new(Config::new("repo"));
        graph.add_node(high("area:empty")).unwrap();

        ground_hierarchy(&mut graph);

        let Some(Node::High(node)) = graph.get_node("area:empty") else { panic!("missing node") };
        assert!(node.metadata.path.is_none());
    }
}
