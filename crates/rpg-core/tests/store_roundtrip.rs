use rpg_core::config::StorageConfig;
use rpg_core::graph::{Config, DependencyEdge, DependencyType, EntityType, Feature, LowLevelNode, LowMetadata, Node, RpGraph};
use rpg_core::store::{FileGraphStore, GraphStore};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn low(id: &str, path: &str) -> Node {
    Node::Low(LowLevelNode {
        id: id.to_string(),
        feature: Feature {
            description: "does a thing".into(),
            keywords: vec!["test".into()],
            sub_features: None,
        },
        metadata: LowMetadata {
            entity_type: EntityType::Function,
            path: path.to_string(),
            start_line: Some(1),
            end_line: Some(5),
            qualified_name: None,
            language: Some("rust".into()),
            extra: BTreeMap::new(),
        },
        source_code: None,
        embedding: None,
    })
}

#[test]
fn round_trips_empty_graph() {
    let tmp = TempDir::new().unwrap();
    let store = FileGraphStore::new(tmp.path(), StorageConfig::default());

    let graph = RpGraph::new(Config::new("demo"));
    store.save(&graph).unwrap();

    let loaded = store.load().unwrap().unwrap();
    assert_eq!(loaded.node_count(), 0);
}

#[test]
fn round_trips_nodes_and_dependency_edges() {
    let tmp = TempDir::new().unwrap();
    let store = FileGraphStore::new(tmp.path(), StorageConfig::default());

    let mut graph = RpGraph::new(Config::new("demo"));
    graph.add_node(low("f.rs:a", "f.rs")).unwrap();
    graph.add_node(low("f.rs:b", "f.rs")).unwrap();
    graph
        .add_dependency_edge(DependencyEdge {
            source: "f.rs:a".into(),
            target: "f.rs:b".into(),
            dependency_type: DependencyType::Call,
            is_runtime: None,
            line: Some(4),
        })
        .unwrap();

    store.save(&graph).unwrap();
    let loaded = store.load().unwrap().unwrap();

    assert_eq!(loaded.node_count(), 2);
    assert_eq!(loaded.edges().len(), 1);
    assert!(
        loaded
            .get_node("f.rs:a")
            .unwrap()
            .feature()
            .keywords
            .contains(&"test".to_string())
    );
}

#[test]
fn load_missing_graph_returns_none() {
    let tmp = TempDir::new().unwrap();
    let store = FileGraphStore::new(tmp.path(), StorageConfig::default());
    assert!(store.load().unwrap().is_none());
}

#[test]
fn backup_copies_existing_graph_aside() {
    let tmp = TempDir::new().unwrap();
    let store = FileGraphStore::new(tmp.path(), StorageConfig::default());

    assert!(store.backup().unwrap().is_none());

    store.save(&RpGraph::new(Config::new("demo"))).unwrap();
    let backup_path = store.backup().unwrap().unwrap();
    assert!(backup_path.exists());
    assert_eq!(backup_path.file_name().unwrap(), "graph.backup.json");
}

#[test]
fn compressed_round_trip_detected_by_magic_bytes() {
    let tmp = TempDir::new().unwrap();
    let store = FileGraphStore::new(tmp.path(), StorageConfig { compress: true });

    let mut graph = RpGraph::new(Config::new("demo"));
    graph.add_node(low("f.rs:a", "f.rs")).unwrap();
    store.save(&graph).unwrap();

    let loaded = store.load().unwrap().unwrap();
    assert_eq!(loaded.node_count(), 1);
}

#[test]
fn save_scaffolds_rpg_directory() {
    let tmp = TempDir::new().unwrap();
    let store = FileGraphStore::new(tmp.path(), StorageConfig::default());
    store.save(&RpGraph::new(Config::new("demo"))).unwrap();

    assert!(tmp.path().join(".rpg/.gitignore").exists());
    assert!(tmp.path().join(".rpg/README.md").exists());
}
