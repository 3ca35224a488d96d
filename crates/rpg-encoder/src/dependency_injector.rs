//! Dependency Injector — merges resolved imports, calls, and inheritance relations into typed
//! [`DependencyEdge`]s, plus module-granularity import [`DataFlowEdge`]s. Edge de-duplication by
//! `(source, target, type)` is enforced by `RpGraph::add_dependency_edge` itself; this module only
//! decides which edges to attempt.

use crate::symbols::{ResolvedCall, ResolvedInheritance};
use rpg_parser::inheritance::RelationKind;
use rpg_core::graph::{DataFlowEdge, DependencyEdge, DependencyType, RpGraph};
use std::path::{Path, PathBuf};

/// Maps a file (and, where known, a qualified entity name within it) to the node id the
/// orchestrator assigned it. Kept as a trait so this module doesn't need to know the
/// orchestrator's id scheme.
pub trait NodeResolver {
    fn file_node(&self, file: &Path) -> Option<String>;
    fn entity_node(&self, file: &Path, qualified_name: &str) -> Option<String>;
}

/// Everything the injector needs to run one pass: already-resolved call sites, inheritance
/// relations, and file-to-file import targets.
pub struct InjectionInput<'a> {
    pub resolved_calls: &'a [ResolvedCall],
    pub resolved_inheritance: &'a [ResolvedInheritance],
    pub import_targets: &'a [(PathBuf, PathBuf)],
}

/// Run one injection pass over `graph`. Edges whose endpoints don't resolve to a known node
/// (external imports, calls to unresolved symbols) are silently skipped, not logged as errors —
/// per the Symbol Resolver's "refuse to guess" contract, an unresolved reference is simply absent
/// rather than an error condition.
pub fn inject_dependencies<R: NodeResolver>(graph: &mut RpGraph, resolver: &R, input: &InjectionInput<'_>) {
    for (source_file, target_file) in input.import_targets {
        let Some(source_id) = resolver.file_node(source_file) else { continue };
        let Some(target_id) = resolver.file_node(target_file) else { continue };
        if source_id == target_id {
            continue;
        }
        let _ = graph.add_dependency_edge(DependencyEdge {
            source: source_id.clone(),
            target: target_id.clone(),
            dependency_type: DependencyType::Import,
            is_runtime: None,
            line: None,
        });
        graph.add_data_flow_edge(DataFlowEdge {
            from: source_id,
            to: target_id,
            data_id: format!("import:{}->{}", source_file.display(), target_file.display()),
            data_type: "import".to_string(),
            transformation: None,
        });
    }

    for call in input.resolved_calls {
        let source_id = call
            .source_entity
            .as_deref()
            .and_then(|name| resolver.entity_node(&call.source_file, name))
            .or_else(|| resolver.file_node(&call.source_file));
        let target_id = resolver
            .entity_node(&call.target_file, &call.target_symbol)
            .or_else(|| resolver.file_node(&call.target_file));
        let (Some(source_id), Some(target_id)) = (source_id, target_id) else { continue };
        if source_id == target_id {
            continue;
        }
        let _ = graph.add_dependency_edge(DependencyEdge {
            source: source_id,
            target: target_id,
            dependency_type: DependencyType::Call,
            is_runtime: None,
            line: call.line,
        });
    }

    for rel in input.resolved_inheritance {
        let source_id = resolver
            .entity_node(&rel.child_file, &rel.child_class)
            .or_else(|| resolver.file_node(&rel.child_file));
        let target_id = resolver
            .entity_node(&rel.target_file, &rel.target_symbol)
            .or_else(|| resolver.file_node(&rel.target_file));
        let (Some(source_id), Some(target_id)) = (source_id, target_id) else { continue };
        if source_id == target_id {
            continue;
        }
        let dependency_type = match rel.kind {
            RelationKind::Inherit => DependencyType::Inherit,
            RelationKind::Implement => DependencyType::Implement,
        };
        let _ = graph.add_dependency_edge(DependencyEdge {
            source: source_id,
            target: target_id,
            dependency_type,
            is_runtime: None,
            line: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpg_core::graph::{Config, Edge, EntityType, Feature, LowLevelNode, LowMetadata, Node};
    use std::collections::BTreeMap;

    struct FixtureResolver {
        files: BTreeMap<PathBuf, String>,
        entities: BTreeMap<(PathBuf, String), String>,
    }

    impl NodeResolver for FixtureResolver {
        fn file_node(&self, file: &Path) -> Option<String> {
            self.files.get(file).cloned()
        }
        fn entity_node(&self, file: &Path, qualified_name: &str) -> Option<String> {
            self.entities.get(&(file.to_path_buf(), qualified_name.to_string())).cloned()
        }
    }

    fn low_class(id: &str, path: &str) -> Node {
        Node::Low(LowLevelNode {
            id: id.to_string(),
            feature: Feature { description: "x".to_string(), keywords: vec![], sub_features: None },
            metadata: LowMetadata {
                entity_type: EntityType::Class,
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

    fn low_file(id: &str, path: &str) -> Node {
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

    #[test]
    fn import_edge_and_data_flow_edge_are_emitted() {
        let mut graph = RpGraph::new(Config::new("repo"));
        graph.add_node(low_file("dog.py", "dog.py")).unwrap();
        graph.add_node(low_file("animal.py", "animal.py")).unwrap();

        let resolver = FixtureResolver {
            files: BTreeMap::from([
                (PathBuf::from("dog.py"), "dog.py".to_string()),
                (PathBuf::from("animal.py"), "animal.py".to_string()),
            ]),
            entities: BTreeMap::new(),
        };
        let import_targets = vec![(PathBuf::from("dog.py"), PathBuf::from("animal.py"))];
        let input = InjectionInput { resolved_calls: &[], resolved_inheritance: &[], import_targets: &import_targets };

        inject_dependencies(&mut graph, &resolver, &input);

        assert_eq!(graph.data_flow_edges().len(), 1);
        assert_eq!(graph.data_flow_edges()[0].data_type, "import");
    }

    #[test]
    fn unresolved_import_target_is_skipped_without_error() {
        let mut graph = RpGraph::new(Config::new("repo"));
        graph.add_node(low_file("dog.py", "dog.py")).unwrap();

        let resolver = FixtureResolver {
            files: BTreeMap::from([(PathBuf::from("dog.py"), "dog.py".to_string())]),
            entities: BTreeMap::new(),
        };
        let import_targets = vec![(PathBuf::from("dog.py"), PathBuf::from("external_pkg"))];
        let input = InjectionInput { resolved_calls: &[], resolved_inheritance: &[], import_targets: &import_targets };

        inject_dependencies(&mut graph, &resolver, &input);

        assert!(graph.data_flow_edges().is_empty());
    }

    #[test]
    fn inherit_edge_requires_both_endpoints_be_classes_and_is_skipped_otherwise() {
        let mut graph = RpGraph::new(Config::new("repo"));
        graph.add_node(low_file("dog.py", "dog.py")).unwrap();
        graph.add_node(low_file("animal.py", "animal.py")).unwrap();

        let resolver = FixtureResolver {
            files: BTreeMap::from([
                (PathBuf::from("dog.py"), "dog.py".to_string()),
                (PathBuf::from("animal.py"), "animal.py".to_string()),
            ]),
            entities: BTreeMap::new(),
        };
        let resolved_inheritance = vec![ResolvedInheritance {
            child_file: PathBuf::from("dog.py"),
            child_class: "Dog".to_string(),
            target_file: PathBuf::from("animal.py"),
            target_symbol: "Animal".to_string(),
            kind: RelationKind::Inherit,
        }];
        let input =
            InjectionInput { resolved_calls: &[], resolved_inheritance: &resolved_inheritance, import_targets: &[] };

        // Neither endpoint resolves to an entity-level class node here, so both fall back to
        // file-level nodes; add_dependency_edge rejects inherit/implement between non-classes.
        inject_dependencies(&mut graph, &resolver, &input);

        let has_dependency_edge = graph.edges().iter().any(|e| matches!(e, Edge::Dependency(_)));
        assert!(!has_dependency_edge);
    }

    #[test]
    fn inherit_edge_between_class_nodes_is_created() {
        let mut graph = RpGraph::new(Config::new("repo"));
        graph.add_node(low_class("dog.py:Dog", "dog.py")).unwrap();
        graph.add_node(low_class("animal.py:Animal", "animal.py")).unwrap();

        let resolver = FixtureResolver {
            files: BTreeMap::new(),
            entities: BTreeMap::from([
                ((PathBuf::from("dog.py"), "Dog".to_string()), "dog.py:Dog".to_string()),
                ((PathBuf::from("animal.py"), "Animal".to_string()), "animal.py:Animal".to_string()),
            ]),
        };
        let resolved_inheritance = vec![ResolvedInheritance {
            child_file: PathBuf::from("dog.py"),
            child_class: "Dog".to_string(),
            target_file: PathBuf::from("animal.py"),
            target_symbol: "Animal".to_string(),
            kind: RelationKind::Inherit,
        }];
        let input =
            InjectionInput { resolved_calls: &[], resolved_inheritance: &resolved_inheritance, import_targets: &[] };

        inject_dependencies(&mut graph, &resolver, &input);

        let has_inherit_edge = graph.edges().iter().any(|e| match e {
            Edge::Dependency(d) => {
                d.source == "dog.py:Dog" && d.target == "animal.py:Animal" && d.dependency_type == DependencyType::Inherit
            }
            Edge::Functional(_) => false,
        });
        assert!(has_inherit_edge);
    }
}
