//! The Repository Planning Graph: a typed, dual-view graph of a repository's architecture
//! (feature hierarchy) and executable structure (imports, calls, inheritance).
//!
//! A [`RpGraph`] owns its nodes and edges exclusively; callers reach it only through the methods
//! here, never by poking at the maps directly, so the invariants in SPEC_FULL.md §3 hold after
//! every mutation.

use crate::error::RpgError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Per-RPG configuration. `github.commit` is the source of truth for "which commit this RPG
/// represents" (invariant 6: a 40-char lowercase hex SHA).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<GithubConfig>,
}

impl Config {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Config {
            name: name.into(),
            root_path: None,
            description: None,
            github: None,
        }
    }

    /// Stamp `commit` onto `config.github`, validating the 40-char lowercase hex shape
    /// (invariant 6). Creates a bare `GithubConfig` if none exists yet.
    pub fn stamp_commit(&mut self, owner: &str, repo: &str, commit: &str) -> Result<(), RpgError> {
        if !is_commit_sha(commit) {
            return Err(RpgError::Validation(format!(
                "commit stamp `{commit}` is not a 40-char lowercase hex SHA"
            )));
        }
        match &mut self.github {
            Some(gh) => commit.clone_into(&mut gh.commit),
            None => {
                self.github = Some(GithubConfig {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                    commit: commit.to_string(),
                    path_prefix: None,
                });
            }
        }
        Ok(())
    }
}

#[must_use]
pub fn is_commit_sha(s: &str) -> bool {
    s.len() == 40 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GithubConfig {
    pub owner: String,
    pub repo: String,
    pub commit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
}

// ---------------------------------------------------------------------------
// Feature
// ---------------------------------------------------------------------------

/// Embedded semantic description attached to every node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Feature {
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_features: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum EntityType {
    File,
    Class,
    Function,
    Method,
    Module,
}

/// Metadata for a [`LowLevelNode`] (atomic code entity).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LowMetadata {
    pub entity_type: EntityType,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualified_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// An atomic code entity: a file, class, function, method, or file-level module node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LowLevelNode {
    pub id: String,
    pub feature: Feature,
    pub metadata: LowMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Metadata for a [`HighLevelNode`] (architectural grouping). `path`/`extra.paths` are populated
/// by the Artifact Grounder (SPEC_FULL.md §4.8), not at construction time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HighMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl HighMetadata {
    #[must_use]
    pub fn entity_type(&self) -> &'static str {
        "module"
    }
}

/// An architectural container (domain/module) that may span many files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HighLevelNode {
    pub id: String,
    pub feature: Feature,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory_path: Option<String>,
    pub metadata: HighMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum Node {
    High(HighLevelNode),
    Low(LowLevelNode),
}

impl Node {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Node::High(h) => &h.id,
            Node::Low(l) => &l.id,
        }
    }

    #[must_use]
    pub fn feature(&self) -> &Feature {
        match self {
            Node::High(h) => &h.feature,
            Node::Low(l) => &l.feature,
        }
    }

    pub fn feature_mut(&mut self) -> &mut Feature {
        match self {
            Node::High(h) => &mut h.feature,
            Node::Low(l) => &mut l.feature,
        }
    }

    #[must_use]
    pub fn embedding(&self) -> Option<&[f32]> {
        match self {
            Node::High(h) => h.embedding.as_deref(),
            Node::Low(l) => l.embedding.as_deref(),
        }
    }

    pub fn set_embedding(&mut self, embedding: Vec<f32>) {
        match self {
            Node::High(h) => h.embedding = Some(embedding),
            Node::Low(l) => l.embedding = Some(embedding),
        }
    }

    #[must_use]
    pub fn as_low(&self) -> Option<&LowLevelNode> {
        match self {
            Node::Low(l) => Some(l),
            Node::High(_) => None,
        }
    }

    #[must_use]
    pub fn as_high(&self) -> Option<&HighLevelNode> {
        match self {
            Node::High(h) => Some(h),
            Node::Low(_) => None,
        }
    }

    #[must_use]
    pub fn is_class(&self) -> bool {
        matches!(
            self,
            Node::Low(l) if l.metadata.entity_type == EntityType::Class
        )
    }

    /// A node has a "code anchor" when it is itself a low-level entity (an orphaned high-level
    /// node, by definition, never has one — see the `Orphan` glossary entry).
    #[must_use]
    pub fn has_code_anchor(&self) -> bool {
        matches!(self, Node::Low(_))
    }
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionalEdge {
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sibling_order: Option<u32>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    Import,
    Call,
    Inherit,
    Implement,
    Use,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DependencyEdge {
    pub source: String,
    pub target: String,
    pub dependency_type: DependencyType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_runtime: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind")]
pub enum Edge {
    Functional(FunctionalEdge),
    Dependency(DependencyEdge),
}

impl Edge {
    #[must_use]
    pub fn source(&self) -> &str {
        match self {
            Edge::Functional(f) => &f.source,
            Edge::Dependency(d) => &d.source,
        }
    }

    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Edge::Functional(f) => &f.target,
            Edge::Dependency(d) => &d.target,
        }
    }
}

/// Inter-module data-flow record, stored out-of-band from the typed edge set (SPEC_FULL.md §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DataFlowEdge {
    pub from: String,
    pub to: String,
    pub data_id: String,
    pub data_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    Both,
}

// ---------------------------------------------------------------------------
// RpGraph
// ---------------------------------------------------------------------------

/// The Repository Planning Graph. Owns all nodes and edges; a reverse child index is maintained
/// alongside `edges` so "children of X by sibling order" never needs a linear scan (design note:
/// "Hierarchy as a forest + side index").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpGraph {
    pub config: Config,
    nodes: BTreeMap<String, Node>,
    edges: Vec<Edge>,
    data_flow_edges: Vec<DataFlowEdge>,

    #[serde(skip)]
    children_of: BTreeMap<String, Vec<String>>,
    #[serde(skip)]
    parent_of: BTreeMap<String, String>,
}

impl RpGraph {
    #[must_use]
    pub fn new(config: Config) -> Self {
        RpGraph {
            config,
            nodes: BTreeMap::new(),
            edges: Vec::new(),
            data_flow_edges: Vec::new(),
            children_of: BTreeMap::new(),
            parent_of: BTreeMap::new(),
        }
    }

    // -- nodes ---------------------------------------------------------

    /// Invariant 1: fails deterministically on a duplicate id.
    pub fn add_node(&mut self, node: Node) -> Result<(), RpgError> {
        let id = node.id().to_string();
        if self.nodes.contains_key(&id) {
            return Err(RpgError::Validation(format!("duplicate node id `{id}`")));
        }
        self.nodes.insert(id, node);
        Ok(())
    }

    #[must_use]
    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    #[must_use]
    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn get_nodes(&self, predicate: impl Fn(&Node) -> bool) -> Vec<&Node> {
        self.nodes.values().filter(|n| predicate(n)).collect()
    }

    /// Removes a node and cascades: incident edges, functional parent/child links, and any
    /// `DataFlowEdge`s that reference it.
    pub fn remove_node(&mut self, id: &str) -> Option<Node> {
        let removed = self.nodes.remove(id)?;
        self.edges.retain(|e| e.source() != id && e.target() != id);
        self.data_flow_edges.retain(|e| e.from != id && e.to != id);
        if let Some(parent) = self.parent_of.remove(id)
            && let Some(siblings) = self.children_of.get_mut(&parent)
        {
            siblings.retain(|c| c != id);
        }
        if let Some(children) = self.children_of.remove(id) {
            for child in children {
                self.parent_of.remove(&child);
            }
        }
        Some(removed)
    }

    // -- functional hierarchy ------------------------------------------

    /// Adds a parent→child edge in the feature hierarchy. Enforces invariant 3 (forest: at most
    /// one functional parent per node, no cycles).
    pub fn add_functional_edge(
        &mut self,
        source: &str,
        target: &str,
        level: Option<u32>,
        sibling_order: Option<u32>,
    ) -> Result<(), RpgError> {
        if !self.nodes.contains_key(source) {
            return Err(RpgError::Validation(format!(
                "functional edge source `{source}` does not exist"
            )));
        }
        if !self.nodes.contains_key(target) {
            return Err(RpgError::Validation(format!(
                "functional edge target `{target}` does not exist"
            )));
        }
        if let Some(existing) = self.parent_of.get(target)
            && existing != source
        {
            return Err(RpgError::Validation(format!(
                "`{target}` already has a functional parent `{existing}`"
            )));
        }
        // Cycle check: target must not already be an ancestor of source.
        let mut cursor = Some(source.to_string());
        while let Some(ref cur) = cursor {
            if cur == target {
                return Err(RpgError::Validation(format!(
                    "functional edge `{source}` -> `{target}` would create a cycle"
                )));
            }
            cursor = self.parent_of.get(cur).cloned();
        }

        self.edges.push(Edge::Functional(FunctionalEdge {
            source: source.to_string(),
            target: target.to_string(),
            level,
            sibling_order,
        }));
        self.parent_of.insert(target.to_string(), source.to_string());
        let siblings = self.children_of.entry(source.to_string()).or_default();
        if !siblings.contains(&target.to_string()) {
            siblings.push(target.to_string());
        }
        let edges = &self.edges;
        siblings.sort_by_key(|id| {
            edges
                .iter()
                .filter_map(|e| match e {
                    Edge::Functional(f) if f.source == source && &f.target == id => f.sibling_order,
                    _ => None,
                })
                .next()
                .unwrap_or(u32::MAX)
        });
        Ok(())
    }

    #[must_use]
    pub fn children_of(&self, id: &str) -> &[String] {
        self.children_of.get(id).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.parent_of.get(id).map(String::as_str)
    }

    /// Detaches `id` from its current functional parent, if any (used by the Evolver before
    /// re-routing a drifted entity).
    pub fn detach_functional_parent(&mut self, id: &str) {
        if let Some(parent) = self.parent_of.remove(id) {
            if let Some(siblings) = self.children_of.get_mut(&parent) {
                siblings.retain(|c| c != id);
            }
            self.edges
                .retain(|e| !matches!(e, Edge::Functional(f) if f.source == parent && f.target == id));
        }
    }

    // -- dependency edges ------------------------------------------------

    /// Adds a dependency edge. Enforces invariant 2 (endpoints exist), invariant 8 (inherit/
    /// implement endpoints are classes), and de-duplicates same `(source, target, type)` triples.
    pub fn add_dependency_edge(&mut self, edge: DependencyEdge) -> Result<(), RpgError> {
        let source_node = self.nodes.get(&edge.source).ok_or_else(|| {
            RpgError::Validation(format!("edge source `{}` does not exist", edge.source))
        })?;
        let target_node = self.nodes.get(&edge.target).ok_or_else(|| {
            RpgError::Validation(format!("edge target `{}` does not exist", edge.target))
        })?;

        if matches!(
            edge.dependency_type,
            DependencyType::Inherit | DependencyType::Implement
        ) && !(source_node.is_class() && target_node.is_class())
        {
            return Err(RpgError::Validation(format!(
                "inherit/implement edge `{}` -> `{}` requires both endpoints to be classes",
                edge.source, edge.target
            )));
        }

        let duplicate = self.edges.iter().any(|e| match e {
            Edge::Dependency(d) => {
                d.source == edge.source
                    && d.target == edge.target
                    && d.dependency_type == edge.dependency_type
            }
            Edge::Functional(_) => false,
        });
        if !duplicate {
            self.edges.push(Edge::Dependency(edge));
        }
        Ok(())
    }

    pub fn add_data_flow_edge(&mut self, edge: DataFlowEdge) {
        if !self.data_flow_edges.contains(&edge) {
            self.data_flow_edges.push(edge);
        }
    }

    #[must_use]
    pub fn data_flow_edges(&self) -> &[DataFlowEdge] {
        &self.data_flow_edges
    }

    pub fn clear_data_flow_edges(&mut self) {
        self.data_flow_edges.clear();
    }

    /// Drops every [`Edge::Dependency`], leaving the functional forest untouched. The Evolver
    /// uses this before a full re-injection pass so stale import/call/inherit edges from changed
    /// files don't linger alongside freshly resolved ones.
    pub fn clear_dependency_edges(&mut self) {
        self.edges.retain(|e| matches!(e, Edge::Functional(_)));
    }

    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Sorts `edges` by `(source, target)` for stable, deterministic persistence (§6.4: "edges
    /// sorted by (source,target)").
    pub fn sort_edges(&mut self) {
        self.edges
            .sort_by(|a, b| (a.source(), a.target()).cmp(&(b.source(), b.target())));
    }

    pub fn get_edges(&self, predicate: impl Fn(&Edge) -> bool) -> Vec<&Edge> {
        self.edges.iter().filter(|e| predicate(e)).collect()
    }

    pub fn remove_edges_between(&mut self, source: &str, target: &str) {
        self.edges
            .retain(|e| !(e.source() == source && e.target() == target));
    }

    #[must_use]
    pub fn neighbors(&self, id: &str, direction: Direction) -> Vec<&str> {
        self.edges
            .iter()
            .filter_map(|e| match direction {
                Direction::Out if e.source() == id => Some(e.target()),
                Direction::In if e.target() == id => Some(e.source()),
                Direction::Both if e.source() == id => Some(e.target()),
                Direction::Both if e.target() == id => Some(e.source()),
                _ => None,
            })
            .collect()
    }

    /// Breadth-first traversal from `start_id`, bounded by `max_depth` (`None` = unbounded).
    #[must_use]
    pub fn traverse(&self, start_id: &str, direction: Direction, max_depth: Option<usize>) -> Vec<String> {
        let mut visited = std::collections::HashSet::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((start_id.to_string(), 0));
        visited.insert(start_id.to_string());
        let mut order = Vec::new();

        while let Some((id, depth)) = queue.pop_front() {
            order.push(id.clone());
            if max_depth.is_some_and(|m| depth >= m) {
                continue;
            }
            for next in self.neighbors(&id, direction) {
                if visited.insert(next.to_string()) {
                    queue.push_back((next.to_string(), depth + 1));
                }
            }
        }
        order
    }

    /// Referential-integrity check (property 2): every edge's endpoints must resolve to a node.
    #[must_use]
    pub fn check_referential_integrity(&self) -> Vec<String> {
        self.edges
            .iter()
            .filter_map(|e| {
                if !self.nodes.contains_key(e.source()) {
                    Some(format!("edge references missing source `{}`", e.source()))
                } else if !self.nodes.contains_key(e.target()) {
                    Some(format!("edge references missing target `{}`", e.target()))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Rebuilds `children_of`/`parent_of` from `edges`. Needed after deserialization (both
    /// indices are `#[serde(skip)]`) or after bulk edge mutation outside the mutation helpers.
    pub fn rebuild_indexes(&mut self) {
        self.children_of.clear();
        self.parent_of.clear();
        let mut functional: Vec<&FunctionalEdge> = self
            .edges
            .iter()
            .filter_map(|e| match e {
                Edge::Functional(f) => Some(f),
                Edge::Dependency(_) => None,
            })
            .collect();
        functional.sort_by_key(|f| f.sibling_order.unwrap_or(u32::MAX));
        for f in functional {
            self.parent_of.insert(f.target.clone(), f.source.clone());
            self.children_of
                .entry(f.source.clone())
                .or_default()
                .push(f.target.clone());
        }
    }

    /// Stamps `config.github.commit`, validating the SHA shape (invariant 6, property 11).
    pub fn stamp_commit(&mut self, owner: &str, repo: &str, commit: &str) -> Result<(), RpgError> {
        self.config.stamp_commit(owner, repo, commit)
    }
}
