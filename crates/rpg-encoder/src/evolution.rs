//! Evolver — incrementally updates an existing RPG against a later commit: diff the revision
//! range, then run delete, modify, insert strictly in that order, computing semantic drift to
//! decide whether a modified entity stays in place or re-routes to a new functional parent.

use crate::cache::SemanticCache;
use crate::dependency_injector::{InjectionInput, inject_dependencies};
use crate::diff::{FileChange, diff_range};
use crate::orchestrator::{
    GraphNodeResolver, add_entity_nodes, link_entity_hierarchy, lift_feature, resolve_calls, stamp_repository,
};
use crate::router::SemanticRouter;
use crate::symbols::{SymbolTable, resolve_inheritance};

use rpg_core::config::RpgConfig;
use rpg_core::embedding::{EmbeddingClient, cosine_similarity};
use rpg_core::error::RpgError;
use rpg_core::graph::{EntityType, Feature, LowLevelNode, LowMetadata, Node, RpGraph};
use rpg_core::llm::LlmClient;

use rpg_parser::ast::{RawEntity, parse_repository};
use rpg_parser::calls::{ScopeSpan, extract_calls};
use rpg_parser::inheritance::extract_inheritance;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Outcome of one `evolve` run.
#[derive(Debug, Default)]
pub struct EvolveResult {
    pub inserted: usize,
    pub deleted: usize,
    pub modified: usize,
    pub rerouted: usize,
    pub pruned_nodes: usize,
    pub duration: Duration,
    pub llm_calls: u32,
    pub errors: Vec<RpgError>,
}

pub async fn evolve<L: LlmClient, E: EmbeddingClient>(
    project_root: &Path,
    graph: &mut RpGraph,
    commit_range: &str,
    config: &RpgConfig,
    llm: Option<&L>,
    embedder: Option<&E>,
) -> Result<EvolveResult, RpgError> {
    let start = Instant::now();
    let mut result = EvolveResult::default();

    let changes = match diff_range(project_root, commit_range) {
        Ok(changes) => changes,
        Err(err) => {
            result.errors.push(RpgError::Git(err.to_string()));
            result.duration = start.elapsed();
            return Ok(result);
        }
    };

    let mut added = Vec::new();
    let mut modified = Vec::new();
    let mut deleted = Vec::new();
    for change in changes {
        match change {
            FileChange::Added(p) => added.push(p),
            FileChange::Modified(p) => modified.push(p),
            FileChange::Deleted(p) => deleted.push(p),
        }
    }

    // Phase D: delete nodes for removed files, then recursively prune orphaned ancestors.
    result.deleted += delete_files(graph, &deleted);
    result.pruned_nodes += prune_orphans(graph);

    // Reparse the whole tree once: this gives an accurate cross-file symbol table for the
    // dependency re-injection pass at the end, at the cost of not scoping AST work to just the
    // changed files (SPEC_FULL.md leaves this a matter of engineering taste, not correctness).
    //
    // parse_repository yields absolute paths (both the outer tuple and every RawEntity::file);
    // orchestrator's node maps, and this file's own, are keyed on the same relative paths that
    // diff.rs and node metadata use, so both are rewritten to relative here, once, up front.
    let parsed_rel = relativize(parse_repository(project_root), project_root);
    let entities_by_file: BTreeMap<PathBuf, Vec<RawEntity>> =
        parsed_rel.iter().map(|(path, r)| (path.clone(), r.entities.clone())).collect();

    let mut cache = SemanticCache::load(project_root, config.encoding.cache_ttl_secs, true);
    let mut router = SemanticRouter::new();
    let mut llm_calls = 0u32;

    // Phase M: reconcile each modified file's new entity set against what the graph already has.
    let mut insert_candidates: BTreeMap<PathBuf, Vec<RawEntity>> = BTreeMap::new();
    for file in &modified {
        let new_entities = entities_by_file.get(file).cloned().unwrap_or_default();
        let (file_node_ids, entity_node_ids) = collect_node_maps(graph);
        if !file_node_ids.contains_key(file) {
            continue;
        }

        let mut seen_qualified = std::collections::BTreeSet::new();
        for entity in &new_entities {
            let qualified = entity.qualified_name();
            seen_qualified.insert(qualified.clone());

            match entity_node_ids.get(&(file.clone(), qualified.clone())) {
                Some(node_id) => {
                    let new_feature = lift_feature(&mut cache, entity, llm, config.encoding.max_parse_iterations).await;
                    if llm.is_some() {
                        llm_calls += 1;
                    }
                    let old_description = graph.get_node(node_id).map(|n| n.feature().description.clone()).unwrap_or_default();
                    let drift =
                        semantic_drift(graph, node_id, &old_description, &new_feature.description, embedder).await;

                    if drift > config.encoding.drift_threshold {
                        graph.detach_functional_parent(node_id);
                        let new_parent = router.find_best_parent(graph, &new_feature.description, llm, embedder).await;
                        llm_calls += router.llm_calls();
                        router.reset();
                        let target = new_parent.or_else(|| any_root(graph));
                        match target {
                            Some(parent_id) if parent_id != *node_id => {
                                let _ = graph.add_functional_edge(&parent_id, node_id, None, None);
                            }
                            _ => tracing::warn!(node = %node_id, "router found no safe parent, leaving node unrooted"),
                        }
                        result.rerouted += 1;
                    } else if let Some(node) = graph.get_node_mut(node_id) {
                        *node.feature_mut() = new_feature;
                        if let Node::Low(low) = node {
                            low.metadata.start_line = Some(entity.line_start as u32);
                            low.metadata.end_line = Some(entity.line_end as u32);
                            low.source_code = Some(entity.source_code.clone());
                        }
                        result.modified += 1;
                    }
                }
                None => insert_candidates.entry(file.clone()).or_default().push(entity.clone()),
            }
        }

        // Entities that existed in the old graph for this file but aren't in the new parse.
        let stale_ids: Vec<String> = entity_node_ids
            .iter()
            .filter(|((f, q), _)| f == file && !seen_qualified.contains(q))
            .map(|(_, id)| id.clone())
            .collect();
        for id in stale_ids {
            graph.remove_node(&id);
            result.deleted += 1;
        }
    }
    result.pruned_nodes += prune_orphans(graph);

    // Phase I: brand-new files, plus entities Phase M accumulated from modified files.
    for file in &added {
        let new_entities = entities_by_file.get(file).cloned().unwrap_or_default();
        ensure_file_node(graph, file, &parsed_rel);
        insert_candidates.entry(file.clone()).or_default().extend(new_entities);
    }

    for (file, entities) in &insert_candidates {
        let (file_node_ids, mut entity_node_ids) = collect_node_maps(graph);
        let Some(file_id) = file_node_ids.get(file).cloned() else { continue };

        add_entity_nodes(graph, entities, &mut entity_node_ids);
        link_entity_hierarchy(graph, entities, &file_node_ids, &entity_node_ids);

        for entity in entities {
            let feature = lift_feature(&mut cache, entity, llm, config.encoding.max_parse_iterations).await;
            if llm.is_some() {
                llm_calls += 1;
            }
            if let Some(id) = entity_node_ids.get(&(entity.file.clone(), entity.qualified_name()))
                && let Some(node) = graph.get_node_mut(id)
            {
                *node.feature_mut() = feature;
            }
            result.inserted += 1;
        }

        // Route the file itself into the feature hierarchy if one exists; otherwise it stays a
        // root of the functional forest, same as an unreorganized encode.
        if has_area_nodes(graph) {
            let description = graph.get_node(&file_id).map(|n| n.feature().description.clone()).unwrap_or_default();
            if let Some(area_id) = router.find_best_parent(graph, &description, llm, embedder).await {
                llm_calls += router.llm_calls();
                router.reset();
                let _ = graph.add_functional_edge(&area_id, &file_id, None, None);
            }
        }
    }

    refresh_file_features(graph, &modified);
    refresh_file_features(graph, &added);
    let _ = cache.save();

    // Re-inject dependency edges from scratch against the full, current parse: stale edges
    // pointing at removed symbols are gone because they were cleared, not because they were
    // individually retracted.
    graph.clear_dependency_edges();
    graph.clear_data_flow_edges();
    reinject_dependencies(graph, &parsed_rel, project_root);

    stamp_repository(graph, project_root);

    result.llm_calls = llm_calls;
    result.duration = start.elapsed();
    Ok(result)
}

/// Removes every node (file and entity alike) whose `metadata.path` matches one of `deleted`.
fn delete_files(graph: &mut RpGraph, deleted: &[PathBuf]) -> usize {
    let mut removed = 0;
    for file in deleted {
        let path_str = file.display().to_string();
        let ids: Vec<String> = graph
            .get_nodes(|n| matches!(n, Node::Low(l) if l.metadata.path == path_str))
            .into_iter()
            .map(|n| n.id().to_string())
            .collect();
        for id in ids {
            graph.remove_node(&id);
            removed += 1;
        }
    }
    removed
}

/// Recursively removes `HighLevelNode`s that have no functional children left, repeating to
/// fixpoint (a pruned node's own parent may become childless in turn).
fn prune_orphans(graph: &mut RpGraph) -> usize {
    let mut pruned = 0;
    loop {
        let orphans: Vec<String> = graph
            .get_nodes(|n| matches!(n, Node::High(_)) && graph.children_of(n.id()).is_empty())
            .into_iter()
            .map(|n| n.id().to_string())
            .collect();
        if orphans.is_empty() {
            break;
        }
        for id in orphans {
            graph.remove_node(&id);
            pruned += 1;
        }
    }
    pruned
}

/// Semantic drift between `old_description` and `new_description`: `1 - cosine(embedding)` when
/// both the stored node embedding and a freshly computed one are available, otherwise `0` for
/// identical strings and `1` for anything else.
async fn semantic_drift<E: EmbeddingClient>(
    graph: &RpGraph,
    node_id: &str,
    old_description: &str,
    new_description: &str,
    embedder: Option<&E>,
) -> f64 {
    if let Some(embedder) = embedder
        && let Some(old_embedding) = graph.get_node(node_id).and_then(Node::embedding)
        && let Ok(new_embedding) = embedder.embed(new_description).await
    {
        return 1.0 - f64::from(cosine_similarity(old_embedding, &new_embedding));
    }
    if old_description == new_description { 0.0 } else { 1.0 }
}

fn any_root(graph: &RpGraph) -> Option<String> {
    graph
        .get_nodes(|n| matches!(n, Node::High(_)) && graph.parent_of(n.id()).is_none())
        .into_iter()
        .map(|n| n.id().to_string())
        .next()
}

fn has_area_nodes(graph: &RpGraph) -> bool {
    !graph.get_nodes(|n| matches!(n, Node::High(_))).is_empty()
}

/// Rewrites every path in a `parse_repository` result from absolute to `project_root`-relative,
/// including each [`RawEntity::file`] — the rest of this module, like the graph's own node
/// metadata and `diff.rs`'s [`FileChange`]s, keys everything on the relative form.
fn relativize(
    parsed: Vec<(PathBuf, rpg_parser::ast::ParseResult)>,
    project_root: &Path,
) -> Vec<(PathBuf, rpg_parser::ast::ParseResult)> {
    parsed
        .into_iter()
        .map(|(path, mut result)| {
            let rel = path.strip_prefix(project_root).unwrap_or(&path).to_path_buf();
            for entity in &mut result.entities {
                entity.file = entity.file.strip_prefix(project_root).unwrap_or(&entity.file).to_path_buf();
            }
            (rel, result)
        })
        .collect()
}

fn ensure_file_node(graph: &mut RpGraph, file: &Path, parsed_rel: &[(PathBuf, rpg_parser::ast::ParseResult)]) {
    let path_str = file.display().to_string();
    if graph.get_nodes(|n| matches!(n, Node::Low(l) if l.metadata.entity_type == EntityType::File && l.metadata.path == path_str)).first().is_some()
    {
        return;
    }
    let language = parsed_rel.iter().find(|(p, _)| p == file).and_then(|(_, r)| r.language).map(|l| format!("{l:?}").to_lowercase());
    let _ = graph.add_node(Node::Low(LowLevelNode {
        id: format!("file:{}", file.display()),
        feature: Feature::default(),
        metadata: LowMetadata {
            entity_type: EntityType::File,
            path: path_str,
            start_line: None,
            end_line: None,
            qualified_name: None,
            language,
            extra: Default::default(),
        },
        source_code: None,
        embedding: None,
    }));
}

/// Builds `(file -> node id, (file, qualified_name) -> node id)` maps from the graph's current
/// node set. Scans every `Low` node, so callers re-derive this once per phase rather than
/// threading a stale map across mutations.
fn collect_node_maps(graph: &RpGraph) -> (BTreeMap<PathBuf, String>, BTreeMap<(PathBuf, String), String>) {
    let mut file_node_ids = BTreeMap::new();
    let mut entity_node_ids = BTreeMap::new();
    for node in graph.get_nodes(|_| true) {
        let Node::Low(low) = node else { continue };
        let path = PathBuf::from(&low.metadata.path);
        if low.metadata.entity_type == EntityType::File {
            file_node_ids.insert(path, node.id().to_string());
        } else if let Some(qualified_name) = &low.metadata.qualified_name {
            entity_node_ids.insert((path, qualified_name.clone()), node.id().to_string());
        }
    }
    (file_node_ids, entity_node_ids)
}

fn refresh_file_features(graph: &mut RpGraph, files: &[PathBuf]) {
    for file in files {
        let path_str = file.display().to_string();
        let Some(file_id) = graph
            .get_nodes(|n| matches!(n, Node::Low(l) if l.metadata.entity_type == EntityType::File && l.metadata.path == path_str))
            .first()
            .map(|n| n.id().to_string())
        else {
            continue;
        };
        let children: Vec<Feature> =
            graph.children_of(&file_id).iter().filter_map(|id| graph.get_node(id)).map(|n| n.feature().clone()).collect();
        let file_name = file.file_name().and_then(|n| n.to_str()).unwrap_or("file").to_string();
        let aggregated = crate::semantic::aggregate_file_feature(&children, &file_name);
        if let Some(node) = graph.get_node_mut(&file_id) {
            *node.feature_mut() = aggregated;
        }
    }
}

fn reinject_dependencies(
    graph: &mut RpGraph,
    parsed_rel: &[(PathBuf, rpg_parser::ast::ParseResult)],
    project_root: &Path,
) {
    let mut all_entities: Vec<RawEntity> = Vec::new();
    let mut all_inheritance = Vec::new();
    let mut all_calls = Vec::new();
    for (path, result) in parsed_rel {
        if result.entities.is_empty() {
            continue;
        }
        let scopes: Vec<ScopeSpan> = result
            .entities
            .iter()
            .map(|e| ScopeSpan {
                name: e.qualified_name(),
                start_row: e.line_start.saturating_sub(1),
                end_row: e.line_end.saturating_sub(1),
            })
            .collect();
        let source = std::fs::read_to_string(project_root.join(path)).unwrap_or_default();
        all_calls.extend(extract_calls(path, &source, result.language, &scopes));
        all_inheritance.extend(extract_inheritance(path, &source, result.language));
        all_entities.extend(result.entities.iter().cloned());
    }

    let symbol_table = SymbolTable::build(parsed_rel);
    let type_inferrer = crate::types::TypeInferrer::build(&all_entities, &all_inheritance);
    let resolved_calls = resolve_calls(&all_calls, &all_entities, parsed_rel, &symbol_table, &type_inferrer);
    let resolved_inheritance: Vec<_> = all_inheritance.iter().filter_map(|rel| resolve_inheritance(&symbol_table, rel)).collect();

    let (file_node_ids, entity_node_ids) = collect_node_maps(graph);
    let import_targets: Vec<(PathBuf, PathBuf)> = file_node_ids
        .keys()
        .flat_map(|file| symbol_table.resolved_imports(file).into_iter().map(move |target| (file.clone(), target)))
        .collect();

    let resolver = GraphNodeResolver { file_node_ids: &file_node_ids, entity_node_ids: &entity_node_ids };
    let input = InjectionInput {
        resolved_calls: &resolved_calls,
        resolved_inheritance: &resolved_inheritance,
        import_targets: &import_targets,
    };
    inject_dependencies(graph, &resolver, &input);
}
