//! Encoder Orchestrator — runs a full encode pass over a repository: parse, extract entities,
//! lift features, optionally reorganize into a feature hierarchy, ground that hierarchy against
//! the filesystem, inject dependency edges, and stamp the commit the resulting RPG describes.

use crate::batch::build_batches;
use crate::cache::SemanticCache;
use crate::dependency_injector::{InjectionInput, NodeResolver, inject_dependencies};
use crate::grounder::ground_hierarchy;
use crate::reorganizer::reorganize;
use crate::semantic::{EntityInput, aggregate_file_feature, extract_heuristic, extract_with_llm};
use crate::symbols::{ResolvedCall, ResolvedInheritance, SymbolTable, resolve_call, resolve_inheritance};
use crate::types::TypeInferrer;

use rpg_core::config::RpgConfig;
use rpg_core::embedding::EmbeddingClient;
use rpg_core::error::RpgError;
use rpg_core::graph::{
    Config, EntityType, Feature, HighLevelNode, HighMetadata, LowLevelNode, LowMetadata, Node, RpGraph,
};
use rpg_core::llm::LlmClient;
use rpg_core::store::ContextStore;

use rpg_parser::ast::{RawEntity, parse_repository};
use rpg_parser::calls::{CallSite, ScopeSpan, extract_calls};
use rpg_parser::inheritance::{InheritanceRelation, extract_inheritance};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Outcome of one `encode` run.
pub struct EncodeResult {
    pub rpg: RpGraph,
    pub files_processed: usize,
    pub entities_extracted: usize,
    pub duration: Duration,
    /// Per-file/per-entity errors accumulated along the way; none of these aborted the run (only
    /// `RpgError::Storage`/`RpgError::Validation` would have).
    pub errors: Vec<RpgError>,
}

/// Run the full encode pipeline over `project_root`, producing a fresh [`RpGraph`] named
/// `repo_name`. `llm`/`embedder` are optional: without an LLM, feature extraction falls back to
/// heuristics and the Structural Reorganizer is skipped entirely (files are left as top-level
/// orphans); without an embedder, [`ground_hierarchy`] and dependency injection are unaffected
/// since neither needs embeddings.
pub async fn encode<L: LlmClient, E: EmbeddingClient>(
    project_root: &Path,
    repo_name: &str,
    config: &RpgConfig,
    mut store: Option<&mut ContextStore>,
    llm: Option<&L>,
    embedder: Option<&E>,
) -> Result<EncodeResult, RpgError> {
    let start = Instant::now();
    let mut errors = Vec::new();

    let parsed = parse_repository(project_root);
    let files_processed = parsed.len();

    let mut graph = RpGraph::new(Config::new(repo_name));
    let mut file_node_ids: BTreeMap<PathBuf, String> = BTreeMap::new();
    let mut entity_node_ids: BTreeMap<(PathBuf, String), String> = BTreeMap::new();
    let mut all_entities: Vec<RawEntity> = Vec::new();
    let mut all_inheritance: Vec<InheritanceRelation> = Vec::new();
    let mut all_calls: Vec<CallSite> = Vec::new();

    for (path, result) in &parsed {
        for err in &result.errors {
            errors.push(RpgError::Parse { path: path.clone(), message: err.message.clone() });
        }

        let rel_path = path.strip_prefix(project_root).unwrap_or(path).to_path_buf();
        let file_id = format!("file:{}", rel_path.display());
        let language = result.language.map(|l| format!("{l:?}").to_lowercase());
        let _ = graph.add_node(Node::Low(LowLevelNode {
            id: file_id.clone(),
            feature: Feature::default(),
            metadata: LowMetadata {
                entity_type: EntityType::File,
                path: rel_path.display().to_string(),
                start_line: None,
                end_line: None,
                qualified_name: None,
                language,
                extra: Default::default(),
            },
            source_code: None,
            embedding: None,
        }));
        file_node_ids.insert(path.clone(), file_id);

        if !result.entities.is_empty() {
            let scopes: Vec<ScopeSpan> = result
                .entities
                .iter()
                .map(|e| ScopeSpan {
                    name: e.qualified_name(),
                    start_row: e.line_start.saturating_sub(1),
                    end_row: e.line_end.saturating_sub(1),
                })
                .collect();
            all_calls.extend(extract_calls(path, &source_text(path), result.language, &scopes));
            all_inheritance.extend(extract_inheritance(path, &source_text(path), result.language));
        }
        all_entities.extend(result.entities.iter().cloned());
    }

    let entities_extracted = all_entities.len();

    // Phase 2: entity nodes + functional hierarchy (file -> top-level entity -> nested method).
    add_entity_nodes(&mut graph, &all_entities, &mut entity_node_ids);
    link_entity_hierarchy(&mut graph, &all_entities, &file_node_ids, &entity_node_ids);

    // Phase 3: lift features.
    let mut cache = SemanticCache::load(project_root, config.encoding.cache_ttl_secs, true);
    let mut features_by_file: BTreeMap<PathBuf, Vec<Feature>> = BTreeMap::new();
    let batches = build_batches(&all_entities, config.encoding.min_batch_tokens, config.encoding.max_batch_tokens);
    for (batch_index, (start_idx, end_idx)) in batches.iter().enumerate() {
        for entity in &all_entities[*start_idx..*end_idx] {
            let feature = lift_feature(&mut cache, entity, llm, config.encoding.max_parse_iterations).await;
            if let Some(id) = entity_node_ids.get(&(entity.file.clone(), entity.qualified_name()))
                && let Some(node) = graph.get_node_mut(id)
            {
                *node.feature_mut() = feature.clone();
            }
            features_by_file.entry(entity.file.clone()).or_default().push(feature);
        }
        if let Some(store) = store.as_deref() {
            if let Err(err) = store.graph.save(&graph) {
                return Err(RpgError::Storage(err));
            }
            tracing::debug!(batch = batch_index, "checkpointed graph after lifting batch");
        }
    }

    for (path, file_id) in &file_node_ids {
        let children = features_by_file.get(path).cloned().unwrap_or_default();
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("file").to_string();
        let aggregated = aggregate_file_feature(&children, &file_name);
        if let Some(node) = graph.get_node_mut(file_id) {
            *node.feature_mut() = aggregated;
        }
    }
    let _ = cache.save();

    // Phase 4: optional structural reorganization into a feature hierarchy.
    let files: Vec<PathBuf> = file_node_ids.keys().cloned().collect();
    let file_features: BTreeMap<PathBuf, Feature> = file_node_ids
        .keys()
        .filter_map(|p| graph.get_node(&file_node_ids[p]).map(|n| (p.clone(), n.feature().clone())))
        .collect();
    let assignments = reorganize(llm, &files, &file_features, config.encoding.cluster_threshold).await;
    apply_hierarchy_assignments(&mut graph, &assignments, &file_node_ids);

    // Phase 5: ground the hierarchy against the files that actually live under it.
    ground_hierarchy(&mut graph);

    // Embed every node with a feature description but no embedding yet (entities, files, and the
    // high-level areas reorganization just created), registering each in the vector/text stores
    // alongside the graph itself so routing and search stay in sync with what was just encoded.
    if let Some(embedder) = embedder {
        let targets: Vec<(String, String)> = graph
            .get_nodes(|n| n.embedding().is_none() && !n.feature().description.is_empty())
            .into_iter()
            .map(|n| (n.id().to_string(), n.feature().description.clone()))
            .collect();
        for (id, description) in targets {
            let Ok(embedding) = embedder.embed(&description).await else { continue };
            if let Some(store) = store.as_deref_mut() {
                store.vectors.upsert(&id, embedding.clone());
                store.text.index(&id, &description);
            }
            if let Some(node) = graph.get_node_mut(&id) {
                node.set_embedding(embedding);
            }
        }
    }

    // Phase 6: inject dependency edges.
    let symbol_table = SymbolTable::build(&parsed);
    let type_inferrer = TypeInferrer::build(&all_entities, &all_inheritance);
    let resolved_calls = resolve_calls(&all_calls, &all_entities, &parsed, &symbol_table, &type_inferrer);
    let resolved_inheritance: Vec<ResolvedInheritance> =
        all_inheritance.iter().filter_map(|rel| resolve_inheritance(&symbol_table, rel)).collect();
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
    inject_dependencies(&mut graph, &resolver, &input);

    // Phase 7: stamp the commit this RPG describes, when the project is a git work-tree.
    stamp_repository(&mut graph, project_root);

    if let Some(store) = store {
        if let Err(err) = store.graph.save(&graph) {
            return Err(RpgError::Storage(err));
        }
    }

    Ok(EncodeResult { rpg: graph, files_processed, entities_extracted, duration: start.elapsed(), errors })
}

pub(crate) fn source_text(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

pub(crate) fn entity_id(entity: &RawEntity) -> String {
    format!("entity:{}:{}", entity.file.display(), entity.qualified_name())
}

pub(crate) fn add_entity_nodes(
    graph: &mut RpGraph,
    entities: &[RawEntity],
    entity_node_ids: &mut BTreeMap<(PathBuf, String), String>,
) {
    let mut bare_name_counts: BTreeMap<(PathBuf, String), u32> = BTreeMap::new();
    for entity in entities {
        *bare_name_counts.entry((entity.file.clone(), entity.name.clone())).or_insert(0) += 1;
    }

    for entity in entities {
        let id = entity_id(entity);
        let node = Node::Low(LowLevelNode {
            id: id.clone(),
            feature: Feature::default(),
            metadata: LowMetadata {
                entity_type: entity.entity_type,
                path: entity.file.display().to_string(),
                start_line: Some(entity.line_start as u32),
                end_line: Some(entity.line_end as u32),
                qualified_name: Some(entity.qualified_name()),
                language: None,
                extra: Default::default(),
            },
            source_code: Some(entity.source_code.clone()),
            embedding: None,
        });
        if graph.add_node(node).is_ok() {
            entity_node_ids.insert((entity.file.clone(), entity.qualified_name()), id.clone());
            if entity.parent.is_some() {
                let bare_key = (entity.file.clone(), entity.name.clone());
                if bare_name_counts.get(&bare_key) == Some(&1) {
                    entity_node_ids.entry(bare_key).or_insert(id);
                }
            }
        }
    }
}

pub(crate) fn link_entity_hierarchy(
    graph: &mut RpGraph,
    entities: &[RawEntity],
    file_node_ids: &BTreeMap<PathBuf, String>,
    entity_node_ids: &BTreeMap<(PathBuf, String), String>,
) {
    for entity in entities {
        let Some(child_id) = entity_node_ids.get(&(entity.file.clone(), entity.qualified_name())) else { continue };
        let parent_id = match &entity.parent {
            Some(class_name) => entity_node_ids
                .get(&(entity.file.clone(), class_name.clone()))
                .or_else(|| file_node_ids.get(&entity.file)),
            None => file_node_ids.get(&entity.file),
        };
        if let Some(parent_id) = parent_id {
            let _ = graph.add_functional_edge(parent_id, child_id, None, None);
        }
    }
}

pub(crate) async fn lift_feature<L: LlmClient>(
    cache: &mut SemanticCache,
    entity: &RawEntity,
    llm: Option<&L>,
    max_iterations: u32,
) -> Feature {
    let now_secs = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    let key = SemanticCache::content_key(
        &format!("{:?}", entity.entity_type),
        &entity.name,
        &entity.file.display().to_string(),
        entity.parent.as_deref(),
        Some(&entity.source_code),
    );
    if let Some(hit) = cache.get(&key, now_secs) {
        return hit;
    }

    let input = EntityInput::from(entity);
    let feature = match llm {
        Some(client) => extract_with_llm(client, &input, &entity.source_code, max_iterations).await,
        None => extract_heuristic(&input),
    };
    cache.put(key, feature.clone(), now_secs);
    feature
}

fn apply_hierarchy_assignments(
    graph: &mut RpGraph,
    assignments: &BTreeMap<PathBuf, String>,
    file_node_ids: &BTreeMap<PathBuf, String>,
) {
    let mut area_node_ids: BTreeMap<String, String> = BTreeMap::new();
    for (file, path) in assignments {
        let Some(file_id) = file_node_ids.get(file) else { continue };
        let leaf_id = ensure_hierarchy_path(graph, &mut area_node_ids, path);
        let _ = graph.add_functional_edge(&leaf_id, file_id, None, None);
    }
}

/// Ensure every `/`-separated segment of `path` has a `HighLevelNode`, chained parent-to-child,
/// returning the id of the leaf segment.
fn ensure_hierarchy_path(graph: &mut RpGraph, area_node_ids: &mut BTreeMap<String, String>, path: &str) -> String {
    let mut built = String::new();
    let mut parent_id: Option<String> = None;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if !built.is_empty() {
            built.push('/');
        }
        built.push_str(segment);

        let id = area_node_ids.get(&built).cloned().unwrap_or_else(|| {
            let id = format!("area:{built}");
            let node = Node::High(HighLevelNode {
                id: id.clone(),
                feature: Feature { description: segment.to_lowercase(), keywords: vec![], sub_features: None },
                directory_path: None,
                metadata: HighMetadata::default(),
                embedding: None,
            });
            let _ = graph.add_node(node);
            if let Some(parent) = &parent_id {
                let _ = graph.add_functional_edge(parent, &id, None, None);
            }
            area_node_ids.insert(built.clone(), id.clone());
            id
        });
        parent_id = Some(id);
    }
    parent_id.unwrap_or_default()
}

/// Resolve every qualified call (`self`/`super`/variable receiver) via the Type Inferrer first,
/// falling back to the Symbol Resolver's same-file/import/fuzzy policy for everything else.
pub(crate) fn resolve_calls(
    calls: &[CallSite],
    entities: &[RawEntity],
    parsed: &[(PathBuf, rpg_parser::ast::ParseResult)],
    symbol_table: &SymbolTable,
    type_inferrer: &TypeInferrer,
) -> Vec<ResolvedCall> {
    let language_by_file: BTreeMap<PathBuf, rpg_parser::languages::Language> = parsed
        .iter()
        .filter_map(|(path, result)| result.language.map(|lang| (path.clone(), lang)))
        .collect();

    // qualified method name -> defining file, only kept when unambiguous across the repository.
    let mut qualified_owners: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for entity in entities {
        qualified_owners.entry(entity.qualified_name()).or_default().push(entity.file.clone());
    }

    let mut resolved = Vec::new();
    for call in calls {
        let Some(&language) = language_by_file.get(&call.caller_file) else { continue };
        let via_type_inferrer = call.caller_entity.as_deref().and_then(|caller_qname| {
            let caller_entity = entities
                .iter()
                .find(|e| e.file == call.caller_file && e.qualified_name() == caller_qname)?;
            let qualified = type_inferrer.resolve_qualified_call(
                call,
                caller_entity.parent.as_deref(),
                &caller_entity.source_code,
                language,
            )?;
            let owners = qualified_owners.get(&qualified)?;
            if owners.len() != 1 {
                return None;
            }
            Some(ResolvedCall {
                source_file: call.caller_file.clone(),
                source_entity: call.caller_entity.clone(),
                target_file: owners[0].clone(),
                target_symbol: qualified,
                line: call.line,
            })
        });

        match via_type_inferrer.or_else(|| resolve_call(symbol_table, call)) {
            Some(r) => resolved.push(r),
            None => continue,
        }
    }
    resolved
}

pub(crate) struct GraphNodeResolver<'a> {
    pub(crate) file_node_ids: &'a BTreeMap<PathBuf, String>,
    pub(crate) entity_node_ids: &'a BTreeMap<(PathBuf, String), String>,
}

impl NodeResolver for GraphNodeResolver<'_> {
    fn file_node(&self, file: &Path) -> Option<String> {
        self.file_node_ids.get(file).cloned()
    }

    fn entity_node(&self, file: &Path, qualified_name: &str) -> Option<String> {
        self.entity_node_ids.get(&(file.to_path_buf(), qualified_name.to_string())).cloned()
    }
}

/// Stamp `config.github.commit` with HEAD's SHA when `project_root` is a git work-tree; a
/// best-effort `origin` remote URL parse supplies owner/repo, falling back to the directory
/// name for both when there's no remote. Not being a git repository at all is not an error: the
/// RPG is simply left unstamped.
pub(crate) fn stamp_repository(graph: &mut RpGraph, project_root: &Path) {
    let Ok(repo) = git2::Repository::open(project_root) else { return };
    let Ok(sha) = crate::diff::head_sha(project_root) else { return };
    let (owner, repo_name) = remote_owner_repo(&repo).unwrap_or_else(|| fallback_owner_repo(project_root));
    if let Err(err) = graph.config.stamp_commit(&owner, &repo_name, &sha) {
        tracing::warn!(error = %err, "failed to stamp commit onto RPG config");
    }
}

fn remote_owner_repo(repo: &git2::Repository) -> Option<(String, String)> {
    let remote = repo.find_remote("origin").ok()?;
    parse_owner_repo(remote.url()?)
}

/// Parses `git@host:owner/repo.git` and `https://host/owner/repo.git` forms.
fn parse_owner_repo(url: &str) -> Option<(String, String)> {
    let trimmed = url.trim_end_matches('/').trim_end_matches(".git");
    let path = if let Some((_, rest)) = trimmed.split_once("://") {
        rest.split_once('/').map(|(_, p)| p)?
    } else {
        trimmed.split_once(':').map(|(_, p)| p)?
    };
    let mut parts = path.trim_matches('/').rsplitn(2, '/');
    let repo_name = parts.next()?.to_string();
    let owner = parts.next()?.to_string();
    Some((owner, repo_name))
}

fn fallback_owner_repo(project_root: &Path) -> (String, String) {
    let name = project_root.file_name().and_then(|n| n.to_str()).unwrap_or("repo").to_string();
    (name.clone(), name)
}
