//! Semantic Router — finds the best-fit `HighLevelNode` parent for a feature description: LLM
//! selection first, embedding-cosine similarity as fallback, first-candidate as last resort.

use rpg_core::embedding::{cosine_similarity, EmbeddingClient};
use rpg_core::graph::{Node, RpGraph};
use rpg_core::llm::LlmClient;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SelectionResponse {
    #[serde(default)]
    selected_id: Option<String>,
}

/// Routes feature descriptions to a hierarchy position, tracking how many LLM calls it made
/// (callers reset this per batch to report routing cost).
#[derive(Default)]
pub struct SemanticRouter {
    llm_calls: u32,
}

impl SemanticRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn llm_calls(&self) -> u32 {
        self.llm_calls
    }

    pub fn reset(&mut self) {
        self.llm_calls = 0;
    }

    /// Find the best-fit `HighLevelNode` id for `feature_description`, recursing into children
    /// until a childless node is reached. Returns `None` if the hierarchy has no `HighLevelNode`s.
    pub async fn find_best_parent<L: LlmClient, E: EmbeddingClient>(
        &mut self,
        graph: &RpGraph,
        feature_description: &str,
        llm: Option<&L>,
        embedder: Option<&E>,
    ) -> Option<String> {
        let roots = root_ids(graph);
        if roots.is_empty() {
            return None;
        }

        let mut current = self.select_among(graph, &roots, feature_description, llm, embedder).await?;

        loop {
            let high_children: Vec<String> = graph
                .children_of(&current)
                .iter()
                .filter(|id| matches!(graph.get_node(id), Some(Node::High(_))))
                .cloned()
                .collect();
            if high_children.is_empty() {
                break;
            }
            match self.select_among(graph, &high_children, feature_description, llm, embedder).await {
                Some(next) if next != current => current = next,
                _ => break,
            }
        }

        Some(current)
    }

    async fn select_among<L: LlmClient, E: EmbeddingClient>(
        &mut self,
        graph: &RpGraph,
        candidates: &[String],
        feature_description: &str,
        llm: Option<&L>,
        embedder: Option<&E>,
    ) -> Option<String> {
        if candidates.is_empty() {
            return None;
        }
        if candidates.len() == 1 {
            return Some(candidates[0].clone());
        }

        if let Some(llm) = llm {
            self.llm_calls += 1;
            if let Some(id) = ask_llm(llm, graph, candidates, feature_description).await {
                return Some(id);
            }
        }

        if let Some(embedder) = embedder
            && let Some(id) = best_by_cosine(graph, candidates, feature_description, embedder).await
        {
            return Some(id);
        }

        tracing::warn!(?candidates, "no LLM/embedding match for routing, falling back to first candidate");
        Some(candidates[0].clone())
    }
}

async fn ask_llm<L: LlmClient>(
    llm: &L,
    graph: &RpGraph,
    candidates: &[String],
    feature_description: &str,
) -> Option<String> {
    let candidate_lines = candidates
        .iter()
        .filter_map(|id| graph.get_node(id).map(|n| format!("- {id}: {}", n.feature().description)))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = format!("Candidates:\n{candidate_lines}\n\nFeature to place: {feature_description}");
    let system = "Choose which candidate this feature best belongs under. \
        Respond with JSON: {\"selected_id\": string}.";

    let response = llm.complete_json::<SelectionResponse>(system, &prompt).await.ok()?;
    let selected = response.selected_id?;
    candidates.iter().find(|id| **id == selected).cloned()
}

async fn best_by_cosine<E: EmbeddingClient>(
    graph: &RpGraph,
    candidates: &[String],
    feature_description: &str,
    embedder: &E,
) -> Option<String> {
    let target = embedder.embed(feature_description).await.ok()?;
    let mut best: Option<(String, f64)> = None;
    for id in candidates {
        let Some(node) = graph.get_node(id) else { continue };
        let candidate_embedding = match node.embedding() {
            Some(e) => e.to_vec(),
            None => embedder.embed(&node.feature().description).await.ok()?,
        };
        let sim = cosine_similarity(&candidate_embedding, &target);
        if best.as_ref().is_none_or(|(_, s)| sim > *s) {
            best = Some((id.clone(), sim));
        }
    }
    best.map(|(id, _)| id)
}

fn root_ids(graph: &RpGraph) -> Vec<String> {
    graph
        .get_nodes(|n| matches!(n, Node::High(_)))
        .into_iter()
        .filter(|n| graph.parent_of(n.id()).is_none())
        .map(|n| n.id().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpg_core::embedding::HashEmbeddingClient;
    use rpg_core::graph::{Config, Feature, HighLevelNode, HighMetadata};
    use rpg_core::llm::NullLlmClient;

    fn high(id: &str, description: &str) -> Node {
        Node::High(HighLevelNode {
            id: id.to_string(),
            feature: Feature { description: description.to_string(), keywords: vec![], sub_features: None },
            directory_path: None,
            metadata: HighMetadata { path: None, paths: vec![], extra: Default::default() },
            embedding: None,
        })
    }

    #[tokio::test]
    async fn no_high_level_nodes_yields_none() {
        let graph = RpGraph::new(Config::new("repo"));
        let mut router = SemanticRouter::new();
        let result = router
            .find_best_parent::<NullLlmClient, HashEmbeddingClient>(&graph, "parse config", None, None)
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn single_root_short_circuits_without_llm_calls() {
        let mut graph = RpGraph::new(Config::new("repo"));
        graph.add_node(high("area:core", "core logic")).unwrap();
        let mut router = SemanticRouter::new();
        let llm = NullLlmClient::single("{\"selected_id\": \"area:core\"}".to_string());
        let result = router.find_best_parent(&graph, "parse config", Some(&llm), None::<&HashEmbeddingClient>).await;
        assert_eq!(result.as_deref(), Some("area:core"));
        assert_eq!(router.llm_calls(), 0);
    }

    #[tokio::test]
    async fn llm_selection_picks_the_matching_candidate() {
        let mut graph = RpGraph::new(Config::new("repo"));
        graph.add_node(high("area:core", "core logic")).unwrap();
        graph.add_node(high("area:io", "input output")).unwrap();
        let mut router = SemanticRouter::new();
        let llm = NullLlmClient::single("{\"selected_id\": \"area:io\"}".to_string());
        let result = router.find_best_parent(&graph, "read a file", Some(&llm), None::<&HashEmbeddingClient>).await;
        assert_eq!(result.as_deref(), Some("area:io"));
        assert_eq!(router.llm_calls(), 1);
    }

    #[tokio::test]
    async fn embedding_fallback_is_used_when_llm_is_absent() {
        let mut graph = RpGraph::new(Config::new("repo"));
        graph.add_node(high("area:core", "parse config")).unwrap();
        graph.add_node(high("area:io", "completely unrelated topic")).unwrap();
        let mut router = SemanticRouter::new();
        let embedder = HashEmbeddingClient::new(16);
        let result = router
            .find_best_parent::<NullLlmClient, HashEmbeddingClient>(&graph, "parse config", None, Some(&embedder))
            .await;
        assert_eq!(result.as_deref(), Some("area:core"));
    }

    #[tokio::test]
    async fn recurses_into_children_when_present() {
        let mut graph = RpGraph::new(Config::new("repo"));
        graph.add_node(high("area:core", "core logic")).unwrap();
        graph.add_node(high("area:core/sub", "sub logic")).unwrap();
        graph.add_functional_edge("area:core", "area:core/sub", None, None).unwrap();
        let mut router = SemanticRouter::new();
        let llm = NullLlmClient::new(vec![
            "{\"selected_id\": \"area:core\"}".to_string(),
            "{\"selected_id\": \"area:core/sub\"}".to_string(),
        ]);
        let result = router.find_best_parent(&graph, "parse config", Some(&llm), None::<&HashEmbeddingClient>).await;
        assert_eq!(result.as_deref(), Some("area:core/sub"));
    }
}
