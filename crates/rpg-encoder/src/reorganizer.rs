//! Structural Reorganizer — proposes a `<Area>/<Category>/<Subcategory>` hierarchy path per file
//! via LLM-driven domain discovery. With no LLM configured this component is a no-op: only the
//! file-level hierarchy the orchestrator already built from directory structure exists.

use rpg_core::graph::Feature;
use rpg_core::llm::LlmClient;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Catch-all subcategory for files a discovered domain doesn't clearly cover.
const CATCH_ALL: &str = "Utilities";

/// A cluster of files processed together for domain discovery, with a handful of
/// representatives shown to the LLM to keep the prompt bounded.
#[derive(Debug, Clone)]
pub struct FileCluster {
    pub files: Vec<PathBuf>,
    pub representatives: Vec<PathBuf>,
}

/// Split `files` into clusters of at most `target_cluster_size`, each carrying up to 3 evenly
/// spaced representatives. Repositories at or under the threshold get a single cluster.
pub fn cluster_files(files: &[PathBuf], target_cluster_size: usize) -> Vec<FileCluster> {
    if files.is_empty() {
        return Vec::new();
    }
    if files.len() <= target_cluster_size {
        return vec![FileCluster {
            files: files.to_vec(),
            representatives: sample_representatives(files, 3),
        }];
    }

    let mut cluster_map: BTreeMap<usize, Vec<PathBuf>> = BTreeMap::new();
    for (idx, file) in files.iter().enumerate() {
        cluster_map.entry(idx / target_cluster_size).or_default().push(file.clone());
    }

    let clusters: Vec<FileCluster> = cluster_map
        .into_values()
        .map(|files| FileCluster { representatives: sample_representatives(&files, 3), files })
        .collect();

    balance_clusters(clusters, target_cluster_size)
}

fn sample_representatives(files: &[PathBuf], count: usize) -> Vec<PathBuf> {
    if files.len() <= count {
        return files.to_vec();
    }
    let step = files.len() / count;
    (0..count).map(|i| files[i * step].clone()).collect()
}

fn balance_clusters(clusters: Vec<FileCluster>, target_size: usize) -> Vec<FileCluster> {
    let mut balanced = Vec::new();
    for cluster in clusters {
        if cluster.files.len() <= target_size {
            balanced.push(cluster);
            continue;
        }
        let num_splits = cluster.files.len().div_ceil(target_size);
        let chunk_size = cluster.files.len() / num_splits;
        for chunk in cluster.files.chunks(chunk_size.max(1)) {
            let files = chunk.to_vec();
            balanced.push(FileCluster { representatives: sample_representatives(&files, 3), files });
        }
    }
    balanced
}

/// `PascalCase` a free-form domain/category name: split on non-alphanumeric boundaries, title
/// each word.
pub fn pascal_case(raw: &str) -> String {
    raw.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
                None => String::new(),
            }
        })
        .collect()
}

/// One file's proposed position in the reorganized hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainAssignment {
    pub area: String,
    pub category: String,
    pub subcategory: String,
}

impl DomainAssignment {
    /// `<Area>/<Category>/<Subcategory>`, each segment `PascalCase`d.
    pub fn path(&self) -> String {
        format!("{}/{}/{}", pascal_case(&self.area), pascal_case(&self.category), pascal_case(&self.subcategory))
    }
}

#[derive(Debug, Deserialize)]
struct DomainDiscoveryResponse {
    domains: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FileAssignmentResponse {
    assignments: BTreeMap<String, FileAssignmentEntry>,
}

#[derive(Debug, Deserialize)]
struct FileAssignmentEntry {
    area: String,
    category: String,
    #[serde(default)]
    subcategory: Option<String>,
}

/// Run domain discovery + per-file assignment for one cluster, returning a path per file.
/// Files the LLM doesn't mention fall back to the `Utilities` catch-all under the first
/// discovered domain (or `Utilities/Utilities/Utilities` if none was discovered).
async fn reorganize_cluster<C: LlmClient>(
    client: &C,
    cluster: &FileCluster,
    features: &BTreeMap<PathBuf, Feature>,
) -> BTreeMap<PathBuf, String> {
    let repr_list = cluster
        .representatives
        .iter()
        .map(|f| {
            let desc = features.get(f).map(|feat| feat.description.as_str()).unwrap_or("");
            format!("- {} ({desc})", f.display())
        })
        .collect::<Vec<_>>()
        .join("\n");

    let discovery_prompt = format!("Representative files:\n{repr_list}\n\nName the top-level functional domains.");
    let domains = client
        .complete_json::<DomainDiscoveryResponse>(
            "List the top-level functional domains covered by this part of the codebase. Respond with JSON: {\"domains\": string[]}.",
            &discovery_prompt,
        )
        .await
        .map(|r| r.domains)
        .unwrap_or_default();

    let fallback_domain = domains.first().cloned().unwrap_or_else(|| CATCH_ALL.to_string());

    let file_list = cluster.files.iter().map(|f| format!("- {}", f.display())).collect::<Vec<_>>().join("\n");
    let assignment_prompt = format!(
        "Domains: {}\n\nFiles:\n{file_list}\n\nAssign each file an area/category/subcategory.",
        domains.join(", ")
    );
    let assignments = client
        .complete_json::<FileAssignmentResponse>(
            "Assign each listed file to an area/category/subcategory within the given domains. \
             Respond with JSON: {\"assignments\": {\"<file>\": {\"area\": string, \"category\": string, \"subcategory\"?: string}}}.",
            &assignment_prompt,
        )
        .await
        .map(|r| r.assignments)
        .unwrap_or_default();

    cluster
        .files
        .iter()
        .map(|file| {
            let key = file.display().to_string();
            let assignment = assignments.get(&key);
            let domain_assignment = match assignment {
                Some(entry) => DomainAssignment {
                    area: entry.area.clone(),
                    category: entry.category.clone(),
                    subcategory: entry.subcategory.clone().unwrap_or_else(|| CATCH_ALL.to_string()),
                },
                None => DomainAssignment {
                    area: fallback_domain.clone(),
                    category: CATCH_ALL.to_string(),
                    subcategory: CATCH_ALL.to_string(),
                },
            };
            (file.clone(), domain_assignment.path())
        })
        .collect()
}

/// Reorganize `files` into hierarchy paths. Returns an empty map when `client` is `None`, per the
/// "no LLM -> skipped entirely" rule; for repositories over `cluster_threshold` files, domain
/// discovery runs per representative-sampled cluster rather than over every file at once.
pub async fn reorganize<C: LlmClient>(
    client: Option<&C>,
    files: &[PathBuf],
    features: &BTreeMap<PathBuf, Feature>,
    cluster_threshold: usize,
) -> BTreeMap<PathBuf, String> {
    let Some(client) = client else {
        return BTreeMap::new();
    };

    let clusters = cluster_files(files, cluster_threshold);
    let mut assignments = BTreeMap::new();
    for cluster in &clusters {
        assignments.extend(reorganize_cluster(client, cluster, features).await);
    }
    assignments
}
