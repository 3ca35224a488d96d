//! The `ContextStore` contract: graph persistence, text search, and vector search behind small
//! object-safe traits, plus a file-backed reference implementation used by the encoder/evolver
//! and in-memory reference implementations used in tests.

use crate::config::StorageConfig;
use crate::embedding::cosine_similarity;
use crate::graph::RpGraph;
use crate::schema;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::io::Read as _;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Persists and loads the `RpGraph` itself.
pub trait GraphStore: Send + Sync {
    fn load(&self) -> Result<Option<RpGraph>>;
    fn save(&self, graph: &RpGraph) -> Result<()>;
    /// Copies the current persisted graph aside before a destructive operation. Returns the
    /// backup path, or `None` if nothing was persisted yet.
    fn backup(&self) -> Result<Option<PathBuf>>;
}

/// Free-text search over a document id's textual content (e.g. entity features, descriptions).
pub trait TextSearchStore: Send + Sync {
    fn index(&mut self, id: &str, text: &str);
    fn remove(&mut self, id: &str);
    fn search(&self, query: &str, limit: usize) -> Vec<(String, f64)>;
}

/// Nearest-neighbor search over embedding vectors.
pub trait VectorStore: Send + Sync {
    fn upsert(&mut self, id: &str, embedding: Vec<f32>);
    fn remove(&mut self, id: &str);
    fn search(&self, query: &[f32], limit: usize) -> Vec<(String, f64)>;
    fn get(&self, id: &str) -> Option<&[f32]>;
}

/// Composed storage contract handed to the orchestrator and evolver. Each facet is boxed so the
/// concrete backend (file-backed, in-memory, or a future database-backed one) stays swappable.
pub struct ContextStore {
    pub graph: Box<dyn GraphStore>,
    pub text: Box<dyn TextSearchStore>,
    pub vectors: Box<dyn VectorStore>,
}

impl ContextStore {
    #[must_use]
    pub fn new(
        graph: Box<dyn GraphStore>,
        text: Box<dyn TextSearchStore>,
        vectors: Box<dyn VectorStore>,
    ) -> Self {
        ContextStore {
            graph,
            text,
            vectors,
        }
    }
}

// ---------------------------------------------------------------------------
// File-backed GraphStore
// ---------------------------------------------------------------------------

const RPG_DIR: &str = ".rpg";
const RPG_FILE: &str = "graph.json";
const RPG_BACKUP_FILE: &str = "graph.backup.json";
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

const RPG_README: &str = "\
# .rpg/\n\
\n\
This directory holds the persisted Repository Planning Graph for this repository.\n\
\n\
- `graph.json` — the current graph, committed alongside the code it describes.\n\
- `graph.backup.json` — a snapshot taken before the last destructive evolve operation.\n\
- `config.toml` — local encoder configuration, not committed (see `.gitignore`).\n";

/// Reads and writes `.rpg/graph.json` under a project root, with optional zstd compression and
/// a `.rpg/graph.backup.json` safety copy before destructive operations.
pub struct FileGraphStore {
    project_root: PathBuf,
    storage: StorageConfig,
}

impl FileGraphStore {
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>, storage: StorageConfig) -> Self {
        FileGraphStore {
            project_root: project_root.into(),
            storage,
        }
    }

    fn rpg_dir(&self) -> PathBuf {
        self.project_root.join(RPG_DIR)
    }

    fn rpg_file(&self) -> PathBuf {
        self.rpg_dir().join(RPG_FILE)
    }

    fn rpg_backup_file(&self) -> PathBuf {
        self.rpg_dir().join(RPG_BACKUP_FILE)
    }

    fn ensure_scaffolding(&self) -> Result<()> {
        let dir = self.rpg_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create RPG directory {}", dir.display()))?;

        let inner_gitignore = dir.join(".gitignore");
        if !inner_gitignore.exists() {
            fs::write(&inner_gitignore, "config.toml\n")?;
        }

        let readme = dir.join("README.md");
        if !readme.exists() {
            fs::write(&readme, RPG_README)?;
        }

        Ok(())
    }
}

impl GraphStore for FileGraphStore {
    fn load(&self) -> Result<Option<RpGraph>> {
        let path = self.rpg_file();
        if !path.exists() {
            return Ok(None);
        }

        let raw = fs::read(&path)
            .with_context(|| format!("failed to read RPG from {}", path.display()))?;

        let json = if raw.len() >= 4 && raw[..4] == ZSTD_MAGIC {
            let mut decoder =
                zstd::Decoder::new(&raw[..]).context("failed to init zstd decoder")?;
            let mut decompressed = String::new();
            decoder
                .read_to_string(&mut decompressed)
                .context("failed to decompress graph.json")?;
            decompressed
        } else {
            String::from_utf8(raw).context("graph.json is not valid UTF-8")?
        };

        Ok(Some(schema::from_json(&json)?))
    }

    fn save(&self, graph: &RpGraph) -> Result<()> {
        self.ensure_scaffolding()?;
        let json = schema::to_json(graph)?;

        if self.storage.compress {
            let compressed =
                zstd::encode_all(json.as_bytes(), 3).context("failed to compress graph.json")?;
            fs::write(self.rpg_file(), compressed).context("failed to write graph.json")?;
        } else {
            fs::write(self.rpg_file(), json).context("failed to write graph.json")?;
        }

        Ok(())
    }

    fn backup(&self) -> Result<Option<PathBuf>> {
        let source = self.rpg_file();
        if !source.exists() {
            return Ok(None);
        }
        let dest = self.rpg_backup_file();
        fs::copy(&source, &dest).with_context(|| {
            format!(
                "failed to back up {} to {}",
                source.display(),
                dest.display()
            )
        })?;
        Ok(Some(dest))
    }
}

// ---------------------------------------------------------------------------
// In-memory reference TextSearchStore / VectorStore
// ---------------------------------------------------------------------------

/// Naive token-overlap text search. Adequate for tests and small repositories; not intended for
/// production-scale corpora.
#[derive(Debug, Default)]
pub struct InMemoryTextSearchStore {
    docs: HashMap<String, Vec<String>>,
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl InMemoryTextSearchStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TextSearchStore for InMemoryTextSearchStore {
    fn index(&mut self, id: &str, text: &str) {
        self.docs.insert(id.to_string(), tokenize(text));
    }

    fn remove(&mut self, id: &str) {
        self.docs.remove(id);
    }

    fn search(&self, query: &str, limit: usize) -> Vec<(String, f64)> {
        let query_tokens: std::collections::HashSet<String> =
            tokenize(query).into_iter().collect();
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(String, f64)> = self
            .docs
            .iter()
            .filter_map(|(id, tokens)| {
                let doc_tokens: std::collections::HashSet<&String> = tokens.iter().collect();
                let overlap = query_tokens
                    .iter()
                    .filter(|t| doc_tokens.contains(t))
                    .count();
                if overlap == 0 {
                    return None;
                }
                #[allow(clippy::cast_precision_loss)]
                let score = overlap as f64 / query_tokens.len() as f64;
                Some((id.clone(), score))
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0)));
        scored.truncate(limit);
        scored
    }
}

/// Linear-scan cosine-similarity vector search. Adequate for tests and small repositories.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    vectors: HashMap<String, Vec<f32>>,
}

impl InMemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorStore for InMemoryVectorStore {
    fn upsert(&mut self, id: &str, embedding: Vec<f32>) {
        self.vectors.insert(id.to_string(), embedding);
    }

    fn remove(&mut self, id: &str) {
        self.vectors.remove(id);
    }

    fn search(&self, query: &[f32], limit: usize) -> Vec<(String, f64)> {
        let mut scored: Vec<(String, f64)> = self
            .vectors
            .iter()
            .map(|(id, v)| (id.clone(), cosine_similarity(query, v)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap().then_with(|| a.0.cmp(&b.0)));
        scored.truncate(limit);
        scored
    }

    fn get(&self, id: &str) -> Option<&[f32]> {
        self.vectors.get(id).map(Vec::as_slice)
    }
}
