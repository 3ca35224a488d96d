//! Semantic Extractor — derives a [`Feature`] (description + keywords + sub-features) for an
//! entity, either heuristically from its name/kind/parent or, when an LLM is configured, via a
//! structured prompt with heuristic fallback on failure.

use rpg_core::graph::{EntityType, Feature};
use rpg_core::llm::LlmClient;
use rpg_parser::ast::RawEntity;
use std::collections::BTreeMap;

/// Everything the extractor needs about one entity; mirrors [`RawEntity`] but decouples this
/// module from the parser's exact shape so tests can construct fixtures without a real parse.
pub struct EntityInput<'a> {
    pub entity_type: EntityType,
    pub name: &'a str,
    pub parent: Option<&'a str>,
    pub file_path: &'a str,
}

impl<'a> From<&'a RawEntity> for EntityInput<'a> {
    fn from(e: &'a RawEntity) -> Self {
        Self {
            entity_type: e.entity_type,
            name: &e.name,
            parent: e.parent.as_deref(),
            file_path: e.file.to_str().unwrap_or(""),
        }
    }
}

/// Verbs considered too vague to stand alone in a feature description.
const VAGUE_VERBS: &[(&str, &str)] = &[("handle", "dispatch"), ("process", "transform")];

/// Tokens that describe *how* code works rather than *what* it does for callers, stripped from
/// feature text.
const IMPLEMENTATION_DETAIL_TOKENS: &[&str] = &["iterate", "array"];

/// Extract a [`Feature`] for `entity` using the pure heuristic rules (no LLM).
pub fn extract_heuristic(entity: &EntityInput<'_>) -> Feature {
    let verb = select_verb(entity.name, entity.entity_type);
    let description = validate_feature_name(&format!("{verb} {}", humanize(entity.name, entity.entity_type)));
    let mut keywords = tokenize_name(entity.name);
    if let Some(parent) = entity.parent {
        keywords.push(parent.to_lowercase());
    }
    keywords.push(format!("{:?}", entity.entity_type).to_lowercase());
    keywords.extend(path_tokens(entity.file_path));
    keywords.sort();
    keywords.dedup();

    let (description, sub_features) = split_on_and(&description);
    Feature {
        description,
        keywords,
        sub_features,
    }
}

/// Choose a verb for `name` by its prefix, per the spec's fixed rule table; classes always get
/// "define" regardless of name.
fn select_verb(name: &str, entity_type: EntityType) -> &'static str {
    if entity_type == EntityType::Class {
        return "define";
    }
    let lower = name.to_lowercase();
    if lower.starts_with("get") {
        "retrieve"
    } else if lower.starts_with("set") {
        "set"
    } else if lower.starts_with("is") || lower.starts_with("has") {
        "check"
    } else if lower.starts_with("create") {
        "create"
    } else if lower.starts_with("handle") {
        "dispatch"
    } else if lower.starts_with("process") {
        "transform"
    } else if lower.starts_with("parse") {
        "parse"
    } else if lower.starts_with("format") {
        "format"
    } else {
        "run"
    }
}

/// Prefixes recognized by [`select_verb`]; stripped from the humanized name so the chosen verb
/// isn't duplicated (e.g. `getUserName` -> "retrieve user name", not "retrieve get user name").
const VERB_PREFIXES: &[&str] = &["get", "set", "is", "has", "create", "handle", "process", "parse", "format"];

/// camelCase/snake_case -> space-separated lowercase words, with a leading verb-prefix word
/// dropped for non-class entities so it isn't duplicated next to the chosen verb.
fn humanize(name: &str, entity_type: EntityType) -> String {
    let mut words = tokenize_name(name);
    if entity_type != EntityType::Class
        && let Some(first) = words.first()
        && VERB_PREFIXES.contains(&first.as_str())
    {
        words.remove(0);
    }
    words.join(" ")
}

/// Split an identifier into lowercase word tokens on camelCase boundaries and `_`/`-`.
pub fn tokenize_name(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    for c in name.chars() {
        if c == '_' || c == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if c.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
            current.push(c.to_ascii_lowercase());
        } else {
            current.extend(c.to_lowercase());
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words.retain(|w| !w.is_empty());
    words
}

/// Tokenize every path segment's file stem (extension stripped) into lowercase words, e.g.
/// `"src/validation.ts"` -> `["src", "validation"]`.
fn path_tokens(path: &str) -> Vec<String> {
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty())
        .flat_map(|segment| {
            let stem = segment.rsplit_once('.').map_or(segment, |(stem, _)| stem);
            tokenize_name(stem)
        })
        .collect()
}

/// Lowercase, strip trailing punctuation, replace vague verbs, strip implementation-detail
/// tokens, and truncate to at most 8 words.
fn validate_feature_name(raw: &str) -> String {
    let mut text = raw.trim().to_lowercase();
    while text.ends_with('.') || text.ends_with(';') || text.ends_with(',') {
        text.pop();
    }

    let mut words: Vec<String> = text
        .split_whitespace()
        .map(|w| {
            for (vague, replacement) in VAGUE_VERBS {
                if w == *vague {
                    return (*replacement).to_string();
                }
            }
            w.to_string()
        })
        .filter(|w| !IMPLEMENTATION_DETAIL_TOKENS.contains(&w.as_str()))
        .collect();

    words.truncate(8);
    text = words.join(" ");
    text
}

/// Split `"do X and do Y"` into `(description, Some(subFeatures))` when the left side has at
/// least two words and the right side reads as a verb phrase (starts with a word, not empty).
fn split_on_and(text: &str) -> (String, Option<Vec<String>>) {
    if let Some(idx) = text.find(" and ") {
        let left = text[..idx].trim();
        let right = text[idx + 5..].trim();
        if left.split_whitespace().count() >= 2 && !right.is_empty() {
            return (left.to_string(), Some(vec![right.to_string()]));
        }
    }
    (text.to_string(), None)
}

/// Aggregate child entity features into a file-level [`Feature`]: pick the most common verb
/// (first word of each description) paired with the file's name; merge+dedupe keywords; include
/// child descriptions as sub-features when there are at least two children; fall back to
/// `"<verb> <fileName>"` with a generic verb when there are no children.
pub fn aggregate_file_feature(children: &[Feature], file_name: &str) -> Feature {
    if children.is_empty() {
        return Feature {
            description: format!("run {file_name}"),
            keywords: vec![file_name.to_lowercase()],
            sub_features: None,
        };
    }

    let mut verb_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for child in children {
        if let Some(verb) = child.description.split_whitespace().next() {
            *verb_counts.entry(verb).or_default() += 1;
        }
    }
    let verb = verb_counts
        .iter()
        .max_by_key(|(_, count)| **count)
        .map(|(verb, _)| *verb)
        .unwrap_or("run");

    let description = format!("{verb} {file_name}");

    let mut keywords: Vec<String> = children.iter().flat_map(|f| f.keywords.iter().cloned()).collect();
    keywords.sort();
    keywords.dedup();

    let sub_features = if children.len() >= 2 {
        Some(children.iter().map(|f| f.description.clone()).collect())
    } else {
        None
    };

    Feature {
        description,
        keywords,
        sub_features,
    }
}

/// A structured LLM response for one entity, prior to validation.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct LlmFeatureResponse {
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub sub_features: Option<Vec<String>>,
}

/// Attempt to extract a feature for `entity` via `client`, retrying the whole call up to
/// `max_iterations` times; falls back to the heuristic on total failure (recording a warning
/// naming the entity and the attempt count, per the spec).
pub async fn extract_with_llm<C: LlmClient>(
    client: &C,
    entity: &EntityInput<'_>,
    source_code: &str,
    max_iterations: u32,
) -> Feature {
    let system = "Describe what this code entity does for its callers. \
        Respond with JSON: {\"description\": string, \"keywords\": string[], \"sub_features\"?: string[]}.";
    let prompt = format!(
        "Entity: {} ({:?})\nParent: {}\n\n```\n{source_code}\n```",
        entity.name,
        entity.entity_type,
        entity.parent.unwrap_or("-"),
    );

    let attempts = max_iterations.max(1);
    for attempt in 1..=attempts {
        match client.complete_json::<LlmFeatureResponse>(system, &prompt).await {
            Ok(resp) => {
                return Feature {
                    description: validate_feature_name(&resp.description),
                    keywords: resp.keywords,
                    sub_features: resp.sub_features,
                };
            }
            Err(_) if attempt < attempts => continue,
            Err(err) => {
                tracing::warn!(entity = entity.name, attempts, error = %err, "semantic extraction failed, falling back to heuristic");
            }
        }
    }
    extract_heuristic(entity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input<'a>(name: &'a str, entity_type: EntityType, parent: Option<&'a str>) -> EntityInput<'a> {
        EntityInput { entity_type, name, parent, file_path: "" }
    }

    #[test]
    fn getter_selects_retrieve_verb() {
        let feature = extract_heuristic(&input("getUserName", EntityType::Function, None));
        assert!(feature.description.starts_with("retrieve"));
    }

    #[test]
    fn boolean_prefix_selects_check_verb() {
        let feature = extract_heuristic(&input("isValid", EntityType::Function, None));
        assert!(feature.description.starts_with("check"));
    }

    #[test]
    fn class_always_defines() {
        let feature = extract_heuristic(&input("parseConfig", EntityType::Class, None));
        assert!(feature.description.starts_with("define"));
    }

    #[test]
    fn method_inherits_parent_class_as_keyword() {
        let feature = extract_heuristic(&input("fetch", EntityType::Method, Some("Dog")));
        assert!(feature.keywords.contains(&"dog".to_string()));
    }

    #[test]
    fn keywords_include_entity_type_and_path_derived_tokens() {
        let entity = EntityInput {
            entity_type: EntityType::Function,
            name: "validateUserInput",
            parent: None,
            file_path: "src/validation.ts",
        };
        let feature = extract_heuristic(&entity);
        assert!(feature.keywords.contains(&"function".to_string()));
        assert!(feature.keywords.contains(&"src".to_string()));
        assert!(feature.keywords.contains(&"validation".to_string()));
    }

    #[test]
    fn tokenize_handles_camel_and_snake_case() {
        assert_eq!(tokenize_name("getUserName"), vec!["get", "user", "name"]);
        assert_eq!(tokenize_name("get_user_name"), vec!["get", "user", "name"]);
    }

    #[test]
    fn vague_verbs_are_replaced() {
        assert_eq!(validate_feature_name("handle request"), "dispatch request");
        assert_eq!(validate_feature_name("process items"), "transform items");
    }

    #[test]
    fn trailing_punctuation_is_stripped() {
        assert_eq!(validate_feature_name("parse config."), "parse config");
    }

    #[test]
    fn implementation_detail_tokens_are_stripped() {
        assert_eq!(validate_feature_name("iterate array items"), "items");
    }

    #[test]
    fn long_descriptions_are_truncated_to_eight_words() {
        let words = "one two three four five six seven eight nine ten";
        assert_eq!(validate_feature_name(words).split_whitespace().count(), 8);
    }

    #[test]
    fn and_splits_into_description_and_sub_features() {
        let (description, sub_features) = split_on_and("parse config and validate input");
        assert_eq!(description, "parse config");
        assert_eq!(sub_features, Some(vec!["validate input".to_string()]));
    }

    #[test]
    fn short_left_side_does_not_split() {
        let (description, sub_features) = split_on_and("run and done");
        assert_eq!(description, "run and done");
        assert!(sub_features.is_none());
    }

    #[test]
    fn file_aggregation_picks_most_common_verb() {
        let children = vec![
            Feature { description: "parse config".into(), keywords: vec!["config".into()], sub_features: None },
            Feature { description: "parse input".into(), keywords: vec!["input".into()], sub_features: None },
            Feature { description: "format output".into(), keywords: vec!["output".into()], sub_features: None },
        ];
        let feature = aggregate_file_feature(&children, "loader.py");
        assert_eq!(feature.description, "parse loader.py");
        assert_eq!(feature.sub_features.unwrap().len(), 3);
    }

    #[test]
    fn file_aggregation_falls_back_for_no_children() {
        let feature = aggregate_file_feature(&[], "empty.py");
        assert_eq!(feature.description, "run empty.py");
        assert!(feature.sub_features.is_none());
    }
}
