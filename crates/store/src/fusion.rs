//! Vector similarity and hybrid score fusion utilities.
//!
//! Pure-Rust implementations of:
//! - Cosine similarity
//! - Alpha-weighted fusion of lexical and vector result lists

use engram_core::store::StoredRecord;
use std::collections::HashMap;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Min-max normalize the scores of a result list into [0, 1].
///
/// A single-element or constant-score list normalizes to 1.0 for every
/// present entry (presence itself is the signal).
fn normalized_scores(results: &[StoredRecord]) -> HashMap<String, f32> {
    if results.is_empty() {
        return HashMap::new();
    }

    let min = results.iter().map(|r| r.score).fold(f32::INFINITY, f32::min);
    let max = results.iter().map(|r| r.score).fold(f32::NEG_INFINITY, f32::max);
    let span = max - min;

    results
        .iter()
        .map(|r| {
            let norm = if span <= f32::EPSILON {
                1.0
            } else {
                (r.score - min) / span
            };
            (r.id.clone(), norm)
        })
        .collect()
}

/// Blend lexical and vector result lists by the `alpha` factor.
///
/// Each record's final score = `alpha * vector_norm + (1 - alpha) *
/// keyword_norm`, where the per-list scores are min-max normalized and a
/// record absent from a list contributes 0 for that component. Results are
/// deduplicated by id and sorted by descending blended score.
pub fn alpha_fusion(
    keyword_results: &[StoredRecord],
    vector_results: &[StoredRecord],
    alpha: f32,
    limit: usize,
) -> Vec<StoredRecord> {
    let keyword_norm = normalized_scores(keyword_results);
    let vector_norm = normalized_scores(vector_results);

    let mut merged: HashMap<String, StoredRecord> = HashMap::new();
    for record in keyword_results.iter().chain(vector_results.iter()) {
        merged.entry(record.id.clone()).or_insert_with(|| record.clone());
    }

    let mut results: Vec<StoredRecord> = merged
        .into_values()
        .map(|mut record| {
            let kw = keyword_norm.get(&record.id).copied().unwrap_or(0.0);
            let vec = vector_norm.get(&record.id).copied().unwrap_or(0.0);
            record.score = alpha * vec + (1.0 - alpha) * kw;
            record
        })
        .collect();

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(limit);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn record(id: &str, score: f32) -> StoredRecord {
        StoredRecord {
            id: id.into(),
            properties: Map::new(),
            score,
        }
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![0.5, 0.5, 0.1];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn fusion_prefers_records_in_both_lists() {
        let keyword = vec![record("both", 3.0), record("kw_only", 2.0)];
        let vector = vec![record("both", 0.9), record("vec_only", 0.8)];

        let merged = alpha_fusion(&keyword, &vector, 0.5, 10);
        assert_eq!(merged[0].id, "both");
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn fusion_alpha_zero_is_pure_keyword() {
        let keyword = vec![record("a", 5.0), record("b", 1.0)];
        let vector = vec![record("b", 0.99)];

        let merged = alpha_fusion(&keyword, &vector, 0.0, 10);
        assert_eq!(merged[0].id, "a");
        assert!((merged[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn fusion_respects_limit() {
        let keyword: Vec<StoredRecord> =
            (0..8).map(|i| record(&format!("k{i}"), i as f32)).collect();
        let merged = alpha_fusion(&keyword, &[], 0.5, 3);
        assert_eq!(merged.len(), 3);
    }
}
