use chrono::{DateTime, Utc};

use crate::models::{GraphNode, RankedResult, RerankWeights, ResultSource};

const RECENCY_WINDOW_DAYS: f64 = 365.0;

/// Phase 3: composite scoring and a stable descending sort.
///
/// score = relevance * w.relevance
///       + source weight (symbolic | semantic)
///       + recency bonus * w.recency
///       - error penalty (if the node carries diagnostics)
///       + query-term overlap bonus (capped)
/// clamped to [0, 1]. Ties keep discovery order.
pub fn rerank(results: &mut [RankedResult], query: &str, weights: &RerankWeights) {
    let now = Utc::now();
    let query_terms = overlap_terms(query);

    for result in results.iter_mut() {
        result.score = composite_score(result, &query_terms, weights, now);
    }
    results.sort_by(|a, b| b.score.total_cmp(&a.score));
}

fn composite_score(
    result: &RankedResult,
    query_terms: &[String],
    weights: &RerankWeights,
    now: DateTime<Utc>,
) -> f32 {
    let source_weight = match result.source {
        ResultSource::Symbolic => weights.symbolic_source,
        ResultSource::Semantic => weights.semantic_source,
    };

    let mut score = result.relevance * weights.relevance + source_weight;
    score += recency_bonus(&result.node, now) * weights.recency;
    if result.has_diagnostics {
        score -= weights.error_penalty;
    }
    score += overlap_bonus(&result.node, query_terms, weights.overlap_cap);

    score.clamp(0.0, 1.0)
}

/// Linear decay from 1.0 to 0.0 over 365 days since `updated_at`. A node
/// without a timestamp decays as if last touched 365 days ago.
fn recency_bonus(node: &GraphNode, now: DateTime<Utc>) -> f32 {
    let age_days = match node.updated_at {
        Some(updated_at) => {
            let age = now.signed_duration_since(updated_at);
            (age.num_seconds() as f64 / 86_400.0).max(0.0)
        }
        None => RECENCY_WINDOW_DAYS,
    };
    (1.0 - age_days / RECENCY_WINDOW_DAYS).clamp(0.0, 1.0) as f32
}

fn overlap_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_lowercase())
        .collect();
    terms.sort();
    terms.dedup();
    terms
}

/// Bonus proportional to the fraction of query terms found in the node's
/// name or path, capped at `cap`.
fn overlap_bonus(node: &GraphNode, query_terms: &[String], cap: f32) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let name = node.name.to_lowercase();
    let path = node.path.to_lowercase();
    let hits = query_terms
        .iter()
        .filter(|t| name.contains(t.as_str()) || path.contains(t.as_str()))
        .count();
    (cap * hits as f32 / query_terms.len() as f32).min(cap)
}
