use std::collections::HashSet;
use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::db::GraphBackend;
use crate::error::Result;
use crate::models::{NodeType, RankedResult, ResultSource};

const DEFINITION_RELEVANCE: f32 = 1.0;
const REFERENCE_RELEVANCE: f32 = 0.8;
const MAX_REFERENCES_PER_CANDIDATE: usize = 5;
const FUZZY_LIMIT: u32 = 10;
const FUZZY_MIN_SIMILARITY: f32 = 0.4;

/// Words that look like identifiers in a free-text query but never are.
const STOPLIST: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "into", "how", "what", "where", "when",
    "why", "does", "are", "is", "not", "all", "any", "can", "use", "using", "used", "find",
    "show", "list", "get", "set", "add", "new", "file", "files", "code", "function", "functions",
    "class", "classes", "method", "methods", "type", "types", "error", "errors", "does", "work",
    "works", "which", "have", "has", "you", "your", "about",
];

fn pascal_case_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][a-z0-9]+(?:[A-Z][a-z0-9]+)*\b").unwrap())
}

fn camel_case_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[a-z]+(?:[A-Z][a-z0-9]+)+\b").unwrap())
}

fn snake_case_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[a-z][a-z0-9]*(?:_[a-z0-9]+)+\b").unwrap())
}

fn constant_case_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z][A-Z0-9]+(?:_[A-Z0-9]+)*\b").unwrap())
}

/// Extracts candidate symbol names from a free-text query using
/// identifier-casing heuristics, stoplist-filtered, in discovery order.
/// Plain lowercase words are a fallback when no cased identifier appears.
pub fn extract_candidates(query: &str) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut candidates: Vec<String> = Vec::new();

    for re in [
        pascal_case_re(),
        camel_case_re(),
        snake_case_re(),
        constant_case_re(),
    ] {
        for m in re.find_iter(query) {
            let word = m.as_str();
            if word.len() < 3 || STOPLIST.contains(&word.to_lowercase().as_str()) {
                continue;
            }
            if seen.insert(word.to_string()) {
                candidates.push(word.to_string());
            }
        }
    }

    if candidates.is_empty() {
        for word in query.split(|c: char| !c.is_alphanumeric() && c != '_') {
            if word.len() < 3 || STOPLIST.contains(&word.to_lowercase().as_str()) {
                continue;
            }
            if seen.insert(word.to_string()) {
                candidates.push(word.to_string());
            }
        }
    }

    candidates
}

/// Character-bigram Dice coefficient, case-insensitive. 1.0 for equal
/// strings, 0.0 when no bigram is shared.
pub fn name_similarity(a: &str, b: &str) -> f32 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if a == b {
        return 1.0;
    }
    let bigrams = |s: &str| -> Vec<(char, char)> {
        let chars: Vec<char> = s.chars().collect();
        chars.windows(2).map(|w| (w[0], w[1])).collect()
    };
    let mut left = bigrams(&a);
    let right = bigrams(&b);
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    let total = left.len() + right.len();
    let mut shared = 0usize;
    for pair in &right {
        if let Some(pos) = left.iter().position(|p| p == pair) {
            left.swap_remove(pos);
            shared += 1;
        }
    }
    (2.0 * shared as f32) / total as f32
}

/// Phase 1: exact and fuzzy name-based retrieval.
pub struct SymbolicRetriever {
    db: Arc<dyn GraphBackend>,
}

impl SymbolicRetriever {
    pub fn new(db: Arc<dyn GraphBackend>) -> Self {
        Self { db }
    }

    /// For each candidate: exact definitions at relevance 1.0, a capped
    /// set of referencing nodes at 0.8, and fuzzy name matches scored by
    /// bigram similarity. Deduplicated by node id.
    pub async fn retrieve(&self, query: &str, project_id: &str) -> Result<Vec<RankedResult>> {
        let candidates = extract_candidates(query);
        debug!(?candidates, project_id, "symbolic candidates");

        let mut results: Vec<RankedResult> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for candidate in &candidates {
            let definitions = self.db.find_node(candidate, None, project_id).await?;
            for node in definitions {
                if seen.insert(node.id.clone()) {
                    results.push(RankedResult::new(
                        node,
                        DEFINITION_RELEVANCE,
                        ResultSource::Symbolic,
                    ));
                }
            }

            // Referencing nodes, capped per candidate.
            let mut reference_node_ids: Vec<String> = Vec::new();
            for result in results
                .iter()
                .filter(|r| &r.node.name == candidate)
                .map(|r| r.node.id.clone())
                .collect::<Vec<_>>()
            {
                for reference in self.db.get_references_to_symbol(&result).await? {
                    if reference_node_ids.len() >= MAX_REFERENCES_PER_CANDIDATE {
                        break;
                    }
                    reference_node_ids.push(reference.reference_node_id);
                }
            }
            for node in self.db.get_nodes_by_ids(&reference_node_ids).await? {
                if seen.insert(node.id.clone()) {
                    results.push(RankedResult::new(
                        node,
                        REFERENCE_RELEVANCE,
                        ResultSource::Symbolic,
                    ));
                }
            }

            // Fuzzy matches on a leading-substring LIKE scan, rescored by
            // bigram similarity.
            let prefix: String = candidate.chars().take(3).collect();
            let pattern = format!("{}%", prefix);
            let fuzzy = self
                .db
                .find_nodes_by_name_like(project_id, &pattern, FUZZY_LIMIT)
                .await?;
            for node in fuzzy {
                if node.node_type == NodeType::File {
                    continue;
                }
                let similarity = name_similarity(candidate, &node.name);
                if similarity >= FUZZY_MIN_SIMILARITY && seen.insert(node.id.clone()) {
                    results.push(RankedResult::new(node, similarity, ResultSource::Symbolic));
                }
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_cased_identifiers() {
        let candidates = extract_candidates("how does UserService call get_config and MAX_RETRIES");
        assert!(candidates.contains(&"UserService".to_string()));
        assert!(candidates.contains(&"get_config".to_string()));
        assert!(candidates.contains(&"MAX_RETRIES".to_string()));
    }

    #[test]
    fn stoplist_filters_common_words() {
        let candidates = extract_candidates("find the function that does this");
        assert!(candidates.is_empty());
    }

    #[test]
    fn falls_back_to_plain_words() {
        let candidates = extract_candidates("parser tokenizer");
        assert_eq!(candidates, vec!["parser", "tokenizer"]);
    }

    #[test]
    fn candidates_are_deduplicated_in_order() {
        let candidates = extract_candidates("UserService UserService parseConfig");
        assert_eq!(candidates, vec!["UserService", "parseConfig"]);
    }

    #[test]
    fn similarity_is_one_for_equal_names() {
        assert_eq!(name_similarity("parse", "Parse"), 1.0);
    }

    #[test]
    fn similarity_orders_closer_names_higher() {
        let close = name_similarity("parseConfig", "parseConfigFile");
        let far = name_similarity("parseConfig", "renderWidget");
        assert!(close > far);
    }

    #[test]
    fn similarity_of_disjoint_names_is_zero() {
        assert_eq!(name_similarity("abc", "xyz"), 0.0);
    }
}
