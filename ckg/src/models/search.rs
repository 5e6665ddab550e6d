use serde::{Deserialize, Serialize};

use super::{GraphNode, SimilarChunk};

/// Which retrieval phase discovered a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSource {
    Symbolic,
    Semantic,
}

/// A retrieval candidate flowing through the rerank pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub node: GraphNode,
    /// Phase-assigned relevance in [0, 1].
    pub relevance: f32,
    pub source: ResultSource,
    /// Composite score after reranking, in [0, 1].
    pub score: f32,
    /// Chunk content for semantic hits, used for assembly.
    pub snippet: Option<String>,
    pub has_diagnostics: bool,
}

impl RankedResult {
    pub fn new(node: GraphNode, relevance: f32, source: ResultSource) -> Self {
        Self {
            node,
            relevance,
            source,
            score: 0.0,
            snippet: None,
            has_diagnostics: false,
        }
    }

    pub fn with_snippet(mut self, snippet: String) -> Self {
        self.snippet = Some(snippet);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOptions {
    pub limit: usize,
    pub include_symbolic: bool,
    pub include_semantic: bool,
    pub include_text: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 20,
            include_symbolic: true,
            include_semantic: true,
            include_text: true,
        }
    }
}

/// Options for hybrid semantic search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticSearchOptions {
    pub limit: usize,
    pub threshold: f32,
    pub enable_vector: bool,
    pub enable_lexical: bool,
}

impl Default for SemanticSearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            threshold: 0.3,
            enable_vector: true,
            enable_lexical: true,
        }
    }
}

/// Combined output of the search façade.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchResponse {
    pub symbolic: Vec<GraphNode>,
    pub semantic: Vec<SimilarChunk>,
    pub text: Vec<GraphNode>,
    pub combined: Vec<RankedResult>,
}
