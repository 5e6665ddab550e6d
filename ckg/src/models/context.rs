use serde::{Deserialize, Serialize};

/// Policy table for composite reranking. The defaults are the canonical
/// retrieval policy; callers may override per query via `ContextOptions`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RerankWeights {
    /// Multiplier on the phase-1/2 relevance signal.
    pub relevance: f32,
    /// Additive weight for symbolically discovered results.
    pub symbolic_source: f32,
    /// Additive weight for semantically discovered results.
    pub semantic_source: f32,
    /// Multiplier on the recency bonus. The bonus decays linearly to 0
    /// over 365 days since `updated_at`; nodes without a timestamp decay
    /// as if last touched 365 days ago, so they never outrank fresh ones.
    pub recency: f32,
    /// Subtracted when the node carries diagnostics.
    pub error_penalty: f32,
    /// Cap on the query-term overlap bonus.
    pub overlap_cap: f32,
}

impl Default for RerankWeights {
    fn default() -> Self {
        Self {
            relevance: 0.8,
            symbolic_source: 0.6,
            semantic_source: 0.4,
            recency: 0.1,
            error_penalty: 0.2,
            overlap_cap: 0.2,
        }
    }
}

/// Options for a context-building query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextOptions {
    /// Token budget B; defaults to the configured budget (8000).
    pub token_budget: Option<usize>,
    pub include_diagnostics: bool,
    pub include_examples: bool,
    pub weights: Option<RerankWeights>,
}

/// Context sections, in population order. The order is the drop-priority
/// under budget pressure: target symbols are the most valuable and headers
/// cheapest, examples go first when the budget runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    FileHeaders,
    TargetSymbols,
    Callers,
    Imports,
    Diagnostics,
    Examples,
}

impl SectionKind {
    pub fn heading(&self) -> &'static str {
        match self {
            Self::FileHeaders => "File Overview",
            Self::TargetSymbols => "Target Symbols",
            Self::Callers => "Nearest Callers",
            Self::Imports => "Related Imports/Exports",
            Self::Diagnostics => "Diagnostics",
            Self::Examples => "Usage Examples",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextItem {
    pub node_id: Option<String>,
    pub title: String,
    pub content: String,
    pub score: f32,
    pub tokens: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSection {
    pub kind: SectionKind,
    pub items: Vec<ContextItem>,
    pub tokens: usize,
}

impl ContextSection {
    pub fn new(kind: SectionKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
            tokens: 0,
        }
    }

    pub fn push(&mut self, item: ContextItem) {
        self.tokens += item.tokens;
        self.items.push(item);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMetadata {
    pub query: String,
    pub project_id: Option<String>,
    pub result_count: usize,
    pub estimated_tokens: usize,
    pub token_budget: usize,
    pub weights: RerankWeights,
}

/// The assembled, token-bounded context bundle.
///
/// `metadata.estimated_tokens` never exceeds `metadata.token_budget`;
/// budget exhaustion is reported here, never as an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBundle {
    pub sections: Vec<ContextSection>,
    pub metadata: ContextMetadata,
}

impl ContextBundle {
    pub fn section(&self, kind: SectionKind) -> Option<&ContextSection> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_are_canonical() {
        let w = RerankWeights::default();
        assert_eq!(w.relevance, 0.8);
        assert_eq!(w.symbolic_source, 0.6);
        assert_eq!(w.semantic_source, 0.4);
        assert_eq!(w.recency, 0.1);
        assert_eq!(w.error_penalty, 0.2);
        assert_eq!(w.overlap_cap, 0.2);
    }

    #[test]
    fn test_section_push_accumulates_tokens() {
        let mut section = ContextSection::new(SectionKind::TargetSymbols);
        section.push(ContextItem {
            node_id: None,
            title: "foo".into(),
            content: "fn foo() {}".into(),
            score: 1.0,
            tokens: 3,
        });
        section.push(ContextItem {
            node_id: None,
            title: "bar".into(),
            content: "fn bar() {}".into(),
            score: 0.9,
            tokens: 4,
        });
        assert_eq!(section.tokens, 7);
    }
}
