use crate::models::{
    ContextBundle, ContextItem, ContextMetadata, ContextSection, RerankWeights, SectionKind,
};

/// Token cost estimate: ceil(characters / 4).
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// An item proposed for a section, before budgeting.
#[derive(Debug, Clone)]
pub struct CandidateItem {
    pub node_id: Option<String>,
    pub title: String,
    pub content: String,
    pub score: f32,
}

impl CandidateItem {
    fn tokens(&self) -> usize {
        estimate_tokens(&self.title) + estimate_tokens(&self.content)
    }
}

// Per-section share of the budget (percent) and item cap.
fn section_policy(kind: SectionKind) -> (usize, usize) {
    match kind {
        SectionKind::FileHeaders => (10, 3),
        SectionKind::TargetSymbols => (60, usize::MAX),
        SectionKind::Callers => (15, 5),
        SectionKind::Imports => (10, 10),
        SectionKind::Diagnostics => (5, 5),
        SectionKind::Examples => (10, 3),
    }
}

/// Phase 4: pack candidate items into sections under the token budget.
///
/// Sections fill in fixed order; each gets min(its share of B, whatever
/// global budget remains). Within a section, items are taken in rank
/// order and packing stops at the first item that would overflow the
/// sub-budget, dropping later items even if smaller. The reported
/// `estimated_tokens` never exceeds the budget; running out is a normal
/// outcome, not an error.
pub fn assemble(
    query: &str,
    project_id: Option<&str>,
    token_budget: usize,
    weights: RerankWeights,
    result_count: usize,
    inputs: Vec<(SectionKind, Vec<CandidateItem>)>,
) -> ContextBundle {
    let mut sections: Vec<ContextSection> = Vec::new();
    let mut consumed = 0usize;

    for (kind, items) in inputs {
        let (percent, max_items) = section_policy(kind);
        let share = token_budget * percent / 100;
        let sub_budget = share.min(token_budget.saturating_sub(consumed));

        let mut section = ContextSection::new(kind);
        for item in items {
            if section.items.len() >= max_items {
                break;
            }
            let tokens = item.tokens();
            if section.tokens + tokens > sub_budget {
                break;
            }
            section.push(ContextItem {
                node_id: item.node_id,
                title: item.title,
                content: item.content,
                score: item.score,
                tokens,
            });
        }

        consumed += section.tokens;
        if !section.is_empty() {
            sections.push(section);
        }
    }

    ContextBundle {
        sections,
        metadata: ContextMetadata {
            query: query.to_string(),
            project_id: project_id.map(str::to_string),
            result_count,
            estimated_tokens: consumed,
            token_budget,
            weights,
        },
    }
}

/// Flattens an assembled bundle into one text blob under stable headings.
/// Pure transform; never re-runs retrieval.
pub fn format_for_ai(bundle: &ContextBundle) -> String {
    let mut out = String::new();
    for section in &bundle.sections {
        if section.is_empty() {
            continue;
        }
        out.push_str("## ");
        out.push_str(section.kind.heading());
        out.push_str("\n\n");
        for item in &section.items {
            out.push_str("### ");
            out.push_str(&item.title);
            out.push('\n');
            out.push_str(&item.content);
            out.push_str("\n\n");
        }
    }
    out
}
