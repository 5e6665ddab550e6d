use std::collections::HashSet;
use std::sync::Arc;

use crate::db::GraphBackend;
use crate::error::{CkgError, Result};
use crate::models::{ImpactReport, NodeType};

const MAX_COMPLEXITY: f32 = 10.0;

/// Estimates the blast radius of changing a symbol: how many references
/// exist, how many files they span, and a rough change-complexity score.
#[derive(Clone)]
pub struct ImpactAnalyzer {
    db: Arc<dyn GraphBackend>,
}

impl ImpactAnalyzer {
    pub fn new(db: Arc<dyn GraphBackend>) -> Self {
        Self { db }
    }

    pub async fn analyze_symbol_impact(
        &self,
        project_id: &str,
        symbol: &str,
    ) -> Result<ImpactReport> {
        let definitions: Vec<_> = self
            .db
            .find_node(symbol, None, project_id)
            .await?
            .into_iter()
            .filter(|n| n.node_type != NodeType::File)
            .collect();
        if definitions.is_empty() {
            return Err(CkgError::NotFound(format!(
                "symbol '{symbol}' in project '{project_id}'"
            )));
        }

        let mut reference_count = 0usize;
        let mut files: HashSet<String> = HashSet::new();
        for definition in &definitions {
            reference_count += self.db.count_references(&definition.id, None).await? as usize;
            files.extend(self.db.referencing_files(&definition.id).await?);
        }
        let file_spread = files.len();

        let complexity = Self::complexity(&definitions, reference_count);
        let recommendations =
            Self::recommendations(symbol, &definitions, reference_count, file_spread);

        Ok(ImpactReport {
            symbol: symbol.to_string(),
            definitions,
            reference_count,
            file_spread,
            complexity,
            recommendations,
        })
    }

    fn complexity(definitions: &[crate::models::GraphNode], reference_count: usize) -> f32 {
        let mut score = 1.0 + (1.0 + reference_count as f32).ln();

        // Interfaces and classes fan out through implementors.
        let type_weight = definitions
            .iter()
            .map(|d| match d.node_type {
                NodeType::Interface | NodeType::Class => 1.5,
                NodeType::Type | NodeType::Module => 1.0,
                _ => 0.5,
            })
            .fold(0.0f32, f32::max);
        score += type_weight;

        if definitions
            .iter()
            .any(|d| d.metadata.get("exported").and_then(|v| v.as_bool()) == Some(true))
        {
            score += 0.5;
        }

        score.min(MAX_COMPLEXITY)
    }

    fn recommendations(
        symbol: &str,
        definitions: &[crate::models::GraphNode],
        reference_count: usize,
        file_spread: usize,
    ) -> Vec<String> {
        let mut out = Vec::new();

        if reference_count == 0 {
            out.push(format!(
                "'{symbol}' has no recorded references; it may be unused or only reached dynamically"
            ));
        }
        if definitions.len() > 1 {
            out.push(format!(
                "'{symbol}' is defined in {} places; confirm which definition you are changing",
                definitions.len()
            ));
        }
        if file_spread > 20 {
            out.push(format!(
                "'{symbol}' is referenced from {file_spread} files; consider a staged migration"
            ));
        } else if reference_count > 0 {
            out.push(format!(
                "review the {reference_count} reference(s) across {file_spread} file(s) before changing the signature"
            ));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GraphNode;

    fn node(node_type: NodeType) -> GraphNode {
        GraphNode::new("p1", node_type, "Widget", "src/widget.ts")
    }

    #[test]
    fn complexity_is_bounded() {
        let defs = vec![node(NodeType::Interface)];
        let score = ImpactAnalyzer::complexity(&defs, 1_000_000);
        assert!(score <= MAX_COMPLEXITY);
        assert!(score >= 1.0);
    }

    #[test]
    fn complexity_grows_with_references() {
        let defs = vec![node(NodeType::Function)];
        let low = ImpactAnalyzer::complexity(&defs, 1);
        let high = ImpactAnalyzer::complexity(&defs, 100);
        assert!(high > low);
    }

    #[test]
    fn unused_symbol_gets_flagged() {
        let defs = vec![node(NodeType::Function)];
        let recs = ImpactAnalyzer::recommendations("Widget", &defs, 0, 0);
        assert!(recs.iter().any(|r| r.contains("no recorded references")));
    }

    #[test]
    fn wide_spread_suggests_staged_migration() {
        let defs = vec![node(NodeType::Class)];
        let recs = ImpactAnalyzer::recommendations("Widget", &defs, 80, 25);
        assert!(recs.iter().any(|r| r.contains("staged migration")));
    }
}
