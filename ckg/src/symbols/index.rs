use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::cache::TtlCache;
use crate::db::{GraphBackend, Neighbor};
use crate::error::Result;
use crate::models::{
    Direction, GraphNode, NodeType, ReferenceType, Relationship, SymbolReference,
};

// Reference kinds that count as actual use of a symbol. An import alone
// does not: a symbol that is imported but never touched is still unused.
const USAGE_TYPES: &[ReferenceType] = &[
    ReferenceType::Usage,
    ReferenceType::Call,
    ReferenceType::Reference,
];

const DEFINITION_TYPES: &[NodeType] = &[
    NodeType::Function,
    NodeType::Method,
    NodeType::Class,
    NodeType::Variable,
    NodeType::Type,
    NodeType::Interface,
    NodeType::Module,
];

/// Exact-name symbol lookups over the graph, with a short-lived cache in
/// front. Cache keys are namespaced `<project>:<operation>:<args>` so a
/// project re-index can drop only its own entries.
#[derive(Clone)]
pub struct SymbolIndex {
    db: Arc<dyn GraphBackend>,
    node_cache: TtlCache<Vec<GraphNode>>,
    reference_cache: TtlCache<Vec<SymbolReference>>,
}

impl SymbolIndex {
    pub fn new(db: Arc<dyn GraphBackend>, cache_size: usize, cache_ttl: Duration) -> Self {
        Self {
            db,
            node_cache: TtlCache::new(cache_size, cache_ttl),
            reference_cache: TtlCache::new(cache_size, cache_ttl),
        }
    }

    /// Finds definition nodes for `name`. When `from_path` is given,
    /// definitions in that file sort first; order is otherwise stable.
    pub async fn find_definition(
        &self,
        project_id: &str,
        name: &str,
        from_path: Option<&str>,
    ) -> Result<Vec<GraphNode>> {
        let key = format!("{project_id}:definition:{name}");
        let mut definitions = match self.node_cache.get(&key) {
            Some(hit) => hit,
            None => {
                let nodes = self.db.find_node(name, None, project_id).await?;
                let definitions: Vec<GraphNode> = nodes
                    .into_iter()
                    .filter(|n| DEFINITION_TYPES.contains(&n.node_type))
                    .collect();
                self.node_cache.put(key, definitions.clone());
                definitions
            }
        };

        if let Some(path) = from_path {
            definitions.sort_by_key(|n| n.path != path);
        }
        Ok(definitions)
    }

    /// All recorded references to any definition of `name`.
    pub async fn find_references(
        &self,
        project_id: &str,
        name: &str,
    ) -> Result<Vec<SymbolReference>> {
        let key = format!("{project_id}:references:{name}");
        if let Some(hit) = self.reference_cache.get(&key) {
            return Ok(hit);
        }

        let definitions = self.find_definition(project_id, name, None).await?;
        let mut references = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for definition in &definitions {
            for reference in self.db.get_references_to_symbol(&definition.id).await? {
                if seen.insert(reference.id.clone()) {
                    references.push(reference);
                }
            }
        }

        self.reference_cache.put(key, references.clone());
        Ok(references)
    }

    /// File nodes that import the file at `path`.
    pub async fn find_importers(&self, project_id: &str, path: &str) -> Result<Vec<GraphNode>> {
        let key = format!("{project_id}:importers:{path}");
        if let Some(hit) = self.node_cache.get(&key) {
            return Ok(hit);
        }

        let mut importers = Vec::new();
        for file in self.file_nodes_at(project_id, path).await? {
            let neighbors = self
                .db
                .get_neighbors(&file.id, Some(Relationship::Imports), Direction::Incoming)
                .await?;
            for Neighbor { node, .. } in neighbors {
                if node.node_type == NodeType::File {
                    importers.push(node);
                }
            }
        }
        importers.sort_by(|a, b| a.path.cmp(&b.path));
        importers.dedup_by(|a, b| a.id == b.id);

        self.node_cache.put(key, importers.clone());
        Ok(importers)
    }

    /// Symbols exported by the file at `path` (outgoing `exports` edges).
    pub async fn find_exports(&self, project_id: &str, path: &str) -> Result<Vec<GraphNode>> {
        let key = format!("{project_id}:exports:{path}");
        if let Some(hit) = self.node_cache.get(&key) {
            return Ok(hit);
        }

        let mut exports = Vec::new();
        for file in self.file_nodes_at(project_id, path).await? {
            let neighbors = self
                .db
                .get_neighbors(&file.id, Some(Relationship::Exports), Direction::Outgoing)
                .await?;
            exports.extend(neighbors.into_iter().map(|n| n.node));
        }

        self.node_cache.put(key, exports.clone());
        Ok(exports)
    }

    /// Exported symbols nothing in the project uses. Import-type
    /// references do not count as use.
    pub async fn find_unused_exports(&self, project_id: &str) -> Result<Vec<GraphNode>> {
        let key = format!("{project_id}:unused_exports:");
        if let Some(hit) = self.node_cache.get(&key) {
            return Ok(hit);
        }

        let edges = self
            .db
            .get_edges_by_project(project_id, Some(Relationship::Exports))
            .await?;
        let exported_ids: Vec<String> = edges
            .into_iter()
            .map(|e| e.target_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let mut unused = Vec::new();
        for node in self.db.get_nodes_by_ids(&exported_ids).await? {
            let count = self.db.count_references(&node.id, Some(USAGE_TYPES)).await?;
            if count == 0 {
                unused.push(node);
            }
        }
        unused.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.name.cmp(&b.name)));

        debug!(project_id, count = unused.len(), "unused export scan");
        self.node_cache.put(key, unused.clone());
        Ok(unused)
    }

    /// Symbols the file at `path` uses but whose defining file it neither
    /// imports nor contains. Returns the offending symbol names.
    pub async fn find_missing_imports(
        &self,
        project_id: &str,
        path: &str,
    ) -> Result<Vec<String>> {
        let imported_paths: HashSet<String> = {
            let mut paths = HashSet::new();
            for file in self.file_nodes_at(project_id, path).await? {
                let neighbors = self
                    .db
                    .get_neighbors(&file.id, Some(Relationship::Imports), Direction::Outgoing)
                    .await?;
                paths.extend(neighbors.into_iter().map(|n| n.node.path));
            }
            paths
        };

        let references = self.db.get_references_from_file(project_id, path).await?;
        let symbol_ids: Vec<String> = references
            .iter()
            .filter(|r| r.reference_type != ReferenceType::Import)
            .map(|r| r.symbol_node_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let mut missing = Vec::new();
        for symbol in self.db.get_nodes_by_ids(&symbol_ids).await? {
            if symbol.path != path && !imported_paths.contains(&symbol.path) {
                missing.push(symbol.name);
            }
        }
        missing.sort();
        missing.dedup();
        Ok(missing)
    }

    /// Drops every cached answer for the project. Called after any write
    /// that touches its graph.
    pub fn invalidate_project(&self, project_id: &str) {
        let prefix = format!("{project_id}:");
        self.node_cache.invalidate_prefix(&prefix);
        self.reference_cache.invalidate_prefix(&prefix);
    }

    async fn file_nodes_at(&self, project_id: &str, path: &str) -> Result<Vec<GraphNode>> {
        let nodes = self.db.find_nodes_by_path(project_id, path).await?;
        Ok(nodes
            .into_iter()
            .filter(|n| n.node_type == NodeType::File)
            .collect())
    }
}
