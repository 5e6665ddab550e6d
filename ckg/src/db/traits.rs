use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    ChunkEmbedding, CodeChunk, ConnectedNode, Diagnostic, Direction, GraphEdge, GraphNode,
    NodeType, ReferenceType, Relationship, SimilarChunk, SymbolReference,
};

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// An adjacent node together with the edge that reaches it.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub edge: GraphEdge,
    pub node: GraphNode,
}

// ---------------------------------------------------------------------------
// Individual store traits
// ---------------------------------------------------------------------------

/// CRUD and query operations for graph nodes.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Atomic per batch: all rows land or none do.
    async fn upsert_nodes_batch(&self, nodes: &[GraphNode]) -> Result<()>;
    async fn get_node(&self, id: &str) -> Result<Option<GraphNode>>;
    async fn get_nodes_by_ids(&self, ids: &[String]) -> Result<Vec<GraphNode>>;
    async fn find_node(
        &self,
        name: &str,
        node_type: Option<NodeType>,
        project_id: &str,
    ) -> Result<Vec<GraphNode>>;
    async fn find_nodes_by_type(
        &self,
        node_type: Option<NodeType>,
        project_id: &str,
        limit: u32,
    ) -> Result<Vec<GraphNode>>;
    async fn find_nodes_by_path(&self, project_id: &str, path: &str) -> Result<Vec<GraphNode>>;
    async fn find_nodes_by_name_like(
        &self,
        project_id: &str,
        pattern: &str,
        limit: u32,
    ) -> Result<Vec<GraphNode>>;
    /// Deletes the node and everything that hangs off it: edges in both
    /// directions, chunks (with embeddings), diagnostics and references.
    async fn delete_node(&self, id: &str) -> Result<bool>;
    /// Delete-then-recreate support: removes every node for a path.
    async fn delete_nodes_by_path(&self, project_id: &str, path: &str) -> Result<u64>;
    async fn clear_project(&self, project_id: &str) -> Result<u64>;
}

/// CRUD and traversal operations for edges.
#[async_trait]
pub trait EdgeStore: Send + Sync {
    /// Atomic per batch. Fails validation if an endpoint does not exist.
    async fn upsert_edges_batch(&self, edges: &[GraphEdge]) -> Result<()>;
    async fn get_neighbors(
        &self,
        node_id: &str,
        relationship: Option<Relationship>,
        direction: Direction,
    ) -> Result<Vec<Neighbor>>;
    async fn get_edges_by_project(
        &self,
        project_id: &str,
        relationship: Option<Relationship>,
    ) -> Result<Vec<GraphEdge>>;
    async fn most_connected_nodes(
        &self,
        project_id: &str,
        limit: u32,
    ) -> Result<Vec<ConnectedNode>>;
}

/// CRUD and lexical-search operations for chunks.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn create_chunks_batch(&self, chunks: &[CodeChunk]) -> Result<()>;
    async fn get_chunks_by_project(&self, project_id: &str) -> Result<Vec<CodeChunk>>;
    async fn get_chunks_by_node(&self, node_id: &str) -> Result<Vec<CodeChunk>>;
    async fn delete_chunks_by_node(&self, node_id: &str) -> Result<u64>;
    /// Chunks whose content matches any of `terms` (LIKE), with owning-node
    /// metadata. Lexical ranking happens in the embedding service.
    async fn find_chunks_matching(
        &self,
        terms: &[String],
        project_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<SimilarChunk>>;
}

/// Vector storage and nearest-neighbor search.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    /// Insert or replace the embedding for (chunk, model).
    async fn upsert_embedding(&self, embedding: &ChunkEmbedding) -> Result<()>;
    async fn delete_embeddings_by_project(&self, project_id: &str) -> Result<u64>;
    async fn count_embeddings(&self, project_id: &str) -> Result<u64>;
    async fn chunks_missing_embeddings(
        &self,
        project_id: &str,
        model: &str,
    ) -> Result<Vec<CodeChunk>>;
    async fn search_similar_chunks(
        &self,
        embedding: &[f32],
        limit: u32,
        threshold: f32,
        project_id: Option<&str>,
    ) -> Result<Vec<SimilarChunk>>;
}

/// Analyzer findings per node.
#[async_trait]
pub trait DiagnosticStore: Send + Sync {
    async fn create_diagnostics_batch(&self, diagnostics: &[Diagnostic]) -> Result<()>;
    async fn get_diagnostics_by_node(&self, node_id: &str) -> Result<Vec<Diagnostic>>;
    /// Distinct node ids in the project that carry at least one diagnostic.
    async fn nodes_with_diagnostics(&self, project_id: &str) -> Result<Vec<String>>;
}

/// Reference-site links per symbol.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn create_references_batch(&self, references: &[SymbolReference]) -> Result<()>;
    async fn get_references_to_symbol(
        &self,
        symbol_node_id: &str,
    ) -> Result<Vec<SymbolReference>>;
    async fn count_references(
        &self,
        symbol_node_id: &str,
        reference_types: Option<&[ReferenceType]>,
    ) -> Result<u64>;
    /// Distinct file paths of reference sites pointing at the symbol.
    async fn referencing_files(&self, symbol_node_id: &str) -> Result<Vec<String>>;
    async fn get_references_from_file(
        &self,
        project_id: &str,
        path: &str,
    ) -> Result<Vec<SymbolReference>>;
}

/// Key-value metadata store (e.g. active embedding dimensions).
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get_meta(&self, key: &str) -> Result<Option<String>>;
    async fn set_meta(&self, key: &str, value: &str) -> Result<()>;

    async fn get_embedding_dimensions(&self) -> Result<Option<usize>> {
        Ok(self
            .get_meta("embedding_dimensions")
            .await?
            .and_then(|v| v.parse().ok()))
    }

    async fn set_embedding_dimensions(&self, dims: usize) -> Result<()> {
        self.set_meta("embedding_dimensions", &dims.to_string()).await
    }
}

// ---------------------------------------------------------------------------
// Unified backend supertrait
// ---------------------------------------------------------------------------

/// A complete graph backend combining all store traits plus lifecycle
/// operations. The graph store is the single source of truth; read caches
/// elsewhere are derived from it.
#[async_trait]
pub trait GraphBackend:
    NodeStore
    + EdgeStore
    + ChunkStore
    + EmbeddingStore
    + DiagnosticStore
    + ReferenceStore
    + MetadataStore
{
    /// Sync with remote (e.g. embedded replica). No-op for local backends.
    async fn sync(&self) -> Result<()>;
}
