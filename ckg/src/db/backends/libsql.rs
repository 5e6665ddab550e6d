use async_trait::async_trait;

use crate::db::connection::Database;
use crate::db::repository::{
    ChunkRepository, DiagnosticRepository, EdgeRepository, EmbeddingRepository, NodeRepository,
    ReferenceRepository,
};
use crate::db::traits::{
    ChunkStore, DiagnosticStore, EdgeStore, EmbeddingStore, GraphBackend, MetadataStore, Neighbor,
    NodeStore, ReferenceStore,
};
use crate::db::MetadataRepository;
use crate::error::Result;
use crate::models::{
    ChunkEmbedding, CodeChunk, ConnectedNode, Diagnostic, Direction, GraphEdge, GraphNode,
    NodeType, ReferenceType, Relationship, SimilarChunk, SymbolReference,
};

pub struct LibSqlBackend {
    db: Database,
}

impl LibSqlBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NodeStore for LibSqlBackend {
    async fn upsert_nodes_batch(&self, nodes: &[GraphNode]) -> Result<()> {
        let conn = self.db.connect()?;
        NodeRepository::upsert_batch(&conn, nodes).await
    }
    async fn get_node(&self, id: &str) -> Result<Option<GraphNode>> {
        let conn = self.db.connect()?;
        NodeRepository::get_by_id(&conn, id).await
    }
    async fn get_nodes_by_ids(&self, ids: &[String]) -> Result<Vec<GraphNode>> {
        let conn = self.db.connect()?;
        NodeRepository::get_by_ids(&conn, ids).await
    }
    async fn find_node(
        &self,
        name: &str,
        node_type: Option<NodeType>,
        project_id: &str,
    ) -> Result<Vec<GraphNode>> {
        let conn = self.db.connect()?;
        NodeRepository::find(&conn, name, node_type, project_id).await
    }
    async fn find_nodes_by_type(
        &self,
        node_type: Option<NodeType>,
        project_id: &str,
        limit: u32,
    ) -> Result<Vec<GraphNode>> {
        let conn = self.db.connect()?;
        NodeRepository::find_by_type(&conn, node_type, project_id, limit).await
    }
    async fn find_nodes_by_path(&self, project_id: &str, path: &str) -> Result<Vec<GraphNode>> {
        let conn = self.db.connect()?;
        NodeRepository::find_by_path(&conn, project_id, path).await
    }
    async fn find_nodes_by_name_like(
        &self,
        project_id: &str,
        pattern: &str,
        limit: u32,
    ) -> Result<Vec<GraphNode>> {
        let conn = self.db.connect()?;
        NodeRepository::find_by_name_like(&conn, project_id, pattern, limit).await
    }
    async fn delete_node(&self, id: &str) -> Result<bool> {
        let conn = self.db.connect()?;
        NodeRepository::delete(&conn, id).await
    }
    async fn delete_nodes_by_path(&self, project_id: &str, path: &str) -> Result<u64> {
        let conn = self.db.connect()?;
        NodeRepository::delete_by_path(&conn, project_id, path).await
    }
    async fn clear_project(&self, project_id: &str) -> Result<u64> {
        let conn = self.db.connect()?;
        NodeRepository::clear_project(&conn, project_id).await
    }
}

#[async_trait]
impl EdgeStore for LibSqlBackend {
    async fn upsert_edges_batch(&self, edges: &[GraphEdge]) -> Result<()> {
        let conn = self.db.connect()?;
        EdgeRepository::upsert_batch(&conn, edges).await
    }
    async fn get_neighbors(
        &self,
        node_id: &str,
        relationship: Option<Relationship>,
        direction: Direction,
    ) -> Result<Vec<Neighbor>> {
        let conn = self.db.connect()?;
        EdgeRepository::get_neighbors(&conn, node_id, relationship, direction).await
    }
    async fn get_edges_by_project(
        &self,
        project_id: &str,
        relationship: Option<Relationship>,
    ) -> Result<Vec<GraphEdge>> {
        let conn = self.db.connect()?;
        EdgeRepository::get_by_project(&conn, project_id, relationship).await
    }
    async fn most_connected_nodes(
        &self,
        project_id: &str,
        limit: u32,
    ) -> Result<Vec<ConnectedNode>> {
        let conn = self.db.connect()?;
        EdgeRepository::most_connected(&conn, project_id, limit).await
    }
}

#[async_trait]
impl ChunkStore for LibSqlBackend {
    async fn create_chunks_batch(&self, chunks: &[CodeChunk]) -> Result<()> {
        let conn = self.db.connect()?;
        ChunkRepository::create_batch(&conn, chunks).await
    }
    async fn get_chunks_by_project(&self, project_id: &str) -> Result<Vec<CodeChunk>> {
        let conn = self.db.connect()?;
        ChunkRepository::get_by_project(&conn, project_id).await
    }
    async fn get_chunks_by_node(&self, node_id: &str) -> Result<Vec<CodeChunk>> {
        let conn = self.db.connect()?;
        ChunkRepository::get_by_node(&conn, node_id).await
    }
    async fn delete_chunks_by_node(&self, node_id: &str) -> Result<u64> {
        let conn = self.db.connect()?;
        ChunkRepository::delete_by_node(&conn, node_id).await
    }
    async fn find_chunks_matching(
        &self,
        terms: &[String],
        project_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<SimilarChunk>> {
        let conn = self.db.connect()?;
        ChunkRepository::find_matching(&conn, terms, project_id, limit).await
    }
}

#[async_trait]
impl EmbeddingStore for LibSqlBackend {
    async fn upsert_embedding(&self, embedding: &ChunkEmbedding) -> Result<()> {
        let conn = self.db.connect()?;
        EmbeddingRepository::upsert(&conn, embedding).await
    }
    async fn delete_embeddings_by_project(&self, project_id: &str) -> Result<u64> {
        let conn = self.db.connect()?;
        EmbeddingRepository::delete_by_project(&conn, project_id).await
    }
    async fn count_embeddings(&self, project_id: &str) -> Result<u64> {
        let conn = self.db.connect()?;
        EmbeddingRepository::count_by_project(&conn, project_id).await
    }
    async fn chunks_missing_embeddings(
        &self,
        project_id: &str,
        model: &str,
    ) -> Result<Vec<CodeChunk>> {
        let conn = self.db.connect()?;
        EmbeddingRepository::chunks_missing(&conn, project_id, model).await
    }
    async fn search_similar_chunks(
        &self,
        embedding: &[f32],
        limit: u32,
        threshold: f32,
        project_id: Option<&str>,
    ) -> Result<Vec<SimilarChunk>> {
        let conn = self.db.connect()?;
        EmbeddingRepository::search_similar(&conn, embedding, limit, threshold, project_id).await
    }
}

#[async_trait]
impl DiagnosticStore for LibSqlBackend {
    async fn create_diagnostics_batch(&self, diagnostics: &[Diagnostic]) -> Result<()> {
        let conn = self.db.connect()?;
        DiagnosticRepository::create_batch(&conn, diagnostics).await
    }
    async fn get_diagnostics_by_node(&self, node_id: &str) -> Result<Vec<Diagnostic>> {
        let conn = self.db.connect()?;
        DiagnosticRepository::get_by_node(&conn, node_id).await
    }
    async fn nodes_with_diagnostics(&self, project_id: &str) -> Result<Vec<String>> {
        let conn = self.db.connect()?;
        DiagnosticRepository::nodes_with_diagnostics(&conn, project_id).await
    }
}

#[async_trait]
impl ReferenceStore for LibSqlBackend {
    async fn create_references_batch(&self, references: &[SymbolReference]) -> Result<()> {
        let conn = self.db.connect()?;
        ReferenceRepository::create_batch(&conn, references).await
    }
    async fn get_references_to_symbol(
        &self,
        symbol_node_id: &str,
    ) -> Result<Vec<SymbolReference>> {
        let conn = self.db.connect()?;
        ReferenceRepository::get_to_symbol(&conn, symbol_node_id).await
    }
    async fn count_references(
        &self,
        symbol_node_id: &str,
        reference_types: Option<&[ReferenceType]>,
    ) -> Result<u64> {
        let conn = self.db.connect()?;
        ReferenceRepository::count(&conn, symbol_node_id, reference_types).await
    }
    async fn referencing_files(&self, symbol_node_id: &str) -> Result<Vec<String>> {
        let conn = self.db.connect()?;
        ReferenceRepository::referencing_files(&conn, symbol_node_id).await
    }
    async fn get_references_from_file(
        &self,
        project_id: &str,
        path: &str,
    ) -> Result<Vec<SymbolReference>> {
        let conn = self.db.connect()?;
        ReferenceRepository::get_from_file(&conn, project_id, path).await
    }
}

#[async_trait]
impl MetadataStore for LibSqlBackend {
    async fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let conn = self.db.connect()?;
        MetadataRepository::get(&conn, key).await
    }
    async fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.db.connect()?;
        MetadataRepository::set(&conn, key, value).await
    }
}

#[async_trait]
impl GraphBackend for LibSqlBackend {
    async fn sync(&self) -> Result<()> {
        self.db.sync().await
    }
}
