use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use ckg::config::Config;
use ckg::db::{Database, GraphBackend, LibSqlBackend};
use ckg::error::{CkgError, Result};
use ckg::indexer::{Extraction, FileScanner, ScannedFile, SymbolExtractor};
use ckg::models::{
    ChunkType, CodeChunk, GraphEdge, GraphNode, NodeType, ReferenceType, Relationship,
    SymbolReference,
};

/// A file-backed test database. The TempDir must outlive the backend.
pub async fn setup_backend() -> (Arc<dyn GraphBackend>, TempDir) {
    let temp_dir = TempDir::new().expect("create temp dir");
    let db_path = temp_dir.path().join("ckg_test.db");
    let mut config = Config::default();
    config.database.url = format!("file:{}", db_path.to_str().unwrap());

    let database = Database::new(&config.database)
        .await
        .expect("open test database");
    let backend: Arc<dyn GraphBackend> = Arc::new(LibSqlBackend::new(database));
    (backend, temp_dir)
}

/// Default config with the database pointed at a temp file and the local
/// embedding encoder selected.
pub fn test_config(db_url: &str) -> Config {
    let mut config = Config::default();
    config.database.url = db_url.to_string();
    config.embeddings.model = "local/statistical-384".to_string();
    config.embeddings.batch_delay_ms = 0;
    config
}

/// Line-oriented stub extractor. Understands:
///   `fn NAME`       a function symbol with a contains edge and a chunk
///   `class NAME`    a class symbol, exported via an exports edge
///   `ref NAME`      a usage reference from the file to a same-file symbol
/// Files named `broken.*` fail extraction.
pub struct StubExtractor;

#[async_trait]
impl SymbolExtractor for StubExtractor {
    async fn extract_file(
        &self,
        project_id: &str,
        path: &str,
        content: &str,
    ) -> Result<Extraction> {
        if path.contains("broken") {
            return Err(CkgError::Extraction(format!("cannot parse {path}")));
        }

        let file_node = GraphNode::new(project_id, NodeType::File, path, path);
        let mut extraction = Extraction {
            nodes: vec![file_node.clone()],
            ..Default::default()
        };
        let mut symbols: HashMap<String, String> = HashMap::new();

        for line in content.lines() {
            let line = line.trim();
            if let Some(name) = line.strip_prefix("fn ") {
                let node = GraphNode::new(project_id, NodeType::Function, name, path);
                symbols.insert(name.to_string(), node.id.clone());
                extraction.edges.push(GraphEdge::new(
                    project_id,
                    &file_node.id,
                    &node.id,
                    Relationship::Contains,
                ));
                extraction.chunks.push(CodeChunk::new(
                    &node.id,
                    project_id,
                    &format!("function {name} in {path}"),
                    ChunkType::Symbol,
                ));
                extraction.nodes.push(node);
            } else if let Some(name) = line.strip_prefix("class ") {
                let node = GraphNode::new(project_id, NodeType::Class, name, path);
                symbols.insert(name.to_string(), node.id.clone());
                extraction.edges.push(GraphEdge::new(
                    project_id,
                    &file_node.id,
                    &node.id,
                    Relationship::Exports,
                ));
                extraction.nodes.push(node);
            } else if let Some(name) = line.strip_prefix("ref ") {
                if let Some(symbol_id) = symbols.get(name) {
                    extraction.references.push(SymbolReference::new(
                        project_id,
                        &file_node.id,
                        symbol_id,
                        ReferenceType::Usage,
                    ));
                }
            }
        }

        Ok(extraction)
    }

    fn supports(&self, path: &str) -> bool {
        path.ends_with(".ts")
    }
}

/// In-memory scanner over a fixed path -> content map.
pub struct MemScanner {
    files: HashMap<String, String>,
}

impl MemScanner {
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl FileScanner for MemScanner {
    async fn scan(&self, _root: &Path) -> Result<Vec<ScannedFile>> {
        let mut files: Vec<ScannedFile> = self
            .files
            .iter()
            .map(|(path, content)| ScannedFile {
                path: path.clone(),
                content: content.clone(),
            })
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    async fn read_file(&self, path: &Path) -> Result<String> {
        let key = path.to_string_lossy().to_string();
        self.files
            .get(&key)
            .cloned()
            .ok_or_else(|| CkgError::NotFound(format!("file {key}")))
    }
}
