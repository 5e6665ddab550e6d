use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{generate_id, NodeType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    Symbol,
    Function,
    FileHeader,
    Basic,
}

impl std::fmt::Display for ChunkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Symbol => write!(f, "symbol"),
            Self::Function => write!(f, "function"),
            Self::FileHeader => write!(f, "file_header"),
            Self::Basic => write!(f, "basic"),
        }
    }
}

impl std::str::FromStr for ChunkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "symbol" => Ok(Self::Symbol),
            "function" => Ok(Self::Function),
            "file_header" => Ok(Self::FileHeader),
            "basic" => Ok(Self::Basic),
            _ => Err(format!("Unknown chunk type: {s}")),
        }
    }
}

/// A retrievable unit of text owned by exactly one node; deleted with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeChunk {
    pub id: String,
    pub node_id: String,
    pub project_id: String,
    pub content: String,
    pub chunk_type: ChunkType,
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CodeChunk {
    pub fn new(node_id: &str, project_id: &str, content: &str, chunk_type: ChunkType) -> Self {
        Self {
            id: generate_id(),
            node_id: node_id.to_string(),
            project_id: project_id.to_string(),
            content: content.to_string(),
            chunk_type,
            language: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }
}

/// A vector bound to one chunk. One active embedding per (chunk, model);
/// regenerating a chunk's content regenerates its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkEmbedding {
    pub id: String,
    pub chunk_id: String,
    pub model: String,
    pub provider: String,
    pub dimensions: usize,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

impl ChunkEmbedding {
    pub fn new(chunk_id: &str, model: &str, provider: &str, vector: Vec<f32>) -> Self {
        Self {
            id: generate_id(),
            chunk_id: chunk_id.to_string(),
            model: model.to_string(),
            provider: provider.to_string(),
            dimensions: vector.len(),
            vector,
            created_at: Utc::now(),
        }
    }
}

/// A nearest-neighbor hit: chunk content plus owning-node metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarChunk {
    pub chunk_id: String,
    pub node_id: String,
    pub content: String,
    pub chunk_type: ChunkType,
    pub node_name: String,
    pub node_path: String,
    pub node_type: NodeType,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_records_dimensions() {
        let emb = ChunkEmbedding::new("c1", "statistical-384", "local", vec![0.0; 384]);
        assert_eq!(emb.dimensions, 384);
    }

    #[test]
    fn test_chunk_type_serde() {
        let json = serde_json::to_string(&ChunkType::FileHeader).unwrap();
        assert_eq!(json, "\"file_header\"");
    }
}
