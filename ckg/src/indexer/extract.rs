use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::models::{ChunkType, CodeChunk, Diagnostic, GraphEdge, GraphNode, SymbolReference};

/// Everything extracted from one file: the file node itself, its symbol
/// nodes, edges, symbol-level chunks, references and diagnostics.
#[derive(Debug, Default)]
pub struct Extraction {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub chunks: Vec<CodeChunk>,
    pub references: Vec<SymbolReference>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty() && self.chunks.is_empty()
    }

    pub fn merge(&mut self, other: Extraction) {
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges);
        self.chunks.extend(other.chunks);
        self.references.extend(other.references);
        self.diagnostics.extend(other.diagnostics);
    }
}

/// Language-aware symbol extraction, provided by the host. The returned
/// extraction must contain the file node for `path`.
#[async_trait]
pub trait SymbolExtractor: Send + Sync {
    async fn extract_file(
        &self,
        project_id: &str,
        path: &str,
        content: &str,
    ) -> Result<Extraction>;

    /// Whether this extractor understands the file at `path`.
    fn supports(&self, path: &str) -> bool;
}

/// A chunk proposed by a splitter, before it is bound to a node.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub content: String,
    pub chunk_type: ChunkType,
}

/// Splits raw file content into file-level retrieval chunks. Symbol-level
/// chunks come from the extractor; this covers the file node itself.
pub trait ChunkSplitter: Send + Sync {
    fn split(&self, path: &str, content: &str) -> Vec<NewChunk>;
}

/// Default splitter: one header chunk from the top of the file, then
/// fixed-size line windows.
pub struct LineChunkSplitter {
    pub header_lines: usize,
    pub window_lines: usize,
}

impl Default for LineChunkSplitter {
    fn default() -> Self {
        Self {
            header_lines: 10,
            window_lines: 40,
        }
    }
}

impl ChunkSplitter for LineChunkSplitter {
    fn split(&self, path: &str, content: &str) -> Vec<NewChunk> {
        let lines: Vec<&str> = content.lines().collect();
        if lines.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let header: String = lines
            .iter()
            .take(self.header_lines)
            .copied()
            .collect::<Vec<_>>()
            .join("\n");
        chunks.push(NewChunk {
            content: format!("{path}\n{header}"),
            chunk_type: ChunkType::FileHeader,
        });

        for window in lines.chunks(self.window_lines) {
            let body = window.join("\n");
            if body.trim().is_empty() {
                continue;
            }
            chunks.push(NewChunk {
                content: body,
                chunk_type: ChunkType::Basic,
            });
        }

        chunks
    }
}

/// A file discovered during a project walk.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: String,
    pub content: String,
}

/// Walks a project root and reads individual files. Provided by the host
/// so the core stays agnostic of ignore rules and filesystem layout.
#[async_trait]
pub trait FileScanner: Send + Sync {
    async fn scan(&self, root: &Path) -> Result<Vec<ScannedFile>>;

    async fn read_file(&self, path: &Path) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splitter_emits_header_then_windows() {
        let splitter = LineChunkSplitter {
            header_lines: 2,
            window_lines: 3,
        };
        let content = "line1\nline2\nline3\nline4\nline5";
        let chunks = splitter.split("src/a.ts", content);
        assert_eq!(chunks[0].chunk_type, ChunkType::FileHeader);
        assert!(chunks[0].content.contains("src/a.ts"));
        assert!(chunks[0].content.contains("line2"));
        assert!(!chunks[0].content.contains("line3"));
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].chunk_type, ChunkType::Basic);
    }

    #[test]
    fn splitter_skips_empty_files() {
        let splitter = LineChunkSplitter::default();
        assert!(splitter.split("src/empty.ts", "").is_empty());
    }

    #[test]
    fn splitter_drops_blank_windows() {
        let splitter = LineChunkSplitter {
            header_lines: 1,
            window_lines: 2,
        };
        let chunks = splitter.split("a.ts", "code\n\n\n\n");
        assert_eq!(
            chunks
                .iter()
                .filter(|c| c.chunk_type == ChunkType::Basic)
                .count(),
            1
        );
    }
}
