use libsql::{params, Connection};

use crate::error::{CkgError, Result};
use crate::models::{ChunkEmbedding, ChunkType, CodeChunk, NodeType, SimilarChunk};

use super::nodes::parse_timestamp;

pub struct EmbeddingRepository;

impl EmbeddingRepository {
    /// One active embedding per (chunk, model): replaces on conflict.
    pub async fn upsert(conn: &Connection, embedding: &ChunkEmbedding) -> Result<()> {
        let vector_json = serde_json::to_string(&embedding.vector)?;

        conn.execute(
            r#"
            INSERT INTO embeddings (
                id, chunk_id, model, provider, dimensions, embedding, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, vector32(?6), ?7)
            ON CONFLICT (chunk_id, model) DO UPDATE SET
                provider = excluded.provider,
                dimensions = excluded.dimensions,
                embedding = excluded.embedding,
                created_at = excluded.created_at
            "#,
            params![
                embedding.id.clone(),
                embedding.chunk_id.clone(),
                embedding.model.clone(),
                embedding.provider.clone(),
                embedding.dimensions as i64,
                vector_json,
                embedding.created_at.to_rfc3339(),
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn delete_by_project(conn: &Connection, project_id: &str) -> Result<u64> {
        let deleted = conn
            .execute(
                "DELETE FROM embeddings WHERE chunk_id IN (
                     SELECT id FROM chunks WHERE project_id = ?1
                 )",
                params![project_id],
            )
            .await?;
        Ok(deleted)
    }

    pub async fn count_by_project(conn: &Connection, project_id: &str) -> Result<u64> {
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM embeddings e
                 JOIN chunks c ON e.chunk_id = c.id
                 WHERE c.project_id = ?1",
                params![project_id],
            )
            .await?;

        let count: i64 = rows
            .next()
            .await?
            .map(|row| row.get(0).unwrap_or(0))
            .unwrap_or(0);
        Ok(count as u64)
    }

    pub async fn chunks_missing(
        conn: &Connection,
        project_id: &str,
        model: &str,
    ) -> Result<Vec<CodeChunk>> {
        let mut rows = conn
            .query(
                "SELECT c.id, c.node_id, c.project_id, c.content, c.chunk_type, c.language, c.created_at
                 FROM chunks c
                 WHERE c.project_id = ?1
                   AND NOT EXISTS (
                       SELECT 1 FROM embeddings e
                       WHERE e.chunk_id = c.id AND e.model = ?2
                   )",
                params![project_id, model],
            )
            .await?;

        let mut chunks = Vec::new();
        while let Some(row) = rows.next().await? {
            let chunk_type: String = row.get(4)?;
            let created_at: String = row.get(6)?;
            chunks.push(CodeChunk {
                id: row.get(0)?,
                node_id: row.get(1)?,
                project_id: row.get(2)?,
                content: row.get(3)?,
                chunk_type: chunk_type
                    .parse::<ChunkType>()
                    .map_err(CkgError::Internal)?,
                language: row.get(5)?,
                created_at: parse_timestamp(&created_at),
            });
        }
        Ok(chunks)
    }

    /// Cosine nearest-neighbor search over stored vectors, filtered to
    /// similarity >= threshold, joined to chunk + owning node.
    pub async fn search_similar(
        conn: &Connection,
        embedding: &[f32],
        limit: u32,
        threshold: f32,
        project_id: Option<&str>,
    ) -> Result<Vec<SimilarChunk>> {
        let embedding_json = serde_json::to_string(embedding)?;

        let query = if project_id.is_some() {
            r#"
            SELECT
                c.id AS chunk_id,
                c.node_id,
                c.content,
                c.chunk_type,
                n.name AS node_name,
                n.path AS node_path,
                n.node_type,
                1 - vector_distance_cos(e.embedding, vector32(?1)) AS score
            FROM embeddings e
            JOIN chunks c ON e.chunk_id = c.id
            JOIN nodes n ON c.node_id = n.id
            WHERE e.embedding IS NOT NULL
              AND (1 - vector_distance_cos(e.embedding, vector32(?1))) >= ?2
              AND c.project_id = ?4
            ORDER BY score DESC
            LIMIT ?3
            "#
        } else {
            r#"
            SELECT
                c.id AS chunk_id,
                c.node_id,
                c.content,
                c.chunk_type,
                n.name AS node_name,
                n.path AS node_path,
                n.node_type,
                1 - vector_distance_cos(e.embedding, vector32(?1)) AS score
            FROM embeddings e
            JOIN chunks c ON e.chunk_id = c.id
            JOIN nodes n ON c.node_id = n.id
            WHERE e.embedding IS NOT NULL
              AND (1 - vector_distance_cos(e.embedding, vector32(?1))) >= ?2
            ORDER BY score DESC
            LIMIT ?3
            "#
        };

        let mut values: Vec<libsql::Value> = vec![
            libsql::Value::from(embedding_json),
            libsql::Value::from(threshold as f64),
            libsql::Value::from(limit),
        ];
        if let Some(project) = project_id {
            values.push(libsql::Value::from(project.to_string()));
        }

        let mut rows = conn.query(query, libsql::params_from_iter(values)).await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            let chunk_type: String = row.get(3)?;
            let node_type: String = row.get(6)?;
            let score = row.get::<f64>(7)? as f32;

            results.push(SimilarChunk {
                chunk_id: row.get(0)?,
                node_id: row.get(1)?,
                content: row.get(2)?,
                chunk_type: chunk_type
                    .parse::<ChunkType>()
                    .map_err(CkgError::Internal)?,
                node_name: row.get(4)?,
                node_path: row.get(5)?,
                node_type: node_type
                    .parse::<NodeType>()
                    .map_err(CkgError::Internal)?,
                score,
            });
        }

        Ok(results)
    }
}
