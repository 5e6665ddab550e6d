use libsql::{params, Connection, Row};

use super::nodes::parse_timestamp;
use crate::error::{CkgError, Result};
use crate::models::{ChunkType, CodeChunk, NodeType, SimilarChunk};

fn chunk_from_row(row: &Row) -> Result<CodeChunk> {
    let chunk_type: String = row.get(4)?;
    let created_at: String = row.get(6)?;

    Ok(CodeChunk {
        id: row.get(0)?,
        node_id: row.get(1)?,
        project_id: row.get(2)?,
        content: row.get(3)?,
        chunk_type: chunk_type
            .parse::<ChunkType>()
            .map_err(CkgError::Internal)?,
        language: row.get(5)?,
        created_at: parse_timestamp(&created_at),
    })
}

const CHUNK_COLUMNS: &str = "id, node_id, project_id, content, chunk_type, language, created_at";

pub struct ChunkRepository;

impl ChunkRepository {
    pub async fn create_batch(conn: &Connection, chunks: &[CodeChunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let tx = conn.transaction().await?;
        for chunk in chunks {
            tx.execute(
                r#"
                INSERT INTO chunks (
                    id, node_id, project_id, content, chunk_type, language, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    chunk.id.clone(),
                    chunk.node_id.clone(),
                    chunk.project_id.clone(),
                    chunk.content.clone(),
                    chunk.chunk_type.to_string(),
                    chunk.language.clone(),
                    chunk.created_at.to_rfc3339(),
                ],
            )
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    pub async fn get_by_project(conn: &Connection, project_id: &str) -> Result<Vec<CodeChunk>> {
        let mut rows = conn
            .query(
                &format!("SELECT {CHUNK_COLUMNS} FROM chunks WHERE project_id = ?1"),
                params![project_id],
            )
            .await?;

        let mut chunks = Vec::new();
        while let Some(row) = rows.next().await? {
            chunks.push(chunk_from_row(&row)?);
        }
        Ok(chunks)
    }

    pub async fn get_by_node(conn: &Connection, node_id: &str) -> Result<Vec<CodeChunk>> {
        let mut rows = conn
            .query(
                &format!("SELECT {CHUNK_COLUMNS} FROM chunks WHERE node_id = ?1"),
                params![node_id],
            )
            .await?;

        let mut chunks = Vec::new();
        while let Some(row) = rows.next().await? {
            chunks.push(chunk_from_row(&row)?);
        }
        Ok(chunks)
    }

    pub async fn delete_by_node(conn: &Connection, node_id: &str) -> Result<u64> {
        let tx = conn.transaction().await?;
        tx.execute(
            "DELETE FROM embeddings WHERE chunk_id IN (SELECT id FROM chunks WHERE node_id = ?1)",
            params![node_id],
        )
        .await?;
        let deleted = tx
            .execute("DELETE FROM chunks WHERE node_id = ?1", params![node_id])
            .await?;
        tx.commit().await?;
        Ok(deleted)
    }

    /// LIKE match of any term against chunk content, joined to the owning
    /// node. Scores are left at 0; lexical ranking is computed by the
    /// caller over the returned content.
    pub async fn find_matching(
        conn: &Connection,
        terms: &[String],
        project_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<SimilarChunk>> {
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        // Fixed params first, term patterns appended after them.
        let fixed = if project_id.is_some() { 2 } else { 1 };
        let term_clauses: Vec<String> = (0..terms.len())
            .map(|i| format!("c.content LIKE ?{}", fixed + i + 1))
            .collect();
        let term_filter = term_clauses.join(" OR ");

        let query = if project_id.is_some() {
            format!(
                "SELECT c.id, c.node_id, c.content, c.chunk_type,
                        n.name, n.path, n.node_type
                 FROM chunks c
                 JOIN nodes n ON c.node_id = n.id
                 WHERE c.project_id = ?2 AND ({term_filter})
                 LIMIT ?1"
            )
        } else {
            format!(
                "SELECT c.id, c.node_id, c.content, c.chunk_type,
                        n.name, n.path, n.node_type
                 FROM chunks c
                 JOIN nodes n ON c.node_id = n.id
                 WHERE {term_filter}
                 LIMIT ?1"
            )
        };

        let mut values: Vec<libsql::Value> = vec![libsql::Value::from(limit)];
        if let Some(project) = project_id {
            values.push(libsql::Value::from(project.to_string()));
        }
        for term in terms {
            values.push(libsql::Value::from(format!("%{term}%")));
        }

        let mut rows = conn.query(&query, libsql::params_from_iter(values)).await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            let chunk_type: String = row.get(3)?;
            let node_type: String = row.get(6)?;
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
                score: 0.0,
            });
        }

        Ok(results)
    }
}
