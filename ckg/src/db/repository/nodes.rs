use chrono::{DateTime, Utc};
use libsql::{params, Connection, Row};

use crate::error::Result;
use crate::models::{GraphNode, NodeType};

pub(crate) fn node_from_row(row: &Row) -> Result<GraphNode> {
    let node_type: String = row.get(2)?;
    let metadata: String = row.get(6)?;
    let created_at: String = row.get(7)?;
    let updated_at: Option<String> = row.get(8)?;

    Ok(GraphNode {
        id: row.get(0)?,
        project_id: row.get(1)?,
        node_type: node_type
            .parse::<NodeType>()
            .map_err(crate::error::CkgError::Internal)?,
        name: row.get(3)?,
        path: row.get(4)?,
        language: row.get(5)?,
        metadata: serde_json::from_str(&metadata).unwrap_or_default(),
        created_at: parse_timestamp(&created_at),
        updated_at: updated_at.as_deref().map(parse_timestamp),
    })
}

pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

const NODE_COLUMNS: &str =
    "id, project_id, node_type, name, path, language, metadata, created_at, updated_at";

pub struct NodeRepository;

impl NodeRepository {
    /// All-or-nothing: the batch lands inside one transaction so readers
    /// never observe a half-written subgraph.
    pub async fn upsert_batch(conn: &Connection, nodes: &[GraphNode]) -> Result<()> {
        if nodes.is_empty() {
            return Ok(());
        }

        let tx = conn.transaction().await?;
        for node in nodes {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO nodes (
                    id, project_id, node_type, name, path, language, metadata, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    node.id.clone(),
                    node.project_id.clone(),
                    node.node_type.to_string(),
                    node.name.clone(),
                    node.path.clone(),
                    node.language.clone(),
                    serde_json::to_string(&node.metadata)?,
                    node.created_at.to_rfc3339(),
                    node.updated_at.map(|dt| dt.to_rfc3339()),
                ],
            )
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    pub async fn get_by_id(conn: &Connection, id: &str) -> Result<Option<GraphNode>> {
        let mut rows = conn
            .query(
                &format!("SELECT {NODE_COLUMNS} FROM nodes WHERE id = ?1"),
                params![id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(node_from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_by_ids(conn: &Connection, ids: &[String]) -> Result<Vec<GraphNode>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
        let query = format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE id IN ({})",
            placeholders.join(", ")
        );
        let values: Vec<libsql::Value> = ids.iter().map(|id| libsql::Value::from(id.clone())).collect();

        let mut rows = conn.query(&query, libsql::params_from_iter(values)).await?;
        let mut nodes = Vec::new();
        while let Some(row) = rows.next().await? {
            nodes.push(node_from_row(&row)?);
        }
        Ok(nodes)
    }

    pub async fn find(
        conn: &Connection,
        name: &str,
        node_type: Option<NodeType>,
        project_id: &str,
    ) -> Result<Vec<GraphNode>> {
        let mut rows = match node_type {
            Some(ty) => {
                conn.query(
                    &format!(
                        "SELECT {NODE_COLUMNS} FROM nodes
                         WHERE project_id = ?1 AND name = ?2 AND node_type = ?3
                         ORDER BY created_at"
                    ),
                    params![project_id, name, ty.to_string()],
                )
                .await?
            }
            None => {
                conn.query(
                    &format!(
                        "SELECT {NODE_COLUMNS} FROM nodes
                         WHERE project_id = ?1 AND name = ?2
                         ORDER BY created_at"
                    ),
                    params![project_id, name],
                )
                .await?
            }
        };

        let mut nodes = Vec::new();
        while let Some(row) = rows.next().await? {
            nodes.push(node_from_row(&row)?);
        }
        Ok(nodes)
    }

    pub async fn find_by_type(
        conn: &Connection,
        node_type: Option<NodeType>,
        project_id: &str,
        limit: u32,
    ) -> Result<Vec<GraphNode>> {
        let mut rows = match node_type {
            Some(ty) => {
                conn.query(
                    &format!(
                        "SELECT {NODE_COLUMNS} FROM nodes
                         WHERE project_id = ?1 AND node_type = ?2
                         ORDER BY name LIMIT ?3"
                    ),
                    params![project_id, ty.to_string(), limit],
                )
                .await?
            }
            None => {
                conn.query(
                    &format!(
                        "SELECT {NODE_COLUMNS} FROM nodes
                         WHERE project_id = ?1
                         ORDER BY name LIMIT ?2"
                    ),
                    params![project_id, limit],
                )
                .await?
            }
        };

        let mut nodes = Vec::new();
        while let Some(row) = rows.next().await? {
            nodes.push(node_from_row(&row)?);
        }
        Ok(nodes)
    }

    pub async fn find_by_path(
        conn: &Connection,
        project_id: &str,
        path: &str,
    ) -> Result<Vec<GraphNode>> {
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {NODE_COLUMNS} FROM nodes
                     WHERE project_id = ?1 AND path = ?2
                     ORDER BY created_at"
                ),
                params![project_id, path],
            )
            .await?;

        let mut nodes = Vec::new();
        while let Some(row) = rows.next().await? {
            nodes.push(node_from_row(&row)?);
        }
        Ok(nodes)
    }

    pub async fn find_by_name_like(
        conn: &Connection,
        project_id: &str,
        pattern: &str,
        limit: u32,
    ) -> Result<Vec<GraphNode>> {
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {NODE_COLUMNS} FROM nodes
                     WHERE project_id = ?1 AND name LIKE ?2
                     ORDER BY name LIMIT ?3"
                ),
                params![project_id, pattern, limit],
            )
            .await?;

        let mut nodes = Vec::new();
        while let Some(row) = rows.next().await? {
            nodes.push(node_from_row(&row)?);
        }
        Ok(nodes)
    }

    /// Cascade delete: embeddings, chunks, diagnostics, references and
    /// edges go before the node row so no orphans remain.
    pub async fn delete(conn: &Connection, id: &str) -> Result<bool> {
        let tx = conn.transaction().await?;

        tx.execute(
            "DELETE FROM embeddings WHERE chunk_id IN (SELECT id FROM chunks WHERE node_id = ?1)",
            params![id],
        )
        .await?;
        tx.execute("DELETE FROM chunks WHERE node_id = ?1", params![id])
            .await?;
        tx.execute("DELETE FROM diagnostics WHERE node_id = ?1", params![id])
            .await?;
        tx.execute(
            "DELETE FROM symbol_references WHERE reference_node_id = ?1 OR symbol_node_id = ?1",
            params![id],
        )
        .await?;
        tx.execute(
            "DELETE FROM edges WHERE source_id = ?1 OR target_id = ?1",
            params![id],
        )
        .await?;
        let deleted = tx
            .execute("DELETE FROM nodes WHERE id = ?1", params![id])
            .await?;

        tx.commit().await?;
        Ok(deleted > 0)
    }

    pub async fn delete_by_path(conn: &Connection, project_id: &str, path: &str) -> Result<u64> {
        let tx = conn.transaction().await?;

        tx.execute(
            "DELETE FROM embeddings WHERE chunk_id IN (
                 SELECT c.id FROM chunks c
                 JOIN nodes n ON c.node_id = n.id
                 WHERE n.project_id = ?1 AND n.path = ?2
             )",
            params![project_id, path],
        )
        .await?;
        tx.execute(
            "DELETE FROM chunks WHERE node_id IN (
                 SELECT id FROM nodes WHERE project_id = ?1 AND path = ?2
             )",
            params![project_id, path],
        )
        .await?;
        tx.execute(
            "DELETE FROM diagnostics WHERE node_id IN (
                 SELECT id FROM nodes WHERE project_id = ?1 AND path = ?2
             )",
            params![project_id, path],
        )
        .await?;
        tx.execute(
            "DELETE FROM symbol_references WHERE
                 reference_node_id IN (SELECT id FROM nodes WHERE project_id = ?1 AND path = ?2)
                 OR symbol_node_id IN (SELECT id FROM nodes WHERE project_id = ?1 AND path = ?2)",
            params![project_id, path],
        )
        .await?;
        tx.execute(
            "DELETE FROM edges WHERE
                 source_id IN (SELECT id FROM nodes WHERE project_id = ?1 AND path = ?2)
                 OR target_id IN (SELECT id FROM nodes WHERE project_id = ?1 AND path = ?2)",
            params![project_id, path],
        )
        .await?;
        let deleted = tx
            .execute(
                "DELETE FROM nodes WHERE project_id = ?1 AND path = ?2",
                params![project_id, path],
            )
            .await?;

        tx.commit().await?;
        Ok(deleted)
    }

    pub async fn clear_project(conn: &Connection, project_id: &str) -> Result<u64> {
        let tx = conn.transaction().await?;

        tx.execute(
            "DELETE FROM embeddings WHERE chunk_id IN (
                 SELECT id FROM chunks WHERE project_id = ?1
             )",
            params![project_id],
        )
        .await?;
        tx.execute("DELETE FROM chunks WHERE project_id = ?1", params![project_id])
            .await?;
        tx.execute(
            "DELETE FROM diagnostics WHERE node_id IN (
                 SELECT id FROM nodes WHERE project_id = ?1
             )",
            params![project_id],
        )
        .await?;
        tx.execute(
            "DELETE FROM symbol_references WHERE project_id = ?1",
            params![project_id],
        )
        .await?;
        tx.execute("DELETE FROM edges WHERE project_id = ?1", params![project_id])
            .await?;
        let deleted = tx
            .execute("DELETE FROM nodes WHERE project_id = ?1", params![project_id])
            .await?;

        tx.commit().await?;
        Ok(deleted)
    }
}
