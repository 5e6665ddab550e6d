use libsql::{params, Connection, Row};

use super::nodes::{node_from_row, parse_timestamp};
use crate::error::{CkgError, Result};
use crate::models::{ConnectedNode, Direction, GraphEdge, Relationship};
use crate::db::traits::Neighbor;

fn edge_from_row(row: &Row) -> Result<GraphEdge> {
    let relationship: String = row.get(4)?;
    let metadata: String = row.get(6)?;
    let created_at: String = row.get(7)?;

    Ok(GraphEdge {
        id: row.get(0)?,
        project_id: row.get(1)?,
        source_id: row.get(2)?,
        target_id: row.get(3)?,
        relationship: relationship
            .parse::<Relationship>()
            .map_err(CkgError::Internal)?,
        strength: row.get::<Option<f64>>(5)?.map(|s| s as f32),
        metadata: serde_json::from_str(&metadata).unwrap_or_default(),
        created_at: parse_timestamp(&created_at),
    })
}

const EDGE_COLUMNS: &str =
    "id, project_id, source_id, target_id, relationship, strength, metadata, created_at";

pub struct EdgeRepository;

impl EdgeRepository {
    /// All-or-nothing, with endpoint validation inside the transaction so
    /// no dangling edge can be committed.
    pub async fn upsert_batch(conn: &Connection, edges: &[GraphEdge]) -> Result<()> {
        if edges.is_empty() {
            return Ok(());
        }

        let tx = conn.transaction().await?;
        for edge in edges {
            let mut endpoints = tx
                .query(
                    "SELECT COUNT(*) FROM nodes WHERE id IN (?1, ?2)",
                    params![edge.source_id.clone(), edge.target_id.clone()],
                )
                .await?;
            let found: i64 = endpoints
                .next()
                .await?
                .map(|row| row.get(0).unwrap_or(0))
                .unwrap_or(0);
            if found < 2 {
                return Err(CkgError::Validation(format!(
                    "Edge {} -> {} references a missing node",
                    edge.source_id, edge.target_id
                )));
            }

            tx.execute(
                r#"
                INSERT OR REPLACE INTO edges (
                    id, project_id, source_id, target_id, relationship, strength, metadata, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    edge.id.clone(),
                    edge.project_id.clone(),
                    edge.source_id.clone(),
                    edge.target_id.clone(),
                    edge.relationship.to_string(),
                    edge.strength.map(|s| s as f64),
                    serde_json::to_string(&edge.metadata)?,
                    edge.created_at.to_rfc3339(),
                ],
            )
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    pub async fn get_neighbors(
        conn: &Connection,
        node_id: &str,
        relationship: Option<Relationship>,
        direction: Direction,
    ) -> Result<Vec<Neighbor>> {
        let direction_clause = match direction {
            Direction::Outgoing => "e.source_id = ?1",
            Direction::Incoming => "e.target_id = ?1",
            Direction::Both => "(e.source_id = ?1 OR e.target_id = ?1)",
        };
        // The joined node is the far endpoint, whichever side it is on.
        let joined_node = match direction {
            Direction::Outgoing => "n.id = e.target_id",
            Direction::Incoming => "n.id = e.source_id",
            Direction::Both => {
                "n.id = CASE WHEN e.source_id = ?1 THEN e.target_id ELSE e.source_id END"
            }
        };

        let (query, has_rel) = match relationship {
            Some(_) => (
                format!(
                    "SELECT e.id, e.project_id, e.source_id, e.target_id, e.relationship,
                            e.strength, e.metadata, e.created_at,
                            n.id, n.project_id, n.node_type, n.name, n.path, n.language,
                            n.metadata, n.created_at, n.updated_at
                     FROM edges e JOIN nodes n ON {joined_node}
                     WHERE {direction_clause} AND e.relationship = ?2"
                ),
                true,
            ),
            None => (
                format!(
                    "SELECT e.id, e.project_id, e.source_id, e.target_id, e.relationship,
                            e.strength, e.metadata, e.created_at,
                            n.id, n.project_id, n.node_type, n.name, n.path, n.language,
                            n.metadata, n.created_at, n.updated_at
                     FROM edges e JOIN nodes n ON {joined_node}
                     WHERE {direction_clause}"
                ),
                false,
            ),
        };

        let mut rows = if has_rel {
            conn.query(
                &query,
                params![node_id, relationship.unwrap().to_string()],
            )
            .await?
        } else {
            conn.query(&query, params![node_id]).await?
        };

        let mut neighbors = Vec::new();
        while let Some(row) = rows.next().await? {
            let relationship: String = row.get(4)?;
            let edge_metadata: String = row.get(6)?;
            let edge_created: String = row.get(7)?;

            let edge = GraphEdge {
                id: row.get(0)?,
                project_id: row.get(1)?,
                source_id: row.get(2)?,
                target_id: row.get(3)?,
                relationship: relationship
                    .parse::<Relationship>()
                    .map_err(CkgError::Internal)?,
                strength: row.get::<Option<f64>>(5)?.map(|s| s as f32),
                metadata: serde_json::from_str(&edge_metadata).unwrap_or_default(),
                created_at: parse_timestamp(&edge_created),
            };

            let node_type: String = row.get(10)?;
            let node_metadata: String = row.get(14)?;
            let node_created: String = row.get(15)?;
            let node_updated: Option<String> = row.get(16)?;

            let node = crate::models::GraphNode {
                id: row.get(8)?,
                project_id: row.get(9)?,
                node_type: node_type
                    .parse()
                    .map_err(CkgError::Internal)?,
                name: row.get(11)?,
                path: row.get(12)?,
                language: row.get(13)?,
                metadata: serde_json::from_str(&node_metadata).unwrap_or_default(),
                created_at: parse_timestamp(&node_created),
                updated_at: node_updated.as_deref().map(parse_timestamp),
            };

            neighbors.push(Neighbor { edge, node });
        }

        Ok(neighbors)
    }

    pub async fn get_by_project(
        conn: &Connection,
        project_id: &str,
        relationship: Option<Relationship>,
    ) -> Result<Vec<GraphEdge>> {
        let mut rows = match relationship {
            Some(rel) => {
                conn.query(
                    &format!(
                        "SELECT {EDGE_COLUMNS} FROM edges
                         WHERE project_id = ?1 AND relationship = ?2"
                    ),
                    params![project_id, rel.to_string()],
                )
                .await?
            }
            None => {
                conn.query(
                    &format!("SELECT {EDGE_COLUMNS} FROM edges WHERE project_id = ?1"),
                    params![project_id],
                )
                .await?
            }
        };

        let mut edges = Vec::new();
        while let Some(row) = rows.next().await? {
            edges.push(edge_from_row(&row)?);
        }
        Ok(edges)
    }

    pub async fn most_connected(
        conn: &Connection,
        project_id: &str,
        limit: u32,
    ) -> Result<Vec<ConnectedNode>> {
        let mut rows = conn
            .query(
                "SELECT n.id, n.project_id, n.node_type, n.name, n.path, n.language,
                        n.metadata, n.created_at, n.updated_at,
                        (SELECT COUNT(*) FROM edges WHERE target_id = n.id) AS in_degree,
                        (SELECT COUNT(*) FROM edges WHERE source_id = n.id) AS out_degree
                 FROM nodes n
                 WHERE n.project_id = ?1
                 ORDER BY in_degree + out_degree DESC, n.name
                 LIMIT ?2",
                params![project_id, limit],
            )
            .await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            let node = node_from_row(&row)?;
            let in_degree: i64 = row.get(9)?;
            let out_degree: i64 = row.get(10)?;
            results.push(ConnectedNode {
                node,
                in_degree: in_degree as usize,
                out_degree: out_degree as usize,
            });
        }

        Ok(results)
    }
}
