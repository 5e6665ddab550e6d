use libsql::{params, Connection, Row};

use super::nodes::parse_timestamp;
use crate::error::{CkgError, Result};
use crate::models::{ReferenceType, SymbolReference};

fn reference_from_row(row: &Row) -> Result<SymbolReference> {
    let reference_type: String = row.get(4)?;
    let created_at: String = row.get(5)?;

    Ok(SymbolReference {
        id: row.get(0)?,
        project_id: row.get(1)?,
        reference_node_id: row.get(2)?,
        symbol_node_id: row.get(3)?,
        reference_type: reference_type
            .parse::<ReferenceType>()
            .map_err(CkgError::Internal)?,
        created_at: parse_timestamp(&created_at),
    })
}

const REF_COLUMNS: &str =
    "id, project_id, reference_node_id, symbol_node_id, reference_type, created_at";

pub struct ReferenceRepository;

impl ReferenceRepository {
    pub async fn create_batch(conn: &Connection, references: &[SymbolReference]) -> Result<()> {
        if references.is_empty() {
            return Ok(());
        }

        let tx = conn.transaction().await?;
        for reference in references {
            tx.execute(
                r#"
                INSERT INTO symbol_references (
                    id, project_id, reference_node_id, symbol_node_id, reference_type, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    reference.id.clone(),
                    reference.project_id.clone(),
                    reference.reference_node_id.clone(),
                    reference.symbol_node_id.clone(),
                    reference.reference_type.to_string(),
                    reference.created_at.to_rfc3339(),
                ],
            )
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    pub async fn get_to_symbol(
        conn: &Connection,
        symbol_node_id: &str,
    ) -> Result<Vec<SymbolReference>> {
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {REF_COLUMNS} FROM symbol_references WHERE symbol_node_id = ?1"
                ),
                params![symbol_node_id],
            )
            .await?;

        let mut references = Vec::new();
        while let Some(row) = rows.next().await? {
            references.push(reference_from_row(&row)?);
        }
        Ok(references)
    }

    pub async fn count(
        conn: &Connection,
        symbol_node_id: &str,
        reference_types: Option<&[ReferenceType]>,
    ) -> Result<u64> {
        let mut rows = match reference_types {
            Some(types) if !types.is_empty() => {
                let placeholders: Vec<String> =
                    (0..types.len()).map(|i| format!("?{}", i + 2)).collect();
                let query = format!(
                    "SELECT COUNT(*) FROM symbol_references
                     WHERE symbol_node_id = ?1 AND reference_type IN ({})",
                    placeholders.join(", ")
                );
                let mut values: Vec<libsql::Value> =
                    vec![libsql::Value::from(symbol_node_id.to_string())];
                values.extend(types.iter().map(|t| libsql::Value::from(t.to_string())));
                conn.query(&query, libsql::params_from_iter(values)).await?
            }
            _ => {
                conn.query(
                    "SELECT COUNT(*) FROM symbol_references WHERE symbol_node_id = ?1",
                    params![symbol_node_id],
                )
                .await?
            }
        };

        let count: i64 = rows
            .next()
            .await?
            .map(|row| row.get(0).unwrap_or(0))
            .unwrap_or(0);
        Ok(count as u64)
    }

    pub async fn referencing_files(
        conn: &Connection,
        symbol_node_id: &str,
    ) -> Result<Vec<String>> {
        let mut rows = conn
            .query(
                "SELECT DISTINCT n.path
                 FROM symbol_references r
                 JOIN nodes n ON r.reference_node_id = n.id
                 WHERE r.symbol_node_id = ?1",
                params![symbol_node_id],
            )
            .await?;

        let mut paths = Vec::new();
        while let Some(row) = rows.next().await? {
            paths.push(row.get(0)?);
        }
        Ok(paths)
    }

    pub async fn get_from_file(
        conn: &Connection,
        project_id: &str,
        path: &str,
    ) -> Result<Vec<SymbolReference>> {
        let mut rows = conn
            .query(
                &format!(
                    "SELECT r.id, r.project_id, r.reference_node_id, r.symbol_node_id,
                            r.reference_type, r.created_at
                     FROM symbol_references r
                     JOIN nodes n ON r.reference_node_id = n.id
                     WHERE r.project_id = ?1 AND n.path = ?2"
                ),
                params![project_id, path],
            )
            .await?;

        let mut references = Vec::new();
        while let Some(row) = rows.next().await? {
            references.push(reference_from_row(&row)?);
        }
        Ok(references)
    }
}
