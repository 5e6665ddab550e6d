use libsql::{params, Connection, Row};

use super::nodes::parse_timestamp;
use crate::error::{CkgError, Result};
use crate::models::{Diagnostic, Severity};

fn diagnostic_from_row(row: &Row) -> Result<Diagnostic> {
    let severity: String = row.get(2)?;
    let created_at: String = row.get(9)?;

    Ok(Diagnostic {
        id: row.get(0)?,
        node_id: row.get(1)?,
        severity: severity.parse::<Severity>().map_err(CkgError::Internal)?,
        message: row.get(3)?,
        line: row.get::<Option<i64>>(4)?.map(|v| v as u32),
        column: row.get::<Option<i64>>(5)?.map(|v| v as u32),
        source: row.get(6)?,
        rule: row.get(7)?,
        suggestion: row.get(8)?,
        created_at: parse_timestamp(&created_at),
    })
}

pub struct DiagnosticRepository;

impl DiagnosticRepository {
    pub async fn create_batch(conn: &Connection, diagnostics: &[Diagnostic]) -> Result<()> {
        if diagnostics.is_empty() {
            return Ok(());
        }

        let tx = conn.transaction().await?;
        for diagnostic in diagnostics {
            tx.execute(
                r#"
                INSERT INTO diagnostics (
                    id, node_id, severity, message, line, column, source, rule, suggestion, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    diagnostic.id.clone(),
                    diagnostic.node_id.clone(),
                    diagnostic.severity.to_string(),
                    diagnostic.message.clone(),
                    diagnostic.line.map(|v| v as i64),
                    diagnostic.column.map(|v| v as i64),
                    diagnostic.source.clone(),
                    diagnostic.rule.clone(),
                    diagnostic.suggestion.clone(),
                    diagnostic.created_at.to_rfc3339(),
                ],
            )
            .await?;
        }
        tx.commit().await?;

        Ok(())
    }

    pub async fn get_by_node(conn: &Connection, node_id: &str) -> Result<Vec<Diagnostic>> {
        let mut rows = conn
            .query(
                "SELECT id, node_id, severity, message, line, column, source, rule, suggestion, created_at
                 FROM diagnostics WHERE node_id = ?1",
                params![node_id],
            )
            .await?;

        let mut diagnostics = Vec::new();
        while let Some(row) = rows.next().await? {
            diagnostics.push(diagnostic_from_row(&row)?);
        }
        Ok(diagnostics)
    }

    pub async fn nodes_with_diagnostics(
        conn: &Connection,
        project_id: &str,
    ) -> Result<Vec<String>> {
        let mut rows = conn
            .query(
                "SELECT DISTINCT d.node_id
                 FROM diagnostics d
                 JOIN nodes n ON d.node_id = n.id
                 WHERE n.project_id = ?1",
                params![project_id],
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }
}
