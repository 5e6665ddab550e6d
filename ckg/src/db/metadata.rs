use chrono::Utc;
use libsql::{params, Connection};

use crate::error::Result;

/// Key-value metadata (schema version, active embedding dimensions).
pub struct MetadataRepository;

impl MetadataRepository {
    pub async fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
        let mut rows = conn
            .query("SELECT value FROM ckg_meta WHERE key = ?1", params![key])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    pub async fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO ckg_meta (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![key, value, Utc::now().to_rfc3339()],
        )
        .await?;

        Ok(())
    }
}
