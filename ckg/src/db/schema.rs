use libsql::Connection;

use crate::error::Result;

pub async fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Graph nodes: files and code symbols
        CREATE TABLE IF NOT EXISTS nodes (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            node_type TEXT NOT NULL,
            name TEXT NOT NULL,
            path TEXT NOT NULL,
            language TEXT,
            metadata TEXT DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_nodes_project ON nodes(project_id);
        CREATE INDEX IF NOT EXISTS idx_nodes_project_path ON nodes(project_id, path);
        CREATE INDEX IF NOT EXISTS idx_nodes_project_name ON nodes(project_id, name);
        CREATE INDEX IF NOT EXISTS idx_nodes_project_type ON nodes(project_id, node_type);

        -- Directed relationships between nodes
        CREATE TABLE IF NOT EXISTS edges (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            source_id TEXT NOT NULL,
            target_id TEXT NOT NULL,
            relationship TEXT NOT NULL,
            strength REAL,
            metadata TEXT DEFAULT '{}',
            created_at TEXT NOT NULL,
            FOREIGN KEY (source_id) REFERENCES nodes(id) ON DELETE CASCADE,
            FOREIGN KEY (target_id) REFERENCES nodes(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_edges_project ON edges(project_id);
        CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id);
        CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id);
        CREATE INDEX IF NOT EXISTS idx_edges_project_rel ON edges(project_id, relationship);

        -- Retrievable text units owned by nodes
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            node_id TEXT NOT NULL,
            project_id TEXT NOT NULL,
            content TEXT NOT NULL,
            chunk_type TEXT NOT NULL DEFAULT 'basic',
            language TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (node_id) REFERENCES nodes(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_node ON chunks(node_id);
        CREATE INDEX IF NOT EXISTS idx_chunks_project ON chunks(project_id);

        -- One active embedding per (chunk, model)
        CREATE TABLE IF NOT EXISTS embeddings (
            id TEXT PRIMARY KEY,
            chunk_id TEXT NOT NULL,
            model TEXT NOT NULL,
            provider TEXT NOT NULL,
            dimensions INTEGER NOT NULL,
            embedding F32_BLOB(384),
            created_at TEXT NOT NULL,
            FOREIGN KEY (chunk_id) REFERENCES chunks(id) ON DELETE CASCADE,
            UNIQUE (chunk_id, model)
        );

        CREATE INDEX IF NOT EXISTS idx_embeddings_chunk ON embeddings(chunk_id);

        -- Analyzer findings attached to nodes
        CREATE TABLE IF NOT EXISTS diagnostics (
            id TEXT PRIMARY KEY,
            node_id TEXT NOT NULL,
            severity TEXT NOT NULL,
            message TEXT NOT NULL,
            line INTEGER,
            column INTEGER,
            source TEXT,
            rule TEXT,
            suggestion TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (node_id) REFERENCES nodes(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_diagnostics_node ON diagnostics(node_id);

        -- Reference sites linked to the symbols they reference
        CREATE TABLE IF NOT EXISTS symbol_references (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            reference_node_id TEXT NOT NULL,
            symbol_node_id TEXT NOT NULL,
            reference_type TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (reference_node_id) REFERENCES nodes(id) ON DELETE CASCADE,
            FOREIGN KEY (symbol_node_id) REFERENCES nodes(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_symrefs_project ON symbol_references(project_id);
        CREATE INDEX IF NOT EXISTS idx_symrefs_symbol ON symbol_references(symbol_node_id);
        CREATE INDEX IF NOT EXISTS idx_symrefs_reference ON symbol_references(reference_node_id);

        -- Metadata key-value store
        CREATE TABLE IF NOT EXISTS ckg_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .await?;

    create_vector_indexes(conn).await?;
    migrate_nodes_updated_at(conn).await?;

    Ok(())
}

async fn migrate_nodes_updated_at(conn: &Connection) -> Result<()> {
    // Databases created before updated_at was split from created_at
    let column_exists: bool = conn
        .query(
            "SELECT COUNT(*) FROM pragma_table_info('nodes') WHERE name='updated_at'",
            (),
        )
        .await?
        .next()
        .await?
        .map(|row| row.get::<i64>(0).unwrap_or(0) > 0)
        .unwrap_or(false);

    if !column_exists {
        tracing::info!("Migrating nodes table: adding updated_at column");
        conn.execute("ALTER TABLE nodes ADD COLUMN updated_at TEXT", ())
            .await?;
        tracing::info!("Migration complete: updated_at column added");
    }

    Ok(())
}

async fn create_vector_indexes(conn: &Connection) -> Result<()> {
    let index_exists: bool = conn
        .query(
            "SELECT 1 FROM sqlite_master WHERE type='index' AND name='embeddings_vector_idx'",
            (),
        )
        .await?
        .next()
        .await?
        .is_some();

    if !index_exists {
        if let Err(e) = conn
            .execute(
                "CREATE INDEX IF NOT EXISTS embeddings_vector_idx ON embeddings(libsql_vector_idx(embedding))",
                (),
            )
            .await
        {
            tracing::warn!("Vector index creation failed for embeddings (may already exist): {e}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    #[tokio::test]
    async fn test_schema_initializes_all_tables() {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        let conn = db.connect().unwrap();

        init_schema(&conn).await.unwrap();

        let mut rows = conn
            .query(
                "SELECT name FROM sqlite_master WHERE type='table' ORDER BY name",
                (),
            )
            .await
            .unwrap();

        let mut tables = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            tables.push(row.get::<String>(0).unwrap());
        }

        for expected in [
            "nodes",
            "edges",
            "chunks",
            "embeddings",
            "diagnostics",
            "symbol_references",
            "ckg_meta",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
        }
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        let conn = db.connect().unwrap();

        init_schema(&conn).await.unwrap();
        init_schema(&conn).await.unwrap();
    }

    #[tokio::test]
    async fn test_embeddings_unique_per_chunk_and_model() {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        let conn = db.connect().unwrap();
        init_schema(&conn).await.unwrap();

        conn.execute(
            "INSERT INTO nodes (id, project_id, node_type, name, path, created_at) VALUES ('n1','p1','function','f','a.rs','2026-01-01T00:00:00Z')",
            (),
        )
        .await
        .unwrap();
        conn.execute(
            "INSERT INTO chunks (id, node_id, project_id, content, chunk_type, created_at) VALUES ('c1','n1','p1','x','basic','2026-01-01T00:00:00Z')",
            (),
        )
        .await
        .unwrap();
        conn.execute(
            "INSERT INTO embeddings (id, chunk_id, model, provider, dimensions, created_at) VALUES ('e1','c1','m','local',384,'2026-01-01T00:00:00Z')",
            (),
        )
        .await
        .unwrap();

        let dup = conn
            .execute(
                "INSERT INTO embeddings (id, chunk_id, model, provider, dimensions, created_at) VALUES ('e2','c1','m','local',384,'2026-01-01T00:00:00Z')",
                (),
            )
            .await;
        assert!(dup.is_err(), "duplicate (chunk, model) embedding must be rejected");
    }
}
