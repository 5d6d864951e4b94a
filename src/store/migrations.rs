use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

pub const SCHEMA_VERSION: i64 = 2;

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        BEGIN;
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS nodes (
            id INTEGER PRIMARY KEY,
            analysis_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            name TEXT NOT NULL,
            file TEXT,
            line_start INTEGER,
            line_end INTEGER,
            metadata TEXT NOT NULL DEFAULT '{}'
        );

        CREATE INDEX IF NOT EXISTS idx_nodes_analysis ON nodes(analysis_id);
        CREATE INDEX IF NOT EXISTS idx_nodes_name ON nodes(analysis_id, name);
        CREATE INDEX IF NOT EXISTS idx_nodes_file ON nodes(analysis_id, file);

        CREATE TABLE IF NOT EXISTS edges (
            id INTEGER PRIMARY KEY,
            analysis_id TEXT NOT NULL,
            source_id INTEGER NOT NULL,
            target_id INTEGER NOT NULL,
            kind TEXT NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}',
            FOREIGN KEY(source_id) REFERENCES nodes(id) ON DELETE CASCADE,
            FOREIGN KEY(target_id) REFERENCES nodes(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_edges_analysis ON edges(analysis_id);
        CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id);
        CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id);

        CREATE TABLE IF NOT EXISTS findings (
            id INTEGER PRIMARY KEY,
            analysis_id TEXT NOT NULL,
            severity TEXT NOT NULL,
            title TEXT NOT NULL,
            file TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_findings_analysis ON findings(analysis_id);
        CREATE INDEX IF NOT EXISTS idx_findings_file ON findings(analysis_id, file);
        COMMIT;
        ",
    )?;

    let current: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    let current: i64 = current.and_then(|v| v.parse().ok()).unwrap_or(0);
    if current < SCHEMA_VERSION {
        conn.execute(
            "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![SCHEMA_VERSION.to_string()],
        )?;
    }
    Ok(())
}
