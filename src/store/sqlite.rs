use crate::config::Config;
use crate::model::{EdgeKind, Finding, GraphEdge, GraphNode, NodeKind, Severity};
use crate::store::{EdgeInput, FindingStore, GraphStore, NodeInput, migrations};
use anyhow::{Context, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, Row, params};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug)]
struct ConnectionCustomizer;

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.busy_timeout(Duration::from_secs(30))?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;
        Ok(())
    }

    fn on_release(&self, _conn: Connection) {}
}

/// SQLite-backed graph store. One mutex-guarded write connection plus a
/// pooled set of readers, all in WAL mode.
pub struct SqliteStore {
    write_conn: Arc<Mutex<Connection>>,
    read_pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create db directory {}", parent.display()))?;
        }

        let write_conn = Connection::open(db_path)
            .with_context(|| format!("open sqlite db at {}", db_path.display()))?;
        write_conn.busy_timeout(Duration::from_secs(30))?;
        write_conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            ",
        )?;
        migrations::migrate(&write_conn)?;

        let manager = SqliteConnectionManager::file(db_path);
        let read_pool = Pool::builder()
            .max_size(Config::get().pool_size)
            .connection_timeout(Duration::from_secs(30))
            .connection_customizer(Box::new(ConnectionCustomizer))
            .build(manager)
            .with_context(|| "create read pool")?;

        Ok(Self {
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.write_conn.lock().unwrap()
    }

    fn read_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.read_pool
            .get()
            .with_context(|| "get read connection from pool")
    }
}

fn metadata_from_row(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::Null)
}

fn node_from_row(row: &Row<'_>) -> rusqlite::Result<GraphNode> {
    let kind: String = row.get(2)?;
    let metadata: String = row.get(7)?;
    Ok(GraphNode {
        id: row.get(0)?,
        analysis_id: row.get(1)?,
        kind: kind.parse::<NodeKind>().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown node kind: {kind}").into(),
            )
        })?,
        name: row.get(3)?,
        file: row.get(4)?,
        line_start: row.get(5)?,
        line_end: row.get(6)?,
        metadata: metadata_from_row(metadata),
    })
}

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<GraphEdge> {
    let kind: String = row.get(4)?;
    let metadata: String = row.get(5)?;
    Ok(GraphEdge {
        id: row.get(0)?,
        analysis_id: row.get(1)?,
        source_id: row.get(2)?,
        target_id: row.get(3)?,
        kind: kind.parse::<EdgeKind>().map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("unknown edge kind: {kind}").into(),
            )
        })?,
        metadata: metadata_from_row(metadata),
    })
}

impl GraphStore for SqliteStore {
    fn delete_analysis(&self, analysis_id: &str) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM edges WHERE analysis_id = ?1",
            params![analysis_id],
        )?;
        tx.execute(
            "DELETE FROM nodes WHERE analysis_id = ?1",
            params![analysis_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn insert_nodes(&self, analysis_id: &str, nodes: &[NodeInput]) -> Result<Vec<i64>> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(nodes.len());
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO nodes (analysis_id, kind, name, file, line_start, line_end, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for node in nodes {
                stmt.execute(params![
                    analysis_id,
                    node.kind.as_str(),
                    node.name,
                    node.file,
                    node.line_start,
                    node.line_end,
                    node.metadata.to_string(),
                ])?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }

    fn insert_edges(&self, analysis_id: &str, edges: &[EdgeInput]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO edges (analysis_id, source_id, target_id, kind, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for edge in edges {
                stmt.execute(params![
                    analysis_id,
                    edge.source_id,
                    edge.target_id,
                    edge.kind.as_str(),
                    edge.metadata.to_string(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(edges.len())
    }

    fn load_nodes(&self, analysis_id: &str) -> Result<Vec<GraphNode>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, analysis_id, kind, name, file, line_start, line_end, metadata
             FROM nodes WHERE analysis_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![analysis_id], node_from_row)?;
        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(row?);
        }
        Ok(nodes)
    }

    fn load_edges(&self, analysis_id: &str) -> Result<Vec<GraphEdge>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, analysis_id, source_id, target_id, kind, metadata
             FROM edges WHERE analysis_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![analysis_id], edge_from_row)?;
        let mut edges = Vec::new();
        for row in rows {
            edges.push(row?);
        }
        Ok(edges)
    }
}

impl FindingStore for SqliteStore {
    fn insert_findings(&self, analysis_id: &str, findings: &[Finding]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO findings (analysis_id, severity, title, file)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for finding in findings {
                stmt.execute(params![
                    analysis_id,
                    finding.severity.as_str(),
                    finding.title,
                    finding.file,
                ])?;
            }
        }
        tx.commit()?;
        Ok(findings.len())
    }

    fn list_findings(&self, analysis_id: &str) -> Result<Vec<Finding>> {
        let conn = self.read_conn()?;
        let mut stmt = conn.prepare(
            "SELECT severity, title, file FROM findings
             WHERE analysis_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![analysis_id], |row| {
            let severity: String = row.get(0)?;
            Ok(Finding {
                severity: severity.parse::<Severity>().map_err(|_| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        format!("unknown severity: {severity}").into(),
                    )
                })?,
                title: row.get(1)?,
                file: row.get(2)?,
            })
        })?;
        let mut findings = Vec::new();
        for row in rows {
            findings.push(row?);
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("graph.sqlite")).unwrap();
        (dir, store)
    }

    fn node(name: &str) -> NodeInput {
        NodeInput {
            kind: NodeKind::Function,
            name: name.to_string(),
            file: Some("src/a.js".to_string()),
            line_start: Some(1),
            line_end: Some(3),
            metadata: json!({"exported": true}),
        }
    }

    #[test]
    fn node_ids_come_back_in_input_order() {
        let (_dir, store) = store();
        let ids = store
            .insert_nodes("a1", &[node("first"), node("second"), node("third")])
            .unwrap();
        assert_eq!(ids.len(), 3);
        assert!(ids[0] < ids[1] && ids[1] < ids[2]);

        let loaded = store.load_nodes("a1").unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].name, "first");
        assert_eq!(loaded[0].id, ids[0]);
        assert_eq!(loaded[0].metadata["exported"], json!(true));
    }

    #[test]
    fn delete_analysis_clears_only_that_analysis() {
        let (_dir, store) = store();
        let ids_a = store.insert_nodes("a1", &[node("a"), node("b")]).unwrap();
        store
            .insert_edges(
                "a1",
                &[EdgeInput {
                    source_id: ids_a[0],
                    target_id: ids_a[1],
                    kind: EdgeKind::Calls,
                    metadata: json!({}),
                }],
            )
            .unwrap();
        store.insert_nodes("a2", &[node("c")]).unwrap();

        store.delete_analysis("a1").unwrap();
        assert!(store.load_nodes("a1").unwrap().is_empty());
        assert!(store.load_edges("a1").unwrap().is_empty());
        assert_eq!(store.load_nodes("a2").unwrap().len(), 1);
    }

    #[test]
    fn delete_analysis_leaves_findings_alone() {
        let (_dir, store) = store();
        store.insert_nodes("a1", &[node("a")]).unwrap();
        store
            .insert_findings(
                "a1",
                &[Finding {
                    severity: Severity::Critical,
                    title: "sql injection".to_string(),
                    file: "src/a.js".to_string(),
                }],
            )
            .unwrap();

        store.delete_analysis("a1").unwrap();
        assert!(store.load_nodes("a1").unwrap().is_empty());
        assert_eq!(store.list_findings("a1").unwrap().len(), 1);
    }

    #[test]
    fn findings_round_trip() {
        let (_dir, store) = store();
        store
            .insert_findings(
                "a1",
                &[Finding {
                    severity: Severity::High,
                    title: "hardcoded secret".to_string(),
                    file: "src/a.js".to_string(),
                }],
            )
            .unwrap();
        let findings = store.list_findings("a1").unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
    }
}
