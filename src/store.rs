use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OpenFlags, params};

use crate::graph::records::{EdgeKind, EdgeRow, NodeKind, NodeRow};

/// Directory holding the per-project store, relative to the workspace root.
pub const STORE_DIR: &str = ".codegraph";
/// Database file name inside [`STORE_DIR`].
pub const STORE_FILE: &str = "graph.db";

/// The embedded relational store holding the graph.
///
/// Builds open it read-write in WAL mode so read-only queries can run over an
/// older snapshot concurrently; query consumers open it read-only. The schema
/// (`nodes`/`edges` plus the six indexes) is the stable contract queries
/// depend on.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (creating if needed) the graph database at `path` for writing.
    pub fn open(path: &Path) -> Result<Store> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open graph database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "wal")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let store = Store { conn };
        store.initialize_schema()?;
        store.migrate()?;
        Ok(store)
    }

    /// Open an existing graph database read-only. A missing store is a fatal
    /// error for query consumers.
    pub fn open_readonly(path: &Path) -> Result<Store> {
        if !path.exists() {
            return Err(anyhow!(
                "no graph database at {}; run `codegraph build` first",
                path.display()
            ));
        }
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("failed to open graph database at {}", path.display()))?;
        Ok(Store { conn })
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Store> {
        let conn = Connection::open_in_memory()?;
        let store = Store { conn };
        store.initialize_schema()?;
        store.migrate()?;
        Ok(store)
    }

    /// Walk upward from `start` looking for an existing store; default to
    /// `start/.codegraph/graph.db` when none is found.
    pub fn discover(start: &Path) -> PathBuf {
        let mut dir = Some(start);
        while let Some(d) = dir {
            let candidate = d.join(STORE_DIR).join(STORE_FILE);
            if candidate.exists() {
                return candidate;
            }
            dir = d.parent();
        }
        start.join(STORE_DIR).join(STORE_FILE)
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS nodes (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                file TEXT NOT NULL,
                line INTEGER NOT NULL,
                end_line INTEGER,
                UNIQUE(name, kind, file, line)
            );

            CREATE TABLE IF NOT EXISTS edges (
                id INTEGER PRIMARY KEY,
                source_id INTEGER NOT NULL REFERENCES nodes(id),
                target_id INTEGER NOT NULL REFERENCES nodes(id),
                kind TEXT NOT NULL,
                confidence REAL NOT NULL DEFAULT 1.0,
                dynamic INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_nodes_name ON nodes(name);
            CREATE INDEX IF NOT EXISTS idx_nodes_file ON nodes(file);
            CREATE INDEX IF NOT EXISTS idx_nodes_kind ON nodes(kind);
            CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id);
            CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id);
            CREATE INDEX IF NOT EXISTS idx_edges_kind ON edges(kind);
            ",
        )?;
        Ok(())
    }

    /// Add columns that predate-schema databases lack. `ALTER TABLE ADD
    /// COLUMN` preserves existing rows, so no data is lost.
    fn migrate(&self) -> Result<()> {
        if !self.has_column("nodes", "end_line")? {
            self.conn
                .execute("ALTER TABLE nodes ADD COLUMN end_line INTEGER", [])?;
        }
        if !self.has_column("edges", "confidence")? {
            self.conn.execute(
                "ALTER TABLE edges ADD COLUMN confidence REAL NOT NULL DEFAULT 1.0",
                [],
            )?;
        }
        if !self.has_column("edges", "dynamic")? {
            self.conn.execute(
                "ALTER TABLE edges ADD COLUMN dynamic INTEGER NOT NULL DEFAULT 0",
                [],
            )?;
        }
        Ok(())
    }

    fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({table})"))?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(1)?;
            if name == column {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // -- shared read helpers -------------------------------------------------

    pub fn load_nodes(&self) -> Result<Vec<NodeRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, kind, file, line, end_line FROM nodes ORDER BY id")?;
        let rows = stmt
            .query_map([], row_to_node)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn load_edges(&self) -> Result<Vec<EdgeRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_id, target_id, kind, confidence, dynamic FROM edges ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], row_to_edge)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn nodes_in_file(&self, file: &str) -> Result<Vec<NodeRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, kind, file, line, end_line FROM nodes WHERE file = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![file], row_to_node)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

pub fn row_to_node(row: &rusqlite::Row) -> rusqlite::Result<NodeRow> {
    let kind_str: String = row.get(2)?;
    Ok(NodeRow {
        id: row.get(0)?,
        name: row.get(1)?,
        kind: NodeKind::from_str(&kind_str).unwrap_or(NodeKind::File),
        file: row.get(3)?,
        line: row.get(4)?,
        end_line: row.get(5)?,
    })
}

pub fn row_to_edge(row: &rusqlite::Row) -> rusqlite::Result<EdgeRow> {
    let kind_str: String = row.get(3)?;
    Ok(EdgeRow {
        id: row.get(0)?,
        source_id: row.get(1)?,
        target_id: row.get(2)?,
        kind: EdgeKind::from_str(&kind_str).unwrap_or(EdgeKind::Imports),
        confidence: row.get(4)?,
        dynamic: row.get::<_, i64>(5)? != 0,
    })
}

/// Prepared write statements, composed once per transaction and passed by
/// reference. Dropping the struct releases the statements before commit.
pub struct WriteStatements<'conn> {
    insert_node: rusqlite::Statement<'conn>,
    select_node_id: rusqlite::Statement<'conn>,
    insert_edge: rusqlite::Statement<'conn>,
}

impl<'conn> WriteStatements<'conn> {
    pub fn prepare(conn: &'conn Connection) -> Result<WriteStatements<'conn>> {
        Ok(WriteStatements {
            insert_node: conn.prepare(
                "INSERT OR IGNORE INTO nodes (name, kind, file, line, end_line)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?,
            select_node_id: conn.prepare(
                "SELECT id FROM nodes WHERE name = ?1 AND kind = ?2 AND file = ?3 AND line = ?4",
            )?,
            insert_edge: conn.prepare(
                "INSERT INTO edges (source_id, target_id, kind, confidence, dynamic)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?,
        })
    }

    /// Insert a node, returning its id. Duplicates under the uniqueness
    /// invariant return the existing id.
    pub fn insert_node(
        &mut self,
        name: &str,
        kind: NodeKind,
        file: &str,
        line: u32,
        end_line: Option<u32>,
    ) -> Result<i64> {
        self.insert_node
            .execute(params![name, kind.as_str(), file, line, end_line])?;
        let id = self
            .select_node_id
            .query_row(params![name, kind.as_str(), file, line], |row| row.get(0))?;
        Ok(id)
    }

    pub fn insert_edge(
        &mut self,
        source_id: i64,
        target_id: i64,
        kind: EdgeKind,
        confidence: f64,
        dynamic: bool,
    ) -> Result<()> {
        self.insert_edge.execute(params![
            source_id,
            target_id,
            kind.as_str(),
            confidence,
            dynamic as i64
        ])?;
        Ok(())
    }
}
