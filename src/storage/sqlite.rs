//! SQLite storage backend

use super::cursor::ScanLease;
use super::traits::{
    AnnotationStore, OpenStore, ResultSink, ScanHandle, StatusSink, StorageError, StorageResult,
};
use crate::evaluation::{AnalysisSummary, TaskStatus};
use crate::model::{AnnotationNode, MatchRecord, NodeId, Span};
use crate::query::{CandidateQuery, NearestQuery, Proximity, SpanWindow};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// An open scan is a query plus an offset into its ordered rows
struct SqliteScan {
    query: CandidateQuery,
    page_size: usize,
    offset: usize,
    lease: ScanLease,
}

type NodeRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    Option<i64>,
    Option<i64>,
);

const NODE_COLUMNS: &str = "id, document_id, types_json, attributes_json, children_json, references_json, span_begin, span_end";

/// SQLite-backed annotation and result store
///
/// Uses a single SQLite database file with tables for nodes, match records,
/// run summaries and run status. Thread-safe via internal mutex on the
/// connection. Type, document and span constraints are evaluated in SQL;
/// attribute filters are applied to the decoded nodes.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    scans: Mutex<HashMap<ScanHandle, SqliteScan>>,
}

impl SqliteStore {
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            -- Annotation nodes, one row per (system, id)
            CREATE TABLE IF NOT EXISTS nodes (
                system TEXT NOT NULL,
                id TEXT NOT NULL,
                document_id TEXT NOT NULL,
                type_name TEXT NOT NULL,
                types_json TEXT NOT NULL,
                attributes_json TEXT NOT NULL,
                children_json TEXT NOT NULL,
                references_json TEXT NOT NULL,
                span_begin INTEGER,
                span_end INTEGER,
                PRIMARY KEY (system, id)
            );

            CREATE INDEX IF NOT EXISTS idx_nodes_document
                ON nodes(system, document_id);
            CREATE INDEX IF NOT EXISTS idx_nodes_span
                ON nodes(system, document_id, span_begin, span_end);

            -- Audit records, write-once
            CREATE TABLE IF NOT EXISTS match_records (
                analysis_index TEXT NOT NULL,
                record_type TEXT NOT NULL,
                id TEXT NOT NULL,
                analysis_id TEXT NOT NULL,
                document_id TEXT NOT NULL,
                record_json TEXT NOT NULL,
                PRIMARY KEY (analysis_index, record_type, id)
            );

            CREATE INDEX IF NOT EXISTS idx_records_analysis
                ON match_records(analysis_id);

            CREATE TABLE IF NOT EXISTS analysis_summaries (
                analysis_id TEXT PRIMARY KEY,
                analysis_index TEXT NOT NULL,
                summary_json TEXT NOT NULL,
                completed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS analysis_tasks (
                analysis_id TEXT PRIMARY KEY,
                status_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Enable WAL mode so result writes do not block node reads
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            scans: Mutex::new(HashMap::new()),
        })
    }

    /// Insert or replace nodes of a system in one transaction
    pub fn save_nodes(&self, system: &str, nodes: &[AnnotationNode]) -> StorageResult<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO nodes
                    (system, id, document_id, type_name, types_json, attributes_json,
                     children_json, references_json, span_begin, span_end)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )?;
            for node in nodes {
                stmt.execute(params![
                    system,
                    node.id.as_str(),
                    node.document_id,
                    node.type_name(),
                    serde_json::to_string(&node.types)?,
                    serde_json::to_string(&node.attributes)?,
                    serde_json::to_string(&node.children)?,
                    serde_json::to_string(&node.references)?,
                    node.primary_span.map(|s| s.begin as i64),
                    node.primary_span.map(|s| s.end as i64),
                ])?;
            }
        }
        tx.commit()?;
        Ok(nodes.len())
    }

    /// Deserialize a node from database columns
    fn row_to_node(row: NodeRow) -> StorageResult<AnnotationNode> {
        let (id, document_id, types, attributes, children, references, begin, end) = row;
        let primary_span = match (begin, end) {
            (Some(b), Some(e)) => Some(Span::new(b as usize, e as usize)),
            _ => None,
        };

        Ok(AnnotationNode {
            id: NodeId::from_string(id),
            document_id,
            types: serde_json::from_str(&types)?,
            attributes: serde_json::from_str(&attributes)?,
            children: serde_json::from_str(&children)?,
            references: serde_json::from_str(&references)?,
            primary_span,
        })
    }

    fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NodeRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
        ))
    }

    /// Nodes passing the SQL-side constraints, in insertion order
    fn select_nodes(
        &self,
        query: &CandidateQuery,
        window: Option<&SpanWindow>,
        page: Option<(usize, usize)>,
    ) -> StorageResult<Vec<AnnotationNode>> {
        let conn = self.conn.lock().unwrap();

        let mut sql = format!(
            "SELECT {} FROM nodes WHERE system = ?1 AND document_id = ?2 \
             AND EXISTS (SELECT 1 FROM json_each(nodes.types_json) WHERE json_each.value = ?3)",
            NODE_COLUMNS
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![
            Box::new(query.system.clone()),
            Box::new(query.document_id.clone()),
            Box::new(query.type_name.clone()),
        ];

        if let Some(window) = window {
            let (begin_lo, begin_hi) = window.begin_bounds();
            let (end_lo, end_hi) = window.end_bounds();
            sql.push_str(" AND span_begin BETWEEN ? AND ? AND span_end BETWEEN ? AND ?");
            params_vec.push(Box::new(begin_lo as i64));
            params_vec.push(Box::new(begin_hi.min(i64::MAX as usize) as i64));
            params_vec.push(Box::new(end_lo as i64));
            params_vec.push(Box::new(end_hi.min(i64::MAX as usize) as i64));
        }

        sql.push_str(" ORDER BY rowid");
        if let Some((limit, offset)) = page {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
        }

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();

        let rows = stmt.query_map(params_refs.as_slice(), Self::read_row)?;

        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(Self::row_to_node(row?)?);
        }
        Ok(nodes)
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }
}

impl AnnotationStore for SqliteStore {
    fn open_scan(
        &self,
        query: &CandidateQuery,
        page_size: usize,
        keep_alive: Duration,
    ) -> StorageResult<ScanHandle> {
        let handle = ScanHandle::new();
        self.scans.lock().unwrap().insert(
            handle.clone(),
            SqliteScan {
                query: query.clone(),
                page_size: page_size.max(1),
                offset: 0,
                lease: ScanLease::new(keep_alive),
            },
        );
        Ok(handle)
    }

    fn next_page(&self, handle: &ScanHandle) -> StorageResult<Vec<AnnotationNode>> {
        let mut scans = self.scans.lock().unwrap();

        let expired = match scans.get(handle) {
            None => return Err(StorageError::ScanNotFound(handle.clone())),
            Some(scan) => scan.lease.is_expired(),
        };
        if expired {
            scans.remove(handle);
            return Err(StorageError::ScanNotFound(handle.clone()));
        }

        let Some(scan) = scans.get_mut(handle) else {
            return Err(StorageError::ScanNotFound(handle.clone()));
        };

        // Keep reading until a row survives the attribute filters or rows run out
        loop {
            let rows = self.select_nodes(
                &scan.query,
                scan.query.window.as_ref(),
                Some((scan.page_size, scan.offset)),
            )?;
            if rows.is_empty() {
                scan.lease.renew();
                return Ok(Vec::new());
            }
            scan.offset += rows.len();

            let page: Vec<AnnotationNode> = rows
                .into_iter()
                .filter(|n| scan.query.passes_filters(n))
                .collect();
            if !page.is_empty() {
                scan.lease.renew();
                return Ok(page);
            }
        }
    }

    fn release_scan(&self, handle: &ScanHandle) -> StorageResult<bool> {
        Ok(self.scans.lock().unwrap().remove(handle).is_some())
    }

    fn get(&self, system: &str, id: &NodeId) -> StorageResult<Option<AnnotationNode>> {
        let conn = self.conn.lock().unwrap();

        let row: Option<NodeRow> = conn
            .query_row(
                &format!("SELECT {} FROM nodes WHERE system = ?1 AND id = ?2", NODE_COLUMNS),
                params![system, id.as_str()],
                Self::read_row,
            )
            .optional()?;

        row.map(Self::row_to_node).transpose()
    }

    fn nearest_by_span(&self, query: &NearestQuery) -> StorageResult<Option<NodeId>> {
        // Euclidean distance within the limit bounds each offset by the limit
        let limit = match query.proximity {
            Proximity::ExactSpan => 0,
            Proximity::Limit(limit) => limit,
        };
        let bounds = SpanWindow::for_fuzz(query.target, limit);
        let candidates = self.select_nodes(&query.selection, Some(&bounds), None)?;
        Ok(query.pick_best(&candidates))
    }

    fn document_ids_page(
        &self,
        system: &str,
        offset: usize,
        limit: usize,
    ) -> StorageResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT document_id FROM nodes WHERE system = ?1
             ORDER BY document_id LIMIT ?2 OFFSET ?3",
        )?;
        let ids = stmt
            .query_map(params![system, limit as i64, offset as i64], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}

impl ResultSink for SqliteStore {
    fn bulk_write(&self, records: &[MatchRecord], _batch_size_hint: usize) -> StorageResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO match_records
                    (analysis_index, record_type, id, analysis_id, document_id, record_json)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )?;
            for record in records {
                let key = record.key();
                stmt.execute(params![
                    key.index,
                    key.record_type,
                    key.id,
                    record.analysis_id,
                    record.document_id,
                    serde_json::to_string(record)?,
                ])?;
            }
        }
        // Dropping an uncommitted transaction rolls the whole batch back
        tx.commit()?;
        Ok(())
    }

    fn write_summary(&self, summary: &AnalysisSummary) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT OR REPLACE INTO analysis_summaries
                (analysis_id, analysis_index, summary_json, completed_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                summary.analysis_id,
                summary.analysis_index,
                serde_json::to_string(summary)?,
                summary.completed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn load_records(&self, analysis_id: &str) -> StorageResult<Vec<MatchRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT record_json FROM match_records WHERE analysis_id = ?1 ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map(params![analysis_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        rows.iter()
            .map(|json| serde_json::from_str(json).map_err(StorageError::from))
            .collect()
    }

    fn load_summary(&self, analysis_id: &str) -> StorageResult<Option<AnalysisSummary>> {
        let conn = self.conn.lock().unwrap();
        let json: Option<String> = conn
            .query_row(
                "SELECT summary_json FROM analysis_summaries WHERE analysis_id = ?1",
                params![analysis_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(json.map(|j| serde_json::from_str(&j)).transpose()?)
    }

    fn delete_document_records(&self, analysis_id: &str, document_id: &str) -> StorageResult<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM match_records WHERE analysis_id = ?1 AND document_id = ?2",
            params![analysis_id, document_id],
        )?;
        Ok(deleted)
    }
}

impl StatusSink for SqliteStore {
    fn update_status(&self, analysis_id: &str, status: &TaskStatus) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO analysis_tasks (analysis_id, status_json, updated_at)
             VALUES (?1, ?2, ?3)",
            params![
                analysis_id,
                serde_json::to_string(status)?,
                status.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn load_status(&self, analysis_id: &str) -> StorageResult<Option<TaskStatus>> {
        let conn = self.conn.lock().unwrap();
        let json: Option<String> = conn
            .query_row(
                "SELECT status_json FROM analysis_tasks WHERE analysis_id = ?1",
                params![analysis_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(json.map(|j| serde_json::from_str(&j)).transpose()?)
    }
}
