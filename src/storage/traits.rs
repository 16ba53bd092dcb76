//! Storage trait definitions

use crate::evaluation::{AnalysisSummary, TaskStatus};
use crate::model::{AnnotationNode, MatchRecord, NodeId};
use crate::query::{CandidateQuery, NearestQuery};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Scan not found or expired: {0}")]
    ScanNotFound(ScanHandle),

    #[error("Write rejected: {0}")]
    WriteRejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Opaque handle to an open paged scan
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScanHandle(String);

impl ScanHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ScanHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScanHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read access to the annotation nodes of every system
///
/// Implementations must be thread-safe (Send + Sync) so that one store can
/// back several analyses.
pub trait AnnotationStore: Send + Sync {
    // === Paged scans ===

    /// Open a scan over the nodes a query selects
    ///
    /// The scan stays valid for `keep_alive` after each page is served.
    fn open_scan(
        &self,
        query: &CandidateQuery,
        page_size: usize,
        keep_alive: Duration,
    ) -> StorageResult<ScanHandle>;

    /// Next page of an open scan; an empty page means the scan is exhausted
    fn next_page(&self, handle: &ScanHandle) -> StorageResult<Vec<AnnotationNode>>;

    /// Release a scan; returns false if it was already gone
    fn release_scan(&self, handle: &ScanHandle) -> StorageResult<bool>;

    // === Lookups ===

    /// Load one node of a system by id
    fn get(&self, system: &str, id: &NodeId) -> StorageResult<Option<AnnotationNode>>;

    /// Id of the selected node closest to the query's target span
    fn nearest_by_span(&self, query: &NearestQuery) -> StorageResult<Option<NodeId>>;

    /// One page of a system's distinct document ids, in ascending order
    fn document_ids_page(
        &self,
        system: &str,
        offset: usize,
        limit: usize,
    ) -> StorageResult<Vec<String>>;
}

/// Destination of audit records and run summaries
pub trait ResultSink: Send + Sync {
    /// Write a batch of records; the batch is accepted whole or rejected
    fn bulk_write(&self, records: &[MatchRecord], batch_size_hint: usize) -> StorageResult<()>;

    /// Persist the summary of a finished run
    fn write_summary(&self, summary: &AnalysisSummary) -> StorageResult<()>;

    /// Records of one run in write order
    fn load_records(&self, analysis_id: &str) -> StorageResult<Vec<MatchRecord>>;

    fn load_summary(&self, analysis_id: &str) -> StorageResult<Option<AnalysisSummary>>;

    /// Remove every record a run wrote for one document, returning how many
    fn delete_document_records(&self, analysis_id: &str, document_id: &str) -> StorageResult<usize>;
}

/// Destination of run progress
pub trait StatusSink: Send + Sync {
    fn update_status(&self, analysis_id: &str, status: &TaskStatus) -> StorageResult<()>;

    fn load_status(&self, analysis_id: &str) -> StorageResult<Option<TaskStatus>>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: AnnotationStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
