//! In-memory storage backend

use super::cursor::ScanLease;
use super::traits::{
    AnnotationStore, ResultSink, ScanHandle, StatusSink, StorageError, StorageResult,
};
use crate::evaluation::{AnalysisSummary, TaskStatus};
use crate::model::{AnnotationNode, MatchRecord, NodeId};
use crate::query::{CandidateQuery, NearestQuery};
use dashmap::DashMap;
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

/// Nodes of one system in insertion order
#[derive(Debug, Default)]
struct SystemNodes {
    order: Vec<NodeId>,
    by_id: HashMap<NodeId, AnnotationNode>,
}

impl SystemNodes {
    fn iter(&self) -> impl Iterator<Item = &AnnotationNode> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }
}

/// A scan's matches are fixed when it opens
#[derive(Debug)]
struct MemoryScan {
    system: String,
    matched: Vec<NodeId>,
    position: usize,
    page_size: usize,
    lease: ScanLease,
}

/// Concurrent in-memory store for nodes, results and status
///
/// Serves tests and small corpora loaded at startup. Every map is a
/// `DashMap`, so a single instance can be shared across threads.
#[derive(Debug, Default)]
pub struct MemoryStore {
    systems: DashMap<String, SystemNodes>,
    scans: DashMap<ScanHandle, MemoryScan>,
    records: DashMap<String, Vec<MatchRecord>>,
    summaries: DashMap<String, AnalysisSummary>,
    statuses: DashMap<String, TaskStatus>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace nodes of a system
    pub fn save_nodes(&self, system: &str, nodes: impl IntoIterator<Item = AnnotationNode>) {
        let mut entry = self.systems.entry(system.to_string()).or_default();
        for node in nodes {
            if !entry.by_id.contains_key(&node.id) {
                entry.order.push(node.id.clone());
            }
            entry.by_id.insert(node.id.clone(), node);
        }
    }

    pub fn node_count(&self, system: &str) -> usize {
        self.systems.get(system).map(|s| s.order.len()).unwrap_or(0)
    }

    /// Number of scans not yet released
    pub fn open_scan_count(&self) -> usize {
        self.scans.len()
    }
}

impl AnnotationStore for MemoryStore {
    fn open_scan(
        &self,
        query: &CandidateQuery,
        page_size: usize,
        keep_alive: Duration,
    ) -> StorageResult<ScanHandle> {
        let matched = self
            .systems
            .get(&query.system)
            .map(|nodes| {
                nodes
                    .iter()
                    .filter(|n| query.matches(n))
                    .map(|n| n.id.clone())
                    .collect()
            })
            .unwrap_or_default();

        let handle = ScanHandle::new();
        self.scans.insert(
            handle.clone(),
            MemoryScan {
                system: query.system.clone(),
                matched,
                position: 0,
                page_size: page_size.max(1),
                lease: ScanLease::new(keep_alive),
            },
        );
        Ok(handle)
    }

    fn next_page(&self, handle: &ScanHandle) -> StorageResult<Vec<AnnotationNode>> {
        let mut scan = self
            .scans
            .get_mut(handle)
            .ok_or_else(|| StorageError::ScanNotFound(handle.clone()))?;

        if scan.lease.is_expired() {
            drop(scan);
            self.scans.remove(handle);
            return Err(StorageError::ScanNotFound(handle.clone()));
        }

        let end = (scan.position + scan.page_size).min(scan.matched.len());
        let ids = scan.matched[scan.position..end].to_vec();
        scan.position = end;
        scan.lease.renew();

        let Some(nodes) = self.systems.get(&scan.system) else {
            return Ok(Vec::new());
        };
        Ok(ids.iter().filter_map(|id| nodes.by_id.get(id).cloned()).collect())
    }

    fn release_scan(&self, handle: &ScanHandle) -> StorageResult<bool> {
        Ok(self.scans.remove(handle).is_some())
    }

    fn get(&self, system: &str, id: &NodeId) -> StorageResult<Option<AnnotationNode>> {
        Ok(self
            .systems
            .get(system)
            .and_then(|nodes| nodes.by_id.get(id).cloned()))
    }

    fn nearest_by_span(&self, query: &NearestQuery) -> StorageResult<Option<NodeId>> {
        Ok(self
            .systems
            .get(&query.selection.system)
            .and_then(|nodes| query.pick_best(nodes.iter())))
    }

    fn document_ids_page(
        &self,
        system: &str,
        offset: usize,
        limit: usize,
    ) -> StorageResult<Vec<String>> {
        let Some(nodes) = self.systems.get(system) else {
            return Ok(Vec::new());
        };
        let documents: BTreeSet<&str> = nodes.iter().map(|n| n.document_id.as_str()).collect();
        Ok(documents
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(str::to_string)
            .collect())
    }
}

impl ResultSink for MemoryStore {
    fn bulk_write(&self, records: &[MatchRecord], _batch_size_hint: usize) -> StorageResult<()> {
        for record in records {
            self.records
                .entry(record.analysis_id.clone())
                .or_default()
                .push(record.clone());
        }
        Ok(())
    }

    fn write_summary(&self, summary: &AnalysisSummary) -> StorageResult<()> {
        self.summaries
            .insert(summary.analysis_id.clone(), summary.clone());
        Ok(())
    }

    fn load_records(&self, analysis_id: &str) -> StorageResult<Vec<MatchRecord>> {
        Ok(self
            .records
            .get(analysis_id)
            .map(|r| r.clone())
            .unwrap_or_default())
    }

    fn load_summary(&self, analysis_id: &str) -> StorageResult<Option<AnalysisSummary>> {
        Ok(self.summaries.get(analysis_id).map(|s| s.clone()))
    }

    fn delete_document_records(&self, analysis_id: &str, document_id: &str) -> StorageResult<usize> {
        let Some(mut records) = self.records.get_mut(analysis_id) else {
            return Ok(0);
        };
        let before = records.len();
        records.retain(|r| r.document_id != document_id);
        Ok(before - records.len())
    }
}

impl StatusSink for MemoryStore {
    fn update_status(&self, analysis_id: &str, status: &TaskStatus) -> StorageResult<()> {
        self.statuses.insert(analysis_id.to_string(), status.clone());
        Ok(())
    }

    fn load_status(&self, analysis_id: &str) -> StorageResult<Option<TaskStatus>> {
        Ok(self.statuses.get(analysis_id).map(|s| s.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnitOfAnalysis;
    use crate::model::Span;
    use crate::query::{Proximity, SpanWindow};

    fn token(id: &str, doc: &str, begin: usize) -> AnnotationNode {
        AnnotationNode::new(id, doc, "Token").with_span(begin, begin + 3)
    }

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.save_nodes(
            "sys",
            (0..7).map(|i| token(&format!("t{}", i), "doc-a", i * 10)),
        );
        store.save_nodes("sys", vec![token("x", "doc-b", 0)]);
        store
    }

    #[test]
    fn test_scan_pages_until_exhausted() {
        let store = seeded();
        let query = CandidateQuery::for_unit(&UnitOfAnalysis::new("sys", "Token"), "doc-a");
        let handle = store.open_scan(&query, 3, Duration::from_secs(60)).unwrap();

        let sizes: Vec<usize> = std::iter::from_fn(|| {
            let page = store.next_page(&handle).unwrap();
            (!page.is_empty()).then_some(page.len())
        })
        .collect();
        assert_eq!(sizes, vec![3, 3, 1]);

        assert!(store.release_scan(&handle).unwrap());
        assert!(!store.release_scan(&handle).unwrap());
        assert_eq!(store.open_scan_count(), 0);
    }

    #[test]
    fn test_scan_applies_window() {
        let store = seeded();
        let query = CandidateQuery::for_unit(&UnitOfAnalysis::new("sys", "Token"), "doc-a")
            .within(SpanWindow::for_fuzz(Span::new(20, 23), 5));
        let handle = store.open_scan(&query, 50, Duration::from_secs(60)).unwrap();

        let page = store.next_page(&handle).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, NodeId::from("t2"));
    }

    #[test]
    fn test_released_scan_is_not_found() {
        let store = seeded();
        let query = CandidateQuery::for_unit(&UnitOfAnalysis::new("sys", "Token"), "doc-a");
        let handle = store.open_scan(&query, 3, Duration::from_secs(60)).unwrap();
        store.release_scan(&handle).unwrap();

        assert!(matches!(
            store.next_page(&handle),
            Err(StorageError::ScanNotFound(_))
        ));
    }

    #[test]
    fn test_expired_scan_is_dropped() {
        let store = seeded();
        let query = CandidateQuery::for_unit(&UnitOfAnalysis::new("sys", "Token"), "doc-a");
        let handle = store.open_scan(&query, 3, Duration::ZERO).unwrap();
        std::thread::sleep(Duration::from_millis(5));

        assert!(store.next_page(&handle).is_err());
        assert_eq!(store.open_scan_count(), 0);
    }

    #[test]
    fn test_document_ids_are_sorted_and_paged() {
        let store = seeded();
        assert_eq!(store.document_ids_page("sys", 0, 10).unwrap(), vec!["doc-a", "doc-b"]);
        assert_eq!(store.document_ids_page("sys", 1, 10).unwrap(), vec!["doc-b"]);
        assert!(store.document_ids_page("other", 0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_nearest_by_span() {
        let store = seeded();
        let selection = CandidateQuery::for_unit(&UnitOfAnalysis::new("sys", "Token"), "doc-a");
        let query = NearestQuery::new(selection, Span::new(31, 35), Proximity::from_limit(80));
        assert_eq!(store.nearest_by_span(&query).unwrap(), Some(NodeId::from("t3")));
    }

    #[test]
    fn test_save_nodes_replaces_by_id() {
        let store = MemoryStore::new();
        store.save_nodes("sys", vec![token("a", "d", 0)]);
        store.save_nodes("sys", vec![token("a", "d", 5)]);

        assert_eq!(store.node_count("sys"), 1);
        let node = store.get("sys", &NodeId::from("a")).unwrap().unwrap();
        assert_eq!(node.primary_span, Some(Span::new(5, 8)));
    }

    #[test]
    fn test_status_roundtrip() {
        let store = MemoryStore::new();
        let status = TaskStatus::started(4);
        store.update_status("a1", &status).unwrap();
        assert_eq!(store.load_status("a1").unwrap(), Some(status));
        assert_eq!(store.load_status("missing").unwrap(), None);
    }
}
