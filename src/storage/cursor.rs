//! Scan leases and scoped scan handles

use super::traits::{AnnotationStore, ScanHandle, StorageResult};
use crate::model::AnnotationNode;
use crate::query::CandidateQuery;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

/// Expiry bookkeeping shared by every store's open scans
#[derive(Debug, Clone)]
pub(crate) struct ScanLease {
    keep_alive: chrono::Duration,
    expires_at: DateTime<Utc>,
}

impl ScanLease {
    pub(crate) fn new(keep_alive: Duration) -> Self {
        let keep_alive =
            chrono::Duration::from_std(keep_alive).unwrap_or_else(|_| chrono::Duration::days(365));
        Self {
            keep_alive,
            expires_at: Utc::now() + keep_alive,
        }
    }

    pub(crate) fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Extend the lease after a page is served
    pub(crate) fn renew(&mut self) {
        self.expires_at = Utc::now() + self.keep_alive;
    }
}

/// An open scan released when dropped
///
/// Release failures on drop are logged and otherwise ignored: the store
/// reclaims the scan once its lease runs out.
pub struct ScopedScan<'a> {
    store: &'a dyn AnnotationStore,
    handle: Option<ScanHandle>,
}

impl<'a> ScopedScan<'a> {
    pub fn open(
        store: &'a dyn AnnotationStore,
        query: &CandidateQuery,
        page_size: usize,
        keep_alive: Duration,
    ) -> StorageResult<Self> {
        let handle = store.open_scan(query, page_size, keep_alive)?;
        Ok(Self {
            store,
            handle: Some(handle),
        })
    }

    /// Next page, empty once exhausted
    pub fn next_page(&mut self) -> StorageResult<Vec<AnnotationNode>> {
        match &self.handle {
            Some(handle) => self.store.next_page(handle),
            None => Ok(Vec::new()),
        }
    }
}

impl Drop for ScopedScan<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.store.release_scan(&handle) {
                debug!(scan = %handle, error = %e, "failed to release scan");
            }
        }
    }
}
