//! Closest-node lookup for audit records

use super::error::EvalResult;
use crate::config::UnitOfAnalysis;
use crate::model::{NodeId, Span};
use crate::query::{CandidateQuery, NearestQuery, Proximity};
use crate::storage::AnnotationStore;

/// Distance limit for closest-node lookups outside hit/miss mode
pub const CLOSEST_MATCH_LIMIT: usize = 80;

/// Finds the node of a unit of analysis nearest to a span
pub struct ClosestFinder<'a> {
    store: &'a dyn AnnotationStore,
    target: &'a UnitOfAnalysis,
    document_id: &'a str,
    span: Option<Span>,
}

impl<'a> ClosestFinder<'a> {
    pub fn new(
        store: &'a dyn AnnotationStore,
        target: &'a UnitOfAnalysis,
        document_id: &'a str,
        span: Option<Span>,
    ) -> Self {
        Self {
            store,
            target,
            document_id,
            span,
        }
    }

    /// Closest node id within `limit`, where 0 means the identical span
    ///
    /// `None` when there is no span to search from or nothing qualifies.
    pub fn find(&self, limit: usize) -> EvalResult<Option<NodeId>> {
        let Some(span) = self.span else {
            return Ok(None);
        };
        let query = NearestQuery::new(
            CandidateQuery::for_unit(self.target, self.document_id),
            span,
            Proximity::from_limit(limit),
        );
        Ok(self.store.nearest_by_span(&query)?)
    }
}
