//! Proximity search for the closest node of a selection

use super::select::CandidateQuery;
use crate::model::{AnnotationNode, NodeId, Span};

/// Score of two spans at euclidean distance `distance`: 1 at zero, falling off
pub fn proximity_score(distance: f64) -> f64 {
    1.0 / (distance + 1.0)
}

/// How close a candidate must be to count
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Proximity {
    /// Identical span only
    ExactSpan,
    /// Euclidean distance at most `limit`
    Limit(usize),
}

impl Proximity {
    /// Limit 0 means identical spans
    pub fn from_limit(limit: usize) -> Self {
        if limit == 0 {
            Proximity::ExactSpan
        } else {
            Proximity::Limit(limit)
        }
    }
}

/// The closest selected node to a target span
#[derive(Debug, Clone, PartialEq)]
pub struct NearestQuery {
    pub selection: CandidateQuery,
    pub target: Span,
    pub proximity: Proximity,
}

impl NearestQuery {
    pub fn new(selection: CandidateQuery, target: Span, proximity: Proximity) -> Self {
        Self {
            selection,
            target,
            proximity,
        }
    }

    /// Lowest acceptable score, `None` when only exact spans count
    pub fn min_score(&self) -> Option<f64> {
        match self.proximity {
            Proximity::ExactSpan => None,
            Proximity::Limit(limit) => Some(proximity_score(limit as f64)),
        }
    }

    /// Score a span, or `None` if it does not qualify
    pub fn score(&self, span: &Span) -> Option<f64> {
        match self.min_score() {
            None => (span == &self.target).then_some(1.0),
            Some(min) => {
                let score = proximity_score(span.distance(&self.target));
                (score >= min).then_some(score)
            }
        }
    }

    /// Pick the best-scoring node; ties go to the smallest id
    ///
    /// Nodes outside the selection or without a span are skipped.
    pub fn pick_best<'a>(
        &self,
        candidates: impl IntoIterator<Item = &'a AnnotationNode>,
    ) -> Option<NodeId> {
        let mut best: Option<(f64, &NodeId)> = None;

        for node in candidates {
            if !self.selection.matches(node) {
                continue;
            }
            let Some(score) = node.primary_span.as_ref().and_then(|s| self.score(s)) else {
                continue;
            };
            let better = match best {
                None => true,
                Some((best_score, best_id)) => {
                    score > best_score || (score == best_score && &node.id < best_id)
                }
            };
            if better {
                best = Some((score, &node.id));
            }
        }

        best.map(|(_, id)| id.clone())
    }
}
