//! Span-windowed matching of one subject node against candidates

use super::cancel::CancellationToken;
use super::closest::ClosestFinder;
use super::error::{EvalResult, EvaluationError};
use crate::config::{AnalysisConfig, UnitOfAnalysis};
use crate::equivalence::{FeatureValueTester, MatchDirection};
use crate::model::{AnnotationNode, NodeId, Span, Value};
use crate::query::{CandidateQuery, SpanWindow};
use crate::storage::{AnnotationStore, ScopedScan};
use std::time::Duration;

/// Candidates fetched per page while matching
pub const MATCH_PAGE_SIZE: usize = 50;

/// How long an idle candidate scan stays open
pub const CANDIDATE_SCAN_KEEP_ALIVE: Duration = Duration::from_secs(120);

/// Immutable inputs shared by every matcher and finder of a run
#[derive(Clone, Copy)]
pub struct MatchContext<'a> {
    pub store: &'a dyn AnnotationStore,
    pub config: &'a AnalysisConfig,
    pub cancel: &'a CancellationToken,
}

impl<'a> MatchContext<'a> {
    pub fn new(
        store: &'a dyn AnnotationStore,
        config: &'a AnalysisConfig,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            store,
            config,
            cancel,
        }
    }

    /// Units of the subject's side and the candidates' side
    fn sides(&self, direction: MatchDirection) -> (&'a UnitOfAnalysis, &'a UnitOfAnalysis) {
        match direction {
            MatchDirection::Normal => (self.config.hypothesis(), self.config.reference()),
            MatchDirection::Converse => (self.config.reference(), self.config.hypothesis()),
        }
    }

    /// Build a matcher for one subject node
    ///
    /// Fails if the subject has no span to anchor the candidate window.
    pub fn matcher(
        &self,
        subject: &AnnotationNode,
        direction: MatchDirection,
    ) -> EvalResult<Matcher<'a>> {
        let (own, other) = self.sides(direction);
        let span = subject
            .primary_span
            .ok_or_else(|| EvaluationError::MissingSpan {
                system: own.system().to_string(),
                id: subject.id.clone(),
            })?;

        let testers = self
            .config
            .feature_value_mappings()
            .iter()
            .map(|mapping| {
                mapping.tester(
                    subject,
                    direction,
                    self.config.hypothesis().system(),
                    self.config.reference().system(),
                    self.store,
                )
            })
            .collect::<EvalResult<Vec<_>>>()?;

        let query = CandidateQuery::for_unit(other, subject.document_id.clone())
            .within(SpanWindow::for_fuzz(span, self.config.fuzz_distance()));

        Ok(Matcher {
            ctx: *self,
            span,
            testers,
            query,
        })
    }

    /// Finder for the node of `direction`'s candidate side closest to a span
    pub fn closest(
        &self,
        direction: MatchDirection,
        document_id: &'a str,
        span: Option<Span>,
    ) -> ClosestFinder<'a> {
        let (_, other) = self.sides(direction);
        ClosestFinder::new(self.store, other, document_id, span)
    }
}

/// Result of matching one subject
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    /// First candidate in the window passing every tester
    pub matching_id: Option<NodeId>,
    /// Whether any candidate was inside the window
    pub had_present: bool,
    /// The subject's span
    pub span: Span,
    /// Mapped subject values, one entry per tester
    pub subject_values: String,
    /// Values of the matching candidate, else of the first candidate seen
    pub candidate_values: String,
}

impl MatchOutcome {
    pub fn is_match(&self) -> bool {
        self.matching_id.is_some()
    }
}

/// Matches one subject against the candidates inside its span window
///
/// Every configured tester must pass for a candidate to match.
pub struct Matcher<'a> {
    ctx: MatchContext<'a>,
    span: Span,
    testers: Vec<FeatureValueTester>,
    query: CandidateQuery,
}

impl Matcher<'_> {
    pub fn query(&self) -> &CandidateQuery {
        &self.query
    }

    pub fn find_match(&self) -> EvalResult<MatchOutcome> {
        let store = self.ctx.store;
        let subject_values = join(self.testers.iter().map(FeatureValueTester::describe_mapped));

        let mut scan = ScopedScan::open(store, &self.query, MATCH_PAGE_SIZE, CANDIDATE_SCAN_KEEP_ALIVE)?;
        let mut had_present = false;
        let mut first_seen: Option<String> = None;

        loop {
            self.ctx.cancel.check()?;
            let page = scan.next_page()?;
            if page.is_empty() {
                break;
            }

            for candidate in &page {
                had_present = true;
                let values = self
                    .testers
                    .iter()
                    .map(|t| t.candidate_value(candidate, store))
                    .collect::<EvalResult<Vec<Value>>>()?;
                let described = join(values.iter().map(Value::to_string));

                if self.testers.iter().zip(&values).all(|(t, v)| t.test_value(v)) {
                    return Ok(MatchOutcome {
                        matching_id: Some(candidate.id.clone()),
                        had_present,
                        span: self.span,
                        subject_values,
                        candidate_values: described,
                    });
                }
                first_seen.get_or_insert(described);
            }
        }

        Ok(MatchOutcome {
            matching_id: None,
            had_present,
            span: self.span,
            subject_values,
            candidate_values: first_seen.unwrap_or_default(),
        })
    }
}

fn join(parts: impl Iterator<Item = String>) -> String {
    parts.collect::<Vec<_>>().join("; ")
}
