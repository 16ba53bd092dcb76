//! Per-document co-occurrence evaluation

use super::closest::CLOSEST_MATCH_LIMIT;
use super::counts::CoOccurrenceCounts;
use super::error::EvalResult;
use super::matcher::{MatchContext, MatchOutcome};
use crate::equivalence::MatchDirection;
use crate::model::{AnnotationNode, Classification, MatchRecord};
use crate::query::CandidateQuery;
use crate::storage::{ResultSink, ScopedScan};
use std::time::Duration;
use tracing::{debug, trace};

/// Pending records are written once this many accumulate
pub const RECORD_BATCH_SIZE: usize = 2000;

/// Subject nodes fetched per page during a sweep
pub const SUBJECT_PAGE_SIZE: usize = 100;

/// How long an idle subject sweep stays open
pub const SUBJECT_SCAN_KEEP_ALIVE: Duration = Duration::from_secs(60);

/// What hit/miss mode does with an unmatched hypothesis node when no
/// reference node shares its exact span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HitMissPolicy {
    /// Leave the node out of the counts and records
    #[default]
    DropUnlocated,
    /// Count the node as a miss
    CountAsMiss,
}

/// Sweep a document evaluation has reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Hypothesis nodes are matched against reference nodes
    ScanHypothesis,
    /// Reference nodes are matched back against hypothesis nodes
    ScanReference,
    Done,
}

/// Buffered writer of audit records
pub struct RecordBuffer<'s> {
    sink: &'s dyn ResultSink,
    pending: Vec<MatchRecord>,
    batch_size: usize,
    written: usize,
}

impl<'s> RecordBuffer<'s> {
    pub fn new(sink: &'s dyn ResultSink, batch_size: usize) -> Self {
        Self {
            sink,
            pending: Vec::new(),
            batch_size: batch_size.max(1),
            written: 0,
        }
    }

    pub fn push(&mut self, record: MatchRecord) -> EvalResult<()> {
        self.pending.push(record);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Write everything pending; a rejected batch stays pending
    pub fn flush(&mut self) -> EvalResult<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        self.sink.bulk_write(&self.pending, self.batch_size)?;
        self.written += self.pending.len();
        debug!(records = self.pending.len(), "flushed match records");
        self.pending.clear();
        Ok(())
    }

    /// Drop pending records without writing them
    pub fn discard(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

/// Evaluation of one document, advanced sweep by sweep
///
/// The hypothesis sweep classifies every hypothesis node as a true or false
/// positive. The reference sweep, skipped in hit/miss mode, classifies every
/// reference node without a counterpart as a false negative.
pub struct DocumentEvaluation<'a> {
    ctx: MatchContext<'a>,
    analysis_id: &'a str,
    analysis_index: String,
    document_id: &'a str,
    policy: HitMissPolicy,
    phase: Phase,
    counts: CoOccurrenceCounts,
}

impl<'a> DocumentEvaluation<'a> {
    pub fn new(
        ctx: MatchContext<'a>,
        analysis_id: &'a str,
        document_id: &'a str,
        policy: HitMissPolicy,
    ) -> Self {
        Self {
            ctx,
            analysis_id,
            analysis_index: ctx.config.analysis_index(),
            document_id,
            policy,
            phase: Phase::ScanHypothesis,
            counts: CoOccurrenceCounts::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn counts(&self) -> CoOccurrenceCounts {
        self.counts
    }

    /// Run the current sweep and move to the next phase
    pub fn step(&mut self, buffer: &mut RecordBuffer<'_>) -> EvalResult<Phase> {
        match self.phase {
            Phase::ScanHypothesis => {
                self.sweep(MatchDirection::Normal, buffer)?;
                self.phase = if self.ctx.config.is_hit_miss() {
                    Phase::Done
                } else {
                    Phase::ScanReference
                };
            }
            Phase::ScanReference => {
                self.sweep(MatchDirection::Converse, buffer)?;
                self.phase = Phase::Done;
            }
            Phase::Done => {}
        }
        Ok(self.phase)
    }

    /// Run every remaining sweep and flush the document's records
    pub fn run(mut self, buffer: &mut RecordBuffer<'_>) -> EvalResult<CoOccurrenceCounts> {
        while self.step(buffer)? != Phase::Done {}
        buffer.flush()?;

        debug!(
            document = %self.document_id,
            both = self.counts.both,
            first_only = self.counts.first_only,
            second_only = self.counts.second_only,
            "document evaluated"
        );
        Ok(self.counts)
    }

    fn sweep(&mut self, direction: MatchDirection, buffer: &mut RecordBuffer<'_>) -> EvalResult<()> {
        let unit = match direction {
            MatchDirection::Normal => self.ctx.config.hypothesis(),
            MatchDirection::Converse => self.ctx.config.reference(),
        };
        let query = CandidateQuery::for_unit(unit, self.document_id);
        let mut scan = ScopedScan::open(self.ctx.store, &query, SUBJECT_PAGE_SIZE, SUBJECT_SCAN_KEEP_ALIVE)?;

        loop {
            self.ctx.cancel.check()?;
            let page = scan.next_page()?;
            if page.is_empty() {
                return Ok(());
            }
            for subject in &page {
                match direction {
                    MatchDirection::Normal => self.evaluate_hypothesis(subject, buffer)?,
                    MatchDirection::Converse => self.evaluate_reference(subject, buffer)?,
                }
            }
        }
    }

    fn evaluate_hypothesis(
        &mut self,
        subject: &AnnotationNode,
        buffer: &mut RecordBuffer<'_>,
    ) -> EvalResult<()> {
        let hit_miss = self.ctx.config.is_hit_miss();
        let outcome = self
            .ctx
            .matcher(subject, MatchDirection::Normal)?
            .find_match()?;

        let (classification, second_id) = match &outcome.matching_id {
            Some(id) => {
                self.counts.increment_both();
                (Classification::TruePositive, Some(id.clone()))
            }
            None => {
                let limit = if hit_miss { 0 } else { CLOSEST_MATCH_LIMIT };
                let closest = self
                    .ctx
                    .closest(MatchDirection::Normal, self.document_id, Some(outcome.span))
                    .find(limit)?;

                // In hit/miss mode only a reference node on the exact span makes a miss
                if hit_miss && closest.is_none() && self.policy == HitMissPolicy::DropUnlocated {
                    trace!(node = %subject.id, "no reference node on span, dropped");
                    return Ok(());
                }

                self.counts.increment_first_only();
                (Classification::FalsePositive, closest)
            }
        };

        let record = MatchRecord {
            first_id: Some(subject.id.clone()),
            first_is_present: true,
            first_matches: true,
            first_values: outcome.subject_values.clone(),
            second_id,
            second_is_present: outcome.had_present,
            second_matches: outcome.is_match(),
            second_values: outcome.candidate_values.clone(),
            ..self.record_base(classification, &outcome)
        };
        buffer.push(record)
    }

    fn evaluate_reference(
        &mut self,
        subject: &AnnotationNode,
        buffer: &mut RecordBuffer<'_>,
    ) -> EvalResult<()> {
        let outcome = self
            .ctx
            .matcher(subject, MatchDirection::Converse)?
            .find_match()?;

        // Matched reference nodes were already counted by the hypothesis sweep
        if outcome.is_match() {
            return Ok(());
        }

        self.counts.increment_second_only();
        let closest = self
            .ctx
            .closest(MatchDirection::Converse, self.document_id, Some(outcome.span))
            .find(CLOSEST_MATCH_LIMIT)?;

        let record = MatchRecord {
            first_id: closest,
            first_is_present: outcome.had_present,
            first_matches: false,
            first_values: outcome.candidate_values.clone(),
            second_id: Some(subject.id.clone()),
            second_is_present: true,
            second_matches: true,
            second_values: outcome.subject_values.clone(),
            ..self.record_base(Classification::FalseNegative, &outcome)
        };
        buffer.push(record)
    }

    fn record_base(&self, classification: Classification, outcome: &MatchOutcome) -> MatchRecord {
        MatchRecord {
            record_id: MatchRecord::new_record_id(),
            index: self.analysis_index.clone(),
            analysis_id: self.analysis_id.to_string(),
            classification,
            first_system: self.ctx.config.hypothesis().system().to_string(),
            first_id: None,
            first_is_present: false,
            first_matches: false,
            first_values: String::new(),
            second_system: self.ctx.config.reference().system().to_string(),
            second_id: None,
            second_is_present: false,
            second_matches: false,
            second_values: String::new(),
            document_id: self.document_id.to_string(),
            span: outcome.span,
        }
    }
}
