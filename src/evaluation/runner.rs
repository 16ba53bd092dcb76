//! Analysis runs across every shared document

use super::cancel::CancellationToken;
use super::counts::Aggregator;
use super::error::{EvalResult, EvaluationError, RunError};
use super::evaluator::{DocumentEvaluation, HitMissPolicy, RecordBuffer, RECORD_BATCH_SIZE};
use super::matcher::MatchContext;
use super::status::TaskStatus;
use super::summary::AnalysisSummary;
use crate::config::AnalysisConfig;
use crate::storage::{AnnotationStore, ResultSink, StatusSink};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Document ids fetched per discovery page
pub const DOCUMENT_PAGE_SIZE: usize = 100;

/// Knobs of an analysis run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub hit_miss_policy: HitMissPolicy,
    /// Skip documents that fail instead of aborting the run
    pub isolate_document_failures: bool,
    pub record_batch_size: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            hit_miss_policy: HitMissPolicy::default(),
            isolate_document_failures: false,
            record_batch_size: RECORD_BATCH_SIZE,
        }
    }
}

/// Drives a configured analysis over the documents both systems annotated
pub struct AnalysisRunner {
    store: Arc<dyn AnnotationStore>,
    results: Arc<dyn ResultSink>,
    status: Arc<dyn StatusSink>,
    options: RunOptions,
    cancel: CancellationToken,
}

impl AnalysisRunner {
    pub fn new(
        store: Arc<dyn AnnotationStore>,
        results: Arc<dyn ResultSink>,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            store,
            results,
            status,
            options: RunOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Token that stops this runner at its next document or page boundary
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn new_analysis_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Sorted ids of documents annotated by both systems
    pub fn shared_documents(&self, config: &AnalysisConfig) -> EvalResult<Vec<String>> {
        let hypothesis = self.document_ids(config.hypothesis().system())?;
        let reference = self.document_ids(config.reference().system())?;
        Ok(hypothesis.intersection(&reference).cloned().collect())
    }

    fn document_ids(&self, system: &str) -> EvalResult<BTreeSet<String>> {
        let mut ids = BTreeSet::new();
        let mut offset = 0;
        loop {
            self.cancel.check()?;
            let page = self.store.document_ids_page(system, offset, DOCUMENT_PAGE_SIZE)?;
            let fetched = page.len();
            ids.extend(page);
            if fetched < DOCUMENT_PAGE_SIZE {
                return Ok(ids);
            }
            offset += fetched;
        }
    }

    /// Evaluate every shared document and write the run summary
    ///
    /// On failure the status sink is marked failed with the error message.
    pub fn run(&self, analysis_id: &str, config: &AnalysisConfig) -> Result<AnalysisSummary, RunError> {
        info!(
            analysis_id,
            hypothesis = %config.hypothesis(),
            reference = %config.reference(),
            hit_miss = config.is_hit_miss(),
            "starting analysis"
        );

        let mut status = TaskStatus::started(0);
        match self.perform(analysis_id, config, &mut status) {
            Ok(summary) => {
                info!(
                    analysis_id,
                    documents = summary.documents,
                    failed = summary.failed_documents.len(),
                    "analysis finished"
                );
                Ok(summary)
            }
            Err(err) => {
                error!(analysis_id, error = %err, "analysis failed");
                status.fail(err.to_string());
                if let Err(e) = self.status.update_status(analysis_id, &status) {
                    error!(analysis_id, error = %e, "failed to record analysis failure");
                }
                Err(err)
            }
        }
    }

    fn perform(
        &self,
        analysis_id: &str,
        config: &AnalysisConfig,
        status: &mut TaskStatus,
    ) -> Result<AnalysisSummary, RunError> {
        let run_error = |source: EvaluationError| match source {
            EvaluationError::Cancelled => RunError::Cancelled(analysis_id.to_string()),
            source => RunError::Analysis {
                analysis_id: analysis_id.to_string(),
                source,
            },
        };

        let documents = self.shared_documents(config).map_err(run_error)?;
        *status = TaskStatus::started(documents.len());
        self.report(analysis_id, status);
        info!(analysis_id, documents = documents.len(), "shared documents found");

        let ctx = MatchContext::new(self.store.as_ref(), config, &self.cancel);
        let mut buffer = RecordBuffer::new(self.results.as_ref(), self.options.record_batch_size);
        let mut aggregator = Aggregator::new();
        let mut failed_documents = Vec::new();

        for document_id in &documents {
            self.cancel.check().map_err(run_error)?;

            let evaluation =
                DocumentEvaluation::new(ctx, analysis_id, document_id, self.options.hit_miss_policy);
            match evaluation.run(&mut buffer) {
                Ok(counts) => aggregator.merge_document(counts),
                Err(EvaluationError::Cancelled) => {
                    return Err(RunError::Cancelled(analysis_id.to_string()))
                }
                Err(source) if self.options.isolate_document_failures => {
                    // Batches flushed mid-document are already in the sink
                    let dropped = buffer.discard()
                        + self
                            .results
                            .delete_document_records(analysis_id, document_id)
                            .map_err(|e| run_error(e.into()))?;
                    warn!(
                        analysis_id,
                        document = %document_id,
                        error = %source,
                        dropped_records = dropped,
                        "document failed, skipping"
                    );
                    failed_documents.push(document_id.clone());
                }
                Err(source) => {
                    return Err(RunError::Document {
                        analysis_id: analysis_id.to_string(),
                        document_id: document_id.clone(),
                        source,
                    })
                }
            }

            status.advance();
            self.report(analysis_id, status);
        }

        buffer.flush().map_err(run_error)?;

        let (counts, merged) = aggregator.finish();
        let mut summary = AnalysisSummary::new(analysis_id, config, &counts, merged);
        summary.failed_documents = failed_documents;
        self.results
            .write_summary(&summary)
            .map_err(|e| run_error(e.into()))?;

        status.finish();
        self.report(analysis_id, status);
        Ok(summary)
    }

    /// Progress updates are best effort
    fn report(&self, analysis_id: &str, status: &TaskStatus) {
        if let Err(e) = self.status.update_status(analysis_id, status) {
            warn!(analysis_id, error = %e, "failed to update analysis status");
        }
    }
}
