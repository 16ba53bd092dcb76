//! Agreement evaluation between a hypothesis and a reference system
//!
//! A run discovers the documents both systems annotated, evaluates each one
//! in two sweeps (hypothesis nodes against reference nodes, then the
//! converse), streams per-node audit records to a result sink and folds the
//! per-document counts into a single summary.

mod cancel;
mod closest;
mod counts;
mod error;
mod evaluator;
mod export;
mod matcher;
mod runner;
mod status;
mod summary;

pub use cancel::CancellationToken;
pub use closest::{ClosestFinder, CLOSEST_MATCH_LIMIT};
pub use counts::{Aggregator, CoOccurrenceCounts};
pub use error::{EvalResult, EvaluationError, RunError};
pub use evaluator::{
    DocumentEvaluation, HitMissPolicy, Phase, RecordBuffer, RECORD_BATCH_SIZE, SUBJECT_PAGE_SIZE,
    SUBJECT_SCAN_KEEP_ALIVE,
};
pub use export::{escape_values, write_csv, CSV_HEADER};
pub use matcher::{MatchContext, MatchOutcome, Matcher, MATCH_PAGE_SIZE, CANDIDATE_SCAN_KEEP_ALIVE};
pub use runner::{AnalysisRunner, RunOptions, DOCUMENT_PAGE_SIZE};
pub use status::TaskStatus;
pub use summary::{AnalysisSummary, HitMissMetrics, MappingSummary, Metrics, StandardMetrics, UnitSummary};
