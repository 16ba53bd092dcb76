//! Agreement: span-aware agreement evaluation between annotation systems
//!
//! Compares the output of a hypothesis annotation system against a
//! reference system over a shared corpus. Nodes are paired by text span
//! (optionally within a fuzz distance) and by configurable feature
//! equivalence tests, producing per-node audit records and precision,
//! recall and F-measure (or hit/miss accuracy) for the run.
//!
//! # Core Concepts
//!
//! - **Units of analysis**: the system, type and attribute filters selecting
//!   the nodes each side contributes
//! - **Feature value mappings**: value translation tables plus an
//!   equivalence test applied per feature
//! - **Runs**: one configured evaluation over every document both systems
//!   annotated
//!
//! # Example
//!
//! ```
//! use agreement::{AnalysisConfig, AnalysisRunner, MemoryStore, UnitOfAnalysis};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let config = AnalysisConfig::new(
//!     UnitOfAnalysis::new("hypothesis", "Token"),
//!     UnitOfAnalysis::new("reference", "Token"),
//!     "demo",
//! );
//! let runner = AnalysisRunner::new(store.clone(), store.clone(), store);
//! let summary = runner.run("run-1", &config).unwrap();
//! assert_eq!(summary.documents, 0);
//! ```

pub mod config;
pub mod equivalence;
pub mod evaluation;
pub mod model;
pub mod query;
pub mod storage;

pub use config::{AnalysisConfig, ConfigError, FilterOption, UnitFilter, UnitOfAnalysis};
pub use equivalence::{
    EquivalenceTest, Feature, FeatureValueMapping, FeatureValueTester, MatchDirection,
    ValueMapping,
};
pub use evaluation::{
    AnalysisRunner, AnalysisSummary, CancellationToken, CoOccurrenceCounts, EvaluationError,
    HitMissPolicy, Metrics, RunError, RunOptions, TaskStatus,
};
pub use model::{AnnotationNode, Classification, MatchRecord, NodeId, Span, Value};
pub use query::{CandidateQuery, LocationPropagator, NearestQuery, SpanWindow};
pub use storage::{
    AnnotationStore, MemoryStore, OpenStore, ResultSink, SqliteStore, StatusSink, StorageError,
    StorageResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
