//! Evaluation and run errors

use crate::model::NodeId;
use crate::storage::StorageError;
use thiserror::Error;

/// Failure while evaluating one document
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Node {id} of {system} has no location")]
    MissingSpan { system: String, id: NodeId },

    #[error("Node {from} of {system} references missing node {target}")]
    DanglingReference {
        system: String,
        from: NodeId,
        target: NodeId,
    },

    #[error("Evaluation cancelled")]
    Cancelled,
}

/// Result type for evaluation operations
pub type EvalResult<T> = Result<T, EvaluationError>;

/// Failure of a whole analysis run
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Analysis {analysis_id} failed on document {document_id}: {source}")]
    Document {
        analysis_id: String,
        document_id: String,
        source: EvaluationError,
    },

    #[error("Analysis {analysis_id} failed: {source}")]
    Analysis {
        analysis_id: String,
        source: EvaluationError,
    },

    #[error("Analysis {0} cancelled")]
    Cancelled(String),
}

impl RunError {
    pub fn analysis_id(&self) -> &str {
        match self {
            RunError::Document { analysis_id, .. } | RunError::Analysis { analysis_id, .. } => {
                analysis_id
            }
            RunError::Cancelled(analysis_id) => analysis_id,
        }
    }
}
