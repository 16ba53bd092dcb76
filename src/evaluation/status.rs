//! Run progress reported to a status sink

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Progress of one analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub total: usize,
    pub completed: usize,
    pub finished: bool,
    pub failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl TaskStatus {
    /// A run about to process `total` documents
    pub fn started(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            finished: false,
            failed: false,
            error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn advance(&mut self) {
        self.completed += 1;
        self.updated_at = Utc::now();
    }

    pub fn finish(&mut self) {
        self.finished = true;
        self.updated_at = Utc::now();
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.finished = true;
        self.failed = true;
        self.error = Some(error.into());
        self.updated_at = Utc::now();
    }
}
