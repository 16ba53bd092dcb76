//! Per-node audit records produced by an evaluation

use super::node::{NodeId, Span};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Outcome class of one evaluated node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    TruePositive,
    FalsePositive,
    FalseNegative,
}

impl Classification {
    /// Record type name under which results are stored
    pub fn type_name(&self) -> &'static str {
        match self {
            Classification::TruePositive => "TruePositive",
            Classification::FalsePositive => "FalsePositive",
            Classification::FalseNegative => "FalseNegative",
        }
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "TruePositive" => Some(Classification::TruePositive),
            "FalsePositive" => Some(Classification::FalsePositive),
            "FalseNegative" => Some(Classification::FalseNegative),
            _ => None,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Storage key of a record: (index, type, id)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub index: String,
    pub record_type: &'static str,
    pub id: String,
}

/// One write-once audit entry
///
/// "First" is always the hypothesis side and "second" the reference side,
/// regardless of which sweep produced the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub record_id: String,
    pub index: String,
    pub analysis_id: String,
    pub classification: Classification,
    pub first_system: String,
    pub first_id: Option<NodeId>,
    pub first_is_present: bool,
    pub first_matches: bool,
    pub first_values: String,
    pub second_system: String,
    pub second_id: Option<NodeId>,
    pub second_is_present: bool,
    pub second_matches: bool,
    pub second_values: String,
    pub document_id: String,
    pub span: Span,
}

impl MatchRecord {
    /// Fresh random record id
    pub fn new_record_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn key(&self) -> RecordKey {
        RecordKey {
            index: self.index.clone(),
            record_type: self.classification.type_name(),
            id: self.record_id.clone(),
        }
    }
}
