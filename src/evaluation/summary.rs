//! Run summaries

use super::counts::CoOccurrenceCounts;
use crate::config::AnalysisConfig;
use crate::equivalence::{EquivalenceTest, Feature};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardMetrics {
    pub first_only: u64,
    pub second_only: u64,
    pub both: u64,
    pub precision: Option<f64>,
    pub recall: Option<f64>,
    pub f_measure: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HitMissMetrics {
    pub hits: u64,
    pub misses: u64,
    pub accuracy: Option<f64>,
}

/// Figures reported for a run; which set depends on the scoring mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metrics {
    Standard(StandardMetrics),
    HitMiss(HitMissMetrics),
}

impl Metrics {
    pub fn from_counts(counts: &CoOccurrenceCounts, hit_miss: bool) -> Self {
        if hit_miss {
            Metrics::HitMiss(HitMissMetrics {
                hits: counts.both,
                misses: counts.first_only,
                accuracy: counts.accuracy(),
            })
        } else {
            Metrics::Standard(StandardMetrics {
                first_only: counts.first_only,
                second_only: counts.second_only,
                both: counts.both,
                precision: counts.precision(),
                recall: counts.recall(),
                f_measure: counts.f_measure(),
            })
        }
    }
}

/// Unit of analysis as echoed in a summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSummary {
    pub system_index: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingSummary {
    pub hypothesis_feature: Feature,
    pub reference_feature: Feature,
    pub equivalence: EquivalenceTest,
}

/// Result of one finished analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub analysis_id: String,
    pub analysis_index: String,
    pub hit_miss: bool,
    pub hypothesis_unit_of_analysis: UnitSummary,
    pub reference_unit_of_analysis: UnitSummary,
    pub description: String,
    pub feature_value_mappings: Vec<MappingSummary>,
    pub fuzz_distance: usize,
    pub documents: usize,
    /// Documents skipped after an evaluation failure
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_documents: Vec<String>,
    #[serde(flatten)]
    pub metrics: Metrics,
    pub completed_at: DateTime<Utc>,
}

impl AnalysisSummary {
    pub fn new(
        analysis_id: impl Into<String>,
        config: &AnalysisConfig,
        counts: &CoOccurrenceCounts,
        documents: usize,
    ) -> Self {
        let unit = |u: &crate::config::UnitOfAnalysis| UnitSummary {
            system_index: u.system().to_string(),
            type_name: u.type_name().to_string(),
        };

        Self {
            analysis_id: analysis_id.into(),
            analysis_index: config.analysis_index(),
            hit_miss: config.is_hit_miss(),
            hypothesis_unit_of_analysis: unit(config.hypothesis()),
            reference_unit_of_analysis: unit(config.reference()),
            description: config.description().to_string(),
            feature_value_mappings: config
                .feature_value_mappings()
                .iter()
                .map(|m| MappingSummary {
                    hypothesis_feature: m.hypothesis_feature().clone(),
                    reference_feature: m.reference_feature().clone(),
                    equivalence: m.equivalence(),
                })
                .collect(),
            fuzz_distance: config.fuzz_distance(),
            documents,
            failed_documents: Vec::new(),
            metrics: Metrics::from_counts(counts, config.is_hit_miss()),
            completed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnitOfAnalysis;

    fn config(hit_miss: bool) -> AnalysisConfig {
        AnalysisConfig::new(
            UnitOfAnalysis::new("hyp", "Token"),
            UnitOfAnalysis::new("ref", "Token"),
            "bench",
        )
        .with_hit_miss(hit_miss)
    }

    #[test]
    fn test_standard_summary_serializes_flat_metrics() {
        let counts = CoOccurrenceCounts::new(2, 3, 5);
        let summary = AnalysisSummary::new("a1", &config(false), &counts, 4);
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["analysisIndex"], "benchanalysis");
        assert_eq!(json["firstOnly"], 2);
        assert_eq!(json["both"], 5);
        assert_eq!(json["hypothesisUnitOfAnalysis"]["systemIndex"], "hyp");
        assert!(json.get("accuracy").is_none());
    }

    #[test]
    fn test_hit_miss_summary_reports_accuracy_only() {
        let counts = CoOccurrenceCounts::new(1, 0, 3);
        let summary = AnalysisSummary::new("a2", &config(true), &counts, 1);
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["hits"], 3);
        assert_eq!(json["misses"], 1);
        assert_eq!(json["accuracy"], 0.75);
        assert!(json.get("precision").is_none());
    }

    #[test]
    fn test_undefined_metric_serializes_null() {
        let summary = AnalysisSummary::new("a3", &config(false), &CoOccurrenceCounts::default(), 0);
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["precision"].is_null());
    }

    #[test]
    fn test_summary_json_roundtrip() {
        let summary = AnalysisSummary::new("a4", &config(true), &CoOccurrenceCounts::new(0, 0, 2), 1);
        let json = serde_json::to_string(&summary).unwrap();
        let back: AnalysisSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }
}
