//! Validated analysis configuration

use crate::equivalence::{Feature, FeatureValueMapping};
use crate::model::{AnnotationNode, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ConfigError;

/// How a unit-of-analysis filter compares its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOption {
    /// Attribute equals any of the whitespace/comma separated terms
    In,
    /// Attribute equals the value
    Equals,
}

impl FromStr for FilterOption {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(FilterOption::In),
            "equals" => Ok(FilterOption::Equals),
            other => Err(ConfigError::UnknownFilterOption(other.to_string())),
        }
    }
}

/// One attribute constraint narrowing a unit of analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFilter {
    pub feature: String,
    pub option: FilterOption,
    pub value: String,
}

impl UnitFilter {
    pub fn new(feature: impl Into<String>, option: FilterOption, value: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            option,
            value: value.into(),
        }
    }

    /// Check a node's attribute against the filter
    ///
    /// Collection attributes pass when any member passes. Missing and null
    /// attributes never pass.
    pub fn matches(&self, node: &AnnotationNode) -> bool {
        let Some(value) = node.attribute(&self.feature) else {
            return false;
        };

        let texts: Vec<String> = match value.as_collection() {
            Some(items) => items.iter().filter_map(Value::as_text).collect(),
            None => value.as_text().into_iter().collect(),
        };

        match self.option {
            FilterOption::Equals => texts.iter().any(|t| t == &self.value),
            FilterOption::In => {
                let terms: Vec<&str> = self
                    .value
                    .split(|c: char| c.is_whitespace() || c == ',')
                    .filter(|t| !t.is_empty())
                    .collect();
                texts.iter().any(|t| terms.contains(&t.as_str()))
            }
        }
    }
}

/// The set of nodes one system contributes to an analysis
///
/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitOfAnalysis {
    system: String,
    type_name: String,
    filters: Vec<UnitFilter>,
}

impl UnitOfAnalysis {
    pub fn new(system: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            type_name: type_name.into(),
            filters: Vec::new(),
        }
    }

    pub fn with_filter(mut self, filter: UnitFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn filters(&self) -> &[UnitFilter] {
        &self.filters
    }
}

impl fmt::Display for UnitOfAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.system, self.type_name)
    }
}

/// Scoring mode and inputs for one analysis run
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub(crate) hypothesis: UnitOfAnalysis,
    pub(crate) reference: UnitOfAnalysis,
    pub(crate) instance: String,
    pub(crate) description: String,
    pub(crate) fuzz_distance: usize,
    pub(crate) hit_miss: bool,
    pub(crate) feature_value_mappings: Vec<FeatureValueMapping>,
}

impl AnalysisConfig {
    /// Build a configuration directly, bypassing document parsing
    pub fn new(
        hypothesis: UnitOfAnalysis,
        reference: UnitOfAnalysis,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            hypothesis,
            reference,
            instance: instance.into(),
            description: String::new(),
            fuzz_distance: 0,
            hit_miss: false,
            feature_value_mappings: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_fuzz_distance(mut self, fuzz_distance: usize) -> Self {
        self.fuzz_distance = fuzz_distance;
        self
    }

    pub fn with_hit_miss(mut self, hit_miss: bool) -> Self {
        self.hit_miss = hit_miss;
        self
    }

    pub fn with_mapping(mut self, mapping: FeatureValueMapping) -> Self {
        self.feature_value_mappings.push(mapping);
        self
    }

    pub fn hypothesis(&self) -> &UnitOfAnalysis {
        &self.hypothesis
    }

    pub fn reference(&self) -> &UnitOfAnalysis {
        &self.reference
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn fuzz_distance(&self) -> usize {
        self.fuzz_distance
    }

    pub fn is_hit_miss(&self) -> bool {
        self.hit_miss
    }

    pub fn feature_value_mappings(&self) -> &[FeatureValueMapping] {
        &self.feature_value_mappings
    }

    /// Name of the index results are written under
    pub fn analysis_index(&self) -> String {
        format!("{}analysis", self.instance)
    }

    /// Features read from hypothesis nodes, in mapping order
    pub fn hypothesis_features(&self) -> impl Iterator<Item = &Feature> {
        self.feature_value_mappings.iter().map(|m| m.hypothesis_feature())
    }
}
