//! Wire shape of analysis configuration documents
//!
//! Every field is optional here so that validation can report exactly which
//! required key is missing instead of a generic parse error.

use super::types::{AnalysisConfig, FilterOption, UnitFilter, UnitOfAnalysis};
use super::ConfigError;
use crate::equivalence::{EquivalenceTest, Feature, FeatureValueMapping, ValueMapping};
use crate::model::Value;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RawAnalysisConfig {
    hypothesis_unit_of_analysis: Option<RawUnit>,
    reference_unit_of_analysis: Option<RawUnit>,
    instance: Option<String>,
    description: Option<String>,
    feature_value_mappings: Option<Vec<RawFeatureValueMapping>>,
    fuzz_distance: Option<i64>,
    hit_miss: Option<RawFlag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUnit {
    selected_system: Option<String>,
    selected_type: Option<String>,
    #[serde(default)]
    filters: Vec<RawFilter>,
}

#[derive(Debug, Deserialize)]
struct RawFilter {
    feature: Option<RawFeature>,
    option: Option<String>,
    value: Option<serde_json::Value>,
}

/// A feature is either a bare attribute name or an object
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFeature {
    Name(String),
    Detailed(RawFeatureObject),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFeatureObject {
    name: Option<String>,
    feature: Option<RawFeatureName>,
    #[serde(default)]
    nested_structure: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawFeatureName {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFeatureValueMapping {
    hypothesis_feature: Option<RawFeature>,
    reference_feature: Option<RawFeature>,
    equivalence: Option<String>,
    value_mappings: Option<Vec<RawValueMapping>>,
}

#[derive(Debug, Deserialize)]
struct RawValueMapping {
    from: Option<Value>,
    to: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Text(String),
}

fn required<T>(value: Option<T>, key: impl Into<String>) -> Result<T, ConfigError> {
    value.ok_or_else(|| ConfigError::MissingKey(key.into()))
}

impl RawAnalysisConfig {
    pub(super) fn validate(self) -> Result<AnalysisConfig, ConfigError> {
        let hypothesis = required(self.hypothesis_unit_of_analysis, "hypothesisUnitOfAnalysis")?
            .validate("hypothesisUnitOfAnalysis")?;
        let reference = required(self.reference_unit_of_analysis, "referenceUnitOfAnalysis")?
            .validate("referenceUnitOfAnalysis")?;
        let instance = required(self.instance, "instance")?;
        let description = required(self.description, "description")?;

        let feature_value_mappings = required(self.feature_value_mappings, "featureValueMappings")?
            .into_iter()
            .enumerate()
            .map(|(i, raw)| raw.validate(&format!("featureValueMappings[{}]", i)))
            .collect::<Result<Vec<_>, _>>()?;

        let fuzz_distance = required(self.fuzz_distance, "fuzzDistance")?;
        let fuzz_distance = usize::try_from(fuzz_distance).map_err(|_| ConfigError::InvalidValue {
            key: "fuzzDistance".into(),
            reason: format!("must be a non-negative integer, got {}", fuzz_distance),
        })?;

        let hit_miss = match required(self.hit_miss, "hitMiss")? {
            RawFlag::Bool(b) => b,
            // Anything other than "true" reads as false
            RawFlag::Text(text) => text.eq_ignore_ascii_case("true"),
        };

        Ok(AnalysisConfig {
            hypothesis,
            reference,
            instance,
            description,
            fuzz_distance,
            hit_miss,
            feature_value_mappings,
        })
    }
}

impl RawUnit {
    fn validate(self, key: &str) -> Result<UnitOfAnalysis, ConfigError> {
        let system = required(self.selected_system, format!("{}.selectedSystem", key))?;
        let type_name = required(self.selected_type, format!("{}.selectedType", key))?;

        let mut unit = UnitOfAnalysis::new(system, type_name);
        for (i, filter) in self.filters.into_iter().enumerate() {
            unit = unit.with_filter(filter.validate(&format!("{}.filters[{}]", key, i))?);
        }
        Ok(unit)
    }
}

impl RawFilter {
    fn validate(self, key: &str) -> Result<UnitFilter, ConfigError> {
        let feature = required(self.feature, format!("{}.feature", key))?
            .validate(&format!("{}.feature", key))?;
        if !feature.nested_structure.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: format!("{}.feature.nestedStructure", key),
                reason: "filters read the node's own attributes and cannot follow references".into(),
            });
        }
        let option: FilterOption = required(self.option, format!("{}.option", key))?.parse()?;
        let value = match required(self.value, format!("{}.value", key))? {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(UnitFilter::new(feature.name, option, value))
    }
}

impl RawFeature {
    fn validate(self, key: &str) -> Result<Feature, ConfigError> {
        match self {
            RawFeature::Name(name) => Ok(Feature::new(name)),
            RawFeature::Detailed(object) => {
                let name = object
                    .name
                    .or_else(|| object.feature.and_then(|f| f.name))
                    .ok_or_else(|| ConfigError::MissingKey(format!("{}.name", key)))?;
                Ok(Feature::new(name).with_path(object.nested_structure))
            }
        }
    }
}

impl RawFeatureValueMapping {
    fn validate(self, key: &str) -> Result<FeatureValueMapping, ConfigError> {
        let hypothesis_feature = required(self.hypothesis_feature, format!("{}.hypothesisFeature", key))?
            .validate(&format!("{}.hypothesisFeature", key))?;
        let reference_feature = required(self.reference_feature, format!("{}.referenceFeature", key))?
            .validate(&format!("{}.referenceFeature", key))?;
        let equivalence: EquivalenceTest =
            required(self.equivalence, format!("{}.equivalence", key))?.parse()?;

        let mut values = ValueMapping::new();
        let pairs = required(self.value_mappings, format!("{}.valueMappings", key))?;
        for (i, pair) in pairs.into_iter().enumerate() {
            let from = required(pair.from, format!("{}.valueMappings[{}].from", key, i))?;
            let to = required(pair.to, format!("{}.valueMappings[{}].to", key, i))?;
            values.insert(from, to);
        }

        Ok(FeatureValueMapping::new(
            hypothesis_feature,
            reference_feature,
            equivalence,
            values,
        ))
    }
}
