//! Feature value mappings and the testers built from them

use super::algebra::EquivalenceTest;
use crate::evaluation::{EvalResult, EvaluationError};
use crate::model::{AnnotationNode, NodeId, Value};
use crate::storage::AnnotationStore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Path to an attribute value, possibly through references
///
/// With an empty `nested_structure` the value is the node's own attribute.
/// Otherwise each path step follows the named reference, expanding array and
/// list containers into their members along the way, and the attribute is
/// read from every node reached at the end of the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested_structure: Vec<String>,
}

impl Feature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nested_structure: Vec::new(),
        }
    }

    pub fn with_path(mut self, path: Vec<String>) -> Self {
        self.nested_structure = path;
        self
    }

    /// Read this feature's value off a node of `system`
    ///
    /// A missing attribute or a missing reference reads as null. A single
    /// collected value is returned as-is; several are returned as a list.
    pub fn read(
        &self,
        node: &AnnotationNode,
        system: &str,
        store: &dyn AnnotationStore,
    ) -> EvalResult<Value> {
        if self.nested_structure.is_empty() {
            return Ok(node.attribute(&self.name).cloned().unwrap_or_default());
        }

        let mut collected = Vec::new();
        self.collect(node, 0, system, store, &mut collected)?;

        if collected.len() == 1 {
            Ok(collected.remove(0))
        } else {
            Ok(Value::List(collected))
        }
    }

    fn collect(
        &self,
        node: &AnnotationNode,
        level: usize,
        system: &str,
        store: &dyn AnnotationStore,
        out: &mut Vec<Value>,
    ) -> EvalResult<()> {
        if node.is_container() {
            for child in &node.children {
                let member = fetch(store, system, &node.id, child)?;
                self.collect(&member, level, system, store, out)?;
            }
            return Ok(());
        }

        if level == self.nested_structure.len() {
            match node.attribute(&self.name) {
                Some(value) => match value.as_collection() {
                    Some(items) => out.extend(items.iter().cloned()),
                    None => out.push(value.clone()),
                },
                None => out.push(Value::Null),
            }
            return Ok(());
        }

        match node.references.get(&self.nested_structure[level]) {
            Some(target) => {
                let next = fetch(store, system, &node.id, target)?;
                self.collect(&next, level + 1, system, store, out)
            }
            None => {
                out.push(Value::Null);
                Ok(())
            }
        }
    }
}

fn fetch(
    store: &dyn AnnotationStore,
    system: &str,
    from: &NodeId,
    target: &NodeId,
) -> EvalResult<AnnotationNode> {
    store
        .get(system, target)?
        .ok_or_else(|| EvaluationError::DanglingReference {
            system: system.to_string(),
            from: from.clone(),
            target: target.clone(),
        })
}

/// Bidirectional hypothesis-to-reference value table
///
/// Both directions are built together from the same pairs, so the converse
/// table is always the exact inverse relation of the forward table. Values
/// without an entry map to themselves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueMapping {
    forward: HashMap<Value, Vec<Value>>,
    converse: HashMap<Value, Vec<Value>>,
}

impl ValueMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (Value, Value)>) -> Self {
        let mut mapping = Self::new();
        for (from, to) in pairs {
            mapping.insert(from, to);
        }
        mapping
    }

    /// Record that hypothesis value `from` corresponds to reference value `to`
    pub fn insert(&mut self, from: Value, to: Value) {
        push_unique(self.converse.entry(to.clone()).or_default(), from.clone());
        push_unique(self.forward.entry(from).or_default(), to);
    }

    /// Reference-side values for a hypothesis value
    pub fn map_forward(&self, raw: &Value) -> Vec<Value> {
        lookup(&self.forward, raw)
    }

    /// Hypothesis-side values for a reference value
    pub fn map_converse(&self, raw: &Value) -> Vec<Value> {
        lookup(&self.converse, raw)
    }

    pub fn forward(&self) -> &HashMap<Value, Vec<Value>> {
        &self.forward
    }

    pub fn converse(&self) -> &HashMap<Value, Vec<Value>> {
        &self.converse
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

fn push_unique(values: &mut Vec<Value>, value: Value) {
    if !values.contains(&value) {
        values.push(value);
    }
}

fn lookup(table: &HashMap<Value, Vec<Value>>, raw: &Value) -> Vec<Value> {
    table.get(raw).cloned().unwrap_or_else(|| vec![raw.clone()])
}

/// Which side of the comparison the subject node comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDirection {
    /// Subject is a hypothesis node, candidates are reference nodes
    Normal,
    /// Subject is a reference node, candidates are hypothesis nodes
    Converse,
}

/// One configured hypothesis/reference feature pairing
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureValueMapping {
    hypothesis_feature: Feature,
    reference_feature: Feature,
    equivalence: EquivalenceTest,
    values: ValueMapping,
}

impl FeatureValueMapping {
    pub fn new(
        hypothesis_feature: Feature,
        reference_feature: Feature,
        equivalence: EquivalenceTest,
        values: ValueMapping,
    ) -> Self {
        Self {
            hypothesis_feature,
            reference_feature,
            equivalence,
            values,
        }
    }

    pub fn hypothesis_feature(&self) -> &Feature {
        &self.hypothesis_feature
    }

    pub fn reference_feature(&self) -> &Feature {
        &self.reference_feature
    }

    pub fn equivalence(&self) -> EquivalenceTest {
        self.equivalence
    }

    pub fn values(&self) -> &ValueMapping {
        &self.values
    }

    /// Build the tester a subject node applies to candidates
    ///
    /// In the converse direction the subject is read with the reference
    /// feature, mapped through the converse table and compared with the
    /// converse test, so that `(h, r)` under the forward test agrees with
    /// `(r, h)` under the converse test.
    pub fn tester(
        &self,
        subject: &AnnotationNode,
        direction: MatchDirection,
        hypothesis_system: &str,
        reference_system: &str,
        store: &dyn AnnotationStore,
    ) -> EvalResult<FeatureValueTester> {
        let tester = match direction {
            MatchDirection::Normal => {
                let raw = self.hypothesis_feature.read(subject, hypothesis_system, store)?;
                FeatureValueTester {
                    mapped_values: self.values.map_forward(&raw),
                    equivalence: self.equivalence,
                    candidate_feature: self.reference_feature.clone(),
                    candidate_system: reference_system.to_string(),
                }
            }
            MatchDirection::Converse => {
                let raw = self.reference_feature.read(subject, reference_system, store)?;
                FeatureValueTester {
                    mapped_values: self.values.map_converse(&raw),
                    equivalence: self.equivalence.converse(),
                    candidate_feature: self.hypothesis_feature.clone(),
                    candidate_system: hypothesis_system.to_string(),
                }
            }
        };
        Ok(tester)
    }
}

/// Candidate predicate bound to one subject's mapped values
///
/// A candidate passes when any mapped value passes the equivalence test
/// against the candidate's own value.
#[derive(Debug, Clone)]
pub struct FeatureValueTester {
    mapped_values: Vec<Value>,
    equivalence: EquivalenceTest,
    candidate_feature: Feature,
    candidate_system: String,
}

impl FeatureValueTester {
    pub fn mapped_values(&self) -> &[Value] {
        &self.mapped_values
    }

    pub fn equivalence(&self) -> EquivalenceTest {
        self.equivalence
    }

    /// The candidate-side value this tester compares against
    pub fn candidate_value(
        &self,
        candidate: &AnnotationNode,
        store: &dyn AnnotationStore,
    ) -> EvalResult<Value> {
        self.candidate_feature.read(candidate, &self.candidate_system, store)
    }

    pub fn test(&self, candidate: &AnnotationNode, store: &dyn AnnotationStore) -> EvalResult<bool> {
        let value = self.candidate_value(candidate, store)?;
        Ok(self.test_value(&value))
    }

    pub fn test_value(&self, candidate_value: &Value) -> bool {
        self.mapped_values
            .iter()
            .any(|mapped| self.equivalence.test(mapped, candidate_value))
    }

    /// Mapped values rendered for audit records
    pub fn describe_mapped(&self) -> String {
        if self.mapped_values.len() == 1 {
            self.mapped_values[0].to_string()
        } else {
            Value::Set(self.mapped_values.clone()).to_string()
        }
    }
}
