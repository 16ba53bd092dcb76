//! Equivalence tests between hypothesis and reference values

use crate::model::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Raised when a configuration names an unknown equivalence test
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid equivalence test string: {0}")]
pub struct UnknownEquivalenceTest(pub String);

/// Binary predicate over a (hypothesis, reference) value pair
///
/// Either side may be a scalar or a collection. Whenever the side a test
/// expects to be a collection is a scalar, the test falls back to a
/// simpler test (see each variant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EquivalenceTest {
    /// Some hypothesis member is in the reference collection.
    /// Scalar hypothesis: `IsIn`. Scalar reference: `Equals`.
    #[serde(rename = "any are in")]
    AnyAreIn,
    /// No hypothesis member is in the reference collection.
    /// Scalar hypothesis: `IsNotIn`. Scalar reference: `DoesNotEqual`.
    #[serde(rename = "none are in")]
    NoneAreIn,
    /// Hypothesis collection is a subset of the reference collection.
    /// Scalar hypothesis: `IsIn`. Scalar reference: `Equals`.
    #[serde(rename = "all are in")]
    AllAreIn,
    /// Reference collection is a subset of the hypothesis collection.
    /// Scalar hypothesis: `IsEqualToAll`. Scalar reference: `Equals`.
    #[serde(rename = "covers all")]
    CoversAll,
    /// Structural equality, null included
    #[serde(rename = "equals")]
    Equals,
    /// Hypothesis equals every reference member.
    /// Scalar reference: `Equals`. Not configurable by key.
    #[serde(rename = "is equal to all")]
    IsEqualToAll,
    /// Reference value is a member of the hypothesis collection.
    /// Scalar hypothesis: `Equals`.
    #[serde(rename = "any are equal to")]
    AnyAreEqualTo,
    /// Reference value is not a member of the hypothesis collection.
    /// Scalar hypothesis: `DoesNotEqual`.
    #[serde(rename = "none are equal to")]
    NoneAreEqualTo,
    /// Hypothesis value is a member of the reference collection.
    /// Scalar reference: `Equals`.
    #[serde(rename = "is in")]
    IsIn,
    /// Hypothesis value is not a member of the reference collection.
    /// Scalar reference: `DoesNotEqual`.
    #[serde(rename = "is not in")]
    IsNotIn,
    /// Structural inequality
    #[serde(rename = "does not equal")]
    DoesNotEqual,
}

impl EquivalenceTest {
    /// Every test, including the internal `IsEqualToAll`
    pub const ALL: [EquivalenceTest; 11] = [
        EquivalenceTest::AnyAreIn,
        EquivalenceTest::NoneAreIn,
        EquivalenceTest::AllAreIn,
        EquivalenceTest::CoversAll,
        EquivalenceTest::Equals,
        EquivalenceTest::IsEqualToAll,
        EquivalenceTest::AnyAreEqualTo,
        EquivalenceTest::NoneAreEqualTo,
        EquivalenceTest::IsIn,
        EquivalenceTest::IsNotIn,
        EquivalenceTest::DoesNotEqual,
    ];

    /// Configuration key, `None` for tests that cannot be configured
    pub fn key(&self) -> Option<&'static str> {
        match self {
            EquivalenceTest::AnyAreIn => Some("any are in"),
            EquivalenceTest::NoneAreIn => Some("none are in"),
            EquivalenceTest::AllAreIn => Some("all are in"),
            EquivalenceTest::CoversAll => Some("covers all"),
            EquivalenceTest::Equals => Some("equals"),
            EquivalenceTest::IsEqualToAll => None,
            EquivalenceTest::AnyAreEqualTo => Some("any are equal to"),
            EquivalenceTest::NoneAreEqualTo => Some("none are equal to"),
            EquivalenceTest::IsIn => Some("is in"),
            EquivalenceTest::IsNotIn => Some("is not in"),
            EquivalenceTest::DoesNotEqual => Some("does not equal"),
        }
    }

    /// The test to apply when hypothesis and reference swap roles
    pub fn converse(self) -> Self {
        match self {
            EquivalenceTest::AllAreIn => EquivalenceTest::CoversAll,
            EquivalenceTest::CoversAll => EquivalenceTest::AllAreIn,
            EquivalenceTest::AnyAreEqualTo => EquivalenceTest::IsIn,
            EquivalenceTest::IsIn => EquivalenceTest::AnyAreEqualTo,
            EquivalenceTest::NoneAreEqualTo => EquivalenceTest::IsNotIn,
            EquivalenceTest::IsNotIn => EquivalenceTest::NoneAreEqualTo,
            other => other,
        }
    }

    /// Evaluate the predicate
    pub fn test(self, hypothesis: &Value, reference: &Value) -> bool {
        use EquivalenceTest::*;

        match self {
            AnyAreIn => match (hypothesis.as_collection(), reference.as_collection()) {
                (Some(hyp), Some(refs)) => hyp.iter().any(|h| refs.contains(h)),
                (Some(_), None) => Equals.test(hypothesis, reference),
                (None, _) => IsIn.test(hypothesis, reference),
            },
            NoneAreIn => match (hypothesis.as_collection(), reference.as_collection()) {
                (Some(hyp), Some(refs)) => !hyp.iter().any(|h| refs.contains(h)),
                (Some(_), None) => DoesNotEqual.test(hypothesis, reference),
                (None, _) => IsNotIn.test(hypothesis, reference),
            },
            AllAreIn => match (hypothesis.as_collection(), reference.as_collection()) {
                (Some(hyp), Some(refs)) => hyp.iter().all(|h| refs.contains(h)),
                (Some(_), None) => Equals.test(hypothesis, reference),
                (None, _) => IsIn.test(hypothesis, reference),
            },
            CoversAll => match (hypothesis.as_collection(), reference.as_collection()) {
                (Some(hyp), Some(refs)) => refs.iter().all(|r| hyp.contains(r)),
                (Some(_), None) => Equals.test(hypothesis, reference),
                (None, _) => IsEqualToAll.test(hypothesis, reference),
            },
            Equals => hypothesis == reference,
            IsEqualToAll => match reference.as_collection() {
                Some(refs) => refs.iter().all(|r| r == hypothesis),
                None => Equals.test(hypothesis, reference),
            },
            AnyAreEqualTo => hypothesis
                .collection_contains(reference)
                .unwrap_or_else(|| Equals.test(hypothesis, reference)),
            NoneAreEqualTo => hypothesis
                .collection_contains(reference)
                .map(|found| !found)
                .unwrap_or_else(|| DoesNotEqual.test(hypothesis, reference)),
            IsIn => reference
                .collection_contains(hypothesis)
                .unwrap_or_else(|| Equals.test(hypothesis, reference)),
            IsNotIn => reference
                .collection_contains(hypothesis)
                .map(|found| !found)
                .unwrap_or_else(|| DoesNotEqual.test(hypothesis, reference)),
            DoesNotEqual => hypothesis != reference,
        }
    }
}

impl FromStr for EquivalenceTest {
    type Err = UnknownEquivalenceTest;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EquivalenceTest::ALL
            .into_iter()
            .find(|test| test.key() == Some(s))
            .ok_or_else(|| UnknownEquivalenceTest(s.to_string()))
    }
}

impl fmt::Display for EquivalenceTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key() {
            Some(key) => f.write_str(key),
            None => f.write_str("is equal to all"),
        }
    }
}
