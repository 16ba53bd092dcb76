//! Value equivalence: the test algebra and the feature mappings built on it

mod algebra;
mod mapping;

pub use algebra::{EquivalenceTest, UnknownEquivalenceTest};
pub use mapping::{
    Feature, FeatureValueMapping, FeatureValueTester, MatchDirection, ValueMapping,
};
