//! Shared fixtures for the integration tests
//!
//! Every test gets its own SQLite file in a temporary directory so runs
//! never see each other's nodes or records.

#![allow(dead_code)]

use agreement::{AnnotationNode, OpenStore, SqliteStore};
use std::sync::Arc;
use tempfile::TempDir;

pub const HYPOTHESIS: &str = "tagger";
pub const REFERENCE: &str = "gold";

/// A SQLite store that lives as long as its temporary directory
pub struct TestDb {
    pub store: Arc<SqliteStore>,
    pub dir: TempDir,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = SqliteStore::open(dir.path().join("agreement.db")).expect("open store");
        Self {
            store: Arc::new(store),
            dir,
        }
    }

    pub fn save(&self, system: &str, nodes: &[AnnotationNode]) {
        self.store.save_nodes(system, nodes).expect("save nodes");
    }
}

/// A token with a part-of-speech tag
pub fn token(id: &str, doc: &str, begin: usize, end: usize, pos: &str) -> AnnotationNode {
    AnnotationNode::new(id, doc, "Token")
        .with_ancestor("Annotation")
        .with_span(begin, end)
        .with_attribute("pos", pos)
}

/// Hypothesis and reference tokens for one document scoring
/// both=5, firstOnly=2, secondOnly=3
///
/// Five tokens agree exactly, two hypothesis tokens sit where the reference
/// has nothing, and three reference tokens sit where the hypothesis has
/// nothing.
pub fn benchmark_document(doc: &str) -> (Vec<AnnotationNode>, Vec<AnnotationNode>) {
    let tags = ["DT", "NN", "VBZ", "JJ", "NN"];
    let mut hypothesis = Vec::new();
    let mut reference = Vec::new();

    for (i, tag) in tags.iter().enumerate() {
        let begin = i * 10;
        hypothesis.push(token(&format!("h{}", i), doc, begin, begin + 4, tag));
        reference.push(token(&format!("r{}", i), doc, begin, begin + 4, tag));
    }

    hypothesis.push(token("h-extra-1", doc, 200, 204, "NN"));
    hypothesis.push(token("h-extra-2", doc, 300, 304, "RB"));

    reference.push(token("r-extra-1", doc, 400, 404, "NN"));
    reference.push(token("r-extra-2", doc, 500, 504, "IN"));
    reference.push(token("r-extra-3", doc, 600, 604, "CC"));

    (hypothesis, reference)
}

/// JSON configuration comparing the `pos` attribute of tokens
pub fn pos_config_json(instance: &str) -> String {
    format!(
        r#"{{
            "hypothesisUnitOfAnalysis": {{ "selectedSystem": "{hyp}", "selectedType": "Token" }},
            "referenceUnitOfAnalysis": {{ "selectedSystem": "{reference}", "selectedType": "Token" }},
            "instance": "{instance}",
            "description": "part of speech agreement",
            "fuzzDistance": 0,
            "hitMiss": false,
            "featureValueMappings": [
                {{
                    "hypothesisFeature": "pos",
                    "referenceFeature": "pos",
                    "equivalence": "equals",
                    "valueMappings": []
                }}
            ]
        }}"#,
        hyp = HYPOTHESIS,
        reference = REFERENCE,
        instance = instance,
    )
}
