//! Full analysis runs against a SQLite store
//!
//! Nodes are saved the way the CLI import does it, a run is driven through
//! `AnalysisRunner`, and results are read back through the sink traits.

mod common;

use agreement::evaluation::{write_csv, CSV_HEADER};
use agreement::{
    AnalysisConfig, AnalysisRunner, AnnotationNode, Classification, FilterOption, HitMissPolicy,
    LocationPropagator, Metrics, NodeId, ResultSink, RunOptions, Span, StatusSink, UnitFilter,
};
use common::{benchmark_document, pos_config_json, token, TestDb, HYPOTHESIS, REFERENCE};

fn runner(db: &TestDb) -> AnalysisRunner {
    AnalysisRunner::new(db.store.clone(), db.store.clone(), db.store.clone())
}

fn standard(metrics: &Metrics) -> (u64, u64, u64, Option<f64>, Option<f64>, Option<f64>) {
    match metrics {
        Metrics::Standard(m) => (m.first_only, m.second_only, m.both, m.precision, m.recall, m.f_measure),
        other => panic!("expected standard metrics, got {:?}", other),
    }
}

fn approx(actual: Option<f64>, expected: f64) -> bool {
    actual.map_or(false, |a| (a - expected).abs() < 1e-9)
}

#[test]
fn test_benchmark_document_scores() {
    let db = TestDb::new();
    let (hypothesis, reference) = benchmark_document("doc-1");
    db.save(HYPOTHESIS, &hypothesis);
    db.save(REFERENCE, &reference);

    let config = AnalysisConfig::from_json_str(&pos_config_json("bench")).unwrap();
    let summary = runner(&db).run("run-1", &config).unwrap();

    let (first_only, second_only, both, precision, recall, f_measure) = standard(&summary.metrics);
    assert_eq!((first_only, second_only, both), (2, 3, 5));
    assert!(approx(precision, 5.0 / 7.0));
    assert!(approx(recall, 5.0 / 8.0));
    assert!(approx(f_measure, 2.0 / 3.0));
    assert_eq!(summary.documents, 1);
    assert_eq!(summary.analysis_index, "benchanalysis");
}

#[test]
fn test_records_and_summary_are_persisted() {
    let db = TestDb::new();
    let (hypothesis, reference) = benchmark_document("doc-1");
    db.save(HYPOTHESIS, &hypothesis);
    db.save(REFERENCE, &reference);

    let config = AnalysisConfig::from_json_str(&pos_config_json("bench")).unwrap();
    let summary = runner(&db).run("run-1", &config).unwrap();

    let records = db.store.load_records("run-1").unwrap();
    let count = |class: Classification| records.iter().filter(|r| r.classification == class).count();
    assert_eq!(count(Classification::TruePositive), 5);
    assert_eq!(count(Classification::FalsePositive), 2);
    assert_eq!(count(Classification::FalseNegative), 3);

    let missed = records
        .iter()
        .find(|r| r.second_id == Some(NodeId::from("r-extra-2")))
        .unwrap();
    assert_eq!(missed.classification, Classification::FalseNegative);
    assert_eq!(missed.span, Span::new(500, 504));
    assert_eq!(missed.second_values, "IN");
    assert!(!missed.first_is_present);
    assert_eq!(missed.first_system, HYPOTHESIS);
    assert_eq!(missed.second_system, REFERENCE);

    assert_eq!(db.store.load_summary("run-1").unwrap(), Some(summary));

    let status = db.store.load_status("run-1").unwrap().unwrap();
    assert!(status.finished);
    assert!(!status.failed);
    assert_eq!((status.total, status.completed), (1, 1));
}

#[test]
fn test_documents_missing_from_one_system_are_skipped() {
    let db = TestDb::new();
    let (hyp_1, ref_1) = benchmark_document("doc-1");
    let (hyp_2, ref_2) = benchmark_document("doc-2");
    db.save(HYPOTHESIS, &hyp_1);
    db.save(REFERENCE, &ref_1);
    db.save(HYPOTHESIS, &hyp_2);
    db.save(REFERENCE, &ref_2);
    db.save(HYPOTHESIS, &[token("lonely", "doc-3", 0, 4, "NN")]);

    let config = AnalysisConfig::from_json_str(&pos_config_json("bench")).unwrap();
    let summary = runner(&db).run("run-1", &config).unwrap();

    assert_eq!(summary.documents, 2);
    let (first_only, second_only, both, ..) = standard(&summary.metrics);
    assert_eq!((first_only, second_only, both), (4, 6, 10));
    assert!(db
        .store
        .load_records("run-1")
        .unwrap()
        .iter()
        .all(|r| r.document_id != "doc-3"));
}

#[test]
fn test_csv_export_has_one_row_per_record() {
    let db = TestDb::new();
    let (hypothesis, reference) = benchmark_document("doc-1");
    db.save(HYPOTHESIS, &hypothesis);
    db.save(REFERENCE, &reference);

    let config = AnalysisConfig::from_json_str(&pos_config_json("bench")).unwrap();
    runner(&db).run("run-1", &config).unwrap();

    let records = db.store.load_records("run-1").unwrap();
    let mut out = Vec::new();
    let rows = write_csv(&records, &mut out).unwrap();
    assert_eq!(rows, 10);

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 11);
    assert_eq!(lines[0], CSV_HEADER);
    assert!(lines.contains(&"true,true,true,true,\"DT\",\"DT\",doc-1,0,4"));
}

#[test]
fn test_yaml_config_with_fuzz_and_value_mapping() {
    let db = TestDb::new();
    db.save(
        HYPOTHESIS,
        &[
            token("h1", "doc-1", 2, 6, "NN"),
            token("h2", "doc-1", 20, 24, "VB"),
        ],
    );
    db.save(
        REFERENCE,
        &[
            token("r1", "doc-1", 0, 4, "NOUN"),
            token("r2", "doc-1", 21, 25, "VERB"),
        ],
    );

    let yaml = r#"
hypothesisUnitOfAnalysis:
  selectedSystem: tagger
  selectedType: Token
referenceUnitOfAnalysis:
  selectedSystem: gold
  selectedType: Token
instance: mapped
description: tagset translation
fuzzDistance: 2
hitMiss: "false"
featureValueMappings:
  - hypothesisFeature: pos
    referenceFeature: pos
    equivalence: equals
    valueMappings:
      - from: NN
        to: NOUN
"#;
    let path = db.dir.path().join("analysis.yaml");
    std::fs::write(&path, yaml).unwrap();
    let config = AnalysisConfig::load(&path).unwrap();
    assert_eq!(config.fuzz_distance(), 2);

    let summary = runner(&db).run("run-1", &config).unwrap();

    // VB has no mapping, so it is compared raw against VERB and fails
    let (first_only, second_only, both, ..) = standard(&summary.metrics);
    assert_eq!((first_only, second_only, both), (1, 1, 1));
}

#[test]
fn test_unit_filters_restrict_both_sides() {
    let db = TestDb::new();
    let (hypothesis, reference) = benchmark_document("doc-1");
    db.save(HYPOTHESIS, &hypothesis);
    db.save(REFERENCE, &reference);

    let base = AnalysisConfig::from_json_str(&pos_config_json("bench")).unwrap();
    let filter = UnitFilter::new("pos", FilterOption::In, "NN, JJ");
    let config = AnalysisConfig::new(
        base.hypothesis().clone().with_filter(filter.clone()),
        base.reference().clone().with_filter(filter),
        "filtered",
    )
    .with_mapping(base.feature_value_mappings()[0].clone());

    let summary = runner(&db).run("run-1", &config).unwrap();
    let (first_only, second_only, both, ..) = standard(&summary.metrics);
    assert_eq!((first_only, second_only, both), (1, 1, 3));
}

#[test]
fn test_hit_miss_run_reports_accuracy() {
    let db = TestDb::new();
    db.save(
        HYPOTHESIS,
        &[
            token("h1", "doc-1", 0, 4, "NN"),
            token("h2", "doc-1", 10, 14, "DT"),
            token("h3", "doc-1", 20, 24, "JJ"),
            token("h4", "doc-1", 500, 504, "RB"),
        ],
    );
    db.save(
        REFERENCE,
        &[
            token("r1", "doc-1", 0, 4, "NN"),
            token("r2", "doc-1", 10, 14, "DT"),
            token("r3", "doc-1", 20, 24, "VB"),
        ],
    );

    let json = pos_config_json("hits").replace("\"hitMiss\": false", "\"hitMiss\": true");
    let config = AnalysisConfig::from_json_str(&json).unwrap();
    assert!(config.is_hit_miss());

    let summary = runner(&db).run("run-1", &config).unwrap();
    match &summary.metrics {
        Metrics::HitMiss(m) => {
            assert_eq!((m.hits, m.misses), (2, 1));
            assert!(approx(m.accuracy, 2.0 / 3.0));
        }
        other => panic!("expected hit/miss metrics, got {:?}", other),
    }
    assert!(db
        .store
        .load_records("run-1")
        .unwrap()
        .iter()
        .all(|r| r.classification != Classification::FalseNegative));

    let options = RunOptions {
        hit_miss_policy: HitMissPolicy::CountAsMiss,
        ..RunOptions::default()
    };
    let summary = runner(&db).with_options(options).run("run-2", &config).unwrap();
    match &summary.metrics {
        Metrics::HitMiss(m) => {
            assert_eq!((m.hits, m.misses), (2, 2));
            assert!(approx(m.accuracy, 0.5));
        }
        other => panic!("expected hit/miss metrics, got {:?}", other),
    }
}

#[test]
fn test_fuzzy_hit_miss_counts_only_exact_span_misses() {
    let db = TestDb::new();
    db.save(
        HYPOTHESIS,
        &[
            token("h1", "doc-1", 0, 4, "NN"),
            token("h2", "doc-1", 10, 14, "DT"),
            token("h3", "doc-1", 20, 24, "JJ"),
        ],
    );
    db.save(
        REFERENCE,
        &[
            // agrees within the window
            token("r1", "doc-1", 1, 5, "NN"),
            // disagrees on the identical span
            token("r2", "doc-1", 10, 14, "VB"),
            // disagrees and sits only nearby
            token("r3", "doc-1", 22, 25, "VB"),
        ],
    );

    let json = pos_config_json("fuzzy-hits")
        .replace("\"hitMiss\": false", "\"hitMiss\": true")
        .replace("\"fuzzDistance\": 0", "\"fuzzDistance\": 3");
    let config = AnalysisConfig::from_json_str(&json).unwrap();

    let summary = runner(&db).run("run-1", &config).unwrap();
    match &summary.metrics {
        Metrics::HitMiss(m) => assert_eq!((m.hits, m.misses), (1, 1)),
        other => panic!("expected hit/miss metrics, got {:?}", other),
    }

    let records = db.store.load_records("run-1").unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.first_id != Some(NodeId::from("h3"))));
}

/// A token pointing at a concept record, which has no span of its own
fn concept_pair(prefix: &str, doc: &str, begin: usize, cui: &str) -> Vec<AnnotationNode> {
    let concept_id = format!("{}-concept", prefix);
    vec![
        AnnotationNode::new(format!("{}-token", prefix), doc, "Token")
            .with_span(begin, begin + 6)
            .with_reference("concept", concept_id.as_str()),
        AnnotationNode::new(concept_id.as_str(), doc, "Concept").with_attribute("cui", cui),
    ]
}

fn import(db: &TestDb, system: &str, mut nodes: Vec<AnnotationNode>) -> usize {
    let located = LocationPropagator::from_nodes(&nodes).assign(&mut nodes);
    db.save(system, &nodes);
    located
}

#[test]
fn test_spanless_nodes_match_through_propagated_spans() {
    let db = TestDb::new();

    let mut hypothesis = concept_pair("h1", "doc-1", 0, "C0011849");
    hypothesis.extend(concept_pair("h2", "doc-1", 40, "C0020538"));
    let mut reference = concept_pair("r1", "doc-1", 0, "C0011849");
    reference.extend(concept_pair("r2", "doc-1", 40, "C0027051"));

    assert_eq!(import(&db, HYPOTHESIS, hypothesis), 2);
    assert_eq!(import(&db, REFERENCE, reference), 2);

    let json = pos_config_json("concepts")
        .replace("\"selectedType\": \"Token\"", "\"selectedType\": \"Concept\"")
        .replace("\"pos\"", "\"cui\"");
    let config = AnalysisConfig::from_json_str(&json).unwrap();

    let summary = runner(&db).run("run-1", &config).unwrap();
    let (first_only, second_only, both, ..) = standard(&summary.metrics);
    assert_eq!((first_only, second_only, both), (1, 1, 1));

    let records = db.store.load_records("run-1").unwrap();
    let matched = records
        .iter()
        .find(|r| r.classification == Classification::TruePositive)
        .unwrap();
    assert_eq!(matched.span, Span::new(0, 6));
    assert_eq!(matched.first_id, Some(NodeId::from("h1-concept")));
}

#[test]
fn test_nested_feature_reads_through_references() {
    let db = TestDb::new();
    import(&db, HYPOTHESIS, concept_pair("h1", "doc-1", 0, "C0011849"));
    import(&db, REFERENCE, concept_pair("r1", "doc-1", 0, "C0011849"));

    let nested = r#"{ "name": "cui", "nestedStructure": ["concept"] }"#;
    let json = pos_config_json("nested")
        .replace(r#""hypothesisFeature": "pos""#, &format!(r#""hypothesisFeature": {}"#, nested))
        .replace(r#""referenceFeature": "pos""#, &format!(r#""referenceFeature": {}"#, nested));
    let config = AnalysisConfig::from_json_str(&json).unwrap();
    assert_eq!(config.feature_value_mappings()[0].hypothesis_feature().nested_structure, vec!["concept"]);

    let summary = runner(&db).run("run-1", &config).unwrap();
    let (first_only, second_only, both, ..) = standard(&summary.metrics);
    assert_eq!((first_only, second_only, both), (0, 0, 1));

    let records = db.store.load_records("run-1").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].first_values, "C0011849");
}

#[test]
fn test_invalid_config_names_missing_key() {
    let json = pos_config_json("broken").replace("\"instance\": \"broken\",", "");
    let err = AnalysisConfig::from_json_str(&json).unwrap_err();
    assert!(err.to_string().contains("instance"), "{}", err);
}
