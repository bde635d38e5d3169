//! Inference service tests against freshly trained artifacts

mod common;

use common::{legitimate_message, phishing_message, test_config, write_corpus};
use phisher_cop::config::InferenceConfig;
use phisher_cop::inference::InferenceService;
use phisher_cop::mime::RawEmail;
use phisher_cop::model::{Label, ModelType};
use phisher_cop::training::{Corpus, TrainingHarness};
use phisher_cop::PhishError;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn train(corpus: &Path, output: &Path, model_type: ModelType) -> PathBuf {
    let mut harness = TrainingHarness::new(test_config(output));
    harness.train(corpus, model_type).unwrap().artifact_path
}

#[test]
fn test_ip_url_with_urgency_is_phishing() {
    let corpus_dir = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_corpus(corpus_dir.path(), 60);
    let artifact = train(corpus_dir.path(), output.path(), ModelType::LogisticRegression);

    let service = InferenceService::new(InferenceConfig::default());
    service.load(&artifact).unwrap();

    let suspicious = RawEmail::from(
        "From: Account Team <noreply@account-alerts.biz>\r\nSubject: URGENT: verify your account\r\n\r\nYour account will be suspended. Verify your password immediately at http://45.33.12.7/login\r\n",
    );
    let verdict = service.predict(&suspicious).unwrap();
    assert_eq!(verdict.label, Label::Phishing);
    assert!(verdict.phishing_probability > 0.7);
    assert_eq!(verdict.confidence, verdict.phishing_probability);
    assert_eq!(verdict.model_type, ModelType::LogisticRegression);
    assert!(!verdict.contributing_signals.is_empty());
    assert!(verdict.contributing_signals.len() <= 5);
    for pair in verdict.contributing_signals.windows(2) {
        assert!(pair[0].weight.abs() >= pair[1].weight.abs());
    }

    let benign = RawEmail::from(legitimate_message(1000).as_str());
    let verdict = service.predict(&benign).unwrap();
    assert_eq!(verdict.label, Label::Legitimate);
}

#[test]
fn test_garbage_input_yields_a_verdict() {
    let corpus_dir = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_corpus(corpus_dir.path(), 20);
    let artifact = train(corpus_dir.path(), output.path(), ModelType::NaiveBayes);

    let service = InferenceService::new(InferenceConfig::default());
    service.load(&artifact).unwrap();

    let inputs: Vec<Vec<u8>> = vec![
        Vec::new(),
        b"   \r\n\r\n".to_vec(),
        vec![0xff, 0xfe, 0x00, 0x81, 0x9f, 0x0a, 0x0a, 0xc3],
        b"Content-Type: multipart/mixed\r\n\r\n--nothing".to_vec(),
    ];
    for input in inputs {
        let verdict = service.predict(&RawEmail::from(input)).unwrap();
        assert!((0.0..=1.0).contains(&verdict.phishing_probability));
        assert!((0.5..=1.0).contains(&verdict.confidence));
    }
}

#[test]
fn test_corrupt_artifact_keeps_previous_model() {
    let corpus_dir = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_corpus(corpus_dir.path(), 20);
    let artifact = train(corpus_dir.path(), output.path(), ModelType::LogisticRegression);

    let service = InferenceService::new(InferenceConfig::default());
    let before = service.load(&artifact).unwrap();

    let corrupt = output.path().join("corrupt.json");
    fs::write(&corrupt, b"{\"format_version\": 1, \"metadata\": ").unwrap();
    assert!(matches!(service.load(&corrupt), Err(PhishError::ArtifactCorrupt(_))));

    // Truncated model parameters
    let mut value: serde_json::Value = serde_json::from_slice(&fs::read(&artifact).unwrap()).unwrap();
    value["model"]["weights"] = serde_json::json!([0.5]);
    let mismatched = output.path().join("mismatched.json");
    fs::write(&mismatched, serde_json::to_vec(&value).unwrap()).unwrap();
    assert!(matches!(service.load(&mismatched), Err(PhishError::ArtifactCorrupt(_))));

    assert_eq!(service.metadata().unwrap(), before);
    let verdict = service
        .predict(&RawEmail::from(phishing_message(7).as_str()))
        .unwrap();
    assert_eq!(verdict.model_type, ModelType::LogisticRegression);
}

#[test]
fn test_reload_swaps_atomically() {
    let corpus_dir = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_corpus(corpus_dir.path(), 20);
    let logistic = train(corpus_dir.path(), output.path(), ModelType::LogisticRegression);
    let bayes = train(corpus_dir.path(), output.path(), ModelType::NaiveBayes);

    let email = RawEmail::from(phishing_message(3).as_str());
    let expected = |path: &Path| {
        let service = InferenceService::new(InferenceConfig::default());
        service.load(path).unwrap();
        service.predict(&email).unwrap()
    };
    let logistic_verdict = expected(&logistic);
    let bayes_verdict = expected(&bayes);

    let service = Arc::new(InferenceService::new(InferenceConfig::default()));
    service.load(&logistic).unwrap();

    thread::scope(|scope| {
        for _ in 0..4 {
            let service = Arc::clone(&service);
            let email = email.clone();
            let logistic_verdict = &logistic_verdict;
            let bayes_verdict = &bayes_verdict;
            scope.spawn(move || {
                for _ in 0..50 {
                    let verdict = service.predict(&email).unwrap();
                    match verdict.model_type {
                        ModelType::LogisticRegression => assert_eq!(&verdict, logistic_verdict),
                        ModelType::NaiveBayes => assert_eq!(&verdict, bayes_verdict),
                        other => panic!("unexpected model {}", other),
                    }
                }
            });
        }

        for i in 0..20 {
            let path = if i % 2 == 0 { &bayes } else { &logistic };
            service.load(path).unwrap();
        }
    });
}

#[test]
fn test_evaluate_holdout_corpus() {
    let corpus_dir = TempDir::new().unwrap();
    let holdout_dir = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_corpus(corpus_dir.path(), 40);
    write_corpus(holdout_dir.path(), 10);
    let artifact = train(corpus_dir.path(), output.path(), ModelType::LogisticRegression);

    let service = InferenceService::new(InferenceConfig::default());
    let holdout = Corpus::load(holdout_dir.path()).unwrap();
    assert!(matches!(service.evaluate(&holdout), Err(PhishError::ModelNotLoaded)));

    service.load(&artifact).unwrap();
    let metrics = service.evaluate(&holdout).unwrap();
    assert_eq!(metrics.examples(), 20);
    assert!(metrics.accuracy >= 0.9);
}
