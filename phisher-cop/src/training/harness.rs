//! Training pipeline
//!
//! A [`TrainingHarness`] runs one batch job through a strictly forward state
//! machine. Nothing is written to the output directory unless every earlier
//! state succeeded, and any error leaves the harness in `Failed`.

use chrono::Utc;
use fs2::FileExt;
use serde::Serialize;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::corpus::Corpus;
use super::metrics::MetricSummary;
use super::split::stratified_split;
use crate::artifact::{ArtifactMetadata, PersistedModel};
use crate::config::Config;
use crate::error::{PhishError, Result};
use crate::features::{FeatureExtractor, FeatureVector};
use crate::mime::ParsedEmail;
use crate::model::{Label, Model, ModelType};
use crate::vectorizer::VectorizerState;

/// Name of the lock file guarding an output directory
pub const LOCK_FILE: &str = ".phisher-cop.lock";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingState {
    Idle,
    Loading,
    FittingVectorizer,
    FittingModel,
    Evaluating,
    Persisting,
    Done,
    Failed,
}

impl TrainingState {
    pub fn as_str(self) -> &'static str {
        match self {
            TrainingState::Idle => "idle",
            TrainingState::Loading => "loading",
            TrainingState::FittingVectorizer => "fitting_vectorizer",
            TrainingState::FittingModel => "fitting_model",
            TrainingState::Evaluating => "evaluating",
            TrainingState::Persisting => "persisting",
            TrainingState::Done => "done",
            TrainingState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TrainingState::Done | TrainingState::Failed)
    }
}

impl fmt::Display for TrainingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation outcome of one candidate model
#[derive(Debug, Clone, Serialize)]
pub struct CandidateReport {
    pub model_type: ModelType,
    pub metrics: MetricSummary,
    pub selected: bool,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub artifact_path: PathBuf,
    pub metadata: ArtifactMetadata,
    pub candidates: Vec<CandidateReport>,
}

/// Exclusive advisory lock on an output directory.
///
/// The OS drops the lock when the holding process exits, so a lock file left
/// by a crashed run does not block the next one.
pub struct TrainingLock {
    path: PathBuf,
    file: File,
}

impl TrainingLock {
    pub fn acquire(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(LOCK_FILE);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Err(PhishError::TrainingInProgress(dir.to_path_buf()));
            }
            return Err(e.into());
        }

        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        debug!("Acquired training lock {}", path.display());
        Ok(Self { path, file })
    }
}

impl Drop for TrainingLock {
    fn drop(&mut self) {
        // Remove while still locked so no other run can grab the old file
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove training lock {}: {}", self.path.display(), e);
        }
        if let Err(e) = self.file.unlock() {
            warn!("Failed to release training lock {}: {}", self.path.display(), e);
        }
    }
}

/// One side of the split, parsed and labeled
struct Partition {
    emails: Vec<ParsedEmail>,
    labels: Vec<Label>,
}

impl Partition {
    fn select(emails: &[ParsedEmail], labels: &[Label], indices: &[usize]) -> Self {
        Self {
            emails: indices.iter().map(|&i| emails[i].clone()).collect(),
            labels: indices.iter().map(|&i| labels[i]).collect(),
        }
    }
}

pub struct TrainingHarness {
    config: Config,
    state: TrainingState,
    history: Vec<TrainingState>,
}

impl TrainingHarness {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: TrainingState::Idle,
            history: vec![TrainingState::Idle],
        }
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    /// Every state visited so far, in order
    pub fn history(&self) -> &[TrainingState] {
        &self.history
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.training.output_dir)
    }

    /// Train a single model type on the corpus at `corpus_path`
    pub fn train<P: AsRef<Path>>(&mut self, corpus_path: P, model_type: ModelType) -> Result<TrainingReport> {
        self.train_best(corpus_path, &[model_type])
    }

    /// Train every candidate on the same split and persist the best one
    pub fn train_best<P: AsRef<Path>>(
        &mut self,
        corpus_path: P,
        candidates: &[ModelType],
    ) -> Result<TrainingReport> {
        let corpus_path = corpus_path.as_ref();
        self.start()?;
        let result = self.with_lock(|harness| {
            let corpus = Corpus::load(corpus_path)?;
            harness.run(&corpus, candidates)
        });
        self.finish(result)
    }

    /// Same as [`TrainingHarness::train_best`] for a corpus already in memory
    pub fn train_corpus(&mut self, corpus: &Corpus, candidates: &[ModelType]) -> Result<TrainingReport> {
        self.start()?;
        let result = self.with_lock(|harness| harness.run(corpus, candidates));
        self.finish(result)
    }

    fn start(&mut self) -> Result<()> {
        if self.state != TrainingState::Idle {
            return Err(PhishError::Training(format!(
                "harness already used (state: {})",
                self.state
            )));
        }
        self.transition(TrainingState::Loading);
        Ok(())
    }

    fn with_lock<F>(&mut self, run: F) -> Result<TrainingReport>
    where
        F: FnOnce(&mut Self) -> Result<TrainingReport>,
    {
        let _lock = TrainingLock::acquire(&self.output_dir())?;
        run(self)
    }

    fn finish(&mut self, result: Result<TrainingReport>) -> Result<TrainingReport> {
        match result {
            Ok(report) => {
                self.transition(TrainingState::Done);
                Ok(report)
            }
            Err(e) => {
                warn!("Training failed during {}: {}", self.state, e);
                self.transition(TrainingState::Failed);
                Err(e)
            }
        }
    }

    fn transition(&mut self, next: TrainingState) {
        debug!("Training state {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    fn run(&mut self, corpus: &Corpus, candidates: &[ModelType]) -> Result<TrainingReport> {
        if candidates.is_empty() {
            return Err(PhishError::Training("no candidate model types".to_string()));
        }

        let seed = self.config.training.seed;
        let split = stratified_split(corpus.documents(), self.config.training.validation_ratio, seed)?;
        let emails = corpus.parse_all();
        let labels = corpus.labels();
        let train = Partition::select(&emails, &labels, &split.train);
        let validation = Partition::select(&emails, &labels, &split.validation);
        info!(
            "Loaded {} documents (train {}, validation {})",
            corpus.len(),
            train.emails.len(),
            validation.emails.len()
        );

        self.transition(TrainingState::FittingVectorizer);
        let vectorizer = VectorizerState::fit(&train.emails, &train.labels, &self.config.vectorizer)?;
        let extractor = FeatureExtractor::new(&vectorizer);
        let x_train = extractor.extract_all(&train.emails);
        let x_validation = extractor.extract_all(&validation.emails);
        info!(
            "Vectorizer fitted: {} terms, {} dimensions",
            vectorizer.vocabulary_len(),
            vectorizer.dimension()
        );

        self.transition(TrainingState::FittingModel);
        let mut models = Vec::with_capacity(candidates.len());
        for &model_type in candidates {
            let mut model = Model::new(model_type, &self.config.model, seed);
            model.fit(&x_train, &train.labels)?;
            info!("Fitted {}", model_type);
            models.push(model);
        }

        self.transition(TrainingState::Evaluating);
        let threshold = self.config.inference.phishing_threshold;
        let mut scored = Vec::with_capacity(models.len());
        for model in models {
            let train_metrics = evaluate(&model, &x_train, &train.labels, threshold)?;
            let metrics = evaluate(&model, &x_validation, &validation.labels, threshold)?
                .with_train_accuracy(train_metrics.accuracy);
            info!(
                "{}: validation accuracy {:.4}, f1 {:.4}",
                model.model_type(),
                metrics.accuracy,
                metrics.f1
            );
            scored.push((model, metrics));
        }

        let best = select_best(&scored);
        let candidates: Vec<CandidateReport> = scored
            .iter()
            .enumerate()
            .map(|(i, (model, metrics))| CandidateReport {
                model_type: model.model_type(),
                metrics: metrics.clone(),
                selected: i == best,
            })
            .collect();
        let (model, metrics) = scored.swap_remove(best);

        self.transition(TrainingState::Persisting);
        let metadata = ArtifactMetadata {
            model_type: model.model_type(),
            trained_at: Utc::now(),
            corpus_checksum: corpus.checksum().to_string(),
            metrics,
            seed,
            dimension: vectorizer.dimension(),
            training_examples: train.emails.len(),
            validation_examples: validation.emails.len(),
        };
        let persisted = PersistedModel::new(metadata, vectorizer, model)?;
        let artifact_path = persisted.save(&self.output_dir())?;

        Ok(TrainingReport {
            artifact_path,
            metadata: persisted.metadata,
            candidates,
        })
    }
}

/// Score a fitted model on a labeled feature set
pub fn evaluate(model: &Model, x: &[FeatureVector], y: &[Label], threshold: f64) -> Result<MetricSummary> {
    let mut predicted = Vec::with_capacity(x.len());
    for features in x {
        let probability = model.predict_proba(features)?;
        predicted.push(Label::from_probability(probability, threshold));
    }
    Ok(MetricSummary::from_predictions(y, &predicted))
}

/// Highest validation f1, then accuracy; earlier candidates win ties
fn select_best(scored: &[(Model, MetricSummary)]) -> usize {
    let mut best = 0;
    for (i, (_, metrics)) in scored.iter().enumerate().skip(1) {
        let current = &scored[best].1;
        if metrics.f1 > current.f1 || (metrics.f1 == current.f1 && metrics.accuracy > current.accuracy) {
            best = i;
        }
    }
    best
}
