//! phisher-cop: phishing email classifier
//!
//! Turns raw RFC 5322 messages into fixed-dimension feature vectors and scores
//! them with a trainable model.
//!
//! # Pipeline
//!
//! - **Parsing**: a total MIME parser that records degradations instead of failing
//! - **Features**: TF-IDF over stemmed terms plus structural signals (IP URLs,
//!   typosquatted domains, sender mismatches, suspicious vocabulary)
//! - **Models**: logistic regression, random forest and naive Bayes behind one contract
//! - **Training**: seeded stratified split, model selection, versioned artifacts
//! - **Inference**: hot-reloadable model with per-verdict explanations
//!
//! # Example
//!
//! ```no_run
//! use phisher_cop::config::Config;
//! use phisher_cop::inference::InferenceService;
//! use phisher_cop::mime::RawEmail;
//! use phisher_cop::model::ModelType;
//! use phisher_cop::training::TrainingHarness;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let mut harness = TrainingHarness::new(config.clone());
//!     let report = harness.train("corpus/", ModelType::LogisticRegression)?;
//!
//!     let service = InferenceService::new(config.inference);
//!     service.load(&report.artifact_path)?;
//!     let verdict = service.predict(&RawEmail::from_path("message.eml")?)?;
//!     println!("{} ({:.2})", verdict.label, verdict.phishing_probability);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`mime`]: Message parsing
//! - [`features`]: Feature extraction
//! - [`vectorizer`]: Fitted TF-IDF state
//! - [`model`]: Classifiers
//! - [`training`]: Corpus loading and the training harness
//! - [`artifact`]: Persisted models
//! - [`inference`]: Prediction service

pub mod address;
pub mod artifact;
pub mod config;
pub mod domain;
pub mod error;
pub mod features;
pub mod inference;
pub mod mime;
pub mod model;
pub mod training;
pub mod vectorizer;

// Re-export commonly used types
pub use artifact::{ArtifactMetadata, PersistedModel};
pub use config::Config;
pub use error::{PhishError, Result};
pub use inference::{InferenceService, Signal, Verdict};
pub use model::{Label, Model, ModelType};
