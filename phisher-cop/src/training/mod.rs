//! Offline training: corpus loading, splitting, fitting and evaluation

pub mod corpus;
pub mod harness;
pub mod metrics;
pub mod split;

pub use corpus::{Corpus, Document};
pub use harness::{
    CandidateReport, TrainingHarness, TrainingLock, TrainingReport, TrainingState, LOCK_FILE,
};
pub use metrics::{ConfusionMatrix, MetricSummary};
pub use split::{stratified_split, Split};
