//! Command line front end
//!
//! ```bash
//! # Train the default model type on a labeled corpus
//! phisher-cop train --corpus data/ --output models
//!
//! # Train every model type and keep the best one
//! phisher-cop train --corpus data.zip --select
//!
//! # Score messages with the newest artifact
//! phisher-cop classify --models-dir models message.eml
//!
//! # Score a holdout corpus
//! phisher-cop evaluate --model models/random_forest-20240501T100000Z.json --corpus holdout/
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use phisher_cop::artifact;
use phisher_cop::config::{Config, LoggingConfig};
use phisher_cop::inference::InferenceService;
use phisher_cop::mime::RawEmail;
use phisher_cop::model::ModelType;
use phisher_cop::training::{Corpus, TrainingHarness};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "phisher-cop")]
#[command(about = "Train and run phishing email classifiers", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model and persist it as a new artifact
    Train {
        /// Corpus directory, manifest or zip archive
        #[arg(long)]
        corpus: PathBuf,
        /// Model family to train
        #[arg(long, conflicts_with = "select")]
        model_type: Option<ModelType>,
        /// Train every model family and keep the best on validation F1
        #[arg(long)]
        select: bool,
        /// Directory receiving the artifact
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Classify one or more messages
    Classify {
        /// Artifact to load
        #[arg(short, long, conflicts_with = "models_dir")]
        model: Option<PathBuf>,
        /// Load the newest artifact in this directory
        #[arg(long)]
        models_dir: Option<PathBuf>,
        /// Print verdicts as JSON lines
        #[arg(long)]
        json: bool,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Score a labeled holdout corpus
    Evaluate {
        #[arg(short, long)]
        model: PathBuf,
        #[arg(long)]
        corpus: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::from(1);
        }
    };

    if let Err(e) = init_tracing(&config.logging) {
        eprintln!("error: {:#}", e);
        return ExitCode::from(1);
    }

    let result = match cli.command {
        Commands::Train {
            corpus,
            model_type,
            select,
            output,
            seed,
        } => train(config, &corpus, model_type, select, output, seed),
        Commands::Classify {
            model,
            models_dir,
            json,
            files,
        } => classify(config, model, models_dir, json, &files),
        Commands::Evaluate { model, corpus } => evaluate(config, &model, &corpus),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Config::default(),
    };
    config.validate()?;
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level).context("invalid log level")?,
    };
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format.as_str() {
        "json" => tracing::subscriber::set_global_default(builder.json().finish()),
        _ => tracing::subscriber::set_global_default(builder.pretty().finish()),
    }
    .context("failed to set tracing subscriber")
}

fn train(
    mut config: Config,
    corpus: &Path,
    model_type: Option<ModelType>,
    select: bool,
    output: Option<PathBuf>,
    seed: Option<u64>,
) -> anyhow::Result<ExitCode> {
    if let Some(output) = output {
        config.training.output_dir = output.to_string_lossy().to_string();
    }
    if let Some(seed) = seed {
        config.training.seed = seed;
    }
    let candidates = if select {
        ModelType::ALL.to_vec()
    } else {
        vec![model_type.unwrap_or(config.training.model_type)]
    };

    info!("Training {:?} on {}", candidates, corpus.display());
    let mut harness = TrainingHarness::new(config);
    let report = harness.train_best(corpus, &candidates)?;

    if report.candidates.len() > 1 {
        for candidate in &report.candidates {
            let marker = if candidate.selected { "*" } else { " " };
            println!(
                "{} {:<20} f1 {:.4}  accuracy {:.4}",
                marker, candidate.model_type, candidate.metrics.f1, candidate.metrics.accuracy
            );
        }
        println!();
    }
    println!("Model:      {}", report.metadata.model_type);
    print!("{}", report.metadata.metrics);
    println!("Artifact:   {}", report.artifact_path.display());
    Ok(ExitCode::SUCCESS)
}

fn classify(
    config: Config,
    model: Option<PathBuf>,
    models_dir: Option<PathBuf>,
    json: bool,
    files: &[PathBuf],
) -> anyhow::Result<ExitCode> {
    let path = match (model, models_dir) {
        (Some(model), _) => model,
        (None, Some(dir)) => artifact::latest_in(&dir)?,
        (None, None) => artifact::latest_in(&config.training.output_dir)?,
    };

    let service = InferenceService::new(config.inference);
    service
        .load(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;

    let mut failed = false;
    for file in files {
        let verdict = RawEmail::from_path(file).and_then(|raw| service.predict(&raw));
        match verdict {
            Ok(verdict) if json => {
                let line = serde_json::json!({
                    "file": file.display().to_string(),
                    "verdict": verdict,
                });
                println!("{}", line);
            }
            Ok(verdict) => {
                println!("{}", file.display());
                println!("Phishing score: {:.2}%", verdict.phishing_probability * 100.0);
                println!("Verdict: {}", verdict.label);
                for signal in &verdict.contributing_signals {
                    println!("  {:<32} {:+.4}", signal.feature, signal.weight);
                }
            }
            Err(e) => {
                eprintln!("error: {}: {}", file.display(), e);
                failed = true;
            }
        }
    }

    Ok(if failed {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}

fn evaluate(config: Config, model: &Path, corpus: &Path) -> anyhow::Result<ExitCode> {
    let service = InferenceService::new(config.inference);
    service
        .load(model)
        .with_context(|| format!("failed to load {}", model.display()))?;
    let corpus = Corpus::load(corpus)?;

    let metrics = service.evaluate(&corpus)?;
    print!("{}", metrics);
    Ok(ExitCode::SUCCESS)
}
