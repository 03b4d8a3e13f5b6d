//! SAPTA CLI: score, scan, label, train and inspect commands.
//!
//! Commands:
//! - `score` - evaluate one ticker from a CSV file
//! - `scan` - evaluate every CSV in a directory and rank the matches
//! - `label` - build the labeled feature dataset and write it as CSV
//! - `train` - train a probability model and write the artifact
//! - `inspect` - feature importance and threshold analysis of an artifact
//! - `synth` - write synthetic OHLCV CSVs for trying the pipeline
//! - `describe` - list the scoring modules and model features

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sapta_core::model::ModelArtifact;
use sapta_core::report::{
    feature_descriptions, format_result, format_scan_results, module_descriptions,
};
use sapta_core::synthetic::synthetic_series;
use sapta_core::{SaptaConfig, SaptaEngine, Status};
use sapta_trainer::{
    analyze_feature_importance, build_dataset, format_importance_report, format_threshold_report,
    format_training_summary, load_csv, load_dir, write_csv, Dataset, ModeSelection, Trainer,
    TrainerConfig,
};

#[derive(Parser)]
#[command(name = "sapta", about = "SAPTA pre-markup accumulation scorer")]
struct Cli {
    /// TOML file with [engine], [labeling] and [trainer] tables.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Model artifact to calibrate status with.
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Print JSON instead of text.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one ticker from an OHLCV CSV file.
    Score {
        csv: PathBuf,

        /// Evaluate as of this date (YYYY-MM-DD) instead of the last bar.
        #[arg(long)]
        date: Option<String>,

        /// Include module notes and diagnostics.
        #[arg(long, default_value_t = false)]
        detailed: bool,
    },
    /// Evaluate every CSV in a directory and rank the matches.
    Scan {
        dir: PathBuf,

        #[arg(long, value_enum, default_value_t = MinStatus::Watchlist)]
        min_status: MinStatus,
    },
    /// Label every CSV in a directory and write the feature dataset.
    Label {
        dir: PathBuf,

        #[arg(long, default_value = "samples.csv")]
        out: PathBuf,
    },
    /// Train a model from a CSV directory or a labeled dataset.
    Train {
        /// Directory of OHLCV CSVs, or a dataset CSV written by `label`.
        input: PathBuf,

        #[arg(long, default_value = "model.json")]
        out: PathBuf,

        #[arg(long, default_value_t = false, conflicts_with = "holdout")]
        walk_forward: bool,

        #[arg(long, default_value_t = false)]
        holdout: bool,
    },
    /// Feature importance and threshold analysis of a model artifact.
    Inspect { artifact: PathBuf },
    /// Write synthetic OHLCV CSVs.
    Synth {
        dir: PathBuf,

        #[arg(long, default_value_t = 20)]
        tickers: usize,

        #[arg(long, default_value_t = 1000)]
        bars: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// List the scoring modules and the model feature vector.
    Describe {
        /// Also list every feature with its description.
        #[arg(long, default_value_t = false)]
        features: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MinStatus {
    Skip,
    Watchlist,
    Siap,
    PreMarkup,
}

impl From<MinStatus> for Status {
    fn from(s: MinStatus) -> Self {
        match s {
            MinStatus::Skip => Status::Skip,
            MinStatus::Watchlist => Status::Watchlist,
            MinStatus::Siap => Status::Siap,
            MinStatus::PreMarkup => Status::PreMarkup,
        }
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => SaptaConfig::from_file(path)?,
        None => SaptaConfig::default(),
    };

    match cli.command {
        Commands::Score {
            csv,
            date,
            detailed,
        } => {
            let engine = build_engine(&config, cli.model.as_deref())?;
            run_score(&engine, &csv, date.as_deref(), detailed, cli.json)
        }
        Commands::Scan { dir, min_status } => {
            let engine = build_engine(&config, cli.model.as_deref())?;
            run_scan(&engine, &dir, min_status.into(), cli.json)
        }
        Commands::Label { dir, out } => {
            let trainer_config = trainer_config(cli.config.as_deref())?;
            run_label(&config, &trainer_config, &dir, &out)
        }
        Commands::Train {
            input,
            out,
            walk_forward,
            holdout,
        } => {
            let mut trainer_config = trainer_config(cli.config.as_deref())?;
            if walk_forward {
                trainer_config.mode = ModeSelection::WalkForward;
            } else if holdout {
                trainer_config.mode = ModeSelection::Holdout;
            }
            run_train(&config, trainer_config, &input, &out, cli.json)
        }
        Commands::Inspect { artifact } => run_inspect(&artifact, cli.json),
        Commands::Synth {
            dir,
            tickers,
            bars,
            seed,
        } => run_synth(&dir, tickers, bars, seed),
        Commands::Describe { features } => run_describe(features, cli.json),
    }
}

fn trainer_config(path: Option<&Path>) -> Result<TrainerConfig> {
    Ok(match path {
        Some(path) => TrainerConfig::from_file(path)?,
        None => TrainerConfig::default(),
    })
}

/// Engine from config. An unreadable or schema-stale model leaves it
/// rule-based; any other failure is an error.
fn build_engine(config: &SaptaConfig, model: Option<&Path>) -> Result<SaptaEngine> {
    let engine = SaptaEngine::new(config.engine.clone())?;
    if let Some(path) = model {
        match engine.load_model(path) {
            Ok(_) => {}
            Err(e) if e.is_calibration_fallback() => {
                warn!(path = %path.display(), "model not loaded: {e}");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(engine)
}

fn run_score(
    engine: &SaptaEngine,
    csv: &Path,
    date: Option<&str>,
    detailed: bool,
    json: bool,
) -> Result<()> {
    let series = load_csv(csv)?;
    let result = match date {
        Some(d) => {
            let date = NaiveDate::parse_from_str(d, "%Y-%m-%d")?;
            let Some(index) = series.bars().iter().rposition(|b| b.date <= date) else {
                bail!("{} has no bars on or before {date}", series.ticker());
            };
            engine.evaluate_at(&series, index)?
        }
        None => engine.evaluate(&series)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", format_result(&result, detailed));
    }
    Ok(())
}

fn run_scan(engine: &SaptaEngine, dir: &Path, min_status: Status, json: bool) -> Result<()> {
    let universe = load_dir(dir)?;
    let results = engine.scan(&universe, min_status);
    info!(
        scanned = universe.len(),
        matched = results.len(),
        min_status = %min_status,
        "scan finished"
    );
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print!("{}", format_scan_results(&results));
    }
    Ok(())
}

fn run_label(
    config: &SaptaConfig,
    trainer_config: &TrainerConfig,
    dir: &Path,
    out: &Path,
) -> Result<()> {
    let engine = SaptaEngine::new(config.engine.clone())?;
    let universe = load_dir(dir)?;
    let dataset = build_dataset(
        &engine,
        &universe,
        &config.labeling,
        trainer_config.workers,
        None,
    )?;
    dataset.write_csv(out)?;
    println!(
        "Wrote {} samples ({:.1}% positive) to {}",
        dataset.len(),
        dataset.positive_rate() * 100.0,
        out.display()
    );
    Ok(())
}

fn run_train(
    config: &SaptaConfig,
    trainer_config: TrainerConfig,
    input: &Path,
    out: &Path,
    json: bool,
) -> Result<()> {
    let trainer = Trainer::new(trainer_config)?;
    let artifact = if input.is_dir() {
        let engine = SaptaEngine::new(config.engine.clone())?;
        let universe = load_dir(input)?;
        trainer.train_universe(&engine, &universe, &config.labeling, None)?
    } else {
        let dataset = Dataset::read_csv(input)
            .with_context(|| format!("reading dataset {}", input.display()))?;
        trainer.train(&dataset, None)?
    };
    artifact.save(out)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&artifact.summary)?);
    } else {
        print!("{}", format_training_summary(&artifact));
        println!("Artifact saved to: {}", out.display());
    }
    Ok(())
}

fn run_inspect(path: &Path, json: bool) -> Result<()> {
    let artifact = ModelArtifact::load(path)?;
    let analysis = analyze_feature_importance(&artifact);
    if json {
        let doc = serde_json::json!({
            "model_id": artifact.model_id,
            "thresholds": artifact.thresholds,
            "validation_metrics": artifact.validation_metrics,
            "importance": analysis,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }
    print!("{}", format_training_summary(&artifact));
    println!();
    print!("{}", format_importance_report(&analysis));
    println!();
    print!("{}", format_threshold_report(&artifact.thresholds));
    Ok(())
}

fn run_describe(features: bool, json: bool) -> Result<()> {
    let modules = module_descriptions();
    let feature_rows = if features {
        feature_descriptions()
    } else {
        Vec::new()
    };
    if json {
        let to_map = |rows: &[(&str, &str)]| {
            rows.iter()
                .map(|(name, description)| {
                    serde_json::json!({ "name": name, "description": description })
                })
                .collect::<Vec<_>>()
        };
        let doc = serde_json::json!({
            "modules": to_map(&modules),
            "features": to_map(&feature_rows),
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }
    println!("MODULES");
    for (name, description) in &modules {
        println!("  {name:<20} {description}");
    }
    if features {
        println!();
        println!("FEATURES ({})", feature_rows.len());
        for (name, description) in &feature_rows {
            println!("  {name:<40} {description}");
        }
    }
    Ok(())
}

fn run_synth(dir: &Path, tickers: usize, bars: usize, seed: u64) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let start = NaiveDate::from_ymd_opt(2015, 1, 1).context("invalid start date")?;
    for i in 0..tickers {
        let ticker = format!("SYN{i:03}");
        let series = synthetic_series(&ticker, start, bars, seed)?;
        write_csv(&dir.join(format!("{ticker}.csv")), &series)?;
    }
    println!("Wrote {tickers} synthetic series to {}", dir.display());
    Ok(())
}
