//! tripeval - scores trip-receipt extraction runs against gold labels.
//!
//! # Usage
//!
//! ```bash
//! # Field accuracy and exact-match ratio per model
//! tripeval score runs/qwen.json runs/gpt.json
//!
//! # Models ranked best first
//! tripeval rank runs/*.json --json
//!
//! # Records a model got wrong, indexed by field
//! tripeval bad-cases runs/all.json --model qwen-vl-max --out bad_cases.json
//!
//! # Score against corrected labels, trips in order
//! tripeval score runs/qwen.json --gold labels.jsonl --order strict
//! ```

mod config;
mod output;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tripeval_core::compare::CompareOptions;
use tripeval_core::evaluation::{
    analyze_run, load_gold_labels, load_runs_with_gold, rank_extractors, BadCaseReport, ExtractorRun,
    ExtractorSummary, MetricsAccumulator,
};

use config::{load_config, parse_tolerance, OrderArg, Overrides, OversizeArg};

/// Trip-receipt extraction evaluator.
///
/// Compares model-extracted receipts with gold records, trips aligned for
/// the best match unless `--order strict` is given.
#[derive(Parser)]
#[command(name = "tripeval", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// JSONL gold labels keyed by case id; run files may then omit gold
    #[arg(long, global = true)]
    gold: Option<PathBuf>,

    /// Trip comparison order
    #[arg(long, value_enum, global = true)]
    order: Option<OrderArg>,

    /// Numeric tolerance: 'lenient', 'exact' or a number
    #[arg(long, value_parser = parse_tolerance, global = true)]
    tolerance: Option<f64>,

    /// What to do with records above the exact alignment limit
    #[arg(long, value_enum, global = true)]
    oversize: Option<OversizeArg>,

    /// Largest predicted trip count aligned exactly
    #[arg(long, global = true)]
    max_exact_trips: Option<usize>,

    /// Only charge trips the prediction is missing, not extra ones
    #[arg(long, global = true)]
    missing_only: bool,

    /// Config file (default: $TRIPEVAL_CONFIG or the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Score each model's run
    Score {
        /// Run files
        #[arg(required = true)]
        runs: Vec<PathBuf>,
    },
    /// Rank models by field accuracy
    Rank {
        /// Run files
        #[arg(required = true)]
        runs: Vec<PathBuf>,
    },
    /// List wrong records, compared without numeric tolerance by default
    BadCases {
        /// Run file
        run: PathBuf,

        /// Only analyze this model
        #[arg(long)]
        model: Option<String>,

        /// Also write the JSON report to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            tolerance: self.tolerance,
            order: self.order,
            oversize: self.oversize,
            max_exact_trips: self.max_exact_trips,
            missing_only: self.missing_only,
        }
    }

    fn options(&self, analysis: bool) -> Result<CompareOptions> {
        let (config, source) = load_config(self.config.as_deref())?;
        info!(?source, "Loaded configuration");
        let config = self.overrides().apply(config, analysis)?;
        let options = if analysis {
            config.analysis_options()?
        } else {
            config.compare_options()?
        };
        Ok(options)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Command::Score { runs } => {
            let options = cli.options(false)?;
            let runs = load_all(runs, cli.gold.as_deref())?;
            let summaries = score_runs(&runs, &options, cli.json)?;
            let output = if cli.json {
                output::format_summaries_json(&summaries)
            } else {
                output::format_summaries_human(&summaries)
            };
            println!("{}", output);
        }
        Command::Rank { runs } => {
            let options = cli.options(false)?;
            let runs = load_all(runs, cli.gold.as_deref())?;
            let ranking = rank_extractors(score_runs(&runs, &options, cli.json)?);
            let output = if cli.json {
                output::format_ranking_json(&ranking)
            } else {
                output::format_ranking_human(&ranking)
            };
            println!("{}", output);
        }
        Command::BadCases { run, model, out } => {
            let options = cli.options(true)?;
            let mut runs = load_all(std::slice::from_ref(run), cli.gold.as_deref())?;
            if let Some(name) = model {
                runs.retain(|r| &r.name == name);
                if runs.is_empty() {
                    bail!("No run for model '{}' in {}", name, run.display());
                }
            }

            let reports = runs
                .iter()
                .map(|r| {
                    analyze_run(r, &options).with_context(|| format!("Failed to analyze run '{}'", r.name))
                })
                .collect::<Result<Vec<BadCaseReport>>>()?;

            let json = output::format_bad_cases_json(&reports);
            if let Some(path) = out {
                std::fs::write(path, &json)
                    .with_context(|| format!("Failed to write report: {}", path.display()))?;
                info!(path = %path.display(), "Wrote bad-case report");
            }
            let output = if cli.json {
                json
            } else {
                output::format_bad_cases_human(&reports)
            };
            println!("{}", output);
        }
    }

    Ok(())
}

/// Loads every run file. With a label file, gold comes from the labels and
/// run files need not embed any.
fn load_all(paths: &[PathBuf], gold: Option<&Path>) -> Result<Vec<ExtractorRun>> {
    let labels = gold
        .map(|path| {
            load_gold_labels(path)
                .with_context(|| format!("Failed to load gold labels: {}", path.display()))
        })
        .transpose()?;

    let mut runs = Vec::new();
    for path in paths {
        let loaded = load_runs_with_gold(path, labels.as_ref())
            .with_context(|| format!("Failed to load run file: {}", path.display()))?;
        info!(path = %path.display(), runs = loaded.len(), "Loaded run file");
        runs.extend(loaded);
    }
    Ok(runs)
}

/// Scores each run, with a progress bar over its cases.
fn score_runs(runs: &[ExtractorRun], options: &CompareOptions, quiet: bool) -> Result<Vec<ExtractorSummary>> {
    let mut summaries = Vec::with_capacity(runs.len());
    for run in runs {
        let pb = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(run.len() as u64)
        };
        pb.set_style(ProgressStyle::default_bar().template("{msg} [{bar:40}] {pos}/{len}")?);
        pb.set_message(run.name.clone());

        let mut acc = MetricsAccumulator::new(&run.name, *options);
        acc.set_elapsed(run.elapsed_seconds);
        for case in &run.cases {
            acc.observe(case)
                .with_context(|| format!("Failed to score case '{}' of run '{}'", case.id, run.name))?;
            pb.inc(1);
        }
        pb.finish_and_clear();
        summaries.push(acc.finish());
    }
    Ok(summaries)
}
