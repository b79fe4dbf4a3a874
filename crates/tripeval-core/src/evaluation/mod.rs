//! Evaluation of extractors over whole runs.
//!
//! Builds on the single-record [`compare`](crate::compare) module:
//!
//! | Module | Produces |
//! |--------|----------|
//! | [`datasets`] | [`ExtractorRun`]s from run files or an in-process [`Extractor`] |
//! | [`metrics`] | per-extractor [`ExtractorSummary`] and a ranking |
//! | [`bad_cases`] | failing records indexed by field name |
//! | [`stats`] | bootstrap confidence intervals |
//!
//! # Two passes
//!
//! Scoring runs with [`Tolerance::LENIENT`](crate::equality::Tolerance::LENIENT)
//! and bad-case analysis with [`Tolerance::EXACT`](crate::equality::Tolerance::EXACT).
//! [`EvalConfig`](crate::config::EvalConfig) derives the options for both.
//!
//! # Example
//!
//! ```ignore
//! use tripeval_core::evaluation::{analyze_run, evaluate_run, load_runs, rank_extractors};
//!
//! let runs = load_runs(Path::new("outputs/qwen_outputs.json"))?;
//! let summaries = runs
//!     .iter()
//!     .map(|run| evaluate_run(run, &config.compare_options()?))
//!     .collect::<Result<Vec<_>, _>>()?;
//! for ranked in rank_extractors(summaries) {
//!     println!("{}. {} {:.4}", ranked.rank, ranked.summary.extractor, ranked.summary.field_accuracy);
//! }
//! ```

pub mod bad_cases;
pub mod datasets;
pub mod metrics;
pub mod stats;

// Runs and sources
pub use datasets::{
    collect_run, load_gold_labels, load_runs, load_runs_with_gold, EvalCase, Extractor, ExtractorRun, GoldLabels,
    GoldSource,
};
// Metrics
pub use metrics::{
    evaluate_run, rank_extractors, ExtractorSummary, FieldStat, MetricsAccumulator,
    RankedExtractor,
};
// Bad cases
pub use bad_cases::{analyze_case, analyze_run, BadCaseEntry, BadCaseReport, TripFault};
// Statistics
pub use stats::{bootstrap_ci, BootstrapResult};
