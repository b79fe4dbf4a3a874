//! Extraction accuracy metrics.
//!
//! Aggregates per-record [`ComparisonResult`]s into one summary per
//! extractor, and ranks extractors against each other.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|------------|
//! | field accuracy | `Σ field_matches / Σ field_total` over all records |
//! | exact match ratio | records compared equal / records evaluated |
//! | per-field accuracy | hits / comparisons for one field name |
//!
//! Field accuracy is micro-averaged: a record with many trips weighs more
//! than one with a single trip. The bootstrap interval is taken over the
//! per-record accuracies instead, so it reflects document-to-document spread.
//!
//! # Per-field counting
//!
//! Top-level fields are compared once per record, including records whose
//! extraction failed. Trip fields are compared once per aligned trip pair;
//! trips lost to a count mismatch only show up in field accuracy.

use super::datasets::{EvalCase, ExtractorRun};
use super::stats::{bootstrap_ci, BootstrapResult};
use crate::alignment::AlignStrategy;
use crate::compare::{compare_optional, CompareOptions, ComparisonResult};
use crate::config::{BOOTSTRAP_RESAMPLES, BOOTSTRAP_SEED};
use crate::error::EvalError;
use crate::record::{TopField, TripField};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::info;

// ============================================================================
// Summary Types
// ============================================================================

/// Hit count for one field name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct FieldStat {
    pub correct: usize,
    pub total: usize,
    /// `correct / total`, 0.0 before any comparison
    pub accuracy: f64,
}

impl FieldStat {
    fn record(&mut self, hit: bool) {
        self.total += 1;
        if hit {
            self.correct += 1;
        }
        self.accuracy = self.correct as f64 / self.total as f64;
    }
}

/// Accuracy summary for one extractor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractorSummary {
    #[serde(rename = "extractor_name")]
    pub extractor: String,
    pub field_accuracy: f64,
    pub exact_match_ratio: f64,
    pub num_cases_evaluated: usize,
    pub total_fields: usize,
    pub field_matches: usize,
    pub exact_matches: usize,
    /// Wall time of the run; falls back to the sum of per-case times
    pub elapsed_seconds: Option<f64>,
    /// Mean per-case extraction time, over cases that were timed
    pub mean_case_seconds: Option<f64>,
    /// Cases with no predicted record
    pub failed_extractions: usize,
    /// Records aligned by the greedy fallback instead of exactly
    pub greedy_alignments: usize,
    pub top_fields: BTreeMap<TopField, FieldStat>,
    pub trip_fields: BTreeMap<TripField, FieldStat>,
    /// 95% bootstrap interval over per-record field accuracy
    pub field_accuracy_ci: Option<BootstrapResult>,
}

/// A summary with its 1-based position in a ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedExtractor {
    pub rank: usize,
    #[serde(flatten)]
    pub summary: ExtractorSummary,
}

// ============================================================================
// Accumulator
// ============================================================================

/// Streams evaluation cases into an [`ExtractorSummary`].
///
/// # Example
///
/// ```ignore
/// let mut acc = MetricsAccumulator::new("qwen-vl-max", CompareOptions::default());
/// for case in &run.cases {
///     acc.observe(case)?;
/// }
/// let summary = acc.finish();
/// ```
#[derive(Debug, Clone)]
pub struct MetricsAccumulator {
    extractor: String,
    options: CompareOptions,
    elapsed_seconds: Option<f64>,
    cases: usize,
    field_matches: usize,
    total_fields: usize,
    exact_matches: usize,
    failed_extractions: usize,
    greedy_alignments: usize,
    timed_cases: usize,
    case_seconds: f64,
    top_fields: BTreeMap<TopField, FieldStat>,
    trip_fields: BTreeMap<TripField, FieldStat>,
    per_record: Vec<f64>,
}

impl MetricsAccumulator {
    pub fn new(extractor: impl Into<String>, options: CompareOptions) -> Self {
        Self {
            extractor: extractor.into(),
            options,
            elapsed_seconds: None,
            cases: 0,
            field_matches: 0,
            total_fields: 0,
            exact_matches: 0,
            failed_extractions: 0,
            greedy_alignments: 0,
            timed_cases: 0,
            case_seconds: 0.0,
            top_fields: TopField::ALL.iter().map(|&f| (f, FieldStat::default())).collect(),
            trip_fields: TripField::ALL.iter().map(|&f| (f, FieldStat::default())).collect(),
            per_record: Vec::new(),
        }
    }

    /// Sets the measured wall time of the whole run.
    pub fn set_elapsed(&mut self, elapsed_seconds: Option<f64>) {
        self.elapsed_seconds = elapsed_seconds;
    }

    /// Compares one case and folds it into the totals.
    ///
    /// Returns the comparison so callers can report on it.
    pub fn observe(&mut self, case: &EvalCase) -> Result<ComparisonResult, EvalError> {
        let result = compare_optional(case.predicted.as_ref(), &case.gold, &self.options)?;
        self.observe_result(&result);
        if let Some(seconds) = case.elapsed_seconds {
            self.timed_cases += 1;
            self.case_seconds += seconds;
        }
        Ok(result)
    }

    /// Folds an already computed comparison into the totals.
    pub fn observe_result(&mut self, result: &ComparisonResult) {
        self.cases += 1;
        self.field_matches += result.field_matches;
        self.total_fields += result.field_total;
        self.per_record.push(result.accuracy());

        if result.record_equal {
            self.exact_matches += 1;
        }
        if result.extraction_failed {
            self.failed_extractions += 1;
        }
        if result.strategy == AlignStrategy::Greedy {
            self.greedy_alignments += 1;
        }

        for (field, stat) in self.top_fields.iter_mut() {
            stat.record(result.top_hit(*field));
        }
        for pair in &result.trip_pairs {
            for (field, stat) in self.trip_fields.iter_mut() {
                stat.record(pair.hit(*field));
            }
        }
    }

    pub fn cases(&self) -> usize {
        self.cases
    }

    pub fn finish(self) -> ExtractorSummary {
        let field_accuracy = ratio(self.field_matches, self.total_fields);
        let exact_match_ratio = ratio(self.exact_matches, self.cases);
        let case_seconds = (self.timed_cases > 0).then_some(self.case_seconds);
        let mean_case_seconds = case_seconds.map(|s| s / self.timed_cases as f64);
        let field_accuracy_ci = (!self.per_record.is_empty())
            .then(|| bootstrap_ci(&self.per_record, BOOTSTRAP_RESAMPLES, BOOTSTRAP_SEED));

        ExtractorSummary {
            extractor: self.extractor,
            field_accuracy,
            exact_match_ratio,
            num_cases_evaluated: self.cases,
            total_fields: self.total_fields,
            field_matches: self.field_matches,
            exact_matches: self.exact_matches,
            elapsed_seconds: self.elapsed_seconds.or(case_seconds),
            mean_case_seconds,
            failed_extractions: self.failed_extractions,
            greedy_alignments: self.greedy_alignments,
            top_fields: self.top_fields,
            trip_fields: self.trip_fields,
            field_accuracy_ci,
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Evaluates every case of a run.
///
/// Fails on the first record that exceeds the alignment limit under a
/// rejecting policy.
pub fn evaluate_run(run: &ExtractorRun, options: &CompareOptions) -> Result<ExtractorSummary, EvalError> {
    let mut acc = MetricsAccumulator::new(&run.name, *options);
    acc.set_elapsed(run.elapsed_seconds);
    for case in &run.cases {
        acc.observe(case)?;
    }
    let summary = acc.finish();

    info!(
        extractor = %summary.extractor,
        cases = summary.num_cases_evaluated,
        field_accuracy = summary.field_accuracy,
        exact_match_ratio = summary.exact_match_ratio,
        "Evaluated run"
    );
    Ok(summary)
}

// ============================================================================
// Ranking
// ============================================================================

/// Orders extractors best first.
///
/// Higher field accuracy wins; ties go to the faster extractor (unknown
/// elapsed time sorts last), then to the name.
pub fn rank_extractors(mut summaries: Vec<ExtractorSummary>) -> Vec<RankedExtractor> {
    summaries.sort_by(compare_for_ranking);
    summaries
        .into_iter()
        .enumerate()
        .map(|(i, summary)| RankedExtractor { rank: i + 1, summary })
        .collect()
}

fn compare_for_ranking(a: &ExtractorSummary, b: &ExtractorSummary) -> Ordering {
    b.field_accuracy
        .total_cmp(&a.field_accuracy)
        .then_with(|| match (a.elapsed_seconds, b.elapsed_seconds) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.extractor.cmp(&b.extractor))
}
