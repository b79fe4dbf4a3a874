//! Record comparator.
//!
//! Combines top-level scalar comparison with aligned trip comparison into a
//! single score and equality verdict for one (predicted, gold) pair.
//!
//! # Accounting
//!
//! ```text
//! field_total   = 6                          top-level fields
//!               + pairs × 5                  aligned trip fields
//!               + penalty_trips × 5          count mismatch, never credited
//! field_matches = top hits + aligned trip hits
//! ```
//!
//! `penalty_trips` is `|gold − predicted|` under [`CountPenalty::Symmetric`]
//! and `max(gold − predicted, 0)` under [`CountPenalty::MissingOnly`].
//!
//! A record is exactly equal iff every top-level field matched, both sides
//! have the same number of trips, and every aligned trip field matched.

use crate::alignment::{align, AlignStrategy, Alignment, AlignmentPolicy};
use crate::config::{TOP_FIELD_COUNT, TRIP_FIELD_COUNT};
use crate::equality::{values_equal, Tolerance};
use crate::error::EvalError;
use crate::record::{Record, TopField, Trip, TripField};
use serde::{Deserialize, Serialize};

/// How predicted trips are paired with gold trips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripOrder {
    /// Order-insensitive: optimal alignment on field matches
    #[default]
    Optimal,
    /// Order-sensitive: predicted trip `i` against gold trip `i`
    Strict,
}

/// How a difference in trip counts is charged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountPenalty {
    /// Missing and extra predicted trips both add 5 unmatched fields each
    #[default]
    Symmetric,
    /// Only missing trips are charged; extra predictions are free
    MissingOnly,
}

/// Comparison settings for one evaluation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompareOptions {
    pub tolerance: Tolerance,
    pub trip_order: TripOrder,
    pub count_penalty: CountPenalty,
    pub alignment: AlignmentPolicy,
}

impl CompareOptions {
    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_trip_order(mut self, trip_order: TripOrder) -> Self {
        self.trip_order = trip_order;
        self
    }

    pub fn with_count_penalty(mut self, count_penalty: CountPenalty) -> Self {
        self.count_penalty = count_penalty;
        self
    }

    pub fn with_alignment(mut self, alignment: AlignmentPolicy) -> Self {
        self.alignment = alignment;
        self
    }
}

/// Field hits for one aligned (gold, predicted) trip pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TripPairOutcome {
    pub gold_index: usize,
    pub pred_index: usize,
    /// Indexed in [`TripField::ALL`] order
    pub hits: [bool; TRIP_FIELD_COUNT],
}

impl TripPairOutcome {
    pub fn hit(&self, field: TripField) -> bool {
        self.hits[field as usize]
    }

    pub fn matches(&self) -> usize {
        self.hits.iter().filter(|&&h| h).count()
    }

    pub fn all_matched(&self) -> bool {
        self.hits.iter().all(|&h| h)
    }

    pub fn wrong_fields(&self) -> Vec<TripField> {
        TripField::ALL
            .iter()
            .zip(self.hits)
            .filter(|(_, hit)| !hit)
            .map(|(f, _)| *f)
            .collect()
    }
}

/// Outcome of comparing one predicted record against its gold record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub record_equal: bool,
    pub field_matches: usize,
    pub field_total: usize,
    /// Indexed in [`TopField::ALL`] order
    pub top_hits: [bool; TOP_FIELD_COUNT],
    pub trip_pairs: Vec<TripPairOutcome>,
    pub gold_trips: usize,
    pub predicted_trips: usize,
    /// Unmatched fields added to `field_total` for the trip count difference
    pub count_penalty_fields: usize,
    /// True when there was no predicted record at all
    pub extraction_failed: bool,
    pub strategy: AlignStrategy,
}

impl ComparisonResult {
    /// Result for a document whose extraction produced no record.
    ///
    /// Only the top-level fields are charged: with no predicted trip
    /// structure there is nothing to align against.
    pub fn failed_extraction(gold: &Record) -> Self {
        Self {
            record_equal: false,
            field_matches: 0,
            field_total: TOP_FIELD_COUNT,
            top_hits: [false; TOP_FIELD_COUNT],
            trip_pairs: Vec::new(),
            gold_trips: gold.trips.len(),
            predicted_trips: 0,
            count_penalty_fields: 0,
            extraction_failed: true,
            strategy: AlignStrategy::Exact,
        }
    }

    pub fn top_hit(&self, field: TopField) -> bool {
        self.top_hits[field as usize]
    }

    pub fn wrong_top_fields(&self) -> Vec<TopField> {
        TopField::ALL
            .iter()
            .zip(self.top_hits)
            .filter(|(_, hit)| !hit)
            .map(|(f, _)| *f)
            .collect()
    }

    pub fn trip_len_mismatch(&self) -> bool {
        self.gold_trips != self.predicted_trips
    }

    /// `field_matches / field_total` for this record.
    pub fn accuracy(&self) -> f64 {
        if self.field_total == 0 {
            0.0
        } else {
            self.field_matches as f64 / self.field_total as f64
        }
    }
}

/// Compares a predicted record against gold under `options`.
///
/// Fails only when the alignment size limit is exceeded under
/// [`OversizePolicy::Reject`](crate::alignment::OversizePolicy::Reject).
pub fn compare_records(
    predicted: &Record,
    gold: &Record,
    options: &CompareOptions,
) -> Result<ComparisonResult, EvalError> {
    let tolerance = options.tolerance;
    let mut field_matches = 0;
    let mut field_total = 0;

    let mut top_hits = [false; TOP_FIELD_COUNT];
    for (slot, &field) in top_hits.iter_mut().zip(TopField::ALL.iter()) {
        field_total += 1;
        if values_equal(predicted.get(field), gold.get(field), tolerance) {
            *slot = true;
            field_matches += 1;
        }
    }

    let n_gold = gold.trips.len();
    let n_pred = predicted.trips.len();
    let alignment = match options.trip_order {
        TripOrder::Optimal => align(
            &predicted.trips,
            &gold.trips,
            &TripField::ALL,
            tolerance,
            &options.alignment,
        )?,
        TripOrder::Strict => Alignment::in_order(n_gold.min(n_pred)),
    };

    let trip_pairs: Vec<TripPairOutcome> = alignment
        .pairs()
        .map(|(g, p)| TripPairOutcome {
            gold_index: g,
            pred_index: p,
            hits: trip_hits(&predicted.trips[p], &gold.trips[g], tolerance),
        })
        .collect();

    for pair in &trip_pairs {
        field_total += TRIP_FIELD_COUNT;
        field_matches += pair.matches();
    }

    let penalty_trips = match options.count_penalty {
        CountPenalty::Symmetric => n_gold.abs_diff(n_pred),
        CountPenalty::MissingOnly => n_gold.saturating_sub(n_pred),
    };
    let count_penalty_fields = penalty_trips * TRIP_FIELD_COUNT;
    field_total += count_penalty_fields;

    let record_equal = top_hits.iter().all(|&h| h)
        && n_gold == n_pred
        && trip_pairs.iter().all(TripPairOutcome::all_matched);

    Ok(ComparisonResult {
        record_equal,
        field_matches,
        field_total,
        top_hits,
        trip_pairs,
        gold_trips: n_gold,
        predicted_trips: n_pred,
        count_penalty_fields,
        extraction_failed: false,
        strategy: alignment.strategy(),
    })
}

/// Compares a possibly missing prediction; `None` scores as a failed
/// extraction.
pub fn compare_optional(
    predicted: Option<&Record>,
    gold: &Record,
    options: &CompareOptions,
) -> Result<ComparisonResult, EvalError> {
    match predicted {
        Some(p) => compare_records(p, gold, options),
        None => Ok(ComparisonResult::failed_extraction(gold)),
    }
}

fn trip_hits(predicted: &Trip, gold: &Trip, tolerance: Tolerance) -> [bool; TRIP_FIELD_COUNT] {
    let mut hits = [false; TRIP_FIELD_COUNT];
    for (slot, &field) in hits.iter_mut().zip(TripField::ALL.iter()) {
        *slot = values_equal(predicted.get(field), gold.get(field), tolerance);
    }
    hits
}
