//! Sub-record alignment.
//!
//! Extractors do not reliably preserve the order of trip legs, so before
//! comparing trips field by field we pair each gold trip with a distinct
//! predicted trip. The pairing maximizes the total number of matching fields.
//!
//! # Score matrix
//!
//! ```text
//! n_common = min(|gold|, |predicted|)
//! score[g][p] = #{ f in fields : equal(predicted[p][f], gold[g][f]) }
//!               for g in 0..n_common, p in 0..|predicted|
//! ```
//!
//! Only the first `n_common` gold trips are aligned; when gold is longer the
//! trailing gold trips stay unpaired and are charged by the comparator's
//! count penalty.
//!
//! # Strategies
//!
//! | Aligner | Result | Cost |
//! |---------|--------|------|
//! | [`ExactAligner`] | optimal | `O(n_common · p · 2^p)` time, `O(n_common · 2^p)` memory |
//! | [`GreedyAligner`] | approximate | `O(n_common · p)` |
//!
//! The exact aligner is only tractable for small fan-out. [`AlignmentPolicy`]
//! states the maximum predicted trip count for exact alignment and what to do
//! beyond it: reject the record or switch to greedy. It never slows down
//! silently.

mod exact;
mod greedy;

pub use exact::ExactAligner;
pub use greedy::GreedyAligner;

use crate::config::{HARD_MAX_EXACT_ALIGN_TRIPS, MAX_EXACT_ALIGN_TRIPS};
use crate::equality::{values_equal, Tolerance};
use crate::error::EvalError;
use crate::record::{Trip, TripField};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// Score Matrix
// ============================================================================

/// Per-pair field match counts between gold trips (rows) and predicted
/// trips (columns).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreMatrix {
    rows: usize,
    cols: usize,
    scores: Vec<u32>,
}

impl ScoreMatrix {
    /// Builds the matrix for the first `min(|gold|, |predicted|)` gold trips
    /// against every predicted trip.
    pub fn build(
        predicted: &[Trip],
        gold: &[Trip],
        fields: &[TripField],
        tolerance: Tolerance,
    ) -> Self {
        let rows = gold.len().min(predicted.len());
        let cols = predicted.len();
        let mut scores = Vec::with_capacity(rows * cols);

        for g in &gold[..rows] {
            for p in predicted {
                let hits = fields
                    .iter()
                    .filter(|&&f| values_equal(p.get(f), g.get(f), tolerance))
                    .count();
                scores.push(hits as u32);
            }
        }

        Self { rows, cols, scores }
    }

    /// Builds a matrix from explicit rows.
    ///
    /// Rows must all have the same length and there may not be more rows
    /// than columns.
    pub fn from_rows(rows: Vec<Vec<u32>>) -> Result<Self, EvalError> {
        let n_rows = rows.len();
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != cols) {
            return Err(EvalError::InvalidConfig(
                "score matrix rows must have equal length".to_string(),
            ));
        }
        if n_rows > cols {
            return Err(EvalError::InvalidConfig(format!(
                "score matrix has {} gold rows but only {} predicted columns",
                n_rows, cols
            )));
        }
        Ok(Self {
            rows: n_rows,
            cols,
            scores: rows.into_iter().flatten().collect(),
        })
    }

    /// Number of gold trips being aligned (`n_common`).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of predicted trips available.
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, gold: usize, predicted: usize) -> u32 {
        self.scores[gold * self.cols + predicted]
    }

    /// Total score of an assignment (`assignment[g]` = predicted index).
    pub fn total(&self, assignment: &[usize]) -> u32 {
        assignment
            .iter()
            .enumerate()
            .map(|(g, &p)| self.get(g, p))
            .sum()
    }
}

// ============================================================================
// Alignment
// ============================================================================

/// How an [`Alignment`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignStrategy {
    /// Optimal subset DP
    Exact,
    /// Greedy best-available per gold trip
    Greedy,
    /// Index `i` paired with index `i` (order-sensitive comparison)
    InOrder,
}

/// Injective pairing of gold trip indices to predicted trip indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    assignment: Vec<usize>,
    total_score: u32,
    strategy: AlignStrategy,
}

impl Alignment {
    pub(crate) fn new(assignment: Vec<usize>, total_score: u32, strategy: AlignStrategy) -> Self {
        Self {
            assignment,
            total_score,
            strategy,
        }
    }

    pub(crate) fn empty(strategy: AlignStrategy) -> Self {
        Self::new(Vec::new(), 0, strategy)
    }

    /// Pairs gold trip `i` with predicted trip `i` for `i in 0..n_common`.
    pub fn in_order(n_common: usize) -> Self {
        Self::new((0..n_common).collect(), 0, AlignStrategy::InOrder)
    }

    /// `(gold_index, predicted_index)` pairs in gold order.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.assignment.iter().copied().enumerate()
    }

    /// Predicted index aligned with `gold_index`, if any.
    pub fn predicted_for(&self, gold_index: usize) -> Option<usize> {
        self.assignment.get(gold_index).copied()
    }

    /// Predicted indices indexed by gold index.
    pub fn as_slice(&self) -> &[usize] {
        &self.assignment
    }

    pub fn len(&self) -> usize {
        self.assignment.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignment.is_empty()
    }

    /// Sum of matched fields over all pairs, as scored by the aligner.
    ///
    /// Always 0 for [`AlignStrategy::InOrder`], which does not score.
    pub fn total_score(&self) -> u32 {
        self.total_score
    }

    pub fn strategy(&self) -> AlignStrategy {
        self.strategy
    }
}

/// Solves the assignment problem on a [`ScoreMatrix`].
pub trait TripAligner {
    /// Returns an injective assignment covering every row of `scores`.
    fn align(&self, scores: &ScoreMatrix) -> Alignment;
}

// ============================================================================
// Policy
// ============================================================================

/// What to do when a record has more predicted trips than the exact
/// aligner accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizePolicy {
    /// Fail with [`EvalError::AlignmentTooLarge`]
    #[default]
    Reject,
    /// Fall back to [`GreedyAligner`]
    Greedy,
}

/// Operating bound for exact alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentPolicy {
    /// Largest predicted trip count aligned with the exact DP
    pub max_exact_trips: usize,
    /// Behavior above `max_exact_trips`
    pub oversize: OversizePolicy,
}

impl Default for AlignmentPolicy {
    fn default() -> Self {
        Self {
            max_exact_trips: MAX_EXACT_ALIGN_TRIPS,
            oversize: OversizePolicy::Reject,
        }
    }
}

impl AlignmentPolicy {
    pub fn new(max_exact_trips: usize, oversize: OversizePolicy) -> Result<Self, EvalError> {
        let policy = Self {
            max_exact_trips,
            oversize,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), EvalError> {
        if self.max_exact_trips > HARD_MAX_EXACT_ALIGN_TRIPS {
            return Err(EvalError::InvalidConfig(format!(
                "max_exact_trips {} exceeds hard limit {}",
                self.max_exact_trips, HARD_MAX_EXACT_ALIGN_TRIPS
            )));
        }
        Ok(())
    }

    /// Picks the aligner for a record with `predicted` trips.
    pub fn aligner_for(&self, predicted: usize) -> Result<&'static dyn TripAligner, EvalError> {
        if predicted <= self.max_exact_trips.min(HARD_MAX_EXACT_ALIGN_TRIPS) {
            return Ok(&ExactAligner);
        }
        match self.oversize {
            OversizePolicy::Reject => Err(EvalError::AlignmentTooLarge {
                predicted,
                limit: self.max_exact_trips,
            }),
            OversizePolicy::Greedy => {
                debug!(
                    predicted,
                    limit = self.max_exact_trips,
                    "Predicted trips exceed exact limit, using greedy alignment"
                );
                Ok(&GreedyAligner)
            }
        }
    }
}

/// Aligns `gold` trips against `predicted` trips on `fields`.
///
/// Returns an empty alignment without scoring when either side is empty.
pub fn align(
    predicted: &[Trip],
    gold: &[Trip],
    fields: &[TripField],
    tolerance: Tolerance,
    policy: &AlignmentPolicy,
) -> Result<Alignment, EvalError> {
    if gold.is_empty() || predicted.is_empty() {
        return Ok(Alignment::empty(AlignStrategy::Exact));
    }
    let aligner = policy.aligner_for(predicted.len())?;
    let scores = ScoreMatrix::build(predicted, gold, fields, tolerance);
    Ok(aligner.align(&scores))
}
