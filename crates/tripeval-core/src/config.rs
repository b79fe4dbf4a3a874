//! Evaluation configuration constants and settings.
//!
//! Constants here define the record schema sizes and the default scoring
//! policy. [`EvalConfig`] bundles the tunable settings so a front end can
//! load them from a file and derive [`CompareOptions`] for each pass.
//!
//! # Usage
//!
//! ```
//! use tripeval_core::config::EvalConfig;
//!
//! let config: EvalConfig = serde_json::from_str(r#"{"trip_order": "strict"}"#).unwrap();
//! config.validate().unwrap();
//! let scoring = config.compare_options().unwrap();
//! let analysis = config.analysis_options().unwrap();
//! assert_ne!(scoring.tolerance, analysis.tolerance);
//! ```

use crate::alignment::{AlignmentPolicy, OversizePolicy};
use crate::compare::{CompareOptions, CountPenalty, TripOrder};
use crate::equality::Tolerance;
use crate::error::EvalError;
use serde::{Deserialize, Serialize};

// =============================================================================
// Schema
// =============================================================================

/// Number of top-level scalar fields in a record.
pub const TOP_FIELD_COUNT: usize = 6;

/// Number of fields in one trip.
pub const TRIP_FIELD_COUNT: usize = 5;

// =============================================================================
// Scoring
// =============================================================================

/// Default numeric tolerance (one cent) for scoring.
pub const DEFAULT_TOLERANCE: f64 = 0.01;

/// Tolerance of the strict bad-case analysis pass.
pub const ANALYSIS_TOLERANCE: f64 = 0.0;

/// Default maximum predicted trips per record for exact alignment.
///
/// Receipts in practice carry well under ten legs; at 16 the DP needs
/// ~1 MiB of backpointers per record.
pub const MAX_EXACT_ALIGN_TRIPS: usize = 16;

/// Hard ceiling for the configurable exact alignment limit.
///
/// At 20 predicted trips the DP touches ~400M transitions and ~20 MiB of
/// backpointers.
pub const HARD_MAX_EXACT_ALIGN_TRIPS: usize = 20;

// =============================================================================
// Statistics
// =============================================================================

/// Bootstrap resamples for field accuracy confidence intervals.
pub const BOOTSTRAP_RESAMPLES: usize = 1000;

/// Seed for bootstrap resampling, fixed for reproducible reports.
pub const BOOTSTRAP_SEED: u64 = 42;

/// Tunable evaluation settings.
///
/// Every field has a default, so partial JSON documents are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Numeric tolerance when scoring extractors
    pub tolerance: f64,
    /// Numeric tolerance for bad-case analysis
    pub analysis_tolerance: f64,
    pub trip_order: TripOrder,
    pub count_penalty: CountPenalty,
    pub max_exact_trips: usize,
    pub oversize: OversizePolicy,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            analysis_tolerance: ANALYSIS_TOLERANCE,
            trip_order: TripOrder::Optimal,
            count_penalty: CountPenalty::Symmetric,
            max_exact_trips: MAX_EXACT_ALIGN_TRIPS,
            oversize: OversizePolicy::Reject,
        }
    }
}

impl EvalConfig {
    pub fn validate(&self) -> Result<(), EvalError> {
        Tolerance::new(self.tolerance)?;
        Tolerance::new(self.analysis_tolerance)?;
        self.alignment_policy()?;
        Ok(())
    }

    pub fn alignment_policy(&self) -> Result<AlignmentPolicy, EvalError> {
        AlignmentPolicy::new(self.max_exact_trips, self.oversize)
    }

    /// Options for scoring and ranking.
    pub fn compare_options(&self) -> Result<CompareOptions, EvalError> {
        self.options_with(self.tolerance)
    }

    /// Options for the bad-case analysis pass.
    pub fn analysis_options(&self) -> Result<CompareOptions, EvalError> {
        self.options_with(self.analysis_tolerance)
    }

    fn options_with(&self, tolerance: f64) -> Result<CompareOptions, EvalError> {
        Ok(CompareOptions {
            tolerance: Tolerance::new(tolerance)?,
            trip_order: self.trip_order,
            count_penalty: self.count_penalty,
            alignment: self.alignment_policy()?,
        })
    }
}
