//! Value equality oracle.
//!
//! Decides whether a predicted scalar should count as matching a gold scalar.
//!
//! | Predicted | Gold | Rule |
//! |-----------|------|------|
//! | `null` | `null` | equal |
//! | `null` | value (or vice versa) | not equal |
//! | number or bool on either side | anything | both coerced to `f64`, `\|a - b\| <= tolerance` |
//! | number or bool vs non-numeric value | | trimmed string comparison |
//! | text / nested | text / nested | trimmed string comparison |
//!
//! Booleans coerce to 1 and 0, so `true` matches `1` and `"1"`. Arrays and
//! objects in a scalar slot compare by their compact JSON text.
//!
//! Two text values that both look numeric are compared as strings: only an
//! actual JSON number switches the oracle into numeric mode.

use crate::config::DEFAULT_TOLERANCE;
use crate::error::EvalError;
use crate::record::Scalar;
use serde::{Deserialize, Serialize};

/// Number of ULPs of slack granted on top of the tolerance.
///
/// Decimal inputs such as `100.01` are not exactly representable, so
/// `100.01 - 100.00` evaluates slightly above `0.01`. The slack is scaled to
/// the operands' magnitude and is far below any monetary precision.
const ULP_SLACK: f64 = 4.0;

/// Maximum absolute numeric difference for two values to be equal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Tolerance(f64);

impl Tolerance {
    /// Monetary tolerance used when scoring extractors.
    pub const LENIENT: Tolerance = Tolerance(DEFAULT_TOLERANCE);

    /// Exact numeric match, used by the strict bad-case analysis pass.
    pub const EXACT: Tolerance = Tolerance(0.0);

    /// Creates a custom tolerance. Must be finite and non-negative.
    pub fn new(value: f64) -> Result<Self, EvalError> {
        if value.is_finite() && value >= 0.0 {
            Ok(Tolerance(value))
        } else {
            Err(EvalError::InvalidConfig(format!(
                "tolerance must be a finite non-negative number, got {}",
                value
            )))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance::LENIENT
    }
}

impl TryFrom<f64> for Tolerance {
    type Error = EvalError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Tolerance::new(value)
    }
}

impl From<Tolerance> for f64 {
    fn from(t: Tolerance) -> f64 {
        t.0
    }
}

/// Returns true if `predicted` should be considered equal to `gold`.
///
/// Never fails: values that cannot be coerced to numbers degrade to string
/// comparison.
pub fn values_equal(predicted: Option<&Scalar>, gold: Option<&Scalar>, tolerance: Tolerance) -> bool {
    match (predicted, gold) {
        (None, None) => true,
        (None, Some(_)) | (Some(_), None) => false,
        (Some(p), Some(g)) => scalars_equal(p, g, tolerance),
    }
}

fn scalars_equal(predicted: &Scalar, gold: &Scalar, tolerance: Tolerance) -> bool {
    if predicted.is_number() || gold.is_number() {
        if let (Some(p), Some(g)) = (predicted.as_number(), gold.as_number()) {
            return numbers_within(p, g, tolerance.value());
        }
    }
    predicted.render().trim() == gold.render().trim()
}

#[inline]
fn numbers_within(a: f64, b: f64, tolerance: f64) -> bool {
    let diff = (a - b).abs();
    let slack = ULP_SLACK * f64::EPSILON * a.abs().max(b.abs()).max(1.0);
    diff <= tolerance + slack
}
