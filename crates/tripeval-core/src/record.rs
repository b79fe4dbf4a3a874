//! Explicit schema for itinerary records.
//!
//! Extractors and gold labels exchange records as JSON objects. Rather than
//! comparing arbitrary nested maps, both sides are decoded into [`Record`]
//! and [`Trip`]: a fixed set of optional scalars plus an ordered list of trip
//! legs. Unknown keys are ignored and missing keys decode as `None`.
//!
//! # JSON shape
//!
//! ```text
//! {
//!   "type": "行程单",
//!   "vendor": "...",
//!   "apply_date": "YYYY-MM-DD",
//!   "start_date": "YYYY-MM-DD",
//!   "end_date": "YYYY-MM-DD",
//!   "trips": [
//!     { "city": "...", "date": "YYYY-MM-DD", "start_time": "YYYY-MM-DD HH:MM:SS",
//!       "line_amount": 23.5, "currency": "CNY" }
//!   ],
//!   "total_amount": 256.8
//! }
//! ```

use crate::error::EvalError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

/// A single non-null field value.
///
/// JSON `null` (and a missing key) is represented as `None` at the field
/// level, so a `Scalar` is always present data. Arrays and objects found in
/// a scalar slot are kept as [`Scalar::Other`], their compact JSON text, and
/// only ever compare as strings.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
    Other(String),
}

impl Scalar {
    /// Returns the value as a number if it is one, or if it is text that
    /// parses as one after trimming. Booleans count as 1 and 0.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(s) => s.trim().parse::<f64>().ok(),
            Scalar::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Scalar::Other(_) => None,
        }
    }

    /// String rendering used for textual comparison.
    pub fn render(&self) -> Cow<'_, str> {
        match self {
            Scalar::Text(s) | Scalar::Other(s) => Cow::Borrowed(s.as_str()),
            Scalar::Number(n) => Cow::Owned(n.to_string()),
            Scalar::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
        }
    }

    /// True for JSON numbers and booleans, the values that put the equality
    /// oracle into numeric mode.
    pub fn is_number(&self) -> bool {
        matches!(self, Scalar::Number(_) | Scalar::Bool(_))
    }
}

impl From<Value> for Scalar {
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(b) => Scalar::Bool(b),
            Value::Number(n) => match n.as_f64() {
                Some(f) => Scalar::Number(f),
                None => Scalar::Other(n.to_string()),
            },
            Value::String(s) => Scalar::Text(s),
            other => Scalar::Other(other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Scalar::from)
    }
}

impl Serialize for Scalar {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Number(n) => serializer.serialize_f64(*n),
            Scalar::Text(s) => serializer.serialize_str(s),
            Scalar::Other(s) => match serde_json::from_str::<Value>(s) {
                Ok(value) => value.serialize(serializer),
                Err(_) => serializer.serialize_str(s),
            },
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Scalar::Number(n)
    }
}

// ============================================================================
// Field names
// ============================================================================

/// Top-level scalar fields of a [`Record`], in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopField {
    #[serde(rename = "type")]
    DocType,
    Vendor,
    ApplyDate,
    StartDate,
    EndDate,
    TotalAmount,
}

impl TopField {
    pub const ALL: [TopField; 6] = [
        TopField::DocType,
        TopField::Vendor,
        TopField::ApplyDate,
        TopField::StartDate,
        TopField::EndDate,
        TopField::TotalAmount,
    ];

    /// JSON key of this field.
    pub fn name(self) -> &'static str {
        match self {
            TopField::DocType => "type",
            TopField::Vendor => "vendor",
            TopField::ApplyDate => "apply_date",
            TopField::StartDate => "start_date",
            TopField::EndDate => "end_date",
            TopField::TotalAmount => "total_amount",
        }
    }
}

impl fmt::Display for TopField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fields of a single [`Trip`], in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripField {
    City,
    Date,
    StartTime,
    LineAmount,
    Currency,
}

impl TripField {
    pub const ALL: [TripField; 5] = [
        TripField::City,
        TripField::Date,
        TripField::StartTime,
        TripField::LineAmount,
        TripField::Currency,
    ];

    /// JSON key of this field.
    pub fn name(self) -> &'static str {
        match self {
            TripField::City => "city",
            TripField::Date => "date",
            TripField::StartTime => "start_time",
            TripField::LineAmount => "line_amount",
            TripField::Currency => "currency",
        }
    }
}

impl fmt::Display for TripField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Records
// ============================================================================

/// One trip leg (e.g. a single taxi ride) within a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Trip {
    pub city: Option<Scalar>,
    pub date: Option<Scalar>,
    pub start_time: Option<Scalar>,
    pub line_amount: Option<Scalar>,
    pub currency: Option<Scalar>,
}

impl Trip {
    pub fn get(&self, field: TripField) -> Option<&Scalar> {
        match field {
            TripField::City => self.city.as_ref(),
            TripField::Date => self.date.as_ref(),
            TripField::StartTime => self.start_time.as_ref(),
            TripField::LineAmount => self.line_amount.as_ref(),
            TripField::Currency => self.currency.as_ref(),
        }
    }
}

/// Structured data extracted from (or labelled for) one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    #[serde(rename = "type")]
    pub doc_type: Option<Scalar>,
    pub vendor: Option<Scalar>,
    pub apply_date: Option<Scalar>,
    pub start_date: Option<Scalar>,
    pub end_date: Option<Scalar>,
    pub total_amount: Option<Scalar>,
    #[serde(deserialize_with = "null_as_empty")]
    pub trips: Vec<Trip>,
}

impl Record {
    pub fn get(&self, field: TopField) -> Option<&Scalar> {
        match field {
            TopField::DocType => self.doc_type.as_ref(),
            TopField::Vendor => self.vendor.as_ref(),
            TopField::ApplyDate => self.apply_date.as_ref(),
            TopField::StartDate => self.start_date.as_ref(),
            TopField::EndDate => self.end_date.as_ref(),
            TopField::TotalAmount => self.total_amount.as_ref(),
        }
    }

    /// Decodes a record from a JSON value.
    ///
    /// `id` is only used to label the error when the value does not have the
    /// record shape: not an object, `trips` not a list, or a trip that is not
    /// an object. Nested values in a scalar slot decode as [`Scalar::Other`].
    pub fn from_json(id: &str, value: serde_json::Value) -> Result<Self, EvalError> {
        if !value.is_object() {
            return Err(EvalError::malformed(
                id,
                format!("expected a JSON object, found {}", json_kind(&value)),
            ));
        }
        serde_json::from_value(value).map_err(|e| EvalError::malformed(id, e))
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Trip>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Trip>>::deserialize(deserializer)?.unwrap_or_default())
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
