//! # tripeval core
//!
//! Comparison engine for evaluating structured-data extraction of trip
//! receipts: how closely does an OCR + LLM pipeline reproduce the labelled
//! record of an itinerary?
//!
//! ## Modules
//!
//! - [`record`] - Record schema: top-level fields and trip legs
//! - [`equality`] - Tolerant value equality
//! - [`alignment`] - Pairing of predicted and gold trips (exact DP, greedy fallback)
//! - [`compare`] - Single-record comparison and scoring
//! - [`evaluation`] - Metrics, rankings, bad-case reports, run loading
//! - [`extraction`] - Recovery of JSON records from raw model output
//! - [`config`] - Constants and evaluation settings
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```
//! use tripeval_core::compare::{compare_records, CompareOptions};
//! use tripeval_core::record::Record;
//!
//! let gold = Record::from_json("doc", serde_json::json!({
//!     "vendor": "滴滴出行",
//!     "trips": [{"city": "北京", "line_amount": 23.5}, {"city": "上海", "line_amount": 40}]
//! })).unwrap();
//! let predicted = Record::from_json("doc", serde_json::json!({
//!     "vendor": "滴滴出行",
//!     "trips": [{"city": "上海", "line_amount": "40.00"}, {"city": "北京", "line_amount": 23.5}]
//! })).unwrap();
//!
//! let result = compare_records(&predicted, &gold, &CompareOptions::default()).unwrap();
//! assert!(result.record_equal);
//! ```

pub mod alignment;
pub mod compare;
pub mod config;
pub mod equality;
pub mod error;
pub mod evaluation;
pub mod extraction;
pub mod record;

pub use compare::{compare_optional, compare_records, CompareOptions, ComparisonResult};
pub use config::EvalConfig;
pub use error::{EvalError, ExtractionError};
pub use record::{Record, Scalar, TopField, Trip, TripField};
