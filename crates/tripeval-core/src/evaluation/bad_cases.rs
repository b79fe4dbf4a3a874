//! Bad-case analysis.
//!
//! Lists every record an extractor got wrong and indexes the failures by
//! field name, so that "which receipts have a wrong `start_time`?" is a
//! single lookup.
//!
//! The analysis usually runs at [`Tolerance::EXACT`](crate::equality::Tolerance::EXACT):
//! a one-cent drift that scoring forgives is still worth looking at here.

use super::datasets::{EvalCase, ExtractorRun};
use crate::compare::{compare_optional, CompareOptions, ComparisonResult};
use crate::error::EvalError;
use crate::record::{TopField, TripField};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Wrong fields of one aligned trip pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TripFault {
    pub gold_index: usize,
    pub pred_index: usize,
    pub wrong_fields: Vec<TripField>,
}

/// Everything that went wrong with one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadCaseEntry {
    pub id: String,
    /// Source document path, so the case can be opened for review
    pub image: Option<String>,
    pub top_wrong: Vec<TopField>,
    /// Trip counts differ, or there was no prediction at all
    pub trip_len_mismatch: bool,
    pub gold_trips: usize,
    pub predicted_trips: usize,
    /// Only pairs with at least one wrong field
    pub trip_wrong: Vec<TripFault>,
    pub extraction_failed: bool,
}

impl BadCaseEntry {
    /// Builds the entry for a comparison, or `None` if the record was equal.
    pub fn from_comparison(id: &str, result: &ComparisonResult) -> Option<Self> {
        if result.record_equal {
            return None;
        }

        let trip_wrong = result
            .trip_pairs
            .iter()
            .filter(|pair| !pair.all_matched())
            .map(|pair| TripFault {
                gold_index: pair.gold_index,
                pred_index: pair.pred_index,
                wrong_fields: pair.wrong_fields(),
            })
            .collect();

        Some(Self {
            id: id.to_string(),
            image: None,
            top_wrong: result.wrong_top_fields(),
            trip_len_mismatch: result.extraction_failed || result.trip_len_mismatch(),
            gold_trips: result.gold_trips,
            predicted_trips: result.predicted_trips,
            trip_wrong,
            extraction_failed: result.extraction_failed,
        })
    }

    /// Trip fields this record is filed under in the report index.
    ///
    /// A count mismatch puts the record under every trip field, since no
    /// pairing of the trips can be trusted.
    pub fn trip_fields_at_fault(&self) -> Vec<TripField> {
        if self.trip_len_mismatch {
            return TripField::ALL.to_vec();
        }
        TripField::ALL
            .iter()
            .copied()
            .filter(|f| self.trip_wrong.iter().any(|t| t.wrong_fields.contains(f)))
            .collect()
    }
}

/// Analyzes one case; `None` means it compared equal.
pub fn analyze_case(
    case: &EvalCase,
    options: &CompareOptions,
) -> Result<Option<BadCaseEntry>, EvalError> {
    let result = compare_optional(case.predicted.as_ref(), &case.gold, options)?;
    Ok(BadCaseEntry::from_comparison(&case.id, &result).map(|entry| BadCaseEntry {
        image: case.image.clone(),
        ..entry
    }))
}

/// Bad cases of one extractor with per-field inverted indices.
///
/// Both indices hold a key for every field name, empty when no record failed
/// on it. Ids appear in input order and at most once per field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadCaseReport {
    pub extractor: String,
    pub cases_analyzed: usize,
    pub entries: Vec<BadCaseEntry>,
    pub top_field_index: BTreeMap<TopField, Vec<String>>,
    pub trip_field_index: BTreeMap<TripField, Vec<String>>,
}

impl BadCaseReport {
    pub fn new(extractor: impl Into<String>) -> Self {
        Self {
            extractor: extractor.into(),
            cases_analyzed: 0,
            entries: Vec::new(),
            top_field_index: TopField::ALL.iter().map(|&f| (f, Vec::new())).collect(),
            trip_field_index: TripField::ALL.iter().map(|&f| (f, Vec::new())).collect(),
        }
    }

    /// Files an entry under every field it failed on.
    pub fn push(&mut self, entry: BadCaseEntry) {
        for field in &entry.top_wrong {
            if let Some(ids) = self.top_field_index.get_mut(field) {
                ids.push(entry.id.clone());
            }
        }
        for field in entry.trip_fields_at_fault() {
            if let Some(ids) = self.trip_field_index.get_mut(&field) {
                ids.push(entry.id.clone());
            }
        }
        self.entries.push(entry);
    }

    pub fn ids_for_top(&self, field: TopField) -> &[String] {
        self.top_field_index
            .get(&field)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn ids_for_trip(&self, field: TripField) -> &[String] {
        self.trip_field_index
            .get(&field)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Analyzes every case of a run, keeping entries in input order.
pub fn analyze_run(run: &ExtractorRun, options: &CompareOptions) -> Result<BadCaseReport, EvalError> {
    let mut report = BadCaseReport::new(&run.name);
    for case in &run.cases {
        report.cases_analyzed += 1;
        if let Some(entry) = analyze_case(case, options)? {
            report.push(entry);
        }
    }

    info!(
        extractor = %report.extractor,
        cases = report.cases_analyzed,
        bad_cases = report.len(),
        "Analyzed run"
    );
    Ok(report)
}
