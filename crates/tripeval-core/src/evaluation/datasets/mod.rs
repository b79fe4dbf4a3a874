//! Evaluation runs and the sources they are built from.
//!
//! An [`ExtractorRun`] is the unit every metric is computed over: one
//! extractor's predictions for a set of documents, each paired with its gold
//! record. Runs come from two places:
//!
//! - [`runs`] - run files written by an upstream evaluation driver
//! - [`collect_run`] - an in-process [`Extractor`] driven against a
//!   [`GoldSource`]
//!
//! # Extractor seam
//!
//! The engine never talks to a model or OCR service. Callers wrap their
//! client in an [`Extractor`]; a failed call is recorded as a missing
//! prediction and the run continues.
//!
//! # Example
//!
//! ```ignore
//! use tripeval_core::evaluation::datasets::{collect_run, load_gold_labels};
//!
//! let labels = load_gold_labels(Path::new("data/labels.jsonl"))?;
//! let run = collect_run(&my_extractor, &labels);
//! let summary = evaluate_run(&run, &CompareOptions::default())?;
//! ```

pub mod runs;

use crate::error::ExtractionError;
use crate::record::Record;
use instant::Instant;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

pub use runs::{load_gold_labels, load_runs, load_runs_with_gold};

// ============================================================================
// Data Structures
// ============================================================================

/// One document: its gold record and what the extractor produced for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalCase {
    pub id: String,
    /// Path of the source document, when the run recorded one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub gold: Record,
    /// `None` when extraction failed or its output could not be recovered
    pub predicted: Option<Record>,
    /// Wall time of this document's extraction call, if measured
    pub elapsed_seconds: Option<f64>,
}

/// All cases produced by one extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorRun {
    pub name: String,
    /// Wall time of the whole run, if measured
    pub elapsed_seconds: Option<f64>,
    pub cases: Vec<EvalCase>,
}

impl ExtractorRun {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elapsed_seconds: None,
            cases: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Replaces each case's gold record with the label of the same id.
    ///
    /// Cases without a label are dropped. Used when gold labels were
    /// corrected after the run was recorded.
    pub fn with_gold(mut self, labels: &GoldLabels) -> Self {
        let before = self.cases.len();
        self.cases.retain_mut(|case| match labels.get(&case.id) {
            Some(gold) => {
                case.gold = gold.clone();
                true
            }
            None => {
                debug!(run = %self.name, id = %case.id, "No gold label, dropping case");
                false
            }
        });
        if self.cases.len() < before {
            debug!(
                run = %self.name,
                dropped = before - self.cases.len(),
                "Dropped cases without gold labels"
            );
        }
        self
    }
}

// ============================================================================
// Sources
// ============================================================================

/// Produces a predicted record for a document.
///
/// Implementations wrap an OCR + LLM pipeline. `Ok(None)` means the
/// extractor ran but produced nothing usable.
pub trait Extractor {
    fn name(&self) -> &str;

    fn extract(&self, doc_id: &str) -> Result<Option<Record>, ExtractionError>;
}

/// Supplies the document set and gold records for an evaluation.
pub trait GoldSource {
    fn name(&self) -> &str;

    /// Document ids in evaluation order.
    fn document_ids(&self) -> Vec<String>;

    fn gold(&self, doc_id: &str) -> Option<Record>;
}

/// Gold records keyed by document id, in file order.
#[derive(Debug, Clone, Default)]
pub struct GoldLabels {
    name: String,
    order: Vec<String>,
    labels: HashMap<String, Record>,
}

impl GoldLabels {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Adds a label, replacing an earlier label for the same id.
    pub fn insert(&mut self, id: impl Into<String>, gold: Record) {
        let id = id.into();
        if self.labels.insert(id.clone(), gold).is_some() {
            warn!(labels = %self.name, id = %id, "Duplicate gold label, keeping the last one");
        } else {
            self.order.push(id);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Record> {
        self.labels.get(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl GoldSource for GoldLabels {
    fn name(&self) -> &str {
        &self.name
    }

    fn document_ids(&self) -> Vec<String> {
        self.order.clone()
    }

    fn gold(&self, doc_id: &str) -> Option<Record> {
        self.labels.get(doc_id).cloned()
    }
}

/// Runs `extractor` over every document of `source` and records the results.
///
/// Each call is timed. An extractor error becomes a missing prediction; a
/// document without gold is skipped.
pub fn collect_run(extractor: &dyn Extractor, source: &dyn GoldSource) -> ExtractorRun {
    let run_start = Instant::now();
    let mut run = ExtractorRun::new(extractor.name());

    for doc_id in source.document_ids() {
        let Some(gold) = source.gold(&doc_id) else {
            debug!(source = source.name(), id = %doc_id, "No gold record, skipping");
            continue;
        };

        let call_start = Instant::now();
        let predicted = match extractor.extract(&doc_id) {
            Ok(predicted) => predicted,
            Err(e) => {
                warn!(extractor = extractor.name(), id = %doc_id, error = %e, "Extraction failed");
                None
            }
        };
        let elapsed = call_start.elapsed().as_secs_f64();

        run.cases.push(EvalCase {
            id: doc_id,
            image: None,
            gold,
            predicted,
            elapsed_seconds: Some(elapsed),
        });
    }

    run.elapsed_seconds = Some(run_start.elapsed().as_secs_f64());
    run
}
