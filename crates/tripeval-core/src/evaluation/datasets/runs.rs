//! Loaders for recorded extractor runs and gold labels.
//!
//! # Run file
//!
//! Written by the evaluation driver after calling each model:
//!
//! ```text
//! {
//!   "models": [
//!     {
//!       "model": "qwen2.5-vl-7b-instruct",
//!       "elapsed_seconds": 812.4,
//!       "cases": [
//!         { "id": "didi_000001", "image": "img/didi_000001.png",
//!           "gold": {...}, "output": {...} | null,
//!           "output_raw": "...", "parse_error": "...", "elapsed_seconds": 3.1 }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! A single `{"model": ..., "cases": [...]}` object is accepted as well.
//!
//! Only `cases` is required. A case without `id` is identified by its `_file`
//! or `image` path, then by its position; a run without `model` is named
//! `<unknown>`. `gold` may be left out when labels are supplied separately
//! (see [`load_runs_with_gold`]).
//!
//! # Gold labels
//!
//! JSONL, one `{"id": "...", "gold": {...}}` object per line.

use super::{EvalCase, ExtractorRun, GoldLabels};
use crate::error::EvalError;
use crate::extraction::parse_predicted;
use crate::record::Record;
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

// ============================================================================
// Wire Format
// ============================================================================

/// Run name used when a run file does not name its model
pub const UNKNOWN_MODEL: &str = "<unknown>";

#[derive(Debug, Deserialize)]
struct RawRun {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    elapsed_seconds: Option<f64>,
    #[serde(default)]
    cases: Vec<RawCase>,
}

#[derive(Debug, Deserialize)]
struct RawCase {
    #[serde(default)]
    id: Value,
    #[serde(default, rename = "_file")]
    file: Value,
    #[serde(default)]
    image: Value,
    #[serde(default)]
    gold: Value,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    output_raw: Option<String>,
    #[serde(default)]
    parse_error: Option<String>,
    #[serde(default)]
    elapsed_seconds: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    id: Value,
    #[serde(default)]
    gold: Value,
}

/// Case ids are usually strings, but numeric ids are accepted.
fn id_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn non_null(value: &Value) -> Option<String> {
    (!value.is_null()).then(|| id_string(value))
}

impl RawCase {
    /// Path of the source document, if the driver recorded one.
    fn source_path(&self) -> Option<String> {
        non_null(&self.image).or_else(|| non_null(&self.file))
    }

    fn resolve_id(&self, run: &str, index: usize) -> String {
        if let Some(id) = non_null(&self.id) {
            return id;
        }
        if let Some(path) = non_null(&self.file).or_else(|| non_null(&self.image)) {
            debug!(run = %run, path = %path, "Case has no id, using its source path");
            return path;
        }
        let id = format!("#{}", index);
        warn!(run = %run, id = %id, "Case has no id or source path, using its position");
        id
    }
}

// ============================================================================
// Loaders
// ============================================================================

/// Loads every extractor run in a run file, using the gold records it
/// embeds.
///
/// Cases whose gold is `null` are skipped. A missing `output` is recovered
/// from `output_raw` when possible; predicted output that still cannot be
/// decoded counts as a failed extraction. Gold that is present but not
/// record-shaped is an error.
pub fn load_runs(path: &Path) -> Result<Vec<ExtractorRun>, EvalError> {
    load_runs_with_gold(path, None)
}

/// Loads every extractor run in a run file, taking gold from `labels` when
/// given.
///
/// With labels, each case is scored against the label of its id and the
/// embedded gold is ignored, so run files written without gold can be
/// judged. Cases with no label are dropped.
pub fn load_runs_with_gold(
    path: &Path,
    labels: Option<&GoldLabels>,
) -> Result<Vec<ExtractorRun>, EvalError> {
    let file = File::open(path)?;
    let value: Value = serde_json::from_reader(BufReader::new(file))?;

    let raw_runs: Vec<RawRun> = match value {
        Value::Object(mut map) => match map.remove("models") {
            Some(models) => serde_json::from_value(models)?,
            None => vec![serde_json::from_value(Value::Object(map))?],
        },
        _ => {
            return Err(EvalError::malformed(
                path.display().to_string(),
                "run file must be a JSON object",
            ))
        }
    };

    raw_runs
        .into_iter()
        .map(|raw| convert_run(raw, labels))
        .collect()
}

fn convert_run(raw: RawRun, labels: Option<&GoldLabels>) -> Result<ExtractorRun, EvalError> {
    let name = raw.model.unwrap_or_else(|| {
        warn!("Run has no model name, using {}", UNKNOWN_MODEL);
        UNKNOWN_MODEL.to_string()
    });
    let mut run = ExtractorRun::new(name);
    run.elapsed_seconds = raw.elapsed_seconds;

    for (index, case) in raw.cases.into_iter().enumerate() {
        let id = case.resolve_id(&run.name, index);
        let image = case.source_path();

        let gold = match labels {
            Some(labels) => match labels.get(&id) {
                Some(gold) => gold.clone(),
                None => {
                    debug!(run = %run.name, id = %id, "No gold label, dropping case");
                    continue;
                }
            },
            None if case.gold.is_null() => {
                warn!(run = %run.name, id = %id, "Case has no gold record, skipping");
                continue;
            }
            None => Record::from_json(&id, case.gold)?,
        };

        if let Some(reason) = &case.parse_error {
            debug!(run = %run.name, id = %id, reason = %reason, "Upstream parse error");
        }
        let predicted = decode_predicted(&id, case.output, case.output_raw.as_deref());

        run.cases.push(EvalCase {
            id,
            image,
            gold,
            predicted,
            elapsed_seconds: case.elapsed_seconds,
        });
    }

    Ok(run)
}

fn decode_predicted(id: &str, output: Value, output_raw: Option<&str>) -> Option<Record> {
    let decoded = match (output, output_raw) {
        (Value::Null, Some(raw)) => parse_predicted(id, raw),
        (Value::Null, None) => return None,
        (output, _) => Record::from_json(id, output),
    };
    match decoded {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(id = %id, error = %e, "Unusable predicted output, counting as failed extraction");
            None
        }
    }
}

/// Loads gold labels from a JSONL file.
///
/// Blank lines are ignored and labels with a `null` gold are skipped. The
/// label set is named after the file stem.
pub fn load_gold_labels(path: &Path) -> Result<GoldLabels, EvalError> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "gold".to_string());
    let mut labels = GoldLabels::new(name);

    let reader = BufReader::new(File::open(path)?);
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let raw: RawLabel = serde_json::from_str(&line)
            .map_err(|e| EvalError::malformed(format!("line {}", line_num + 1), e))?;
        let id = id_string(&raw.id);
        if raw.gold.is_null() {
            warn!(id = %id, line = line_num + 1, "Gold label is null, skipping");
            continue;
        }
        let gold = Record::from_json(&id, raw.gold)?;
        labels.insert(id, gold);
    }

    Ok(labels)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::datasets::GoldSource;
    use crate::record::Scalar;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const RUN_FILE: &str = r#"{
        "models": [
            {
                "model": "qwen-vl-max",
                "elapsed_seconds": 12.5,
                "cases": [
                    {"id": "c1", "gold": {"vendor": "滴滴出行", "trips": []},
                     "output": {"vendor": "滴滴出行", "trips": []}, "elapsed_seconds": 1.5},
                    {"id": "c2", "gold": {"vendor": "高德打车"},
                     "output": null, "output_raw": "```json\n{'vendor': '高德打车',}\n```"},
                    {"id": "c3", "gold": {"vendor": "T3出行"},
                     "output": null, "output_raw": "sorry", "parse_error": "No JSON object"},
                    {"id": "c4", "gold": null, "output": {}},
                    {"id": 5, "gold": {"vendor": "曹操出行"}, "output": "not a record"}
                ]
            },
            {"model": "qwen-vl-plus", "cases": []}
        ]
    }"#;

    #[test]
    fn test_load_runs() {
        let file = write_temp(RUN_FILE);
        let runs = load_runs(file.path()).unwrap();

        assert_eq!(runs.len(), 2);
        let run = &runs[0];
        assert_eq!(run.name, "qwen-vl-max");
        assert_eq!(run.elapsed_seconds, Some(12.5));

        let ids: Vec<&str> = run.cases.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3", "5"]);

        assert!(run.cases[0].predicted.is_some());
        assert_eq!(run.cases[0].elapsed_seconds, Some(1.5));
        // Recovered from output_raw
        assert_eq!(
            run.cases[1].predicted.as_ref().and_then(|r| r.vendor.clone()),
            Some(Scalar::from("高德打车"))
        );
        assert!(run.cases[2].predicted.is_none());
        assert!(run.cases[3].predicted.is_none());

        assert!(runs[1].is_empty());
    }

    #[test]
    fn test_load_single_run_object() {
        let file = write_temp(r#"{"model": "solo", "cases": [{"id": "a", "gold": {}, "output": {}}]}"#);
        let runs = load_runs(file.path()).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].name, "solo");
        assert_eq!(runs[0].len(), 1);
    }

    #[test]
    fn test_malformed_gold_is_an_error() {
        let file = write_temp(r#"{"model": "m", "cases": [{"id": "bad", "gold": [1, 2]}]}"#);
        let err = load_runs(file.path()).unwrap_err();
        assert!(matches!(err, EvalError::MalformedRecord { ref id, .. } if id == "bad"));
    }

    #[test]
    fn test_invalid_json_and_missing_file() {
        let file = write_temp("{not json");
        assert!(matches!(load_runs(file.path()), Err(EvalError::Json(_))));

        let file = write_temp("[]");
        assert!(matches!(
            load_runs(file.path()),
            Err(EvalError::MalformedRecord { .. })
        ));

        assert!(matches!(
            load_runs(Path::new("/nonexistent/run.json")),
            Err(EvalError::Io(_))
        ));
    }

    #[test]
    fn test_nested_value_costs_one_field() {
        let file = write_temp(r#"{"model": "m", "cases": [
            {"id": "r1",
             "gold": {"vendor": "滴滴出行", "total_amount": 30,
                      "trips": [{"city": "上海", "line_amount": 30}]},
             "output": {"vendor": {"name": "滴滴出行"}, "total_amount": 30,
                        "trips": [{"city": "上海", "line_amount": 30}]}}
        ]}"#);
        let runs = load_runs(file.path()).unwrap();
        let predicted = runs[0].cases[0].predicted.as_ref().unwrap();
        assert_eq!(predicted.vendor, Some(Scalar::Other(r#"{"name":"滴滴出行"}"#.to_string())));

        let summary =
            crate::evaluation::evaluate_run(&runs[0], &crate::compare::CompareOptions::default()).unwrap();
        assert_eq!(summary.failed_extractions, 0);
        assert_eq!(summary.field_matches, 10);
        assert_eq!(summary.total_fields, 11);
    }

    #[test]
    fn test_gold_from_labels_for_run_without_gold() {
        let run_file = write_temp(r#"{"model": "m", "cases": [
            {"id": "a", "output": {"vendor": "曹操出行"}},
            {"id": "b", "output": {"vendor": "T3出行"}},
            {"id": "c", "output": {"vendor": "高德打车"}}
        ]}"#);
        let labels_file = write_temp(concat!(
            "{\"id\": \"a\", \"gold\": {\"vendor\": \"曹操出行\"}}\n",
            "{\"id\": \"b\", \"gold\": {\"vendor\": \"首汽约车\"}}\n",
        ));
        let labels = load_gold_labels(labels_file.path()).unwrap();

        assert!(load_runs(run_file.path()).unwrap()[0].is_empty());

        let runs = load_runs_with_gold(run_file.path(), Some(&labels)).unwrap();
        let ids: Vec<&str> = runs[0].cases.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(runs[0].cases[1].gold.vendor, Some(Scalar::from("首汽约车")));
    }

    #[test]
    fn test_labels_take_precedence_over_embedded_gold() {
        let run_file = write_temp(r#"{"model": "m", "cases": [
            {"id": "a", "gold": [1, 2], "output": {"vendor": "曹操出行"}}
        ]}"#);
        let mut labels = GoldLabels::new("fixed");
        labels.insert("a", Record { vendor: Some(Scalar::from("曹操出行")), ..Default::default() });

        let runs = load_runs_with_gold(run_file.path(), Some(&labels)).unwrap();
        assert_eq!(runs[0].cases[0].gold.vendor, Some(Scalar::from("曹操出行")));
    }

    #[test]
    fn test_missing_id_and_model_fall_back() {
        let file = write_temp(r#"{"cases": [
            {"_file": "img/1.png", "gold": {"vendor": "a"}, "output": {"vendor": "a"}},
            {"image": "img/2.png", "gold": {"vendor": "b"}, "output": null},
            {"gold": {"vendor": "c"}, "output": null},
            {"id": "named", "image": "img/4.png", "_file": "img/4.jpg", "gold": {}, "output": {}}
        ]}"#);
        let runs = load_runs(file.path()).unwrap();

        assert_eq!(runs[0].name, UNKNOWN_MODEL);
        let ids: Vec<&str> = runs[0].cases.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["img/1.png", "img/2.png", "#2", "named"]);
        let images: Vec<Option<&str>> = runs[0].cases.iter().map(|c| c.image.as_deref()).collect();
        assert_eq!(images, vec![Some("img/1.png"), Some("img/2.png"), None, Some("img/4.png")]);
    }

    #[test]
    fn test_load_gold_labels() {
        let file = write_temp(concat!(
            "{\"id\": \"a\", \"gold\": {\"total_amount\": 12.0}}\n",
            "\n",
            "{\"id\": \"b\", \"gold\": null}\n",
            "{\"id\": 7, \"gold\": {\"trips\": [{\"city\": \"深圳\"}]}}\n",
        ));
        let labels = load_gold_labels(file.path()).unwrap();

        assert_eq!(labels.document_ids(), vec!["a", "7"]);
        assert_eq!(
            labels.get("a").and_then(|r| r.total_amount.clone()),
            Some(Scalar::Number(12.0))
        );
        assert_eq!(labels.get("7").map(|r| r.trips.len()), Some(1));
    }

    #[test]
    fn test_gold_labels_bad_line() {
        let file = write_temp("{\"id\": \"a\", \"gold\": {}}\nnot json\n");
        let err = load_gold_labels(file.path()).unwrap_err();
        assert!(matches!(err, EvalError::MalformedRecord { ref id, .. } if id == "line 2"));
    }
}
