//! Output formatting for evaluation results.
//!
//! Every report comes in a human-readable form for the terminal and a JSON
//! form for scripting.

use serde::Serialize;
use tripeval_core::evaluation::{BadCaseReport, ExtractorSummary, FieldStat, RankedExtractor};
use tripeval_core::{TopField, TripField};

/// Maximum ids listed per field in the human bad-case report
const IDS_MAX_SHOWN: usize = 10;

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

fn format_seconds(seconds: Option<f64>) -> String {
    match seconds {
        Some(s) => format!("{:.1}s", s),
        None => "-".to_string(),
    }
}

fn field_row(name: &str, stat: &FieldStat) -> String {
    format!(
        "  {:<14} {:>8.4} {:>6}/{:<6}\n",
        name, stat.accuracy, stat.correct, stat.total
    )
}

// ============================================================================
// Scores
// ============================================================================

/// Formats extractor summaries as JSON.
pub fn format_summaries_json(summaries: &[ExtractorSummary]) -> String {
    to_json(summaries)
}

/// Formats extractor summaries for the terminal.
pub fn format_summaries_human(summaries: &[ExtractorSummary]) -> String {
    if summaries.is_empty() {
        return "No extractor runs to score".to_string();
    }

    let mut output = String::new();
    for summary in summaries {
        output.push_str(&format!("{}\n", "=".repeat(60)));
        output.push_str(&format!("{}\n", summary.extractor));
        output.push_str(&format!("{}\n", "=".repeat(60)));
        output.push_str(&format!(
            "Cases: {}  Failed extractions: {}  Greedy alignments: {}\n",
            summary.num_cases_evaluated, summary.failed_extractions, summary.greedy_alignments
        ));
        output.push_str(&format!(
            "Field accuracy:   {:.4} ({}/{})\n",
            summary.field_accuracy, summary.field_matches, summary.total_fields
        ));
        if let Some(ci) = &summary.field_accuracy_ci {
            output.push_str(&format!("  per-record CI:  {}\n", ci.format(4)));
        }
        output.push_str(&format!(
            "Exact match:      {:.4} ({}/{})\n",
            summary.exact_match_ratio, summary.exact_matches, summary.num_cases_evaluated
        ));
        output.push_str(&format!(
            "Elapsed:          {}  (mean per case: {})\n",
            format_seconds(summary.elapsed_seconds),
            format_seconds(summary.mean_case_seconds)
        ));

        output.push_str(&format!("\n  {:<14} {:>8} {:>13}\n", "Field", "Acc", "Correct"));
        for (field, stat) in &summary.top_fields {
            output.push_str(&field_row(field.name(), stat));
        }
        for (field, stat) in &summary.trip_fields {
            output.push_str(&field_row(&format!("trips.{}", field.name()), stat));
        }
        output.push('\n');
    }
    output
}

// ============================================================================
// Ranking
// ============================================================================

/// Formats a ranking as JSON.
pub fn format_ranking_json(ranking: &[RankedExtractor]) -> String {
    to_json(ranking)
}

/// Formats a ranking as a table.
pub fn format_ranking_human(ranking: &[RankedExtractor]) -> String {
    if ranking.is_empty() {
        return "No extractor runs to rank".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:<4} {:<24} {:>8} {:>8} {:>6} {:>10}\n",
        "Rank", "Extractor", "FieldAcc", "Exact", "Cases", "Elapsed"
    ));
    output.push_str(&format!("{}\n", "-".repeat(65)));
    for entry in ranking {
        let s = &entry.summary;
        output.push_str(&format!(
            "{:<4} {:<24} {:>8.4} {:>8.4} {:>6} {:>10}\n",
            entry.rank,
            s.extractor,
            s.field_accuracy,
            s.exact_match_ratio,
            s.num_cases_evaluated,
            format_seconds(s.elapsed_seconds)
        ));
    }
    output
}

// ============================================================================
// Bad cases
// ============================================================================

/// Formats bad-case reports as JSON.
pub fn format_bad_cases_json(reports: &[BadCaseReport]) -> String {
    to_json(reports)
}

fn format_ids(ids: &[String]) -> String {
    let shown: Vec<&str> = ids.iter().take(IDS_MAX_SHOWN).map(String::as_str).collect();
    let mut line = shown.join(", ");
    if ids.len() > IDS_MAX_SHOWN {
        line.push_str(&format!(", ... ({} more)", ids.len() - IDS_MAX_SHOWN));
    }
    line
}

/// Formats bad-case reports for the terminal: a per-field index, then the
/// records themselves.
pub fn format_bad_cases_human(reports: &[BadCaseReport]) -> String {
    let mut output = String::new();
    for report in reports {
        output.push_str(&format!(
            "{}: {} bad case{} of {}\n",
            report.extractor,
            report.len(),
            if report.len() == 1 { "" } else { "s" },
            report.cases_analyzed
        ));
        if report.is_empty() {
            output.push('\n');
            continue;
        }

        for field in TopField::ALL {
            let ids = report.ids_for_top(field);
            if !ids.is_empty() {
                output.push_str(&format!("  {:<18} {:>4}  {}\n", field.name(), ids.len(), format_ids(ids)));
            }
        }
        for field in TripField::ALL {
            let ids = report.ids_for_trip(field);
            if !ids.is_empty() {
                let name = format!("trips.{}", field.name());
                output.push_str(&format!("  {:<18} {:>4}  {}\n", name, ids.len(), format_ids(ids)));
            }
        }

        output.push('\n');
        for entry in &report.entries {
            output.push_str(&format!("  - {}", entry.id));
            if let Some(image) = entry.image.as_ref().filter(|image| **image != entry.id) {
                output.push_str(&format!(" [{}]", image));
            }
            if entry.extraction_failed {
                output.push_str(" (no prediction)\n");
                continue;
            }
            output.push('\n');
            if !entry.top_wrong.is_empty() {
                let names: Vec<&str> = entry.top_wrong.iter().map(|f| f.name()).collect();
                output.push_str(&format!("      wrong: {}\n", names.join(", ")));
            }
            if entry.trip_len_mismatch {
                output.push_str(&format!(
                    "      trips: {} predicted, {} expected\n",
                    entry.predicted_trips, entry.gold_trips
                ));
            }
            for fault in &entry.trip_wrong {
                let names: Vec<&str> = fault.wrong_fields.iter().map(|f| f.name()).collect();
                output.push_str(&format!(
                    "      trip {} -> {}: {}\n",
                    fault.gold_index,
                    fault.pred_index,
                    names.join(", ")
                ));
            }
        }
        output.push('\n');
    }
    output
}
