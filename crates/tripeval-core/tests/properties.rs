//! Property-based tests for the comparison engine.
//!
//! Generators produce small receipts whose trips share a narrow value pool,
//! so partial matches between trips are common and alignment has real
//! choices to make.

use proptest::prelude::*;

use tripeval_core::alignment::{ExactAligner, GreedyAligner, ScoreMatrix, TripAligner};
use tripeval_core::compare::{compare_records, CompareOptions, CountPenalty, TripOrder};
use tripeval_core::equality::Tolerance;
use tripeval_core::record::{Record, Scalar, Trip};

// ---------------------------------------------------------------------------
// Strategy generators
// ---------------------------------------------------------------------------

fn arb_scalar() -> impl Strategy<Value = Option<Scalar>> {
    prop_oneof![
        3 => prop::sample::select(vec!["北京", "上海", "CNY", "2025-01-01"])
            .prop_map(|s| Some(Scalar::from(s))),
        3 => (0u32..5).prop_map(|n| Some(Scalar::Number(n as f64 * 10.0))),
        1 => Just(Some(Scalar::Bool(true))),
        1 => Just(None),
    ]
}

fn arb_trip() -> impl Strategy<Value = Trip> {
    (arb_scalar(), arb_scalar(), arb_scalar(), arb_scalar(), arb_scalar()).prop_map(
        |(city, date, start_time, line_amount, currency)| Trip {
            city,
            date,
            start_time,
            line_amount,
            currency,
        },
    )
}

fn arb_record(max_trips: usize) -> impl Strategy<Value = Record> {
    (
        arb_scalar(),
        arb_scalar(),
        arb_scalar(),
        proptest::collection::vec(arb_trip(), 0..=max_trips),
    )
        .prop_map(|(vendor, apply_date, total_amount, trips)| Record {
            vendor,
            apply_date,
            total_amount,
            trips,
            ..Default::default()
        })
}

/// A record and the same record with its trips shuffled.
fn arb_record_and_shuffle(max_trips: usize) -> impl Strategy<Value = (Record, Record)> {
    arb_record(max_trips).prop_flat_map(|record| {
        let trips = record.trips.clone();
        (Just(record), Just(trips).prop_shuffle())
    })
    .prop_map(|(record, shuffled)| {
        let mut permuted = record.clone();
        permuted.trips = shuffled;
        (record, permuted)
    })
}

/// A score matrix with `rows <= cols <= max_cols`.
fn arb_matrix(max_cols: usize) -> impl Strategy<Value = ScoreMatrix> {
    (1..=max_cols)
        .prop_flat_map(|cols| (1..=cols, Just(cols)))
        .prop_flat_map(|(rows, cols)| {
            proptest::collection::vec(proptest::collection::vec(0u32..=5, cols), rows)
        })
        .prop_filter_map("rows must not exceed cols", |rows| ScoreMatrix::from_rows(rows).ok())
}

fn brute_force_best(m: &ScoreMatrix) -> u32 {
    fn go(m: &ScoreMatrix, g: usize, used: &mut Vec<bool>) -> u32 {
        if g == m.rows() {
            return 0;
        }
        let mut best = 0;
        for p in 0..m.cols() {
            if !used[p] {
                used[p] = true;
                best = best.max(m.get(g, p) + go(m, g + 1, used));
                used[p] = false;
            }
        }
        best
    }
    go(m, 0, &mut vec![false; m.cols()])
}

// ---------------------------------------------------------------------------
// Comparator properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Every record equals itself, under both trip orders.
    #[test]
    fn prop_identity(record in arb_record(6)) {
        for order in [TripOrder::Optimal, TripOrder::Strict] {
            let options = CompareOptions::default().with_trip_order(order);
            let result = compare_records(&record, &record, &options).unwrap();
            prop_assert!(result.record_equal);
            prop_assert_eq!(result.field_matches, result.field_total);
        }
    }

    /// Shuffling the predicted trips does not change the optimal score.
    #[test]
    fn prop_permutation_invariance((gold, permuted) in arb_record_and_shuffle(6)) {
        let options = CompareOptions::default();
        let baseline = compare_records(&gold, &gold, &options).unwrap();
        let result = compare_records(&permuted, &gold, &options).unwrap();
        prop_assert_eq!(result.field_matches, baseline.field_matches);
        prop_assert!(result.record_equal);
    }

    /// Matches never exceed the total, whatever the options.
    #[test]
    fn prop_matches_bounded_by_total(
        predicted in arb_record(5),
        gold in arb_record(5),
        strict in any::<bool>(),
        missing_only in any::<bool>(),
    ) {
        let options = CompareOptions::default()
            .with_trip_order(if strict { TripOrder::Strict } else { TripOrder::Optimal })
            .with_count_penalty(if missing_only { CountPenalty::MissingOnly } else { CountPenalty::Symmetric })
            .with_tolerance(Tolerance::EXACT);
        let result = compare_records(&predicted, &gold, &options).unwrap();

        prop_assert!(result.field_matches <= result.field_total);
        prop_assert_eq!(result.trip_pairs.len(), gold.trips.len().min(predicted.trips.len()));
        if result.record_equal {
            prop_assert_eq!(result.field_matches, result.field_total);
        }
    }

    /// The optimal comparator never scores below the strict one.
    #[test]
    fn prop_optimal_dominates_strict(predicted in arb_record(5), gold in arb_record(5)) {
        let optimal = compare_records(&predicted, &gold, &CompareOptions::default()).unwrap();
        let strict_options = CompareOptions::default().with_trip_order(TripOrder::Strict);
        let strict = compare_records(&predicted, &gold, &strict_options).unwrap();

        prop_assert!(optimal.field_matches >= strict.field_matches);
        prop_assert_eq!(optimal.field_total, strict.field_total);
    }
}

// ---------------------------------------------------------------------------
// Aligner properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// The DP finds the brute-force optimum.
    #[test]
    fn prop_exact_matches_brute_force(m in arb_matrix(6)) {
        let alignment = ExactAligner.align(&m);
        prop_assert_eq!(alignment.total_score(), brute_force_best(&m));
        prop_assert_eq!(m.total(alignment.as_slice()), alignment.total_score());
    }

    /// Both aligners produce injective assignments covering every row.
    #[test]
    fn prop_alignments_are_injective(m in arb_matrix(7)) {
        let aligners: [&dyn TripAligner; 2] = [&ExactAligner, &GreedyAligner];
        for aligner in aligners {
            let alignment = aligner.align(&m);
            prop_assert_eq!(alignment.len(), m.rows());
            let mut seen = alignment.as_slice().to_vec();
            seen.sort_unstable();
            seen.dedup();
            prop_assert_eq!(seen.len(), m.rows());
            prop_assert!(alignment.as_slice().iter().all(|&p| p < m.cols()));
        }
    }

    /// Greedy is a lower bound on the optimum.
    #[test]
    fn prop_greedy_never_beats_exact(m in arb_matrix(7)) {
        prop_assert!(GreedyAligner.align(&m).total_score() <= ExactAligner.align(&m).total_score());
    }

    /// Equal inputs give equal alignments.
    #[test]
    fn prop_exact_is_deterministic(m in arb_matrix(6)) {
        prop_assert_eq!(ExactAligner.align(&m), ExactAligner.align(&m));
    }
}
