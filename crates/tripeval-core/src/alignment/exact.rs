//! Optimal trip alignment via subset dynamic programming.

use super::{AlignStrategy, Alignment, GreedyAligner, ScoreMatrix, TripAligner};
use crate::config::HARD_MAX_EXACT_ALIGN_TRIPS;
use tracing::warn;

/// Marker for "no transition reached this state".
const UNREACHED: u8 = u8::MAX;

/// Exact assignment solver over bitmasks of used predicted trips.
///
/// # Recurrence
///
/// ```text
/// best[0][0]            = 0
/// best[g + 1][m | 1<<p] = max over p not in m of best[g][m] + score[g][p]
/// answer                = max over m of best[n_common][m]
/// ```
///
/// Only the chosen predicted index is stored per state: the previous mask is
/// the current mask with that bit cleared.
///
/// # Determinism
///
/// Masks are visited in ascending numeric order and candidates in ascending
/// predicted index; a state is only overwritten by a strictly better score,
/// and the final mask is the lowest one holding the maximum. Equal inputs
/// always yield the same alignment.
///
/// # Preconditions
///
/// Memory is `n_common · 2^cols` bytes. Callers normally go through
/// [`AlignmentPolicy`](super::AlignmentPolicy), which bounds `cols`. A
/// matrix wider than [`HARD_MAX_EXACT_ALIGN_TRIPS`] is handed to
/// [`GreedyAligner`] instead, and the result says so in its strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactAligner;

impl TripAligner for ExactAligner {
    fn align(&self, scores: &ScoreMatrix) -> Alignment {
        let n_common = scores.rows();
        let n_pred = scores.cols();
        if n_common == 0 {
            return Alignment::empty(AlignStrategy::Exact);
        }
        if n_pred > HARD_MAX_EXACT_ALIGN_TRIPS {
            warn!(
                predicted = n_pred,
                limit = HARD_MAX_EXACT_ALIGN_TRIPS,
                "Score matrix too wide for exact alignment, aligning greedily"
            );
            return GreedyAligner.align(scores);
        }

        let states = 1usize << n_pred;
        let mut best: Vec<Option<u32>> = vec![None; states];
        best[0] = Some(0);
        let mut choices: Vec<Vec<u8>> = Vec::with_capacity(n_common);

        for g in 0..n_common {
            let mut next: Vec<Option<u32>> = vec![None; states];
            let mut chosen = vec![UNREACHED; states];

            for (mask, value) in best.iter().enumerate() {
                let Some(value) = *value else { continue };
                for p in 0..n_pred {
                    let bit = 1usize << p;
                    if mask & bit != 0 {
                        continue;
                    }
                    let candidate = value + scores.get(g, p);
                    let slot = &mut next[mask | bit];
                    if slot.map_or(true, |current| candidate > current) {
                        *slot = Some(candidate);
                        chosen[mask | bit] = p as u8;
                    }
                }
            }

            best = next;
            choices.push(chosen);
        }

        let mut best_mask = 0usize;
        let mut best_value: Option<u32> = None;
        for (mask, value) in best.iter().enumerate() {
            if let Some(v) = *value {
                if best_value.map_or(true, |b| v > b) {
                    best_value = Some(v);
                    best_mask = mask;
                }
            }
        }

        let mut assignment = vec![0usize; n_common];
        let mut mask = best_mask;
        for g in (0..n_common).rev() {
            let p = choices[g][mask];
            debug_assert_ne!(p, UNREACHED);
            assignment[g] = p as usize;
            mask &= !(1usize << p);
        }

        Alignment::new(assignment, best_value.unwrap_or(0), AlignStrategy::Exact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permutations(n: usize, k: usize) -> Vec<Vec<usize>> {
        fn go(n: usize, k: usize, used: &mut Vec<bool>, cur: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
            if cur.len() == k {
                out.push(cur.clone());
                return;
            }
            for i in 0..n {
                if !used[i] {
                    used[i] = true;
                    cur.push(i);
                    go(n, k, used, cur, out);
                    cur.pop();
                    used[i] = false;
                }
            }
        }
        let mut out = Vec::new();
        go(n, k, &mut vec![false; n], &mut Vec::new(), &mut out);
        out
    }

    fn brute_force_best(m: &ScoreMatrix) -> u32 {
        permutations(m.cols(), m.rows())
            .iter()
            .map(|perm| m.total(perm))
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn test_crafted_three_by_three_matches_brute_force() {
        // Greedy row-by-row would take (0,0)=4 then be forced into a bad pair.
        let m = ScoreMatrix::from_rows(vec![vec![4, 3, 0], vec![3, 0, 0], vec![0, 2, 5]]).unwrap();
        let a = ExactAligner.align(&m);

        assert_eq!(a.total_score(), brute_force_best(&m));
        assert_eq!(a.total_score(), 11);
        assert_eq!(a.as_slice(), &[1, 0, 2]);
    }

    #[test]
    fn test_rectangular_more_predicted() {
        let m = ScoreMatrix::from_rows(vec![vec![1, 5, 2, 0], vec![0, 5, 0, 4]]).unwrap();
        let a = ExactAligner.align(&m);
        assert_eq!(a.total_score(), 9);
        assert_eq!(a.as_slice(), &[1, 3]);
    }

    #[test]
    fn test_ties_prefer_lowest_indices() {
        let m = ScoreMatrix::from_rows(vec![vec![5, 5, 5], vec![5, 5, 5], vec![5, 5, 5]]).unwrap();
        let a = ExactAligner.align(&m);
        assert_eq!(a.as_slice(), &[0, 1, 2]);
        // Same input, same answer
        assert_eq!(ExactAligner.align(&m), a);
    }

    #[test]
    fn test_assignment_is_injective() {
        let m = ScoreMatrix::from_rows(vec![
            vec![5, 5, 0, 1, 2],
            vec![5, 5, 0, 1, 2],
            vec![5, 5, 0, 1, 2],
            vec![0, 0, 0, 0, 0],
        ])
        .unwrap();
        let a = ExactAligner.align(&m);
        let mut seen = a.as_slice().to_vec();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 4);
        assert_eq!(a.total_score(), brute_force_best(&m));
    }

    #[test]
    fn test_exhaustive_small_matrices() {
        // Deterministic pseudo-random matrices up to 4x5
        let mut state = 7u64;
        let mut next = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((state >> 33) % 6) as u32
        };
        for rows in 1..=4 {
            for cols in rows..=5 {
                let m = ScoreMatrix::from_rows(
                    (0..rows)
                        .map(|_| (0..cols).map(|_| next()).collect::<Vec<u32>>())
                        .collect(),
                )
                .unwrap();
                let a = ExactAligner.align(&m);
                assert_eq!(a.total_score(), brute_force_best(&m), "{}x{}", rows, cols);
                assert_eq!(m.total(a.as_slice()), a.total_score());
            }
        }
    }

    #[test]
    fn test_too_wide_matrix_falls_back_to_greedy() {
        let cols = 64;
        let mut row = vec![0u32; cols];
        row[cols - 1] = 5;
        let m = ScoreMatrix::from_rows(vec![row]).unwrap();

        let a = ExactAligner.align(&m);
        assert_eq!(a.strategy(), AlignStrategy::Greedy);
        assert_eq!(a.as_slice(), &[cols - 1]);
        assert_eq!(a.total_score(), 5);
    }

    #[test]
    fn test_hard_limit_width_is_still_exact() {
        let m = ScoreMatrix::from_rows(vec![vec![1; HARD_MAX_EXACT_ALIGN_TRIPS]]).unwrap();
        assert_eq!(ExactAligner.align(&m).strategy(), AlignStrategy::Exact);
    }
}
