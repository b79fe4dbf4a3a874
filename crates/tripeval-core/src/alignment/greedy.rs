//! Greedy trip alignment for records too large for the exact solver.

use super::{AlignStrategy, Alignment, ScoreMatrix, TripAligner};

/// Pairs each gold trip, in order, with the best still-unused predicted trip.
///
/// Ties go to the lowest predicted index. Linear in the matrix size but not
/// optimal: an early gold trip can take a predicted trip that a later gold
/// trip needed more.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyAligner;

impl TripAligner for GreedyAligner {
    fn align(&self, scores: &ScoreMatrix) -> Alignment {
        let mut used = vec![false; scores.cols()];
        let mut assignment = Vec::with_capacity(scores.rows());
        let mut total = 0u32;

        for g in 0..scores.rows() {
            let mut pick: Option<(usize, u32)> = None;
            for (p, taken) in used.iter().enumerate() {
                if *taken {
                    continue;
                }
                let s = scores.get(g, p);
                if pick.map_or(true, |(_, best)| s > best) {
                    pick = Some((p, s));
                }
            }
            // rows <= cols, so an unused column always exists
            if let Some((p, s)) = pick {
                used[p] = true;
                assignment.push(p);
                total += s;
            }
        }

        Alignment::new(assignment, total, AlignStrategy::Greedy)
    }
}
