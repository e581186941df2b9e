//! Greedy minimum-distance matcher between two candidate pools (rows vs.
//! columns of a precomputed distance matrix).

use nalgebra::DMatrix;

use crate::error::{Result, TrackerError};

/// One accepted row-to-column pairing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub row: usize,
    pub col: usize,
    pub distance: f64,
}

/// The outcome of a single greedy matching pass.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub matches: Vec<Match>,
    pub unmatched_rows: Vec<usize>,
    pub unmatched_cols: Vec<usize>,
}

/// Repeatedly picks the smallest remaining entry strictly below
/// `distance_threshold`, ties broken by first occurrence in row-major
/// order, accepts it as a match, then removes its whole row and column
/// from further consideration by overwriting them with infinity. Stops
/// once no finite candidate entry remains.
///
/// Any NaN anywhere in `distances` is rejected up front rather than
/// silently skipped, since a NaN cost almost always means a caller-side
/// distance function produced garbage.
pub fn greedy_match(distances: &DMatrix<f64>, distance_threshold: f64) -> Result<MatchResult> {
    let (rows, cols) = distances.shape();
    for r in 0..rows {
        for c in 0..cols {
            if distances[(r, c)].is_nan() {
                return Err(TrackerError::NanCost { row: r, col: c });
            }
        }
    }

    let mut working = distances.clone();
    let mut matches = Vec::new();

    loop {
        let mut best: Option<(usize, usize, f64)> = None;
        for r in 0..rows {
            for c in 0..cols {
                let d = working[(r, c)];
                if d.is_finite() && d < distance_threshold {
                    match best {
                        Some((_, _, b)) if d >= b => {}
                        _ => best = Some((r, c, d)),
                    }
                }
            }
        }

        let Some((r, c, d)) = best else { break };
        matches.push(Match { row: r, col: c, distance: d });
        for cc in 0..cols {
            working[(r, cc)] = f64::INFINITY;
        }
        for rr in 0..rows {
            working[(rr, c)] = f64::INFINITY;
        }
    }

    let mut matched_rows = vec![false; rows];
    let mut matched_cols = vec![false; cols];
    for m in &matches {
        matched_rows[m.row] = true;
        matched_cols[m.col] = true;
    }

    let unmatched_rows = (0..rows).filter(|&r| !matched_rows[r]).collect();
    let unmatched_cols = (0..cols).filter(|&c| !matched_cols[c]).collect();

    Ok(MatchResult {
        matches,
        unmatched_rows,
        unmatched_cols,
    })
}
