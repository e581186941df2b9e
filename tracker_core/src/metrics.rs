//! MOTChallenge-style CLEAR MOT metric accumulation: per-frame optimal
//! ground-truth/hypothesis assignment by IoU, with TP/FP/FN/ID-switch
//! counting and trajectory-level MT/PT/ML/fragmentation bookkeeping.

use std::collections::HashMap;

use pathfinding::kuhn_munkres::kuhn_munkres_min;
use pathfinding::matrix::Matrix;

/// An axis-aligned box as `[x1, y1, x2, y2]`.
pub type BBox = [f64; 4];

fn iou(a: BBox, b: BBox) -> f64 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

fn iou_distance(a: BBox, b: BBox) -> f64 {
    1.0 - iou(a, b)
}

const COST_SCALE: f64 = 1_000_000.0;
const SENTINEL: i64 = i64::MAX / 4;

/// Minimum-cost assignment between `cost[r][c]` entries that pass `gate`
/// (inclusive), using Hungarian optimal assignment over an integer-scaled,
/// square-padded cost matrix. Returns `(row, col)` pairs within the
/// original (unpadded) bounds.
fn optimal_assignment(cost: &[Vec<f64>], gate: f64) -> Vec<(usize, usize)> {
    let rows = cost.len();
    if rows == 0 {
        return Vec::new();
    }
    let cols = cost[0].len();
    if cols == 0 {
        return Vec::new();
    }

    let n = rows.max(cols);
    let mut padded = Matrix::new(n, n, SENTINEL);
    for (r, row) in cost.iter().enumerate() {
        for (c, &value) in row.iter().enumerate() {
            padded[(r, c)] = if value.is_finite() && value <= gate {
                (value * COST_SCALE).round() as i64
            } else {
                SENTINEL
            };
        }
    }

    let (_, assignment) = kuhn_munkres_min(&padded);
    assignment
        .into_iter()
        .enumerate()
        .filter(|&(r, c)| r < rows && c < cols && padded[(r, c)] < SENTINEL)
        .collect()
}

#[derive(Debug, Default, Clone)]
struct TrajectoryStats {
    total_frames: u64,
    tracked_frames: u64,
    was_tracked_last_frame: bool,
    fragmentations: u64,
}

/// Accumulates CLEAR MOT statistics across all frames of a sequence (or
/// many sequences, if fed in order without resetting).
#[derive(Debug)]
pub struct MotAccumulator {
    iou_threshold: f64,
    total_gt: u64,
    total_fp: u64,
    total_misses: u64,
    total_idsw: u64,
    total_matches: u64,
    total_match_distance: f64,
    last_match: HashMap<u64, u64>,
    trajectories: HashMap<u64, TrajectoryStats>,
}

impl MotAccumulator {
    /// `iou_threshold` is the minimum IoU (0 < t <= 1) for a gt/hypothesis
    /// pair to be considered a valid match.
    pub fn new(iou_threshold: f64) -> Self {
        Self {
            iou_threshold,
            total_gt: 0,
            total_fp: 0,
            total_misses: 0,
            total_idsw: 0,
            total_matches: 0,
            total_match_distance: 0.0,
            last_match: HashMap::new(),
            trajectories: HashMap::new(),
        }
    }

    /// Folds in one frame. `gt`/`hyp` are `(identity, box)` pairs; identities
    /// are caller-assigned and stable across frames.
    pub fn accumulate(&mut self, gt: &[(u64, BBox)], hyp: &[(u64, BBox)]) {
        let distance_gate = 1.0 - self.iou_threshold;

        let mut matched_gt = vec![false; gt.len()];
        let mut matched_hyp = vec![false; hyp.len()];
        let mut matches: Vec<(usize, usize, f64)> = Vec::new();

        // Prefer continuing the previous frame's assignment where it is
        // still within the gate, so a correspondence does not flicker
        // between equally-good hypotheses frame to frame.
        for (gi, &(gid, gbox)) in gt.iter().enumerate() {
            if let Some(&prev_hyp_id) = self.last_match.get(&gid) {
                if let Some(hi) = hyp.iter().position(|&(hid, _)| hid == prev_hyp_id) {
                    let d = iou_distance(gbox, hyp[hi].1);
                    if d <= distance_gate {
                        matched_gt[gi] = true;
                        matched_hyp[hi] = true;
                        matches.push((gi, hi, d));
                    }
                }
            }
        }

        let remaining_gt: Vec<usize> = (0..gt.len()).filter(|&i| !matched_gt[i]).collect();
        let remaining_hyp: Vec<usize> = (0..hyp.len()).filter(|&i| !matched_hyp[i]).collect();
        if !remaining_gt.is_empty() && !remaining_hyp.is_empty() {
            let cost: Vec<Vec<f64>> = remaining_gt
                .iter()
                .map(|&gi| remaining_hyp.iter().map(|&hi| iou_distance(gt[gi].1, hyp[hi].1)).collect())
                .collect();
            for (r, c) in optimal_assignment(&cost, distance_gate) {
                let gi = remaining_gt[r];
                let hi = remaining_hyp[c];
                matched_gt[gi] = true;
                matched_hyp[hi] = true;
                matches.push((gi, hi, cost[r][c]));
            }
        }

        let mut new_last_match = HashMap::with_capacity(gt.len());

        for &(gi, hi, d) in &matches {
            let gid = gt[gi].0;
            let hid = hyp[hi].0;
            if let Some(&prev_hid) = self.last_match.get(&gid) {
                if prev_hid != hid {
                    self.total_idsw += 1;
                }
            }
            new_last_match.insert(gid, hid);
            self.total_match_distance += d;
            self.total_matches += 1;

            let stats = self.trajectories.entry(gid).or_default();
            stats.total_frames += 1;
            stats.tracked_frames += 1;
            stats.was_tracked_last_frame = true;
        }

        for (gi, &(gid, _)) in gt.iter().enumerate() {
            if matched_gt[gi] {
                continue;
            }
            self.total_misses += 1;
            let stats = self.trajectories.entry(gid).or_default();
            stats.total_frames += 1;
            if stats.was_tracked_last_frame {
                stats.fragmentations += 1;
            }
            stats.was_tracked_last_frame = false;
            if let Some(&prev_hid) = self.last_match.get(&gid) {
                new_last_match.insert(gid, prev_hid);
            }
        }

        for matched in &matched_hyp {
            if !matched {
                self.total_fp += 1;
            }
        }

        self.total_gt += gt.len() as u64;
        self.last_match = new_last_match;
    }

    /// Computes the summary statistics accumulated so far.
    pub fn summary(&self) -> MetricsSummary {
        let mut mostly_tracked = 0u64;
        let mut partially_tracked = 0u64;
        let mut mostly_lost = 0u64;
        let mut fragmentations = 0u64;

        for stats in self.trajectories.values() {
            let ratio = stats.tracked_frames as f64 / stats.total_frames.max(1) as f64;
            if ratio >= 0.8 {
                mostly_tracked += 1;
            } else if ratio <= 0.2 {
                mostly_lost += 1;
            } else {
                partially_tracked += 1;
            }
            fragmentations += stats.fragmentations;
        }

        let mota = if self.total_gt == 0 {
            0.0
        } else {
            1.0 - (self.total_misses + self.total_fp + self.total_idsw) as f64 / self.total_gt as f64
        };
        let motp = if self.total_matches > 0 {
            self.total_match_distance / self.total_matches as f64
        } else {
            f64::NAN
        };
        let precision = if self.total_matches + self.total_fp > 0 {
            self.total_matches as f64 / (self.total_matches + self.total_fp) as f64
        } else {
            0.0
        };
        let recall = if self.total_gt > 0 {
            self.total_matches as f64 / self.total_gt as f64
        } else {
            0.0
        };

        MetricsSummary {
            mota,
            motp,
            precision,
            recall,
            mostly_tracked,
            partially_tracked,
            mostly_lost,
            fragmentations,
            id_switches: self.total_idsw,
            num_matches: self.total_matches,
            num_false_positives: self.total_fp,
            num_misses: self.total_misses,
            num_objects: self.total_gt,
        }
    }
}

/// Summary of a [`MotAccumulator`]'s state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSummary {
    pub mota: f64,
    pub motp: f64,
    pub precision: f64,
    pub recall: f64,
    pub mostly_tracked: u64,
    pub partially_tracked: u64,
    pub mostly_lost: u64,
    pub fragmentations: u64,
    pub id_switches: u64,
    pub num_matches: u64,
    pub num_false_positives: u64,
    pub num_misses: u64,
    pub num_objects: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_tracker_has_mota_one() {
        let mut acc = MotAccumulator::new(0.5);
        for _ in 0..10 {
            acc.accumulate(&[(1, [0.0, 0.0, 10.0, 10.0])], &[(1, [0.0, 0.0, 10.0, 10.0])]);
        }
        let summary = acc.summary();
        assert!((summary.mota - 1.0).abs() < 1e-9);
        assert_eq!(summary.id_switches, 0);
        assert_eq!(summary.mostly_tracked, 1);
    }

    #[test]
    fn missed_detection_counts_as_a_miss() {
        let mut acc = MotAccumulator::new(0.5);
        acc.accumulate(&[(1, [0.0, 0.0, 10.0, 10.0])], &[]);
        let summary = acc.summary();
        assert_eq!(summary.num_misses, 1);
        assert_eq!(summary.num_matches, 0);
    }

    #[test]
    fn extra_hypothesis_counts_as_false_positive() {
        let mut acc = MotAccumulator::new(0.5);
        acc.accumulate(&[], &[(1, [0.0, 0.0, 10.0, 10.0])]);
        let summary = acc.summary();
        assert_eq!(summary.num_false_positives, 1);
    }

    #[test]
    fn identity_swap_is_counted_as_id_switch() {
        let mut acc = MotAccumulator::new(0.5);
        acc.accumulate(&[(1, [0.0, 0.0, 10.0, 10.0])], &[(100, [0.0, 0.0, 10.0, 10.0])]);
        acc.accumulate(&[(1, [0.0, 0.0, 10.0, 10.0])], &[(200, [0.0, 0.0, 10.0, 10.0])]);
        let summary = acc.summary();
        assert_eq!(summary.id_switches, 1);
    }

    #[test]
    fn disjoint_boxes_below_threshold_are_not_matched() {
        let mut acc = MotAccumulator::new(0.5);
        acc.accumulate(&[(1, [0.0, 0.0, 1.0, 1.0])], &[(1, [100.0, 100.0, 101.0, 101.0])]);
        let summary = acc.summary();
        assert_eq!(summary.num_matches, 0);
        assert_eq!(summary.num_misses, 1);
        assert_eq!(summary.num_false_positives, 1);
    }
}
