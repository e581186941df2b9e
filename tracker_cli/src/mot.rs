//! Drives a `Tracker` over one MOTChallenge-format sequence directory and,
//! if ground truth is present, accumulates CLEAR MOT metrics.

use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use tracing::info;

use tracker_core::numerics::PointMatrix;
use tracker_core::{Detection, MetricsSummary, MotAccumulator};

use crate::config::TrackerConfigFile;
use crate::motchallenge::{self, MotRow};

pub struct SequenceArgs {
    pub sequence_dir: PathBuf,
    pub config_path: Option<String>,
    pub output_path: PathBuf,
    pub iou_match_threshold: f64,
}

pub struct SequenceOutcome {
    pub hypothesis_rows: Vec<MotRow>,
    pub metrics: Option<MetricsSummary>,
}

/// Runs the MOTChallenge harness on a single sequence directory, which is
/// expected to contain `det.txt`, an optional `gt.txt`, and an optional
/// `seqinfo.ini`.
pub fn run_sequence(args: &SequenceArgs) -> Result<SequenceOutcome> {
    let config = match &args.config_path {
        Some(path) => TrackerConfigFile::load_from_file(path)?,
        None => TrackerConfigFile::default(),
    };
    let mut tracker = config.build_tracker()?;

    let det_path = args.sequence_dir.join("det").join("det.txt");
    let det_path = if det_path.exists() { det_path } else { args.sequence_dir.join("det.txt") };
    let detections = motchallenge::read_rows(&det_path)?;
    let frames = motchallenge::group_by_frame(&detections);

    let gt_path = first_existing(&[args.sequence_dir.join("gt").join("gt.txt"), args.sequence_dir.join("gt.txt")]);
    let gt_rows = gt_path.as_ref().map(motchallenge::read_rows).transpose()?;
    let gt_by_frame = gt_rows.as_ref().map(|rows| motchallenge::group_by_frame(rows));

    if let Some(seq_info) = read_seqinfo(&args.sequence_dir) {
        info!(seq_length = seq_info.seq_length, frame_rate = seq_info.frame_rate, "read seqinfo.ini");
        if seq_info.seq_length != frames.len() as u64 {
            tracing::warn!(
                seq_length = seq_info.seq_length,
                detected_frames = frames.len(),
                "seqinfo.ini seqLength does not match the number of frames with detections"
            );
        }
    }

    let mut accumulator = gt_by_frame.as_ref().map(|_| MotAccumulator::new(args.iou_match_threshold));
    let mut hypothesis_rows = Vec::new();

    for (frame, rows) in &frames {
        let dets: Vec<Detection> = rows
            .iter()
            .map(|row| {
                let bbox = row.bbox();
                let points = PointMatrix::from_row_slice(2, 2, &[bbox[0], bbox[1], bbox[2], bbox[3]]);
                Detection::new(points, Some(vec![row.conf, row.conf]), None, None)
            })
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("building detections for frame {frame}"))?;

        tracker.update(dets, 1, None);

        for obj in tracker.visible_objects() {
            let estimate = obj.estimate();
            let (x1, y1, x2, y2) = (estimate[(0, 0)], estimate[(0, 1)], estimate[(1, 0)], estimate[(1, 1)]);
            hypothesis_rows.push(MotRow {
                frame: *frame,
                id: obj.id().expect("visible objects are always confirmed") as i64,
                bb_left: x1,
                bb_top: y1,
                bb_width: (x2 - x1).max(0.0),
                bb_height: (y2 - y1).max(0.0),
                conf: 1.0,
                x: -1.0,
                y: -1.0,
                z: -1.0,
            });
        }

        if let (Some(acc), Some(gt_by_frame)) = (accumulator.as_mut(), &gt_by_frame) {
            let gt_this_frame: Vec<(u64, [f64; 4])> = gt_by_frame
                .iter()
                .find(|(f, _)| f == frame)
                .map(|(_, rows)| rows.iter().map(|r| (r.id as u64, r.bbox())).collect())
                .unwrap_or_default();
            let hyp_this_frame: Vec<(u64, [f64; 4])> = hypothesis_rows
                .iter()
                .filter(|r| r.frame == *frame)
                .map(|r| (r.id as u64, r.bbox()))
                .collect();
            acc.accumulate(&gt_this_frame, &hyp_this_frame);
        }
    }

    motchallenge::write_rows(&args.output_path, &hypothesis_rows)?;
    info!(frames = frames.len(), output = %args.output_path.display(), "wrote hypothesis file");

    let metrics = accumulator.map(|a| a.summary());
    if let Some(summary) = &metrics {
        info!(
            mota = summary.mota,
            motp = summary.motp,
            precision = summary.precision,
            recall = summary.recall,
            id_switches = summary.id_switches,
            mostly_tracked = summary.mostly_tracked,
            mostly_lost = summary.mostly_lost,
            "sequence metrics"
        );
    }

    Ok(SequenceOutcome { hypothesis_rows, metrics })
}

fn first_existing(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| p.exists()).cloned()
}

fn read_seqinfo(sequence_dir: &Path) -> Option<motchallenge::SequenceInfo> {
    motchallenge::read_seqinfo(sequence_dir.join("seqinfo.ini")).ok()
}
