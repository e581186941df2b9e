//! MOTChallenge-format CSV I/O and `seqinfo.ini` parsing. Reading/writing
//! this format is explicitly a harness concern, not part of the tracker
//! core.

use std::path::Path;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracker_core::metrics::BBox;

/// One row of a MOTChallenge `gt.txt`/`det.txt`/hypothesis file:
/// `frame,id,bb_left,bb_top,bb_width,bb_height,conf,x,y,z`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MotRow {
    pub frame: i64,
    pub id: i64,
    pub bb_left: f64,
    pub bb_top: f64,
    pub bb_width: f64,
    pub bb_height: f64,
    pub conf: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl MotRow {
    pub fn bbox(&self) -> BBox {
        [self.bb_left, self.bb_top, self.bb_left + self.bb_width, self.bb_top + self.bb_height]
    }
}

/// Reads an entire MOTChallenge-format CSV file (no header row).
pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<MotRow>> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("opening MOTChallenge file {}", path.display()))?;

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: MotRow = record.with_context(|| format!("parsing row in {}", path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Writes hypothesis rows in MOTChallenge format.
pub fn write_rows(path: impl AsRef<Path>, rows: &[MotRow]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("creating output file {}", path.display()))?;

    for row in rows {
        writer.serialize(row).with_context(|| format!("writing row to {}", path.display()))?;
    }
    writer.flush().with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}

/// Groups rows by frame number, in ascending frame order.
pub fn group_by_frame(rows: &[MotRow]) -> Vec<(i64, Vec<MotRow>)> {
    let mut frames: Vec<i64> = rows.iter().map(|r| r.frame).collect();
    frames.sort_unstable();
    frames.dedup();

    frames
        .into_iter()
        .map(|frame| (frame, rows.iter().filter(|r| r.frame == frame).copied().collect()))
        .collect()
}

/// The handful of `seqinfo.ini` fields the harness needs.
#[derive(Debug, Clone, Copy)]
pub struct SequenceInfo {
    pub seq_length: u64,
    pub frame_rate: f64,
}

/// Parses `seqLength` and `frameRate` out of a MOTChallenge `seqinfo.ini`.
pub fn read_seqinfo(path: impl AsRef<Path>) -> Result<SequenceInfo> {
    let path = path.as_ref();
    let conf = ini::Ini::load_from_file(path).with_context(|| format!("loading {}", path.display()))?;
    let section = conf.section(Some("Sequence")).ok_or_else(|| eyre::eyre!("{} is missing a [Sequence] section", path.display()))?;

    let seq_length: u64 = section
        .get("seqLength")
        .ok_or_else(|| eyre::eyre!("{} is missing seqLength", path.display()))?
        .parse()
        .with_context(|| format!("parsing seqLength in {}", path.display()))?;
    let frame_rate: f64 = section
        .get("frameRate")
        .ok_or_else(|| eyre::eyre!("{} is missing frameRate", path.display()))?
        .parse()
        .with_context(|| format!("parsing frameRate in {}", path.display()))?;

    Ok(SequenceInfo { seq_length, frame_rate })
}
