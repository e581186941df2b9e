use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "multitrack", about = "Offline harness for tracker_core")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Runs the tracker over one MOTChallenge-format sequence directory.
    Mot {
        /// Directory containing det.txt (or det/det.txt), and optionally
        /// gt.txt (or gt/gt.txt) and seqinfo.ini.
        #[arg(long)]
        sequence_dir: PathBuf,

        /// TOML tracker configuration; defaults are used if omitted.
        #[arg(long)]
        config: Option<String>,

        /// Where to write the hypothesis file.
        #[arg(long, default_value = "hypothesis.txt")]
        output: PathBuf,

        /// IoU threshold used when matching ground truth to hypotheses
        /// for metric accumulation.
        #[arg(long, default_value_t = 0.5)]
        iou_match_threshold: f64,
    },

    /// Runs a synthetic multi-object sequence and prints the tracked
    /// objects each frame, to confirm the tracker works end to end.
    Demo {
        #[arg(long, default_value_t = 60)]
        frames: u64,

        /// TOML tracker configuration; defaults are used if omitted.
        #[arg(long)]
        config: Option<String>,
    },
}
