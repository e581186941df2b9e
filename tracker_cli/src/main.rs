mod cli;
mod config;
mod demo;
mod logging;
mod mot;
mod motchallenge;

use clap::Parser;
use eyre::Result;
use tracing::info;

use cli::{Cli, Command};
use config::TrackerConfigFile;

fn main() -> Result<()> {
    let _tracing_guard = logging::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Mot { sequence_dir, config, output, iou_match_threshold } => {
            let outcome = mot::run_sequence(&mot::SequenceArgs {
                sequence_dir,
                config_path: config,
                output_path: output,
                iou_match_threshold,
            })?;
            info!(hypothesis_rows = outcome.hypothesis_rows.len(), "sequence complete");
        }
        Command::Demo { frames, config } => {
            let config = match config {
                Some(path) => TrackerConfigFile::load_from_file(&path)?,
                None => TrackerConfigFile::default(),
            };
            let mut tracker = config.build_tracker()?;
            demo::run(&mut tracker, frames);
        }
    }

    Ok(())
}
