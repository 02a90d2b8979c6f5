use std::{
    fs::File,
    io::{self, Write},
};

use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::{debug, info};

use hand_gesture_pipeline::pipeline_config::{PipelineConfig, load_config_from_file};
use hand_gesture_pipeline::replay_interface::{EventWriter, load_recording, replay};
use hand_gesture_pipeline::systems::Systems;

mod cli;
use cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger from the environment
    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();

    debug!("Started; args: {:?}", cli);

    let config = match cli.preset {
        Some(game) => {
            info!("Using built-in preset for {}", game);
            PipelineConfig::for_game(game)
        }
        None => load_config_from_file(&cli.config_path)?,
    };

    if let Some(path) = &cli.write_config_path {
        config.write_config_to_file(path)?;
    }

    let frames = load_recording(&cli.recording_path)?;
    let mut systems = Systems::new(&config)?;

    let summary = match &cli.output_path {
        Some(path) => {
            let mut writer = EventWriter::new(File::create(path)?, cli.output_format);
            let summary = replay(&frames, &mut systems, &mut writer)?;
            writer.finish()?.sync_all()?;
            info!("Wrote {} events to {}", summary.total_events(), path);
            summary
        }
        None => {
            let mut writer = EventWriter::new(io::stdout().lock(), cli.output_format);
            let summary = replay(&frames, &mut systems, &mut writer)?;
            writer.finish()?.flush()?;
            summary
        }
    };

    info!(
        "Done: {} punches, {} pinches, {} dodges",
        summary.count("punch"),
        summary.count("pinch"),
        summary.count("dodge")
    );

    Ok(())
}
