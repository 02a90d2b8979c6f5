use clap::Parser;
use hand_gesture_pipeline::{pipeline_config::GamePreset, replay_interface::OutputFormat};

// Some defaults; some of which can be overriden via CLI args
const CONFIG_FILE_PATH: &str = "./gestures.json";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Recorded session to replay (JSON array, .jsonl or .msgpack of frames)
    #[arg(long = "recording")]
    pub recording_path: String,

    /// Where to load pipeline config; ignored when a preset is given
    #[arg(long = "config", default_value_t = String::from(CONFIG_FILE_PATH))]
    pub config_path: String,

    /// Use the built-in tuning for one of the games instead of a config file
    #[arg(long = "preset")]
    pub preset: Option<GamePreset>,

    /// Write events here instead of stdout
    #[arg(long = "output")]
    pub output_path: Option<String>,

    /// json (one event per line) or msgpack
    #[arg(long = "outputFormat", default_value_t = OutputFormat::JsonLines)]
    pub output_format: OutputFormat,

    /// Save the effective config to this path before replaying
    #[arg(long = "writeConfig")]
    pub write_config_path: Option<String>,

    #[arg(long = "loglevel", default_value_t = String::from("info"))]
    pub log_level: String,
}
