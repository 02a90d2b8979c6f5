use std::{fmt, fs, io::ErrorKind, str::FromStr};

use anyhow::{Context, Result, ensure};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::systems::{
    classifier::ClassifierSettings,
    cursor::{CursorAnchor, CursorSettings, TrackingMode},
    debounce::DebounceSettings,
    dodge::DodgeSettings,
    guard::GuardSettings,
    punch::PunchSettings,
    smoothing::FilterSettings,
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Hands scored below this by the detector are treated as absent
    pub min_detection_confidence: f32,

    pub cursor: CursorSettings,
    pub gestures: ClassifierSettings,
    pub debounce: DebounceSettings,
    pub punch: PunchSettings,
    pub guard: GuardSettings,
    pub dodge: DodgeSettings,

    // -------- STAGE SWITCHES
    /// Pinch/Release, GestureChange, PalmOpen and Point events
    pub enable_gesture_events: bool,
    pub enable_punches: bool,
    pub enable_guard: bool,
    pub enable_dodge: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            min_detection_confidence: 0.5,
            cursor: CursorSettings::default(),
            gestures: ClassifierSettings::default(),
            debounce: DebounceSettings::default(),
            punch: PunchSettings::default(),
            guard: GuardSettings::default(),
            dodge: DodgeSettings::default(),
            enable_gesture_events: true,
            enable_punches: true,
            enable_guard: true,
            enable_dodge: true,
        }
    }
}

/// The games in the hub, each with its own cursor feel and set of detectors
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum GamePreset {
    Boxing,
    Flappy,
    FruitSlice,
    Particles,
    Menu,
}

impl GamePreset {
    pub const ALL: [GamePreset; 5] = [
        GamePreset::Boxing,
        GamePreset::Flappy,
        GamePreset::FruitSlice,
        GamePreset::Particles,
        GamePreset::Menu,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GamePreset::Boxing => "boxing",
            GamePreset::Flappy => "flappy",
            GamePreset::FruitSlice => "fruitSlice",
            GamePreset::Particles => "particles",
            GamePreset::Menu => "menu",
        }
    }
}

impl fmt::Display for GamePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GamePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GamePreset::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let names: Vec<&str> = GamePreset::ALL.iter().map(|p| p.name()).collect();
                format!("unknown game \"{}\", expected one of {}", s, names.join(", "))
            })
    }
}

impl PipelineConfig {
    pub fn for_game(game: GamePreset) -> Self {
        let defaults = PipelineConfig::default();
        let no_boxing = PipelineConfig {
            enable_punches: false,
            enable_guard: false,
            enable_dodge: false,
            ..defaults.clone()
        };
        match game {
            GamePreset::Boxing => PipelineConfig {
                cursor: CursorSettings {
                    mode: TrackingMode::Dual,
                    anchor: CursorAnchor::PalmCenter,
                    filter: FilterSettings::new(1.0, 0.15, 1.0),
                    ..defaults.cursor
                },
                punch: PunchSettings {
                    depth_filter: Some(FilterSettings::punch_depth()),
                    ..defaults.punch
                },
                ..defaults
            },
            GamePreset::Flappy | GamePreset::Menu => PipelineConfig {
                cursor: CursorSettings {
                    mode: TrackingMode::Single,
                    anchor: CursorAnchor::IndexTip,
                    filter: FilterSettings::cursor(),
                    ..defaults.cursor
                },
                ..no_boxing
            },
            GamePreset::FruitSlice => PipelineConfig {
                cursor: CursorSettings {
                    mode: TrackingMode::Dual,
                    anchor: CursorAnchor::IndexTip,
                    filter: FilterSettings::fast_motion(),
                    ..defaults.cursor
                },
                ..no_boxing
            },
            GamePreset::Particles => PipelineConfig {
                cursor: CursorSettings {
                    mode: TrackingMode::Dual,
                    anchor: CursorAnchor::PalmCenter,
                    filter: FilterSettings::manipulation(),
                    ..defaults.cursor
                },
                ..no_boxing
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0. ..=1.).contains(&self.min_detection_confidence),
            "minDetectionConfidence must be within [0,1], got {}",
            self.min_detection_confidence
        );
        self.cursor.validate().context("invalid cursor settings")?;
        self.gestures.validate().context("invalid gesture settings")?;
        self.debounce.validate().context("invalid debounce settings")?;
        self.punch.validate().context("invalid punch settings")?;
        self.guard.validate().context("invalid guard settings")?;
        self.dodge.validate().context("invalid dodge settings")?;
        Ok(())
    }

    pub fn write_config_to_file(&self, config_file_path: &str) -> Result<()> {
        debug!("Current state of config: {:?}", self);
        let text = serde_json::to_string_pretty(self)?;
        fs::write(config_file_path, text)
            .with_context(|| format!("Error writing config to file {}", config_file_path))?;
        info!("Wrote config to file: {:?}", config_file_path);
        Ok(())
    }
}

/// Missing file means defaults; anything else that goes wrong is an error
pub fn load_config_from_file(config_file_path: &str) -> Result<PipelineConfig> {
    let config = match fs::read_to_string(config_file_path) {
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(
                "Pipeline config file not found at {}, using defaults",
                config_file_path
            );
            PipelineConfig::default()
        }
        Err(e) => {
            return Err(e).with_context(|| {
                format!("Failed to load pipeline config from {}", config_file_path)
            });
        }
        Ok(s) => {
            let loaded = serde_json::from_str::<PipelineConfig>(&s)
                .with_context(|| format!("Failed to parse config data in {}", config_file_path))?;
            info!("Loaded pipeline config OK from \"{}\"", config_file_path);
            debug!("Config parsed data from file: {:?}", &loaded);
            loaded
        }
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::Hand;

    fn temp_path(name: &str) -> String {
        std::env::temp_dir()
            .join(format!("{}-{}.json", name, std::process::id()))
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cursor.mode, TrackingMode::Dual);
        assert!(config.enable_punches && config.enable_guard && config.enable_dodge);
    }

    #[test]
    fn test_every_preset_is_valid() {
        for game in GamePreset::ALL {
            assert!(PipelineConfig::for_game(game).validate().is_ok(), "{}", game);
        }
    }

    #[test]
    fn test_presets_differ_where_games_differ() {
        let boxing = PipelineConfig::for_game(GamePreset::Boxing);
        assert_eq!(boxing.cursor.anchor, CursorAnchor::PalmCenter);
        assert!(boxing.enable_punches);
        assert_eq!(boxing.punch.depth_filter, Some(FilterSettings::punch_depth()));

        let menu = PipelineConfig::for_game(GamePreset::Menu);
        assert_eq!(menu.cursor.mode, TrackingMode::Single);
        assert!(!menu.enable_punches && !menu.enable_guard && !menu.enable_dodge);

        let fruit = PipelineConfig::for_game(GamePreset::FruitSlice);
        assert_eq!(fruit.cursor.filter, FilterSettings::fast_motion());
    }

    #[test]
    fn test_preset_names_parse() {
        assert_eq!("boxing".parse::<GamePreset>(), Ok(GamePreset::Boxing));
        assert_eq!("FruitSlice".parse::<GamePreset>(), Ok(GamePreset::FruitSlice));
        assert!("tetris".parse::<GamePreset>().is_err());
        for game in GamePreset::ALL {
            assert_eq!(game.to_string().parse::<GamePreset>(), Ok(game));
        }
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{
            "minDetectionConfidence": 0.7,
            "cursor": { "mode": "single", "filter": { "beta": 0.02 } },
            "punch": { "leadHand": "right" },
            "enableDodge": false
        }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.min_detection_confidence, 0.7);
        assert_eq!(config.cursor.mode, TrackingMode::Single);
        assert_eq!(config.cursor.anchor, CursorAnchor::IndexTip);
        assert_eq!(config.cursor.filter.beta, 0.02);
        assert_eq!(config.cursor.filter.min_cutoff, 1.0);
        assert_eq!(config.punch.lead_hand, Hand::Right);
        assert!(!config.enable_dodge);
        assert!(config.enable_guard);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = PipelineConfig::default();
        config.min_detection_confidence = 1.5;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.cursor.filter.min_cutoff = 0.;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.guard.max_separation = -1.;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = load_config_from_file("/nonexistent/dir/gestures.json").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_write_then_load() {
        let path = temp_path("pipeline-config");
        let config = PipelineConfig::for_game(GamePreset::Particles);
        config.write_config_to_file(&path).unwrap();
        let loaded = load_config_from_file(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_bad_file_contents_are_errors() {
        let path = temp_path("pipeline-config-bad");
        fs::write(&path, "{ not json").unwrap();
        assert!(load_config_from_file(&path).is_err());

        fs::write(&path, r#"{ "dodge": { "threshold": 0.9 } }"#).unwrap();
        assert!(load_config_from_file(&path).is_err());
        let _ = fs::remove_file(&path);
    }
}
