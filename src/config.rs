//src/config.rs
use comfy_table::Color;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;
use thiserror::Error;
use tracing::warn;

use crate::calendar::DisplayState;
use crate::records::Recurrence;
use crate::store::OwnerId;

const CONFIG_FILE_NAME: &str = "config.toml";
const APP_CONFIG_DIR: &str = "fit-calendar";
const CONFIG_ENV_VAR: &str = "FIT_CALENDAR_CONFIG_DIR"; // Environment variable name

#[derive(Error, Debug)]
pub enum Error {
    #[error("Could not determine configuration directory.")]
    CannotDetermineConfigDir,
    #[error("I/O error accessing config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file (TOML): {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize config data (TOML): {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Invalid color name: {0}")]
    InvalidColor(String),
    #[error("Invalid owner id: it must not be empty.")]
    InvalidOwnerId,
    #[error("Invalid default recurrence '{0}' in config.")]
    InvalidRecurrence(String),
}

// Define standard colors using strum for easy iteration/parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum StandardColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    DarkGrey,
    DarkRed,
    DarkGreen,
    DarkYellow,
    DarkBlue,
    DarkMagenta,
    DarkCyan,
    Grey,
}

// Helper to convert our enum to comfy_table::Color
impl From<StandardColor> for Color {
    fn from(value: StandardColor) -> Self {
        match value {
            StandardColor::Black => Self::Black,
            StandardColor::Red => Self::Red,
            StandardColor::Green => Self::Green,
            StandardColor::Yellow => Self::Yellow,
            StandardColor::Blue => Self::Blue,
            StandardColor::Magenta => Self::Magenta,
            StandardColor::Cyan => Self::Cyan,
            StandardColor::White => Self::White,
            StandardColor::DarkGrey => Self::DarkGrey,
            StandardColor::DarkRed => Self::DarkRed,
            StandardColor::DarkGreen => Self::DarkGreen,
            StandardColor::DarkYellow => Self::DarkYellow,
            StandardColor::DarkBlue => Self::DarkBlue,
            StandardColor::DarkMagenta => Self::DarkMagenta,
            StandardColor::DarkCyan => Self::DarkCyan,
            StandardColor::Grey => Self::Grey,
        }
    }
}

// Helper to parse a string into our StandardColor enum
pub fn parse_color(color_str: &str) -> Result<StandardColor, Error> {
    StandardColor::iter()
        .find(|color| format!("{color:?}").eq_ignore_ascii_case(color_str.trim()))
        .ok_or_else(|| Error::InvalidColor(color_str.to_string()))
}

/// Colour names per cell state, parsed with [`parse_color`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)] // Ensure defaults are used if fields are missing
pub struct Theme {
    pub header_color: String,
    pub today_color: String,
    pub workout_color: String,
    pub payment_color: String,
    pub both_color: String,
    pub out_of_month_color: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            header_color: "Green".to_string(),
            today_color: "Blue".to_string(),
            workout_color: "Green".to_string(),
            payment_color: "Yellow".to_string(),
            both_color: "Cyan".to_string(),
            out_of_month_color: "DarkGrey".to_string(),
        }
    }
}

impl Theme {
    /// Foreground colour for a cell, `None` for plain cells. An unknown colour
    /// name falls back to no colour with a warning.
    #[must_use]
    pub fn color_for(&self, state: DisplayState) -> Option<StandardColor> {
        let name = match state {
            DisplayState::OutOfMonth => &self.out_of_month_color,
            DisplayState::Today => &self.today_color,
            DisplayState::WorkoutOnly => &self.workout_color,
            DisplayState::PaymentOnly => &self.payment_color,
            DisplayState::WorkoutAndPayment => &self.both_color,
            DisplayState::Plain => return None,
        };
        match parse_color(name) {
            Ok(color) => Some(color),
            Err(e) => {
                warn!("{e}; rendering {state} cells without colour");
                None
            }
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)] // Ensure defaults are used if fields are missing
pub struct Config {
    /// The signed-in user. `None` means signed out: nothing is fetched or written.
    pub owner_id: Option<String>,
    pub workout_categories: Vec<String>,
    pub payment_categories: Vec<String>,
    pub default_recurrence: String,
    pub max_workouts_per_cell: usize,
    pub currency: String,

    // Theming
    pub theme: Theme,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| (*s).to_string()).collect()
}

// Implement Default for Config manually to set defaults correctly
impl Default for Config {
    fn default() -> Self {
        Self {
            owner_id: None,
            workout_categories: strings(&[
                "Gym",
                "Swimming",
                "Yoga",
                "Running",
                "Cycling",
                "Pilates",
                "Tennis",
                "Basketball",
                "Soccer",
                "Jiu-jitsu",
                "Other",
            ]),
            payment_categories: strings(&[
                "Gym",
                "Jiu-jitsu dojo",
                "Swimming pool",
                "Yoga studio",
                "Pilates",
                "Climbing gym",
                "Boxing gym",
                "Tennis court",
                "Golf course",
                "Other",
            ]),
            default_recurrence: "monthly".to_string(),
            max_workouts_per_cell: 4,
            currency: "KRW".to_string(),
            theme: Theme::default(),
        }
    }
}

impl Config {
    /// The authenticated identity, if any. Blank ids count as signed out.
    #[must_use]
    pub fn owner(&self) -> Option<OwnerId> {
        self.owner_id.as_deref().and_then(OwnerId::new)
    }

    pub fn set_owner(&mut self, id: &str) -> Result<(), Error> {
        let owner = OwnerId::new(id).ok_or(Error::InvalidOwnerId)?;
        self.owner_id = Some(owner.as_str().to_string());
        Ok(())
    }

    pub fn clear_owner(&mut self) {
        self.owner_id = None;
    }

    pub fn default_recurrence(&self) -> Result<Recurrence, Error> {
        self.default_recurrence
            .parse()
            .map_err(|_| Error::InvalidRecurrence(self.default_recurrence.clone()))
    }
}

/// Determines the path to the configuration file.
/// Exposed at crate root as get_config_path_util
pub fn get_config_path() -> Result<PathBuf, Error> {
    let config_dir_override = std::env::var(CONFIG_ENV_VAR).ok();

    let config_dir_path = if let Some(path_str) = config_dir_override {
        let path = PathBuf::from(path_str);
        if !path.is_dir() {
            warn!(
                "Environment variable {} points to '{}', which is not a directory. Trying to create it.",
                CONFIG_ENV_VAR,
                path.display()
            );
            fs::create_dir_all(&path)?;
        }
        path
    } else {
        let base_config_dir = dirs::config_dir().ok_or(Error::CannotDetermineConfigDir)?;
        base_config_dir.join(APP_CONFIG_DIR)
    };

    if !config_dir_path.exists() {
        fs::create_dir_all(&config_dir_path)?;
    }

    Ok(config_dir_path.join(CONFIG_FILE_NAME))
}

/// Loads the configuration from the TOML file at the given path.
/// A missing file is created with defaults.
pub fn load_config(config_path: &Path) -> Result<Config, Error> {
    if config_path.exists() {
        let config_content = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&config_content).map_err(Error::TomlParse)?;
        Ok(config)
    } else {
        let default_config = Config::default();
        save_config(config_path, &default_config)?;
        Ok(default_config)
    }
}

/// Saves the configuration to the TOML file.
pub fn save_config(config_path: &Path, config: &Config) -> Result<(), Error> {
    if let Some(parent_dir) = config_path.parent() {
        if !parent_dir.exists() {
            fs::create_dir_all(parent_dir)?;
        }
    }
    let config_content = toml::to_string_pretty(config).map_err(Error::TomlSerialize)?;
    fs::write(config_path, config_content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let config = load_config(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "owner_id = \"me@example.com\"\n[theme]\ntoday_color = \"Red\"\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.owner().unwrap().as_str(), "me@example.com");
        assert_eq!(config.theme.today_color, "Red");
        assert_eq!(config.theme.payment_color, "Yellow");
        assert_eq!(config.max_workouts_per_cell, 4);
    }

    #[test]
    fn owner_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut config = Config::default();
        assert!(config.set_owner("   ").is_err());
        config.set_owner(" user-1 ").unwrap();
        save_config(&path, &config).unwrap();
        assert_eq!(load_config(&path).unwrap().owner_id.as_deref(), Some("user-1"));

        config.clear_owner();
        assert!(config.owner().is_none());
        config.owner_id = Some("  ".into());
        assert!(config.owner().is_none());
    }

    #[test]
    fn theme_colors() {
        let theme = Theme::default();
        assert_eq!(theme.color_for(DisplayState::Today), Some(StandardColor::Blue));
        assert_eq!(theme.color_for(DisplayState::Plain), None);
        let broken = Theme {
            today_color: "Chartreuse".into(),
            ..Theme::default()
        };
        assert_eq!(broken.color_for(DisplayState::Today), None);
        assert_eq!(parse_color("darkgrey").unwrap(), StandardColor::DarkGrey);
    }
}
