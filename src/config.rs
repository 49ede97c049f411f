//! Input settings, persisted as TOML next to the other per-user configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::InputError;
use crate::input::event::Rotation;
use crate::keymap::layout::ScanEncoding;

const CONFIG_DIR: &str = "boardinput";
const CONFIG_FILE: &str = "input.toml";

/// Hardware family the binary brings up
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BoardKind {
    /// TCA8418 keyboard, falling back to the scanned keyboard
    #[default]
    CardputerAdv,
    /// Scanned GPIO keyboard only
    Cardputer,
    /// CST816 touch panel plus two click buttons
    TouchDisplay,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct InputSettings {
    /// Minimum spacing between processed press cycles
    pub debounce_ms: u32,
    /// Keypad controller poll cadence, matching its internal scan rate
    pub matrix_poll_ms: u32,
    pub home_rate_limit_ms: u32,
    pub short_press_ms: u32,
    pub long_press_ms: u32,
    pub button_sample_ms: u64,
    pub idle_timeout_ms: u32,
    pub poll_interval_ms: u64,

    pub board: BoardKind,
    pub scan_encoding: ScanEncoding,
    pub tca8418_address: u8,
    pub cst816_address: u8,
    /// Raw panel coordinate reported by the home/center region
    pub home_button: (i16, i16),
    pub battery_divider: u32,
    pub rotation: u8,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 200,
            matrix_poll_ms: 100,
            home_rate_limit_ms: 200,
            short_press_ms: 120,
            long_press_ms: 600,
            button_sample_ms: 5,
            idle_timeout_ms: 30_000,
            poll_interval_ms: 10,
            board: BoardKind::default(),
            scan_encoding: ScanEncoding::default(),
            tca8418_address: 0x34,
            cst816_address: 0x15,
            home_button: (85, 360),
            battery_divider: 1,
            rotation: 0,
        }
    }
}

impl InputSettings {
    /// `<config dir>/boardinput/input.toml`
    pub fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| {
            warn!("Could not determine config directory, using current directory");
            PathBuf::from(".")
        });
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    pub fn from_toml(content: &str) -> Result<Self, InputError> {
        toml::from_str(content).map_err(|e| InputError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, InputError> {
        toml::to_string_pretty(self).map_err(|e| InputError::Config(e.to_string()))
    }

    pub fn initial_rotation(&self) -> Result<Rotation, InputError> {
        Rotation::try_from(self.rotation)
    }

    /// Reads settings from `path`. A missing or malformed file never blocks
    /// startup: both yield the defaults.
    pub async fn load_or_default(path: &Path) -> Self {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => match Self::from_toml(&content) {
                Ok(settings) => {
                    info!("Loaded input settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    warn!("Ignoring malformed settings in {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                warn!("Failed to read {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    pub async fn save(&self, path: &Path) -> Result<(), InputError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| InputError::Config(format!("Failed to create config directory: {}", e)))?;
        }
        let content = self.to_toml()?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| InputError::Config(format!("Failed to write {}: {}", path.display(), e)))?;
        info!("Input settings saved to {}", path.display());
        Ok(())
    }
}
