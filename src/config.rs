//! Configuration file handling for camera-preview.
//!
//! Loads configuration from `<config dir>/camera-preview/config.toml` or a custom path.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::camera::{
    CameraIdentity, CameraSettingsBuilder, CropPolicy, Resolution, SizeConstraints,
    DEFAULT_OPEN_TIMEOUT, DEFAULT_SAMPLE_INTERVAL,
};

/// Template written by `config init`. Parses to [`Config::default`].
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# camera-preview configuration

[camera]
# Camera to open first: "0" = back, "1" = front (default: first usable)
# id = "0"
# Display rotation in degrees: 0, 90, 180, 270
rotation = 0
# Mirror the preview horizontally
mirror = false
# Preview size bounds and exact size (WIDTHxHEIGHT)
# max_size = "1920x1080"
# min_size = "320x240"
# preview_size = "1280x720"
# Viewfinder size used to match the preview aspect ratio
# viewport = "1080x1920"
# How long open and close wait for the camera lock
open_timeout_ms = 2500
# Reassemble frames into NV21
convert_frames = true
# Trim the padding seam: none, trim-column, trim-row
crop = "none"

[simulator]
# Time between synthetic frames
frame_interval_ms = 33
# Extra bytes at the end of every row (at most 4096)
row_padding = 0

[host]
# Size of the simulated preview view
view_size = "1080x1920"
# Process every Nth frame
sample_interval = 30
"#;

/// Configuration file structure for camera-preview.
/// Loaded from <config dir>/camera-preview/config.toml (or custom path via --config).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub host: HostConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CameraConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub rotation: u32,
    pub mirror: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<String>,
    pub open_timeout_ms: u64,
    pub convert_frames: bool,
    pub crop: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            id: None,
            rotation: 0,
            mirror: false,
            max_size: None,
            min_size: None,
            preview_size: None,
            viewport: None,
            open_timeout_ms: DEFAULT_OPEN_TIMEOUT.as_millis() as u64,
            convert_frames: true,
            crop: "none".to_string(),
        }
    }
}

impl CameraConfig {
    /// Size bounds, exact size and viewport parsed from their `WxH` strings.
    pub fn size_constraints(&self) -> Result<SizeConstraints, ConfigError> {
        Ok(SizeConstraints {
            max: parse_size("camera.max_size", self.max_size.as_deref())?,
            min: parse_size("camera.min_size", self.min_size.as_deref())?,
            exact: parse_size("camera.preview_size", self.preview_size.as_deref())?,
            viewport: parse_size("camera.viewport", self.viewport.as_deref())?,
        })
    }

    pub fn crop_policy(&self) -> Result<CropPolicy, ConfigError> {
        match self.crop.as_str() {
            "none" => Ok(CropPolicy::None),
            "trim-column" => Ok(CropPolicy::TrimTrailingColumn),
            "trim-row" => Ok(CropPolicy::TrimTrailingRow),
            other => Err(ConfigError::InvalidValue {
                key: "camera.crop",
                message: format!("'{other}' is not one of none, trim-column, trim-row"),
            }),
        }
    }

    /// Copy these settings onto `builder`. The preview surface is left to
    /// the caller.
    pub fn apply(&self, builder: CameraSettingsBuilder) -> Result<CameraSettingsBuilder, ConfigError> {
        let constraints = self.size_constraints()?;
        let mut builder = builder
            .display_rotation_degrees(self.rotation)
            .mirror(self.mirror)
            .open_timeout(Duration::from_millis(self.open_timeout_ms))
            .convert_frames(self.convert_frames)
            .crop(self.crop_policy()?);
        if let Some(id) = &self.id {
            builder = builder.camera(CameraIdentity::new(id.as_str()));
        }
        if let Some(max) = constraints.max {
            builder = builder.max_preview_size(max);
        }
        if let Some(min) = constraints.min {
            builder = builder.min_preview_size(min);
        }
        if let Some(exact) = constraints.exact {
            builder = builder.preview_size(exact);
        }
        if let Some(viewport) = constraints.viewport {
            builder = builder.viewport_size(viewport);
        }
        Ok(builder)
    }
}

/// Largest per-row padding the simulator accepts.
pub const MAX_ROW_PADDING: u32 = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub frame_interval_ms: u64,
    pub row_padding: u32,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 33,
            row_padding: 0,
        }
    }
}

impl SimulatorConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.row_padding > MAX_ROW_PADDING {
            return Err(ConfigError::InvalidValue {
                key: "simulator.row_padding",
                message: format!("{} exceeds {MAX_ROW_PADDING} bytes", self.row_padding),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    pub view_size: String,
    pub sample_interval: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            view_size: "1080x1920".to_string(),
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
        }
    }
}

impl HostConfig {
    pub fn view_size(&self) -> Result<Resolution, ConfigError> {
        parse_size("host.view_size", Some(self.view_size.as_str()))?.ok_or(ConfigError::InvalidValue {
            key: "host.view_size",
            message: "must not be empty".to_string(),
        })
    }
}

fn parse_size(key: &'static str, value: Option<&str>) -> Result<Option<Resolution>, ConfigError> {
    value
        .map(|s| {
            s.parse::<Resolution>().map_err(|e| ConfigError::InvalidValue {
                key,
                message: e.to_string(),
            })
        })
        .transpose()
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                source: e,
            })?;
            config.simulator.validate()?;
            log::debug!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Config::default())
        }
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", .path.display())]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to render config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("camera-preview").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/camera-preview/config.toml")
        })
}
