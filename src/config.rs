//! Configuration loaded from `~/.config/swipecap/config.toml`.
//!
//! Every section is optional; a missing file yields the defaults.
//!
//! ```toml
//! [paths]
//! captions_dir = "captions"
//!
//! [timing]
//! global_offset = -0.08
//!
//! [style]
//! font_key = "montserrat_bold"
//! highlight_color = [0, 255, 180, 255]
//!
//! [motion]
//! selection = { mode = "seeded", seed = 7 }
//!
//! [encoder]
//! preset = "veryfast"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::caption::{MotionConfig, StyleOverrides, TimingConfig};
use crate::compositor::EncoderConfig;
use crate::transcribe::TranscriberConfig;

/// File locations, relative paths resolve against the working directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Scene script (`{"scenes": [...]}`)
    pub script: PathBuf,
    /// `scene_{id}.mp3` narration tracks
    pub audio_dir: PathBuf,
    /// `scene_{id}.jpg` backgrounds
    pub image_dir: PathBuf,
    /// `scene_{id}.json` caption artifacts
    pub captions_dir: PathBuf,
    /// Rendered scenes and the final short
    pub output_dir: PathBuf,
    /// Root that allow-listed font paths resolve against
    pub font_dir: PathBuf,
    /// Scratch space for raw caption frames
    pub work_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            script: PathBuf::from("data/scenes.json"),
            audio_dir: PathBuf::from("assets/audio"),
            image_dir: PathBuf::from("assets/images"),
            captions_dir: PathBuf::from("captions"),
            output_dir: PathBuf::from("output"),
            font_dir: PathBuf::from("."),
            work_dir: std::env::temp_dir().join("swipecap"),
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub timing: TimingConfig,
    /// Sparse caption style overrides, resolved leniently
    pub style: StyleOverrides,
    pub motion: MotionConfig,
    pub encoder: EncoderConfig,
    pub transcriber: TranscriberConfig,
}

impl AppConfig {
    /// Parse a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("invalid swipecap config")
    }

    /// Load from `path`, or from the default location when `None`.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (config_path(), false),
        };

        if !path.exists() {
            if required {
                anyhow::bail!("config file not found: {}", path.display());
            }
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        toml::from_str(&content).with_context(|| format!("invalid TOML in {}", path.display()))
    }
}

/// Return the path to the default config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("swipecap")
        .join("config.toml")
}
