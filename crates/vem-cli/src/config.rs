//! Settings for the `vem` binary.
//!
//! Later sources win: built-in defaults, `<config dir>/vem/config.toml`, the
//! file passed with `--config`, then `VEM_` environment variables. Nested
//! keys use a double underscore, e.g. `VEM_CAPTURE__PLAYBACK_RATE=2`.
//!
//! ```toml
//! database_path = "/srv/vem/vem.db"
//!
//! [capture]
//! playback_rate = 2
//! autoplay = true
//! split = false
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use vem_core::PlaybackRate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite file holding analyses and captures.
    pub database_path: PathBuf,
    #[serde(default)]
    pub capture: CaptureSettings,
}

/// How `vem capture` sets up the player before replaying a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Speed the player starts at; 1, 2 or 4.
    pub playback_rate: f64,
    /// Start playing before the first step.
    pub autoplay: bool,
    /// Always save split pieces, as if `--split` were given.
    pub split: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            playback_rate: PlaybackRate::Normal.factor(),
            autoplay: false,
            split: false,
        }
    }
}

impl CaptureSettings {
    /// The starting rate. Only meaningful after [`Config::load`] validated it.
    pub fn rate(&self) -> PlaybackRate {
        PlaybackRate::from_requested(self.playback_rate)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            capture: CaptureSettings::default(),
        }
    }
}

impl Config {
    /// Layers every settings source and validates the result.
    ///
    /// A file named with `--config` must exist; the per-user file is optional.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(dir) = dirs::config_dir() {
            figment = figment.merge(Toml::file(dir.join("vem").join("config.toml")));
        }
        if let Some(path) = config_file {
            if !path.is_file() {
                bail!("config file {} does not exist", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }

        let config: Self = figment
            .merge(Env::prefixed("VEM_").split("__"))
            .extract()
            .context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let requested = self.capture.playback_rate;
        if self.capture.rate().factor().total_cmp(&requested).is_ne() {
            bail!("capture.playback_rate must be 1, 2 or 4, got {requested}");
        }
        if self.database_path.as_os_str().is_empty() {
            bail!("database_path must not be empty");
        }
        Ok(())
    }
}

/// `<data dir>/vem/vem.db`, e.g. `~/.local/share/vem/vem.db` on Linux.
fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vem")
        .join("vem.db")
}
