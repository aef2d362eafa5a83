//! TOML configuration.
//!
//! Every key is optional; a missing file means all defaults. The defaults
//! reproduce the classic behavior: 10 ms settle, 50 ms hold, concurrent taps,
//! one tap per keydown (including auto-repeat).
//!
//! ```toml
//! settle_ms = 10
//! hold_ms = 50
//! dispatch = "concurrent"     # or "serialized"
//! keyup_policy = "symmetric"  # or "independent"
//! repeat = "every"            # or "first"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Upper bound for either delay. Longer pauses make the tap feel broken.
const MAX_DELAY_MS: u64 = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// How scheduled taps are run relative to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Each tap is an independent task; rapid presses may overlap.
    #[default]
    Concurrent,
    /// Taps are queued and played one after another.
    Serialized,
}

/// How a CapsLock keyup's verdict is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyupPolicy {
    /// Reuse the verdict given to the matching keydown.
    #[default]
    Symmetric,
    /// Re-derive from the Shift state at keyup time.
    Independent,
}

/// Which CapsLock keydowns of one physical press schedule a tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatPolicy {
    /// Every suppressed keydown, auto-repeats included.
    #[default]
    Every,
    /// Only the first keydown of a press.
    First,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Delay before the tap is injected, letting the suppressed keydown settle.
    pub settle_ms: u64,
    /// How long Alt stays down inside Shift.
    pub hold_ms: u64,
    pub dispatch: DispatchMode,
    pub keyup_policy: KeyupPolicy,
    pub repeat: RepeatPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settle_ms: 10,
            hold_ms: 50,
            dispatch: DispatchMode::default(),
            keyup_policy: KeyupPolicy::default(),
            repeat: RepeatPolicy::default(),
        }
    }
}

impl Config {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }

    /// Parses and validates TOML text. `path` is only used in error messages.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, or the per-user default location when `path` is `None`.
    ///
    /// A missing default file yields `Config::default()`; a missing explicit
    /// file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match default_path() {
                Some(p) => (p, false),
                None => return Ok(Config::default()),
            },
        };

        match std::fs::read_to_string(&path) {
            Ok(text) => {
                log::debug!("config: loading {}", path.display());
                Self::from_toml(&text, &path)
            }
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("config: {} not found, using defaults", path.display());
                Ok(Config::default())
            }
            Err(source) => Err(ConfigError::Io { path, source }),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("settle_ms", self.settle_ms), ("hold_ms", self.hold_ms)] {
            if value > MAX_DELAY_MS {
                return Err(ConfigError::Invalid(format!(
                    "{name} = {value} exceeds {MAX_DELAY_MS} ms"
                )));
            }
        }
        Ok(())
    }
}

/// `<config dir>/capsswitch/config.toml`, e.g. `%APPDATA%\capsswitch\config.toml`.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("capsswitch").join("config.toml"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
