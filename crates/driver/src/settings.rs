//! Port settings
//!
//! Optional per-host configuration for how attached adapters are
//! presented. Loaded from a TOML file; a missing file means defaults,
//! a malformed one is an error.

use crate::bringup::ChipVariant;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Presentation and chip options for attached ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PortSettings {
    /// Alias used instead of the generated `ch341-serialN` name.
    #[serde(default)]
    pub port_name: Option<String>,
    /// Suppress publishing the port under its alias.
    #[serde(default)]
    pub skip_external_naming: bool,
    /// Treat the chip as pre-HX silicon during bring-up.
    #[serde(default)]
    pub legacy_chip: bool,
}

impl PortSettings {
    /// Load settings from `path`, or from the standard location when
    /// `path` is `None`. A file that does not exist yields defaults.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path,
            None => Self::default_path(),
        };
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&config_path).map_err(|e| {
            Error::Settings(format!("reading {}: {e}", config_path.display()))
        })?;
        let settings: Self = toml::from_str(&content).map_err(|e| {
            Error::Settings(format!("parsing {}: {e}", config_path.display()))
        })?;
        info!(path = %config_path.display(), "loaded port settings");
        Ok(settings)
    }

    /// Load settings, falling back to defaults on any failure.
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(settings) => settings,
            Err(error) => {
                warn!(%error, "failed to load port settings, using defaults");
                Self::default()
            }
        }
    }

    /// Write the settings to `path` as TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Settings(format!("serializing settings: {e}")))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Settings(format!("creating {}: {e}", parent.display())))?;
        }
        fs::write(path, content)
            .map_err(|e| Error::Settings(format!("writing {}: {e}", path.display())))?;
        Ok(())
    }

    /// The chip variant these settings select.
    pub fn chip_variant(&self) -> ChipVariant {
        if self.legacy_chip {
            ChipVariant::Legacy
        } else {
            ChipVariant::Hx
        }
    }

    fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("ch34x-bridge").join("port.toml")
        } else {
            PathBuf::from("port.toml")
        }
    }
}
