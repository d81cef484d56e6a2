//! Persistent settings
//!
//! **Why**: Studios settle on a default frame step, padding and version style once; this
//! keeps them in `loom.json` so the CLI doesn't need them on every call.
//!
//! **Used by**: main (settings load), CLI handlers (defaults under flag overrides)

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::frames::FrameFilter;
use crate::paths::{config_file, PathConfig};
use crate::sequence::DEFAULT_PADDING;
use crate::version::{DEFAULT_DELIMITER, DEFAULT_MIN_LEAD};

/// Settings file name inside the config directory
pub const SETTINGS_FILE: &str = "loom.json";

/// User defaults, all optional in the file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Step for ranges that don't specify `xN`
    pub increment: f64,
    /// Treat each exclusion independently
    pub filter_individual: bool,
    /// Frame digits when an output path has no hashes
    pub padding: usize,
    /// Separator around version tags
    pub delimiter: String,
    /// Minimum digits of a new version tag
    pub min_lead: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            increment: 1.0,
            filter_individual: false,
            padding: DEFAULT_PADDING,
            delimiter: DEFAULT_DELIMITER.to_string(),
            min_lead: DEFAULT_MIN_LEAD,
        }
    }
}

impl Settings {
    /// Load from the resolved config directory, falling back to defaults
    pub fn load(config: &PathConfig) -> Self {
        let path = config_file(SETTINGS_FILE, config);
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::from_json(&path) {
            Ok(settings) => {
                debug!("Settings loaded from {}", path.display());
                settings
            }
            Err(e) => {
                warn!("Ignoring settings file: {:#}", e);
                Self::default()
            }
        }
    }

    /// Read settings from a JSON file
    pub fn from_json(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Read settings: {}", path.display()))?;
        let settings = serde_json::from_str(&json)
            .with_context(|| format!("Parse settings: {}", path.display()))?;
        Ok(settings)
    }

    /// Write settings as pretty JSON
    pub fn to_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Write settings: {}", path.display()))?;
        Ok(())
    }

    /// Frame filter configured from these settings
    pub fn frame_filter(&self) -> FrameFilter {
        FrameFilter::new()
            .increment(self.increment)
            .individual(self.filter_individual)
    }
}
