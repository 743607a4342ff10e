//! Settings infrastructure for embedls.
//!
//! Settings come from a `settings.toml` file discovered from the workspace
//! root. Every field is optional; a missing or broken file means defaults.
//!
//! ```toml
//! [plugins]
//! disabled = ["template-interpolation"]
//!
//! [plugins.order]
//! sfc = -10
//!
//! [capabilities.style]
//! diagnostics = false
//!
//! [incremental]
//! enabled = true
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::SettingsError;
use crate::mapping::CapabilityOverrides;

/// Name of the settings file looked up during discovery.
pub const SETTINGS_FILE: &str = "settings.toml";

/// Root settings structure loaded from settings.toml.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Plugin selection and ordering.
    pub plugins: Option<PluginSettings>,

    /// Capability upper bounds keyed by embedded file kind
    /// (`template`, `template_code`, `script`, `script_setup`, `style`,
    /// `custom`).
    pub capabilities: Option<HashMap<String, CapabilityOverrides>>,

    /// Incremental reconciliation.
    pub incremental: Option<IncrementalSettings>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PluginSettings {
    /// Plugin names to leave out.
    pub disabled: Option<Vec<String>>,

    /// Order overrides by plugin name. Lower runs first.
    pub order: Option<HashMap<String, i32>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IncrementalSettings {
    /// When false, every edit re-projects the whole file (default: true).
    pub enabled: Option<bool>,
}

/// Read and parse a settings file.
pub fn read_settings(path: &Path) -> Result<Settings, SettingsError> {
    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load settings from a file.
///
/// Returns default settings if the file doesn't exist or can't be parsed.
pub fn load_settings(path: &Path) -> Settings {
    match read_settings(path) {
        Ok(settings) => settings,
        Err(e) => {
            warn!("{}", e);
            Settings::default()
        }
    }
}

/// Discover settings.toml by searching up the directory tree, then direct children.
///
/// Search order:
/// 1. Walk up from `start_dir` to filesystem root
/// 2. If not found, check immediate child directories of `start_dir`
///
/// Returns `(settings, settings_dir)` where `settings_dir` is the directory
/// containing the found file.
/// If not found, returns `(Settings::default(), start_dir)`.
pub fn discover_settings(start_dir: &Path) -> (Settings, PathBuf) {
    let mut current = Some(start_dir);
    while let Some(dir) = current {
        let candidate = dir.join(SETTINGS_FILE);
        if candidate.is_file() {
            debug!("Using settings from {}", candidate.display());
            return (load_settings(&candidate), dir.to_path_buf());
        }
        current = dir.parent();
    }

    if let Ok(entries) = std::fs::read_dir(start_dir) {
        for entry in entries.flatten() {
            if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
                let candidate = entry.path().join(SETTINGS_FILE);
                if candidate.is_file() {
                    debug!("Using settings from {}", candidate.display());
                    return (load_settings(&candidate), entry.path());
                }
            }
        }
    }

    (Settings::default(), start_dir.to_path_buf())
}
