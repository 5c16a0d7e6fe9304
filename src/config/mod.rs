// CrabStruct - GPL-3.0-or-later
// This file is part of CrabStruct.
//
// Copyright (C) 2026 Daniel Freiermuth
//
// CrabStruct is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// CrabStruct is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with CrabStruct.  If not, see <https://www.gnu.org/licenses/>.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::structure::query::DEFAULT_BACKTRACK_LIMIT;
use crate::structure::session::DEFAULT_BOUNDED_LINK_GAP;
use crate::structure::SessionOptions;

/// User configuration stored in the config directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Column names always treated as timestamps (case-insensitive)
    pub timestamp_columns: Vec<String>,

    /// How many non-empty values are sampled to detect a timestamp column
    pub timestamp_sample_rows: usize,

    /// Row limit used when a link is toggled to "at most"
    pub bounded_link_gap: usize,

    pub backtrack_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timestamp_columns: vec!["timestamp".to_string(), "time".to_string()],
            timestamp_sample_rows: 20,
            bounded_link_gap: DEFAULT_BOUNDED_LINK_GAP,
            backtrack_limit: DEFAULT_BACKTRACK_LIMIT,
        }
    }
}

impl Config {
    /// Get the path to the user config file
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|config_dir| config_dir.join("crabstruct").join("config.json"))
    }

    /// Load the user config, returning defaults if not found
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load a config file, returning defaults if it is missing or invalid
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("No config found at {path:?}, using defaults");
            return Self::default();
        }
        tracing::info!("Loading config from {path:?}");
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|contents| serde_json::from_str::<Self>(&contents).map_err(|e| e.to_string()));
        match parsed {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring config {path:?}: {e}");
                Self::default()
            }
        }
    }

    /// Save the config to `path`
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {e}"))?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {e}"))?;

        std::fs::write(path, json).map_err(|e| format!("Failed to write config file: {e}"))?;

        tracing::info!("Saved config to {path:?}");
        Ok(())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            bounded_link_gap: self.bounded_link_gap,
            backtrack_limit: self.backtrack_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json"));
        assert_eq!(config, Config::default());
        assert_eq!(config.bounded_link_gap, 10);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            bounded_link_gap: 3,
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn test_partial_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        std::fs::write(&path, r#"{"backtrack_limit": 42}"#).unwrap();
        let config = Config::load_from(&path);
        assert_eq!(config.backtrack_limit, 42);
        assert_eq!(config.session_options().bounded_link_gap, DEFAULT_BOUNDED_LINK_GAP);

        std::fs::write(&path, "not json").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());
    }
}
