// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! CLI configuration
//!
//! Resolution order: `--config` file, then `DOTAUTHZ_CONFIG`, then engine
//! defaults overlaid with `DOTAUTHZ_*` variables. The state file can be
//! overridden separately by `--state` or `DOTAUTHZ_STATE_FILE`.

use anyhow::{Context, Result};
use dotauthz_core::AuthzConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_STATE_FILE: &str = "dotauthz-state.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// JSON snapshot the CLI reads and writes
    pub state_file: PathBuf,

    /// Engine settings
    pub authz: AuthzConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            authz: AuthzConfig::default(),
        }
    }
}

impl CliConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = toml::from_str(&content).with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn resolve_config(cli_config: Option<PathBuf>, cli_state: Option<PathBuf>) -> Result<Self> {
        Self::resolve_with(cli_config, cli_state, |key| std::env::var(key).ok())
    }

    /// Resolve through an arbitrary variable lookup
    pub fn resolve_with<F>(cli_config: Option<PathBuf>, cli_state: Option<PathBuf>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if let Some(config_path) = cli_config {
            Self::load_from_file(config_path)?
        } else if let Some(env_config) = lookup("DOTAUTHZ_CONFIG") {
            Self::load_from_file(env_config)?
        } else {
            Self {
                authz: AuthzConfig::from_lookup(&lookup),
                ..Self::default()
            }
        };

        // CLI state file overrides environment settings
        if let Some(state_file) = cli_state {
            config.state_file = state_file;
        } else if let Some(env_state) = lookup("DOTAUTHZ_STATE_FILE") {
            config.state_file = PathBuf::from(env_state);
        }

        Ok(config)
    }
}
