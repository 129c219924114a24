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

//! Configuration for the authorization engine

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Shallowest traversal bound that still reaches the system context from a project
pub const MIN_HIERARCHY_DEPTH: usize = 3;

/// Configuration for the authorization engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthzConfig {
    /// Upper bound on parent-chain traversal (system, organization, project)
    pub max_hierarchy_depth: usize,

    /// Upper bound on `_1`, `_2`, ... suffixes tried while generating a role slug
    pub max_slug_attempts: usize,

    /// Record audit events for checks and mutations
    pub audit_enabled: bool,

    /// Number of audit events kept in memory
    pub audit_max_events: usize,

    /// Permission checks slower than this are logged as warnings
    pub slow_check_threshold_ms: u64,

    /// Whether an inactive condition blocks its assignment instead of being skipped
    pub inactive_condition_blocks: bool,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            max_hierarchy_depth: 3,
            max_slug_attempts: 1000,
            audit_enabled: true,
            audit_max_events: 10000,
            slow_check_threshold_ms: 5,
            inactive_condition_blocks: true,
        }
    }
}

impl AuthzConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            max_hierarchy_depth: parse_var(&lookup, "DOTAUTHZ_MAX_HIERARCHY_DEPTH").map(clamp_hierarchy_depth).unwrap_or(defaults.max_hierarchy_depth),

            max_slug_attempts: parse_var(&lookup, "DOTAUTHZ_MAX_SLUG_ATTEMPTS").filter(|attempts: &usize| *attempts > 0).unwrap_or(defaults.max_slug_attempts),

            audit_enabled: parse_var(&lookup, "DOTAUTHZ_AUDIT_ENABLED").unwrap_or(defaults.audit_enabled),

            audit_max_events: parse_var(&lookup, "DOTAUTHZ_AUDIT_MAX_EVENTS").unwrap_or(defaults.audit_max_events),

            slow_check_threshold_ms: parse_var(&lookup, "DOTAUTHZ_SLOW_CHECK_THRESHOLD_MS").unwrap_or(defaults.slow_check_threshold_ms),

            inactive_condition_blocks: parse_var(&lookup, "DOTAUTHZ_INACTIVE_CONDITION_BLOCKS").unwrap_or(defaults.inactive_condition_blocks),
        }
    }

    /// Slow-check threshold as a duration
    pub fn slow_check_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_check_threshold_ms)
    }
}

/// Raise a depth bound that would cut ancestors out of the chain
pub fn clamp_hierarchy_depth(depth: usize) -> usize {
    if depth < MIN_HIERARCHY_DEPTH {
        warn!(requested = depth, minimum = MIN_HIERARCHY_DEPTH, "Hierarchy depth below minimum; using minimum");
        return MIN_HIERARCHY_DEPTH;
    }
    depth
}

/// Parse a variable, treating absent and unparseable values alike
fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|value| value.trim().parse().ok())
}
