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

//! Exported record sets
//!
//! The engine keeps its tables in memory. A snapshot carries the four record
//! sets (and the retained audit trail) so any store can persist them.

use crate::assignments::Assignment;
use crate::audit::AuditEvent;
use crate::conditions::Condition;
use crate::context::Context;
use crate::error::AuthzResult;
use crate::roles::CustomRole;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Serializable state of an authorization system
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub contexts: Vec<Context>,

    #[serde(default)]
    pub roles: Vec<CustomRole>,

    #[serde(default)]
    pub assignments: Vec<Assignment>,

    #[serde(default)]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audit_events: Vec<AuditEvent>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty() && self.roles.is_empty() && self.assignments.is_empty() && self.conditions.is_empty()
    }

    pub fn to_json(&self) -> AuthzResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> AuthzResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a snapshot from a JSON file
    pub fn load(path: impl AsRef<Path>) -> AuthzResult<Self> {
        let path = path.as_ref();
        let snapshot = Self::from_json(&fs::read_to_string(path)?)?;

        debug!(
            path = %path.display(),
            contexts = snapshot.contexts.len(),
            roles = snapshot.roles.len(),
            assignments = snapshot.assignments.len(),
            conditions = snapshot.conditions.len(),
            "Snapshot loaded"
        );

        Ok(snapshot)
    }

    /// Read a snapshot, or start empty when the file does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> AuthzResult<Self> {
        let path = path.as_ref();
        if path.exists() { Self::load(path) } else { Ok(Self::default()) }
    }

    /// Write the snapshot as JSON, replacing the file atomically
    pub fn save(&self, path: impl AsRef<Path>) -> AuthzResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, self.to_json()?)?;
        fs::rename(&tmp, path)?;

        debug!(path = %path.display(), "Snapshot saved");
        Ok(())
    }
}
