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

//! Permission strings and wildcard matching
//!
//! Permissions are `"module.action"` strings. A grant matches when it is the
//! exact permission, the module wildcard `"module.*"`, or the global `"*"`.
//! Matching is a fixed set of string comparisons, never a pattern engine.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Grants every permission
pub const GLOBAL_WILDCARD: &str = "*";

/// Split `"module.action"` at the first dot
pub fn split_permission(permission: &str) -> Option<(&str, &str)> {
    let (module, action) = permission.split_once('.')?;
    if module.is_empty() || action.is_empty() {
        return None;
    }
    Some((module, action))
}

/// `"{module}.*"`
pub fn module_wildcard(module: &str) -> String {
    format!("{}.*", module)
}

/// `"{module}.{action}"`
pub fn qualified(module: &str, action: &str) -> String {
    format!("{}.{}", module, action)
}

/// Whether a single grant string covers a permission
pub fn grant_matches(grant: &str, permission: &str) -> bool {
    if grant == GLOBAL_WILDCARD || grant == permission {
        return true;
    }

    match (grant.strip_suffix(".*"), split_permission(permission)) {
        (Some(grant_module), Some((module, _))) => grant_module == module,
        _ => false,
    }
}

/// Set of permission grants
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(HashSet<String>);

impl PermissionSet {
    pub fn insert(&mut self, grant: impl Into<String>) -> bool {
        self.0.insert(grant.into())
    }

    /// Exact membership
    pub fn contains(&self, grant: &str) -> bool {
        self.0.contains(grant)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    /// Sorted grants, for stable output
    pub fn sorted(&self) -> Vec<String> {
        let mut grants: Vec<String> = self.0.iter().cloned().collect();
        grants.sort();
        grants
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
