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

//! Role catalog: fixed system roles and organization-scoped custom roles

pub mod catalog;
pub mod custom;
pub mod slug;
pub mod system;

pub use catalog::RoleCatalog;
pub use custom::{CustomRole, NewCustomRole, RoleId, RoleUpdate};
pub use slug::{slugify, unique_slug};
pub use system::SystemRole;

use crate::error::AuthzError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which catalog a role slug refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleType {
    System,
    Custom,
}

impl RoleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleType::System => "system",
            RoleType::Custom => "custom",
        }
    }
}

impl fmt::Display for RoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleType {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(RoleType::System),
            "custom" => Ok(RoleType::Custom),
            other => Err(AuthzError::InvalidInput {
                message: format!("Unknown role type '{}'", other),
            }),
        }
    }
}

/// A role as seen by the resolver
#[derive(Debug, Clone, Copy)]
pub enum ResolvedRole<'a> {
    System(SystemRole),
    Custom(&'a CustomRole),
}

impl ResolvedRole<'_> {
    pub fn slug(&self) -> &str {
        match self {
            ResolvedRole::System(role) => role.slug(),
            ResolvedRole::Custom(role) => &role.slug,
        }
    }

    /// System roles are always active
    pub fn is_active(&self) -> bool {
        match self {
            ResolvedRole::System(_) => true,
            ResolvedRole::Custom(role) => role.is_active,
        }
    }

    /// Whether the role grants a permission; inactive roles grant nothing
    pub fn grants(&self, permission: &str) -> bool {
        if !self.is_active() {
            return false;
        }

        match self {
            ResolvedRole::System(role) => role.grants(permission),
            ResolvedRole::Custom(role) => role.grants(permission),
        }
    }

    /// Flattened grants of the role
    pub fn permissions(&self) -> Vec<String> {
        match self {
            ResolvedRole::System(role) => role.permissions().iter().map(|grant| grant.to_string()).collect(),
            ResolvedRole::Custom(role) => role.get_all_permissions(),
        }
    }
}
