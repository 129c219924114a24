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

//! Fixed, code-defined system roles
//!
//! System roles are available in every organization without per-organization
//! storage. Their grants use the same wildcard rules as custom roles.

use crate::permissions::grant_matches;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Built-in roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemRole {
    SuperAdmin,
    OrganizationAdmin,
    OrganizationMember,
    ProjectManager,
    ProjectMember,
    Viewer,
}

impl SystemRole {
    /// Every system role, most privileged first
    pub const ALL: [SystemRole; 6] = [
        SystemRole::SuperAdmin,
        SystemRole::OrganizationAdmin,
        SystemRole::OrganizationMember,
        SystemRole::ProjectManager,
        SystemRole::ProjectMember,
        SystemRole::Viewer,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            SystemRole::SuperAdmin => "super_admin",
            SystemRole::OrganizationAdmin => "organization_admin",
            SystemRole::OrganizationMember => "organization_member",
            SystemRole::ProjectManager => "project_manager",
            SystemRole::ProjectMember => "project_member",
            SystemRole::Viewer => "viewer",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.slug() == slug)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SystemRole::SuperAdmin => "Super Administrator",
            SystemRole::OrganizationAdmin => "Organization Administrator",
            SystemRole::OrganizationMember => "Organization Member",
            SystemRole::ProjectManager => "Project Manager",
            SystemRole::ProjectMember => "Project Member",
            SystemRole::Viewer => "Viewer",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SystemRole::SuperAdmin => "Full access to every organization and project",
            SystemRole::OrganizationAdmin => "Manages an organization, its members, roles and projects",
            SystemRole::OrganizationMember => "Standard member access within an organization",
            SystemRole::ProjectManager => "Runs projects: contracts, estimates, procurement and materials",
            SystemRole::ProjectMember => "Works on a project with read access to its records",
            SystemRole::Viewer => "Read-only access",
        }
    }

    /// Grants held by this role
    pub fn permissions(&self) -> &'static [&'static str] {
        match self {
            SystemRole::SuperAdmin => &["*"],
            SystemRole::OrganizationAdmin => &[
                "organization.*",
                "users.*",
                "roles.*",
                "projects.*",
                "contracts.*",
                "procurement.*",
                "estimates.*",
                "materials.*",
                "billing.*",
                "dashboard.view",
            ],
            SystemRole::OrganizationMember => &["organization.view", "projects.view", "materials.view", "dashboard.view"],
            SystemRole::ProjectManager => &["projects.*", "contracts.*", "estimates.*", "procurement.*", "materials.*", "dashboard.view"],
            SystemRole::ProjectMember => &["projects.view", "materials.view", "estimates.view", "dashboard.view"],
            SystemRole::Viewer => &["organization.view", "projects.view", "dashboard.view"],
        }
    }

    /// Whether this role grants a permission
    pub fn grants(&self, permission: &str) -> bool {
        self.permissions().iter().any(|grant| grant_matches(grant, permission))
    }
}

impl fmt::Display for SystemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}
