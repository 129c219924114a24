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

//! Organization-scoped custom roles

use crate::conditions::ConditionSpec;
use crate::permissions::{GLOBAL_WILDCARD, PermissionSet, module_wildcard, qualified, split_permission};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Custom role identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(pub u64);

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role defined by an organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRole {
    /// Unique role identifier
    pub id: RoleId,

    /// Owning organization
    pub organization_id: String,

    /// Human-readable role name
    pub name: String,

    /// Unique within the organization; fixed at creation
    pub slug: String,

    pub description: Option<String>,

    /// Fully qualified grants, e.g. `"billing.view"` or `"*"`
    #[serde(default)]
    pub system_permissions: PermissionSet,

    /// Per-module grants, e.g. `materials → {"view", "edit"}`
    #[serde(default)]
    pub module_permissions: BTreeMap<String, PermissionSet>,

    /// UI surfaces the role may open
    #[serde(default)]
    pub interface_access: BTreeSet<String>,

    /// Conditions attached to every new assignment of this role
    #[serde(default)]
    pub conditions_template: Vec<ConditionSpec>,

    /// Inactive roles never grant anything
    pub is_active: bool,

    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomRole {
    /// Exact membership in the system permission set
    pub fn has_system_permission(&self, permission: &str) -> bool {
        self.system_permissions.contains(permission)
    }

    /// Whether the role grants `action` within `module`
    ///
    /// Holds when the module's set carries the action, the module wildcard or
    /// `"*"`, or when the system set carries `"{module}.*"` or `"*"`.
    pub fn has_module_permission(&self, module: &str, action: &str) -> bool {
        let wildcard = module_wildcard(module);

        if let Some(actions) = self.module_permissions.get(module) {
            if actions.contains(action) || actions.contains(&wildcard) || actions.contains(GLOBAL_WILDCARD) {
                return true;
            }
        }

        self.system_permissions.contains(&wildcard) || self.system_permissions.contains(GLOBAL_WILDCARD)
    }

    /// Whether the role grants a `"module.action"` permission
    pub fn grants(&self, permission: &str) -> bool {
        if self.has_system_permission(permission) || self.has_system_permission(GLOBAL_WILDCARD) {
            return true;
        }

        split_permission(permission).is_some_and(|(module, action)| self.has_module_permission(module, action))
    }

    /// Flattened, deduplicated and sorted grants
    pub fn get_all_permissions(&self) -> Vec<String> {
        let mut all: BTreeSet<String> = self.system_permissions.iter().cloned().collect();

        for (module, actions) in &self.module_permissions {
            for action in actions.iter() {
                let wildcard = module_wildcard(module);
                if action == GLOBAL_WILDCARD || *action == wildcard {
                    all.insert(wildcard);
                } else {
                    all.insert(qualified(module, action));
                }
            }
        }

        all.into_iter().collect()
    }

    pub fn has_interface_access(&self, interface: &str) -> bool {
        self.interface_access.contains(interface)
    }
}

/// Input for creating a custom role
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewCustomRole {
    pub organization_id: String,
    pub name: String,
    pub description: Option<String>,

    #[serde(default)]
    pub system_permissions: PermissionSet,

    #[serde(default)]
    pub module_permissions: BTreeMap<String, PermissionSet>,

    #[serde(default)]
    pub interface_access: BTreeSet<String>,

    #[serde(default)]
    pub conditions_template: Vec<ConditionSpec>,

    pub created_by: String,
}

impl NewCustomRole {
    pub fn new(organization_id: impl Into<String>, name: impl Into<String>, created_by: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            name: name.into(),
            created_by: created_by.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_system_permission(mut self, permission: impl Into<String>) -> Self {
        self.system_permissions.insert(permission);
        self
    }

    /// Add actions to a module
    pub fn with_module_permissions<I, S>(mut self, module: impl Into<String>, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.module_permissions.entry(module.into()).or_default();
        for action in actions {
            entry.insert(action);
        }
        self
    }

    pub fn with_interface_access(mut self, interface: impl Into<String>) -> Self {
        self.interface_access.insert(interface.into());
        self
    }

    pub fn with_condition(mut self, condition: ConditionSpec) -> Self {
        self.conditions_template.push(condition);
        self
    }
}

/// Partial update of a custom role; `None` leaves a field unchanged
///
/// Renaming keeps the slug.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub system_permissions: Option<PermissionSet>,
    pub module_permissions: Option<BTreeMap<String, PermissionSet>>,
    pub interface_access: Option<BTreeSet<String>>,
    pub conditions_template: Option<Vec<ConditionSpec>>,
}

impl RoleUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub(crate) fn apply(self, role: &mut CustomRole) {
        if let Some(name) = self.name {
            role.name = name;
        }
        if let Some(description) = self.description {
            role.description = description;
        }
        if let Some(system_permissions) = self.system_permissions {
            role.system_permissions = system_permissions;
        }
        if let Some(module_permissions) = self.module_permissions {
            role.module_permissions = module_permissions;
        }
        if let Some(interface_access) = self.interface_access {
            role.interface_access = interface_access;
        }
        if let Some(conditions_template) = self.conditions_template {
            role.conditions_template = conditions_template;
        }
        role.updated_at = Utc::now();
    }
}
