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

//! Storage of custom roles with per-organization slug uniqueness

use crate::error::{AuthzError, AuthzResult};
use crate::roles::custom::{CustomRole, NewCustomRole, RoleId, RoleUpdate};
use crate::roles::slug::{slugify, unique_slug};
use crate::roles::system::SystemRole;
use crate::roles::{ResolvedRole, RoleType};
use chrono::Utc;
use std::collections::HashMap;
use tracing::info;

/// Custom roles keyed by id, indexed by `(organization, slug)`
#[derive(Debug, Clone)]
pub struct RoleCatalog {
    roles: HashMap<RoleId, CustomRole>,
    slug_index: HashMap<(String, String), RoleId>,
    next_id: u64,
    max_slug_attempts: usize,
}

impl RoleCatalog {
    pub fn new(max_slug_attempts: usize) -> Self {
        Self {
            roles: HashMap::new(),
            slug_index: HashMap::new(),
            next_id: 1,
            max_slug_attempts: max_slug_attempts.max(1),
        }
    }

    /// Rebuild the catalog from persisted records
    pub fn from_records(records: Vec<CustomRole>, max_slug_attempts: usize) -> AuthzResult<Self> {
        let mut catalog = Self::new(max_slug_attempts);

        for role in records {
            let key = (role.organization_id.clone(), role.slug.clone());
            if catalog.slug_index.contains_key(&key) {
                return Err(AuthzError::Conflict {
                    message: format!("Duplicate role slug '{}' in organization {}", role.slug, role.organization_id),
                });
            }
            if catalog.roles.contains_key(&role.id) {
                return Err(AuthzError::Conflict {
                    message: format!("Duplicate role id {}", role.id),
                });
            }

            for condition in &role.conditions_template {
                condition.rule()?;
            }

            catalog.next_id = catalog.next_id.max(role.id.0 + 1);
            catalog.slug_index.insert(key, role.id);
            catalog.roles.insert(role.id, role);
        }

        Ok(catalog)
    }

    /// All records ordered by id
    pub fn records(&self) -> Vec<CustomRole> {
        let mut records: Vec<CustomRole> = self.roles.values().cloned().collect();
        records.sort_by_key(|role| role.id);
        records
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Create a custom role with a fresh slug
    ///
    /// The slug is derived from the name and suffixed `_1`, `_2`, ... until it
    /// is free in the organization. Collisions never reach the caller.
    pub fn create(&mut self, input: NewCustomRole) -> AuthzResult<CustomRole> {
        validate_non_empty("organization id", &input.organization_id)?;
        validate_non_empty("role name", &input.name)?;
        for condition in &input.conditions_template {
            condition.rule()?;
        }

        let slug = self.next_slug(&input.organization_id, &input.name)?;
        let id = RoleId(self.next_id);
        self.next_id += 1;

        let now = Utc::now();
        let role = CustomRole {
            id,
            organization_id: input.organization_id,
            name: input.name.trim().to_string(),
            slug,
            description: input.description,
            system_permissions: input.system_permissions,
            module_permissions: input.module_permissions,
            interface_access: input.interface_access,
            conditions_template: input.conditions_template,
            is_active: true,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
        };

        info!(
            role_id = %role.id,
            organization_id = %role.organization_id,
            slug = %role.slug,
            created_by = %role.created_by,
            "Custom role created"
        );

        self.slug_index.insert((role.organization_id.clone(), role.slug.clone()), id);
        self.roles.insert(id, role.clone());
        Ok(role)
    }

    /// Apply a partial update; the slug never changes
    pub fn update(&mut self, id: RoleId, update: RoleUpdate) -> AuthzResult<CustomRole> {
        if let Some(name) = &update.name {
            validate_non_empty("role name", name)?;
        }
        if let Some(template) = &update.conditions_template {
            for condition in template {
                condition.rule()?;
            }
        }

        let role = self.roles.get_mut(&id).ok_or_else(|| role_not_found(id))?;
        let update = RoleUpdate {
            name: update.name.map(|name| name.trim().to_string()),
            ..update
        };
        update.apply(role);

        info!(role_id = %id, slug = %role.slug, "Custom role updated");
        Ok(role.clone())
    }

    /// Mark a role inactive
    ///
    /// Assignments of the role are cascaded by the caller while it still holds
    /// the catalog lock.
    pub fn set_inactive(&mut self, id: RoleId) -> AuthzResult<CustomRole> {
        let role = self.roles.get_mut(&id).ok_or_else(|| role_not_found(id))?;

        if role.is_active {
            role.is_active = false;
            role.updated_at = Utc::now();
        }

        Ok(role.clone())
    }

    /// Copy a role into another organization as an independent active role
    pub fn clone_to(&mut self, id: RoleId, target_organization_id: &str, cloned_by: &str) -> AuthzResult<CustomRole> {
        let source = self.roles.get(&id).ok_or_else(|| role_not_found(id))?;

        let input = NewCustomRole {
            organization_id: target_organization_id.to_string(),
            name: source.name.clone(),
            description: source.description.clone(),
            system_permissions: source.system_permissions.clone(),
            module_permissions: source.module_permissions.clone(),
            interface_access: source.interface_access.clone(),
            conditions_template: source.conditions_template.clone(),
            created_by: cloned_by.to_string(),
        };

        self.create(input)
    }

    pub fn get(&self, id: RoleId) -> Option<&CustomRole> {
        self.roles.get(&id)
    }

    /// Look up a role by slug, active or not
    pub fn find_by_slug(&self, organization_id: &str, slug: &str) -> Option<&CustomRole> {
        self.slug_index.get(&(organization_id.to_string(), slug.to_string())).and_then(|id| self.roles.get(id))
    }

    /// Roles of an organization ordered by slug
    pub fn list(&self, organization_id: &str, include_inactive: bool) -> Vec<&CustomRole> {
        let mut roles: Vec<&CustomRole> = self.roles.values().filter(|role| role.organization_id == organization_id && (include_inactive || role.is_active)).collect();
        roles.sort_by(|a, b| a.slug.cmp(&b.slug));
        roles
    }

    /// Resolve an assignable role
    ///
    /// System roles resolve everywhere. Custom roles resolve only when active
    /// and owned by `organization_id`.
    pub fn resolve(&self, role_type: RoleType, slug: &str, organization_id: Option<&str>) -> Option<ResolvedRole<'_>> {
        match role_type {
            RoleType::System => SystemRole::from_slug(slug).map(ResolvedRole::System),
            RoleType::Custom => {
                let role = self.find_by_slug(organization_id?, slug)?;
                role.is_active.then_some(ResolvedRole::Custom(role))
            }
        }
    }

    fn next_slug(&self, organization_id: &str, name: &str) -> AuthzResult<String> {
        let base = slugify(name);
        unique_slug(
            &base,
            |candidate| self.slug_index.contains_key(&(organization_id.to_string(), candidate.to_string())),
            self.max_slug_attempts,
        )
    }
}

#[cfg(test)]
impl RoleCatalog {
    /// Raw access for tests that need records the public API refuses to build
    pub(crate) fn get_mut(&mut self, id: RoleId) -> Option<&mut CustomRole> {
        self.roles.get_mut(&id)
    }
}

impl Default for RoleCatalog {
    fn default() -> Self {
        Self::new(1000)
    }
}

fn role_not_found(id: RoleId) -> AuthzError {
    AuthzError::RoleNotFound {
        message: format!("Custom role {} not found", id),
    }
}

fn validate_non_empty(field: &str, value: &str) -> AuthzResult<()> {
    if value.trim().is_empty() {
        return Err(AuthzError::InvalidInput {
            message: format!("{} must not be empty", field),
        });
    }
    Ok(())
}
