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

//! Authorization system that coordinates all components
//!
//! Each table sits behind its own lock. Locks are always taken in the order
//! contexts → roles → assignments → conditions.

use crate::assignments::{Assignment, AssignmentId, AssignmentStore, NewAssignment};
use crate::audit::{AuditEventType, AuditLogger};
use crate::conditions::{Condition, ConditionId, ConditionProviders, ConditionSpec, ConditionStore, RuntimeContext};
use crate::config::AuthzConfig;
use crate::context::{Context, ContextId, ContextTree};
use crate::error::{AuthzError, AuthzResult};
use crate::resolver::{self, AccessDecision, AccessRequest, ResolveOptions, Tables};
use crate::roles::{CustomRole, NewCustomRole, RoleCatalog, RoleId, RoleType, RoleUpdate, SystemRole};
use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of deactivating a custom role
#[derive(Debug, Clone, PartialEq)]
pub struct RoleDeactivation {
    pub role: CustomRole,

    /// Assignments switched off by the cascade
    pub assignments_deactivated: Vec<AssignmentId>,
}

/// Main authorization system
#[derive(Debug, Clone)]
pub struct AuthzSystem {
    config: Arc<AuthzConfig>,
    contexts: Arc<RwLock<ContextTree>>,
    roles: Arc<RwLock<RoleCatalog>>,
    assignments: Arc<RwLock<AssignmentStore>>,
    conditions: Arc<RwLock<ConditionStore>>,
    providers: Arc<ConditionProviders>,
    audit_logger: Arc<AuditLogger>,
}

impl AuthzSystem {
    /// Create an empty system
    pub fn new(config: AuthzConfig) -> Self {
        let contexts = ContextTree::new(config.max_hierarchy_depth);
        let roles = RoleCatalog::new(config.max_slug_attempts);
        Self::from_parts(config, contexts, roles, AssignmentStore::new(), ConditionStore::new())
    }

    /// Rebuild a system from exported records
    pub fn from_snapshot(config: AuthzConfig, snapshot: Snapshot) -> AuthzResult<Self> {
        let contexts = ContextTree::from_records(snapshot.contexts, config.max_hierarchy_depth)?;
        let roles = RoleCatalog::from_records(snapshot.roles, config.max_slug_attempts)?;
        let assignments = AssignmentStore::from_records(snapshot.assignments)?;
        let conditions = ConditionStore::from_records(snapshot.conditions)?;

        let system = Self::from_parts(config, contexts, roles, assignments, conditions);
        system.audit_logger.restore(snapshot.audit_events);

        info!(
            contexts = system.contexts.read().len(),
            roles = system.roles.read().len(),
            assignments = system.assignments.read().len(),
            conditions = system.conditions.read().len(),
            "Authorization system restored from snapshot"
        );

        Ok(system)
    }

    fn from_parts(config: AuthzConfig, contexts: ContextTree, roles: RoleCatalog, assignments: AssignmentStore, conditions: ConditionStore) -> Self {
        let audit_logger = if config.audit_enabled { AuditLogger::with_max_events(config.audit_max_events) } else { AuditLogger::disabled() };

        Self {
            config: Arc::new(config),
            contexts: Arc::new(RwLock::new(contexts)),
            roles: Arc::new(RwLock::new(roles)),
            assignments: Arc::new(RwLock::new(assignments)),
            conditions: Arc::new(RwLock::new(conditions)),
            providers: Arc::new(ConditionProviders::new()),
            audit_logger: Arc::new(audit_logger),
        }
    }

    /// Replace the collaborators consulted by conditions
    pub fn with_providers(mut self, providers: ConditionProviders) -> Self {
        self.providers = Arc::new(providers);
        self
    }

    pub fn config(&self) -> &AuthzConfig {
        &self.config
    }

    pub fn audit_logger(&self) -> &AuditLogger {
        &self.audit_logger
    }

    /// Export every record set
    pub fn snapshot(&self) -> Snapshot {
        let contexts = self.contexts.read();
        let roles = self.roles.read();
        let assignments = self.assignments.read();
        let conditions = self.conditions.read();

        Snapshot {
            contexts: contexts.records(),
            roles: roles.records(),
            assignments: assignments.records(),
            conditions: conditions.records(),
            audit_events: self.audit_logger.export(),
        }
    }

    // Contexts

    /// Get or create the system context
    pub fn get_system_context(&self) -> Context {
        if let Some(context) = self.contexts.read().find_system_context() {
            return context.clone();
        }

        self.contexts.write().get_system_context()
    }

    /// Get or create an organization context
    pub fn get_organization_context(&self, organization_id: &str) -> AuthzResult<Context> {
        if let Some(context) = self.contexts.read().find_organization_context(organization_id) {
            return Ok(context.clone());
        }

        self.contexts.write().get_organization_context(organization_id)
    }

    /// Get or create a project context under its organization
    pub fn get_project_context(&self, project_id: &str, organization_id: &str) -> AuthzResult<Context> {
        if let Some(context) = self.contexts.read().find_project_context(project_id, organization_id) {
            return Ok(context.clone());
        }

        self.contexts.write().get_project_context(project_id, organization_id)
    }

    /// Look up the system context without creating it
    pub fn find_system_context(&self) -> Option<Context> {
        self.contexts.read().find_system_context().cloned()
    }

    pub fn find_organization_context(&self, organization_id: &str) -> Option<Context> {
        self.contexts.read().find_organization_context(organization_id).cloned()
    }

    pub fn find_project_context(&self, project_id: &str, organization_id: &str) -> Option<Context> {
        self.contexts.read().find_project_context(project_id, organization_id).cloned()
    }

    pub fn context(&self, context_id: ContextId) -> Option<Context> {
        self.contexts.read().get(context_id).cloned()
    }

    /// Ancestor chain ordered root → self
    pub fn get_hierarchy(&self, context_id: ContextId) -> Vec<Context> {
        self.contexts.read().get_hierarchy(context_id).into_iter().cloned().collect()
    }

    pub fn is_child_of(&self, context_id: ContextId, ancestor_id: ContextId) -> bool {
        self.contexts.read().is_child_of(context_id, ancestor_id)
    }

    pub fn set_context_metadata(&self, context_id: ContextId, key: &str, value: &str) -> AuthzResult<()> {
        self.contexts.write().set_metadata(context_id, key.to_string(), value.to_string())
    }

    // Roles

    pub fn create_role(&self, input: NewCustomRole) -> AuthzResult<CustomRole> {
        let role = self.roles.write().create(input)?;
        self.audit_logger.log_role_created(&role.organization_id, &role.slug, &role.created_by);
        Ok(role)
    }

    pub fn update_role(&self, role_id: RoleId, update: RoleUpdate, updated_by: &str) -> AuthzResult<CustomRole> {
        let role = self.roles.write().update(role_id, update)?;
        self.audit_logger.log_role_updated(&role.organization_id, &role.slug, updated_by);
        Ok(role)
    }

    /// Deactivate a custom role and every assignment of it
    ///
    /// The catalog and assignment locks are held together, so no reader sees
    /// the role inactive while its assignments are still live.
    pub fn deactivate_role(&self, role_id: RoleId, deactivated_by: &str) -> AuthzResult<RoleDeactivation> {
        let contexts = self.contexts.read();
        let mut roles = self.roles.write();
        let mut assignments = self.assignments.write();

        let role = roles.set_inactive(role_id)?;
        let touched = assignments.deactivate_custom_role(&role.slug, &role.organization_id, |context_id| contexts.organization_of(context_id));

        drop(assignments);
        drop(roles);
        drop(contexts);

        info!(
            role_id = %role.id,
            organization_id = %role.organization_id,
            slug = %role.slug,
            deactivated_by = %deactivated_by,
            assignments_deactivated = touched.len(),
            "Custom role deactivated"
        );
        self.audit_logger.log_role_deactivated(&role.organization_id, &role.slug, deactivated_by, touched.len());

        Ok(RoleDeactivation {
            role,
            assignments_deactivated: touched,
        })
    }

    /// Copy a custom role into another organization
    pub fn clone_role(&self, role_id: RoleId, target_organization_id: &str, cloned_by: &str) -> AuthzResult<CustomRole> {
        let mut roles = self.roles.write();
        let source = roles.get(role_id).cloned().ok_or_else(|| AuthzError::RoleNotFound {
            message: format!("Custom role {} not found", role_id),
        })?;
        let clone = roles.clone_to(role_id, target_organization_id, cloned_by)?;
        drop(roles);

        self.audit_logger.log_role_cloned(&source.organization_id, &source.slug, &clone.organization_id, &clone.slug, cloned_by);
        Ok(clone)
    }

    pub fn role(&self, role_id: RoleId) -> Option<CustomRole> {
        self.roles.read().get(role_id).cloned()
    }

    /// Find a custom role by slug, active or not
    pub fn find_role(&self, organization_id: &str, slug: &str) -> Option<CustomRole> {
        self.roles.read().find_by_slug(organization_id, slug).cloned()
    }

    pub fn list_roles(&self, organization_id: &str, include_inactive: bool) -> Vec<CustomRole> {
        self.roles.read().list(organization_id, include_inactive).into_iter().cloned().collect()
    }

    /// Flattened grants of an assignable role
    pub fn role_permissions(&self, role_type: RoleType, slug: &str, organization_id: Option<&str>) -> AuthzResult<Vec<String>> {
        let roles = self.roles.read();
        roles.resolve(role_type, slug, organization_id).map(|role| role.permissions()).ok_or_else(|| AuthzError::RoleNotFound {
            message: format!("No active {} role '{}'", role_type, slug),
        })
    }

    // Assignments

    /// Assign a role in a context
    ///
    /// Conditions from a custom role's template are attached to the new
    /// assignment. The template is validated before anything is written.
    pub fn assign_role(&self, input: NewAssignment) -> AuthzResult<Assignment> {
        let contexts = self.contexts.read();
        let roles = self.roles.read();

        let context = contexts.get(input.context_id).ok_or_else(|| AuthzError::ContextNotFound {
            message: format!("Context {} not found", input.context_id),
        })?;
        let organization_id = contexts.organization_of(context.id);

        let template = match roles.resolve(input.role_type, &input.role_slug, organization_id) {
            Some(crate::roles::ResolvedRole::Custom(role)) => role.conditions_template.clone(),
            Some(crate::roles::ResolvedRole::System(_)) => Vec::new(),
            None => {
                return Err(AuthzError::RoleNotFound {
                    message: match (input.role_type, organization_id) {
                        (RoleType::Custom, Some(organization_id)) => format!("No active custom role '{}' in organization {}", input.role_slug, organization_id),
                        (RoleType::Custom, None) => format!("Custom role '{}' cannot be assigned outside an organization", input.role_slug),
                        (RoleType::System, _) => format!("Unknown system role '{}'", input.role_slug),
                    },
                });
            }
        };

        for spec in &template {
            spec.rule()?;
        }

        let mut assignments = self.assignments.write();
        let mut conditions = self.conditions.write();

        let assignment = assignments.insert(input, Utc::now())?;
        for spec in template {
            conditions.attach(assignment.id, spec)?;
        }

        drop(conditions);
        drop(assignments);
        drop(roles);
        drop(contexts);

        let assigned_by = assignment.assigned_by.as_deref().unwrap_or("system");
        info!(
            assignment_id = %assignment.id,
            user_id = %assignment.user_id,
            role_slug = %assignment.role_slug,
            role_type = %assignment.role_type,
            context_id = %assignment.context_id,
            assigned_by = %assigned_by,
            "Role assigned"
        );
        self.audit_logger.log_role_assigned(&assignment.user_id, &assignment.role_slug, assignment.context_id, assigned_by, assignment.expires_at);

        Ok(assignment)
    }

    /// Assign a system role in a context
    pub fn assign_system_role(&self, user_id: &str, role: SystemRole, context_id: ContextId, assigned_by: Option<&str>) -> AuthzResult<Assignment> {
        let mut input = NewAssignment::system(user_id, role, context_id);
        input.assigned_by = assigned_by.map(str::to_string);
        self.assign_role(input)
    }

    /// Revoke an assignment; revoking twice is a conflict
    pub fn revoke_assignment(&self, assignment_id: AssignmentId, revoked_by: &str) -> AuthzResult<Assignment> {
        let assignment = self.assignments.write().revoke(assignment_id)?;

        info!(assignment_id = %assignment.id, user_id = %assignment.user_id, revoked_by = %revoked_by, "Assignment revoked");
        self.audit_logger.log_assignment_revoked(&assignment.user_id, &assignment.role_slug, assignment.context_id, revoked_by);
        Ok(assignment)
    }

    /// Move an assignment's expiry
    pub fn extend_assignment(&self, assignment_id: AssignmentId, expires_at: DateTime<Utc>, extended_by: &str) -> AuthzResult<Assignment> {
        let assignment = self.assignments.write().extend(assignment_id, expires_at, Utc::now())?;

        info!(assignment_id = %assignment.id, expires_at = %expires_at, extended_by = %extended_by, "Assignment extended");
        self.audit_logger.log_assignment_extended(&assignment.user_id, &assignment.role_slug, expires_at, extended_by);
        Ok(assignment)
    }

    pub fn assignment(&self, assignment_id: AssignmentId) -> Option<Assignment> {
        self.assignments.read().get(assignment_id).cloned()
    }

    /// Currently valid assignments of a user
    pub fn user_assignments(&self, user_id: &str) -> Vec<Assignment> {
        self.assignments.read().user_assignments(user_id, Utc::now()).into_iter().cloned().collect()
    }

    // Conditions

    pub fn attach_condition(&self, assignment_id: AssignmentId, spec: ConditionSpec, actor: &str) -> AuthzResult<Condition> {
        let assignments = self.assignments.read();
        let assignment = assignments.get(assignment_id).ok_or_else(|| AuthzError::AssignmentNotFound {
            message: format!("Assignment {} not found", assignment_id),
        })?;

        let condition = self.conditions.write().attach(assignment_id, spec)?;

        info!(condition_id = %condition.id, assignment_id = %assignment_id, condition_type = %condition.condition_type, "Condition attached");
        self.audit_logger.log_condition_changed(AuditEventType::ConditionAttached, &assignment.user_id, condition.condition_type.as_str(), actor, true);
        Ok(condition)
    }

    pub fn set_condition_active(&self, condition_id: ConditionId, is_active: bool, actor: &str) -> AuthzResult<Condition> {
        let assignments = self.assignments.read();
        let condition = self.conditions.write().set_active(condition_id, is_active)?;
        let user_id = assignments.get(condition.assignment_id).map(|assignment| assignment.user_id.clone()).unwrap_or_default();

        info!(condition_id = %condition_id, is_active = is_active, "Condition updated");
        self.audit_logger.log_condition_changed(AuditEventType::ConditionUpdated, &user_id, condition.condition_type.as_str(), actor, is_active);
        Ok(condition)
    }

    pub fn conditions_for(&self, assignment_id: AssignmentId) -> Vec<Condition> {
        self.conditions.read().for_assignment(assignment_id).into_iter().cloned().collect()
    }

    // Decisions

    /// Decide a permission check and explain the outcome
    pub fn explain(&self, user_id: &str, permission: &str, context_id: ContextId, runtime: Option<&RuntimeContext>) -> AccessDecision {
        let start_time = Instant::now();
        let default_runtime;
        let runtime = match runtime {
            Some(runtime) => runtime,
            None => {
                default_runtime = RuntimeContext::now();
                &default_runtime
            }
        };

        let decision = {
            let contexts = self.contexts.read();
            let roles = self.roles.read();
            let assignments = self.assignments.read();
            let conditions = self.conditions.read();

            let tables = Tables {
                contexts: &contexts,
                roles: &roles,
                assignments: &assignments,
                conditions: &conditions,
            };
            let request = AccessRequest {
                user_id,
                permission,
                context_id,
                now: Utc::now(),
                runtime,
            };
            let options = ResolveOptions {
                inactive_condition_blocks: self.config.inactive_condition_blocks,
            };

            resolver::explain(tables, request, &self.providers, options)
        };

        let duration = start_time.elapsed();

        self.audit_logger
            .log_permission_check(user_id, permission, context_id, decision.allowed, runtime.client_ip.map(|ip| ip.to_string()), runtime.request_id.clone());

        if duration > self.config.slow_check_threshold() {
            warn!(
                user_id = %user_id,
                permission = %permission,
                context_id = %context_id,
                duration_ms = %duration.as_millis(),
                "Slow permission check detected"
            );
        }

        debug!(
            user_id = %user_id,
            permission = %permission,
            context_id = %context_id,
            allowed = %decision.allowed,
            reason = %decision.reason,
            duration_ms = %duration.as_millis(),
            "Permission check completed"
        );

        decision
    }

    /// Whether a user may perform `permission` within a context
    pub fn can(&self, user_id: &str, permission: &str, context_id: ContextId, runtime: Option<&RuntimeContext>) -> bool {
        self.explain(user_id, permission, context_id, runtime).allowed
    }

    /// Whether a user holds a role anywhere on the chain of a context
    pub fn has_role(&self, user_id: &str, role_slug: &str, context_id: ContextId) -> bool {
        let contexts = self.contexts.read();
        let roles = self.roles.read();
        let assignments = self.assignments.read();
        let conditions = self.conditions.read();

        let tables = Tables {
            contexts: &contexts,
            roles: &roles,
            assignments: &assignments,
            conditions: &conditions,
        };

        resolver::has_role(tables, user_id, role_slug, context_id, Utc::now())
    }
}

impl Default for AuthzSystem {
    fn default() -> Self {
        Self::new(AuthzConfig::default())
    }
}
