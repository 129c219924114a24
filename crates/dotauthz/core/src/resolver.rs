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

//! Permission resolution over the context chain
//!
//! A user holds a permission in a context when some valid assignment on the
//! context's ancestor chain resolves to an active role granting it and every
//! condition on that assignment passes.

use crate::assignments::{Assignment, AssignmentId, AssignmentStore};
use crate::conditions::{ConditionProviders, ConditionStore, EvaluationEnv, RuntimeContext};
use crate::context::{ContextId, ContextTree};
use crate::roles::RoleCatalog;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Read-only view over the tables a decision needs
#[derive(Debug, Clone, Copy)]
pub struct Tables<'a> {
    pub contexts: &'a ContextTree,
    pub roles: &'a RoleCatalog,
    pub assignments: &'a AssignmentStore,
    pub conditions: &'a ConditionStore,
}

/// A single permission question
#[derive(Debug, Clone, Copy)]
pub struct AccessRequest<'a> {
    pub user_id: &'a str,
    pub permission: &'a str,
    pub context_id: ContextId,

    /// Engine clock used for assignment validity
    pub now: DateTime<Utc>,

    /// Caller attributes; its timestamp only drives time conditions
    pub runtime: &'a RuntimeContext,
}

/// Evaluation switches
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    /// Inactive conditions fail their assignment instead of being skipped
    pub inactive_condition_blocks: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self { inactive_condition_blocks: true }
    }
}

/// Why a decision came out the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    Granted,
    UnknownContext,
    NoValidAssignment,
    NoGrantingRole,
    ConditionsFailed,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::Granted => "granted",
            DecisionReason::UnknownContext => "unknown_context",
            DecisionReason::NoValidAssignment => "no_valid_assignment",
            DecisionReason::NoGrantingRole => "no_granting_role",
            DecisionReason::ConditionsFailed => "conditions_failed",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a permission check with diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: DecisionReason,

    /// Assignment that granted access
    pub granted_by: Option<AssignmentId>,

    /// Slug of the granting role
    pub role_slug: Option<String>,

    /// Valid assignments found on the chain
    pub assignments_considered: usize,
}

impl AccessDecision {
    fn denied(reason: DecisionReason, assignments_considered: usize) -> Self {
        Self {
            allowed: false,
            reason,
            granted_by: None,
            role_slug: None,
            assignments_considered,
        }
    }
}

/// Resolve a permission question
pub fn explain(tables: Tables<'_>, request: AccessRequest<'_>, providers: &ConditionProviders, options: ResolveOptions) -> AccessDecision {
    let chain = tables.contexts.chain_ids(request.context_id);
    if chain.is_empty() {
        return AccessDecision::denied(DecisionReason::UnknownContext, 0);
    }

    let candidates = tables.assignments.valid_for_user_in(request.user_id, &chain, request.now);
    if candidates.is_empty() {
        return AccessDecision::denied(DecisionReason::NoValidAssignment, 0);
    }

    let mut reason = DecisionReason::NoGrantingRole;

    for assignment in &candidates {
        let organization_id = tables.contexts.organization_of(assignment.context_id);

        let Some(role) = tables.roles.resolve(assignment.role_type, &assignment.role_slug, organization_id) else {
            continue;
        };
        if !role.grants(request.permission) {
            continue;
        }

        let env = EvaluationEnv {
            user_id: request.user_id,
            organization_id,
            runtime: request.runtime,
            providers,
        };

        if conditions_pass(tables.conditions, assignment, &env, options) {
            return AccessDecision {
                allowed: true,
                reason: DecisionReason::Granted,
                granted_by: Some(assignment.id),
                role_slug: Some(role.slug().to_string()),
                assignments_considered: candidates.len(),
            };
        }

        reason = DecisionReason::ConditionsFailed;
    }

    AccessDecision::denied(reason, candidates.len())
}

/// Whether a permission is held
pub fn resolve(tables: Tables<'_>, request: AccessRequest<'_>, providers: &ConditionProviders, options: ResolveOptions) -> bool {
    explain(tables, request, providers, options).allowed
}

/// Whether the user holds a role anywhere on the chain of `context_id`
///
/// Conditions are not consulted; custom roles must still be active.
pub fn has_role(tables: Tables<'_>, user_id: &str, role_slug: &str, context_id: ContextId, now: DateTime<Utc>) -> bool {
    let chain = tables.contexts.chain_ids(context_id);

    tables
        .assignments
        .valid_for_user_in(user_id, &chain, now)
        .into_iter()
        .filter(|assignment| assignment.role_slug == role_slug)
        .any(|assignment| {
            let organization_id = tables.contexts.organization_of(assignment.context_id);
            tables.roles.resolve(assignment.role_type, &assignment.role_slug, organization_id).is_some()
        })
}

fn conditions_pass(conditions: &ConditionStore, assignment: &Assignment, env: &EvaluationEnv<'_>, options: ResolveOptions) -> bool {
    conditions
        .for_assignment(assignment.id)
        .into_iter()
        .filter(|condition| condition.is_active || options.inactive_condition_blocks)
        .all(|condition| condition.evaluate(env))
}
