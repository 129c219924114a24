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

//! User role assignments scoped to contexts
//!
//! An assignment is a fact: user U holds role R within context C. Validity is
//! computed at read time from the active flag and the expiry, never stored.

use crate::context::ContextId;
use crate::error::{AuthzError, AuthzResult};
use crate::roles::RoleType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Assignment identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssignmentId(pub u64);

impl fmt::Display for AssignmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User role assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,

    pub user_id: String,

    /// Slug of the assigned role
    pub role_slug: String,

    pub role_type: RoleType,

    /// Context the role applies in, and below
    pub context_id: ContextId,

    /// Who assigned this role
    pub assigned_by: Option<String>,

    pub assigned_at: DateTime<Utc>,

    /// Assignment expiration (optional)
    pub expires_at: Option<DateTime<Utc>>,

    /// Cleared by revocation or role deactivation
    pub is_active: bool,
}

impl Assignment {
    /// Active and not expired at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}

/// Input for a new assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAssignment {
    pub user_id: String,
    pub role_slug: String,
    pub role_type: RoleType,
    pub context_id: ContextId,
    pub assigned_by: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewAssignment {
    pub fn new(user_id: impl Into<String>, role_slug: impl Into<String>, role_type: RoleType, context_id: ContextId) -> Self {
        Self {
            user_id: user_id.into(),
            role_slug: role_slug.into(),
            role_type,
            context_id,
            assigned_by: None,
            expires_at: None,
        }
    }

    /// System-role assignment
    pub fn system(user_id: impl Into<String>, role: crate::roles::SystemRole, context_id: ContextId) -> Self {
        Self::new(user_id, role.slug(), RoleType::System, context_id)
    }

    /// Custom-role assignment
    pub fn custom(user_id: impl Into<String>, role_slug: impl Into<String>, context_id: ContextId) -> Self {
        Self::new(user_id, role_slug, RoleType::Custom, context_id)
    }

    pub fn assigned_by(mut self, assigned_by: impl Into<String>) -> Self {
        self.assigned_by = Some(assigned_by.into());
        self
    }

    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Assignments keyed by id and indexed by user
#[derive(Debug, Clone, Default)]
pub struct AssignmentStore {
    assignments: HashMap<AssignmentId, Assignment>,
    by_user: HashMap<String, Vec<AssignmentId>>,
    next_id: u64,
}

impl AssignmentStore {
    pub fn new() -> Self {
        Self {
            assignments: HashMap::new(),
            by_user: HashMap::new(),
            next_id: 1,
        }
    }

    /// Rebuild the store from persisted records
    pub fn from_records(records: Vec<Assignment>) -> AuthzResult<Self> {
        let mut store = Self::new();

        for assignment in records {
            if store.assignments.contains_key(&assignment.id) {
                return Err(AuthzError::Conflict {
                    message: format!("Duplicate assignment id {}", assignment.id),
                });
            }

            store.next_id = store.next_id.max(assignment.id.0 + 1);
            store.by_user.entry(assignment.user_id.clone()).or_default().push(assignment.id);
            store.assignments.insert(assignment.id, assignment);
        }

        for ids in store.by_user.values_mut() {
            ids.sort();
        }

        Ok(store)
    }

    /// All records ordered by id
    pub fn records(&self) -> Vec<Assignment> {
        let mut records: Vec<Assignment> = self.assignments.values().cloned().collect();
        records.sort_by_key(|assignment| assignment.id);
        records
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Record a new active assignment
    ///
    /// Role and context existence are checked by the caller, which holds the
    /// catalog and context locks.
    pub fn insert(&mut self, input: NewAssignment, now: DateTime<Utc>) -> AuthzResult<Assignment> {
        if input.user_id.trim().is_empty() {
            return Err(AuthzError::InvalidInput {
                message: "user id must not be empty".to_string(),
            });
        }
        if let Some(expires_at) = input.expires_at {
            if expires_at <= now {
                return Err(AuthzError::InvalidInput {
                    message: format!("expiry {} is not in the future", expires_at),
                });
            }
        }

        let id = AssignmentId(self.next_id.max(1));
        self.next_id = id.0 + 1;

        let assignment = Assignment {
            id,
            user_id: input.user_id,
            role_slug: input.role_slug,
            role_type: input.role_type,
            context_id: input.context_id,
            assigned_by: input.assigned_by,
            assigned_at: now,
            expires_at: input.expires_at,
            is_active: true,
        };

        self.by_user.entry(assignment.user_id.clone()).or_default().push(id);
        self.assignments.insert(id, assignment.clone());
        Ok(assignment)
    }

    /// Deactivate an assignment; terminal
    pub fn revoke(&mut self, id: AssignmentId) -> AuthzResult<Assignment> {
        let assignment = self.get_mut(id)?;

        if !assignment.is_active {
            return Err(AuthzError::Conflict {
                message: format!("Assignment {} is already revoked", id),
            });
        }

        assignment.is_active = false;
        Ok(assignment.clone())
    }

    /// Move the expiry of a live assignment
    pub fn extend(&mut self, id: AssignmentId, new_expiry: DateTime<Utc>, now: DateTime<Utc>) -> AuthzResult<Assignment> {
        let assignment = self.get_mut(id)?;

        if !assignment.is_active {
            return Err(AuthzError::Conflict {
                message: format!("Assignment {} is revoked and cannot be extended", id),
            });
        }
        if new_expiry <= now {
            return Err(AuthzError::InvalidInput {
                message: format!("expiry {} is not in the future", new_expiry),
            });
        }

        assignment.expires_at = Some(new_expiry);
        Ok(assignment.clone())
    }

    pub fn get(&self, id: AssignmentId) -> Option<&Assignment> {
        self.assignments.get(&id)
    }

    fn get_mut(&mut self, id: AssignmentId) -> AuthzResult<&mut Assignment> {
        self.assignments.get_mut(&id).ok_or_else(|| AuthzError::AssignmentNotFound {
            message: format!("Assignment {} not found", id),
        })
    }

    /// Every assignment of a user, valid or not, ordered by id
    pub fn for_user(&self, user_id: &str) -> Vec<&Assignment> {
        self.by_user
            .get(user_id)
            .map(|ids| ids.iter().filter_map(|id| self.assignments.get(id)).collect())
            .unwrap_or_default()
    }

    /// Valid assignments of a user
    pub fn user_assignments(&self, user_id: &str, now: DateTime<Utc>) -> Vec<&Assignment> {
        self.for_user(user_id).into_iter().filter(|assignment| assignment.is_valid_at(now)).collect()
    }

    /// Valid assignments of a user in any of `contexts`
    pub fn valid_for_user_in(&self, user_id: &str, contexts: &[ContextId], now: DateTime<Utc>) -> Vec<&Assignment> {
        let contexts: HashSet<ContextId> = contexts.iter().copied().collect();
        self.for_user(user_id)
            .into_iter()
            .filter(|assignment| contexts.contains(&assignment.context_id) && assignment.is_valid_at(now))
            .collect()
    }

    /// Deactivate every active assignment of a custom role
    ///
    /// `organization_of` maps an assignment's context to its organization.
    /// Returns the deactivated assignments.
    pub fn deactivate_custom_role<'a, F>(&mut self, role_slug: &str, organization_id: &str, organization_of: F) -> Vec<AssignmentId>
    where
        F: Fn(ContextId) -> Option<&'a str>,
    {
        let mut touched: Vec<AssignmentId> = self
            .assignments
            .values_mut()
            .filter(|assignment| assignment.is_active && assignment.role_type == RoleType::Custom && assignment.role_slug == role_slug)
            .filter(|assignment| organization_of(assignment.context_id) == Some(organization_id))
            .map(|assignment| {
                assignment.is_active = false;
                assignment.id
            })
            .collect();

        touched.sort();
        touched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::SystemRole;
    use chrono::Duration;

    #[test]
    fn test_expiry_overrides_active_flag() {
        let mut store = AssignmentStore::new();
        let now = Utc::now();

        let assignment = store.insert(NewAssignment::system("u1", SystemRole::Viewer, ContextId(1)).expires_at(now + Duration::hours(1)), now).unwrap();

        assert!(assignment.is_active);
        assert!(assignment.is_valid_at(now));
        assert!(!assignment.is_valid_at(now + Duration::hours(2)));
        assert!(!assignment.is_valid_at(now + Duration::hours(1)));
    }

    #[test]
    fn test_insert_rejects_past_expiry() {
        let mut store = AssignmentStore::new();
        let now = Utc::now();

        let err = store.insert(NewAssignment::system("u1", SystemRole::Viewer, ContextId(1)).expires_at(now - Duration::seconds(1)), now).unwrap_err();
        assert_eq!(err.error_type(), "invalid_input");
        assert!(store.is_empty());
    }

    #[test]
    fn test_revoke_is_terminal() {
        let mut store = AssignmentStore::new();
        let now = Utc::now();
        let assignment = store.insert(NewAssignment::system("u1", SystemRole::Viewer, ContextId(1)), now).unwrap();

        let revoked = store.revoke(assignment.id).unwrap();
        assert!(!revoked.is_valid_at(now));
        assert_eq!(store.revoke(assignment.id).unwrap_err().error_type(), "conflict");
        assert_eq!(store.extend(assignment.id, now + Duration::days(1), now).unwrap_err().error_type(), "conflict");
        assert!(store.user_assignments("u1", now).is_empty());
        assert_eq!(store.for_user("u1").len(), 1);
    }

    #[test]
    fn test_extend_updates_expiry_only() {
        let mut store = AssignmentStore::new();
        let now = Utc::now();
        let assignment = store.insert(NewAssignment::system("u1", SystemRole::Viewer, ContextId(1)).expires_at(now + Duration::hours(1)), now).unwrap();

        let later = now + Duration::days(30);
        let extended = store.extend(assignment.id, later, now).unwrap();

        assert_eq!(extended.expires_at, Some(later));
        assert_eq!(extended.assigned_at, assignment.assigned_at);
        assert_eq!(extended.role_slug, assignment.role_slug);
        assert!(store.extend(assignment.id, now - Duration::hours(1), now).is_err());
        assert!(store.extend(AssignmentId(99), later, now).unwrap_err().is_not_found());
    }

    #[test]
    fn test_valid_for_user_in_filters_contexts() {
        let mut store = AssignmentStore::new();
        let now = Utc::now();
        store.insert(NewAssignment::system("u1", SystemRole::Viewer, ContextId(1)), now).unwrap();
        store.insert(NewAssignment::system("u1", SystemRole::ProjectMember, ContextId(3)), now).unwrap();
        store.insert(NewAssignment::system("u2", SystemRole::Viewer, ContextId(1)), now).unwrap();

        let found = store.valid_for_user_in("u1", &[ContextId(1), ContextId(2)], now);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].role_slug, "viewer");
        assert!(store.valid_for_user_in("nobody", &[ContextId(1)], now).is_empty());
    }

    #[test]
    fn test_deactivate_custom_role_matches_organization() {
        let mut store = AssignmentStore::new();
        let now = Utc::now();
        let in_org = store.insert(NewAssignment::custom("u1", "site_manager", ContextId(2)), now).unwrap();
        let in_project = store.insert(NewAssignment::custom("u2", "site_manager", ContextId(3)), now).unwrap();
        let other_org = store.insert(NewAssignment::custom("u3", "site_manager", ContextId(4)), now).unwrap();
        let system_role = store.insert(NewAssignment::system("u1", SystemRole::Viewer, ContextId(2)), now).unwrap();

        let organization_of = |context_id: ContextId| match context_id.0 {
            2 | 3 => Some("42"),
            4 => Some("43"),
            _ => None,
        };

        let touched = store.deactivate_custom_role("site_manager", "42", organization_of);
        assert_eq!(touched, vec![in_org.id, in_project.id]);
        assert!(!store.get(in_org.id).unwrap().is_active);
        assert!(!store.get(in_project.id).unwrap().is_active);
        assert!(store.get(other_org.id).unwrap().is_active);
        assert!(store.get(system_role.id).unwrap().is_active);

        assert!(store.deactivate_custom_role("site_manager", "42", organization_of).is_empty());
    }

    #[test]
    fn test_from_records_round_trip() {
        let mut store = AssignmentStore::new();
        let now = Utc::now();
        store.insert(NewAssignment::system("u1", SystemRole::Viewer, ContextId(1)).assigned_by("admin"), now).unwrap();

        let mut restored = AssignmentStore::from_records(store.records()).unwrap();
        assert_eq!(restored.user_assignments("u1", now).len(), 1);

        let next = restored.insert(NewAssignment::system("u2", SystemRole::Viewer, ContextId(1)), now).unwrap();
        assert_eq!(next.id, AssignmentId(2));
    }
}
