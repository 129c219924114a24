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

//! End-to-end authorization scenarios
//!
//! These tests drive the public `AuthzSystem` surface the way a host service
//! would: contexts created lazily, roles defined per organization, users
//! assigned in contexts and permissions checked with runtime attributes.

use chrono::{Duration, TimeZone, Utc};
use dotauthz_core::{
    AuthzConfig, AuthzError, AuthzResult, AuthzSystem, ConditionProviders, ConditionSpec, ConditionType, NewAssignment, NewCustomRole, PermissionSet, RoleUpdate, RuntimeContext, Snapshot, SpendLedger,
    SpendQuery, SystemRole,
};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Ledger that reports a fixed spend and counts lookups
struct FixedLedger {
    spent: f64,
    calls: AtomicUsize,
}

impl SpendLedger for FixedLedger {
    fn total_spent(&self, _query: &SpendQuery) -> AuthzResult<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.spent)
    }
}

#[test]
fn test_organization_context_is_idempotent() {
    let system = AuthzSystem::default();

    let first = system.get_organization_context("42").unwrap();
    let second = system.get_organization_context("42").unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(system.snapshot().contexts.len(), 2);
}

#[test]
fn test_project_context_parent_is_organization_context() {
    let system = AuthzSystem::default();

    let project = system.get_project_context("tower-b", "42").unwrap();
    let org = system.get_organization_context("42").unwrap();
    let root = system.get_system_context();

    assert_eq!(project.parent_context_id, Some(org.id));
    assert_eq!(org.parent_context_id, Some(root.id));
    assert!(system.is_child_of(project.id, org.id));
    assert!(system.is_child_of(org.id, root.id));
    assert!(system.is_child_of(project.id, root.id));
    assert!(!system.is_child_of(org.id, project.id));
    assert!(!system.is_child_of(project.id, project.id));

    let chain: Vec<_> = system.get_hierarchy(project.id).into_iter().map(|context| context.id).collect();
    assert_eq!(chain, vec![root.id, org.id, project.id]);
}

#[test]
fn test_slug_generation_scenario() {
    let system = AuthzSystem::default();

    let first = system.create_role(NewCustomRole::new("42", "Site Manager", "admin")).unwrap();
    let second = system.create_role(NewCustomRole::new("42", "Site Manager", "admin")).unwrap();

    assert_eq!(first.slug, "site_manager");
    assert_eq!(second.slug, "site_manager_1");

    let renamed = system
        .update_role(
            first.id,
            RoleUpdate {
                name: Some("Yard Boss".to_string()),
                ..Default::default()
            },
            "admin",
        )
        .unwrap();
    assert_eq!(renamed.slug, "site_manager");
}

#[test]
fn test_materials_view_edit_scenario() {
    let system = AuthzSystem::default();
    let project = system.get_project_context("tower-b", "42").unwrap();

    let role = system.create_role(NewCustomRole::new("42", "Storekeeper", "admin").with_module_permissions("materials", ["view"])).unwrap();
    system.assign_role(NewAssignment::custom("u1", &role.slug, project.id).assigned_by("admin")).unwrap();

    assert!(system.can("u1", "materials.view", project.id, None));
    assert!(!system.can("u1", "materials.edit", project.id, None));

    let mut module_permissions = BTreeMap::new();
    module_permissions.insert("materials".to_string(), PermissionSet::from_iter(["materials.*"]));
    system
        .update_role(
            role.id,
            RoleUpdate {
                module_permissions: Some(module_permissions),
                ..Default::default()
            },
            "admin",
        )
        .unwrap();

    assert!(system.can("u1", "materials.edit", project.id, None));
    assert!(!system.can("u1", "billing.view", project.id, None));
}

#[test]
fn test_organization_admin_revoke_scenario() {
    let system = AuthzSystem::default();
    let org = system.get_organization_context("42").unwrap();

    let assignment = system.assign_system_role("u1", SystemRole::OrganizationAdmin, org.id, Some("root")).unwrap();
    assert!(system.can("u1", "organization.manage", org.id, None));

    system.revoke_assignment(assignment.id, "root").unwrap();
    assert!(!system.can("u1", "organization.manage", org.id, None));

    let err = system.revoke_assignment(assignment.id, "root").unwrap_err();
    assert!(matches!(err, AuthzError::Conflict { .. }));
}

#[test]
fn test_expiry_overrides_active_flag() {
    let system = AuthzSystem::default();
    let org = system.get_organization_context("42").unwrap();

    let expires_at = Utc::now() + Duration::hours(1);
    let assignment = system.assign_role(NewAssignment::system("u1", SystemRole::Viewer, org.id).expires_at(expires_at)).unwrap();
    assert!(system.can("u1", "projects.view", org.id, None));

    // Restore the same state with the expiry already behind us
    let mut snapshot = system.snapshot();
    snapshot.assignments[0].expires_at = Some(Utc::now() - Duration::seconds(1));
    let restored = AuthzSystem::from_snapshot(AuthzConfig::default(), snapshot).unwrap();

    assert!(restored.assignment(assignment.id).unwrap().is_active);
    assert!(!restored.can("u1", "projects.view", org.id, None));

    restored.extend_assignment(assignment.id, Utc::now() + Duration::days(1), "admin").unwrap();
    assert!(restored.can("u1", "projects.view", org.id, None));
}

#[test]
fn test_caller_timestamp_does_not_revive_expired_assignment() {
    let system = AuthzSystem::default();
    let org = system.get_organization_context("42").unwrap();
    system.assign_role(NewAssignment::system("u1", SystemRole::Viewer, org.id).expires_at(Utc::now() + Duration::hours(1))).unwrap();

    let mut snapshot = system.snapshot();
    let expired_at = Utc::now() - Duration::seconds(1);
    snapshot.assignments[0].expires_at = Some(expired_at);
    let restored = AuthzSystem::from_snapshot(AuthzConfig::default(), snapshot).unwrap();

    let back_in_time = RuntimeContext::at(expired_at - Duration::hours(1));
    assert!(!restored.can("u1", "projects.view", org.id, None));
    assert!(!restored.can("u1", "projects.view", org.id, Some(&back_in_time)));
}

#[test]
fn test_past_expiry_is_rejected() {
    let system = AuthzSystem::default();
    let org = system.get_organization_context("42").unwrap();

    let err = system.assign_role(NewAssignment::system("u1", SystemRole::Viewer, org.id).expires_at(Utc::now() - Duration::hours(1))).unwrap_err();
    assert_eq!(err.error_type(), "invalid_input");
}

#[test]
fn test_role_deactivation_cascades_to_assignments() {
    let system = AuthzSystem::default();
    let org = system.get_organization_context("42").unwrap();
    let project = system.get_project_context("tower-b", "42").unwrap();

    let role = system.create_role(NewCustomRole::new("42", "Site Manager", "admin").with_module_permissions("materials", ["*"])).unwrap();
    let assignments = [
        system.assign_role(NewAssignment::custom("u1", &role.slug, org.id)).unwrap(),
        system.assign_role(NewAssignment::custom("u2", &role.slug, project.id)).unwrap(),
    ];

    let outcome = system.deactivate_role(role.id, "admin").unwrap();
    assert_eq!(outcome.assignments_deactivated.len(), 2);

    for assignment in &assignments {
        let stored = system.assignment(assignment.id).unwrap();
        assert!(!stored.is_active);
        assert!(!system.can(&stored.user_id, "materials.view", project.id, None));
    }

    assert!(system.find_role("42", &role.slug).is_some_and(|role| !role.is_active));
    assert!(system.assign_role(NewAssignment::custom("u3", &role.slug, org.id)).is_err());
}

#[test]
fn test_organization_assignment_is_inherited_by_projects() {
    let system = AuthzSystem::default();
    let org = system.get_organization_context("42").unwrap();
    let project = system.get_project_context("tower-b", "42").unwrap();
    let foreign_project = system.get_project_context("depot", "43").unwrap();

    system.assign_system_role("u1", SystemRole::ProjectManager, org.id, None).unwrap();

    assert!(system.can("u1", "contracts.view", project.id, None));
    assert!(system.has_role("u1", "project_manager", project.id));
    assert!(!system.can("u1", "contracts.view", foreign_project.id, None));
    assert!(!system.has_role("u1", "project_manager", foreign_project.id));
}

#[test]
fn test_system_assignment_applies_everywhere() {
    let system = AuthzSystem::default();
    let root = system.get_system_context();
    let project = system.get_project_context("tower-b", "42").unwrap();

    system.assign_system_role("ops", SystemRole::SuperAdmin, root.id, None).unwrap();

    assert!(system.can("ops", "billing.refund", project.id, None));
    assert!(system.has_role("ops", "super_admin", project.id));
}

#[test]
fn test_inactive_condition_fails_closed() {
    let system = AuthzSystem::default();
    let org = system.get_organization_context("42").unwrap();
    let assignment = system.assign_system_role("u1", SystemRole::Viewer, org.id, None).unwrap();

    let condition = system.attach_condition(assignment.id, ConditionSpec::new(ConditionType::Time, json!({})), "admin").unwrap();
    assert!(system.can("u1", "projects.view", org.id, None));

    system.set_condition_active(condition.id, false, "admin").unwrap();
    assert!(!system.can("u1", "projects.view", org.id, None));

    let lenient = AuthzSystem::from_snapshot(
        AuthzConfig {
            inactive_condition_blocks: false,
            ..Default::default()
        },
        system.snapshot(),
    )
    .unwrap();
    assert!(lenient.can("u1", "projects.view", org.id, None));
}

#[test]
fn test_time_condition_working_hours() {
    let system = AuthzSystem::default();
    let org = system.get_organization_context("42").unwrap();
    let assignment = system.assign_system_role("u1", SystemRole::OrganizationMember, org.id, None).unwrap();

    system
        .attach_condition(
            assignment.id,
            ConditionSpec::new(ConditionType::Time, json!({"working_hours": "08:00-18:00", "allowed_days": ["mon", "tue", "wed", "thu", "fri"]})),
            "admin",
        )
        .unwrap();

    let wednesday_noon = RuntimeContext::at(Utc.with_ymd_and_hms(2025, 6, 11, 12, 0, 0).unwrap());
    let wednesday_night = RuntimeContext::at(Utc.with_ymd_and_hms(2025, 6, 11, 22, 0, 0).unwrap());
    let saturday_noon = RuntimeContext::at(Utc.with_ymd_and_hms(2025, 6, 14, 12, 0, 0).unwrap());

    assert!(system.can("u1", "projects.view", org.id, Some(&wednesday_noon)));
    assert!(!system.can("u1", "projects.view", org.id, Some(&wednesday_night)));
    assert!(!system.can("u1", "projects.view", org.id, Some(&saturday_noon)));
}

#[test]
fn test_malformed_stored_condition_denies() {
    let system = AuthzSystem::default();
    let org = system.get_organization_context("42").unwrap();
    let assignment = system.assign_system_role("u1", SystemRole::Viewer, org.id, None).unwrap();

    let mut snapshot = system.snapshot();
    let condition = system.attach_condition(assignment.id, ConditionSpec::new(ConditionType::Location, json!({})), "admin").unwrap();
    let mut stored = condition.clone();
    stored.condition_data = json!({"allowed_ips": ["not-an-ip"]});
    snapshot.conditions.push(stored);

    let restored = AuthzSystem::from_snapshot(AuthzConfig::default(), snapshot).unwrap();
    let runtime = RuntimeContext::now().with_client_ip("10.0.0.1".parse().unwrap());
    assert!(!restored.can("u1", "projects.view", org.id, Some(&runtime)));
}

#[test]
fn test_budget_condition_consults_spend_ledger() {
    let ledger = Arc::new(FixedLedger {
        spent: 900.0,
        calls: AtomicUsize::new(0),
    });
    let system = AuthzSystem::default().with_providers(ConditionProviders::new().with_spend_ledger(ledger.clone()));
    let project = system.get_project_context("tower-b", "42").unwrap();

    let role = system
        .create_role(
            NewCustomRole::new("42", "Buyer", "admin")
                .with_module_permissions("procurement", ["approve"])
                .with_condition(ConditionSpec::new(ConditionType::Budget, json!({"max_amount": 500.0, "daily_limit": 1000.0}))),
        )
        .unwrap();
    system.assign_role(NewAssignment::custom("u1", &role.slug, project.id)).unwrap();

    let small = RuntimeContext::now().with_amount(50.0);
    let over_daily = RuntimeContext::now().with_amount(200.0);
    let over_single = RuntimeContext::now().with_amount(600.0);

    assert!(system.can("u1", "procurement.approve", project.id, Some(&small)));
    assert!(!system.can("u1", "procurement.approve", project.id, Some(&over_daily)));
    assert!(!system.can("u1", "procurement.approve", project.id, Some(&over_single)));
    assert_eq!(ledger.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_cloned_role_is_independent() {
    let system = AuthzSystem::default();
    let source = system.create_role(NewCustomRole::new("42", "Estimator", "admin").with_module_permissions("estimates", ["view", "edit"])).unwrap();

    let clone = system.clone_role(source.id, "43", "ops").unwrap();
    system.deactivate_role(source.id, "admin").unwrap();

    let target = system.get_organization_context("43").unwrap();
    system.assign_role(NewAssignment::custom("u1", &clone.slug, target.id)).unwrap();

    assert!(system.can("u1", "estimates.edit", target.id, None));
    assert_eq!(system.role_permissions(dotauthz_core::RoleType::Custom, &clone.slug, Some("43")).unwrap(), vec!["estimates.edit", "estimates.view"]);
}

#[test]
fn test_snapshot_file_round_trip() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("authz.json");

    let system = AuthzSystem::default();
    let project = system.get_project_context("tower-b", "42").unwrap();
    system.assign_system_role("u1", SystemRole::ProjectMember, project.id, None).unwrap();
    system.snapshot().save(&path).unwrap();

    let restored = AuthzSystem::from_snapshot(AuthzConfig::default(), Snapshot::load(&path).unwrap()).unwrap();
    assert!(restored.can("u1", "estimates.view", project.id, None));
    assert!(!restored.audit_logger().get_events(None).is_empty());
}

#[test]
fn test_concurrent_context_creation_yields_one_row() {
    let system = AuthzSystem::default();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let system = system.clone();
            thread::spawn(move || system.get_project_context("tower-b", "42").unwrap().id)
        })
        .collect();

    let ids: HashSet<_> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();
    assert_eq!(ids.len(), 1);
    assert_eq!(system.snapshot().contexts.len(), 3);
}

#[test]
fn test_concurrent_role_creation_yields_distinct_slugs() {
    let system = AuthzSystem::default();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let system = system.clone();
            thread::spawn(move || system.create_role(NewCustomRole::new("42", "Site Manager", "admin")).unwrap().slug)
        })
        .collect();

    let slugs: HashSet<_> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();
    assert_eq!(slugs.len(), 8);
    assert!(slugs.contains("site_manager"));
    assert!(slugs.contains("site_manager_7"));
}
