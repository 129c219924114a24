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

//! Permission check benchmarks
//!
//! A check walks at most three contexts and a handful of assignments, so it
//! should stay well under the slow-check threshold.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use dotauthz_core::{AuthzConfig, AuthzSystem, ConditionSpec, ConditionType, NewAssignment, NewCustomRole, RuntimeContext, SystemRole};
use serde_json::json;

fn populated_system() -> AuthzSystem {
    let system = AuthzSystem::new(AuthzConfig {
        audit_enabled: false,
        ..Default::default()
    });

    for org in 0..20 {
        let org_id = format!("org-{}", org);
        let org_context = system.get_organization_context(&org_id).unwrap();
        let role = system.create_role(NewCustomRole::new(&org_id, "Site Manager", "admin").with_module_permissions("materials", ["view", "edit"])).unwrap();

        for project in 0..10 {
            let project_context = system.get_project_context(&format!("project-{}", project), &org_id).unwrap();
            for user in 0..5 {
                let user_id = format!("user-{}-{}", org, user);
                system.assign_role(NewAssignment::custom(&user_id, &role.slug, project_context.id)).unwrap();
            }
        }

        let admin = system.assign_system_role(&format!("admin-{}", org), SystemRole::OrganizationAdmin, org_context.id, None).unwrap();
        system
            .attach_condition(admin.id, ConditionSpec::new(ConditionType::Location, json!({"allowed_ips": ["10.0.0.0/8"]})), "admin")
            .unwrap();
    }

    system
}

/// Benchmark permission checks
fn bench_permission_checks(c: &mut Criterion) {
    let system = populated_system();
    let project = system.get_project_context("project-3", "org-7").unwrap();
    let runtime = RuntimeContext::now().with_client_ip("10.1.2.3".parse().unwrap());

    let mut group = c.benchmark_group("permission_checks");

    group.bench_function("custom_role_granted", |b| b.iter(|| system.can(black_box("user-7-2"), black_box("materials.edit"), project.id, Some(&runtime))));

    group.bench_function("inherited_with_condition", |b| b.iter(|| system.can(black_box("admin-7"), black_box("contracts.sign"), project.id, Some(&runtime))));

    group.bench_function("denied", |b| b.iter(|| system.can(black_box("user-7-2"), black_box("billing.refund"), project.id, Some(&runtime))));

    group.bench_function("has_role", |b| b.iter(|| system.has_role(black_box("user-7-2"), black_box("site_manager"), project.id)));

    group.finish();
}

criterion_group!(benches, bench_permission_checks);
criterion_main!(benches);
