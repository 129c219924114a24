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

//! Hierarchical, context-scoped authorization
//!
//! Answers "can user U perform permission P within context C" for resources
//! nested as system → organization → project. Role-based grants are combined
//! with attribute-based conditions attached to individual assignments.

pub mod assignments;
pub mod audit;
pub mod conditions;
pub mod config;
pub mod context;
pub mod error;
pub mod permissions;
pub mod resolver;
pub mod roles;
pub mod snapshot;
pub mod system;

pub use assignments::{Assignment, AssignmentId, AssignmentStore, NewAssignment};
pub use audit::{AuditEvent, AuditEventType, AuditLogger, AuditResult, AuditStatistics};
pub use conditions::{
    Condition, ConditionId, ConditionProviders, ConditionRule, ConditionSpec, ConditionStore, ConditionType, CustomConditionEvaluator, ProjectCountQuery, ProjectCountSource, RuntimeContext, SpendLedger,
    SpendQuery,
};
pub use config::AuthzConfig;
pub use context::{Context, ContextId, ContextTree, ContextType};
pub use error::{AuthzError, AuthzResult};
pub use permissions::PermissionSet;
pub use resolver::{AccessDecision, DecisionReason};
pub use roles::{CustomRole, NewCustomRole, RoleCatalog, RoleId, RoleType, RoleUpdate, SystemRole};
pub use snapshot::Snapshot;
pub use system::{AuthzSystem, RoleDeactivation};
