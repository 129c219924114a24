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

//! Audit trail for authorization decisions and administrative changes

use crate::context::ContextId;
use crate::error::AuthzError;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Audit event types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Permission check performed
    PermissionCheck,
    /// Custom role created
    RoleCreated,
    /// Custom role updated
    RoleUpdated,
    /// Custom role deactivated, with its assignments
    RoleDeactivated,
    /// Custom role copied into another organization
    RoleCloned,
    /// Role assigned to user
    RoleAssigned,
    /// Assignment revoked
    AssignmentRevoked,
    /// Assignment expiry moved
    AssignmentExtended,
    /// Condition attached to an assignment
    ConditionAttached,
    /// Condition switched on or off
    ConditionUpdated,
}

impl AuditEventType {
    pub const ALL: [AuditEventType; 10] = [
        AuditEventType::PermissionCheck,
        AuditEventType::RoleCreated,
        AuditEventType::RoleUpdated,
        AuditEventType::RoleDeactivated,
        AuditEventType::RoleCloned,
        AuditEventType::RoleAssigned,
        AuditEventType::AssignmentRevoked,
        AuditEventType::AssignmentExtended,
        AuditEventType::ConditionAttached,
        AuditEventType::ConditionUpdated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::PermissionCheck => "permission_check",
            AuditEventType::RoleCreated => "role_created",
            AuditEventType::RoleUpdated => "role_updated",
            AuditEventType::RoleDeactivated => "role_deactivated",
            AuditEventType::RoleCloned => "role_cloned",
            AuditEventType::RoleAssigned => "role_assigned",
            AuditEventType::AssignmentRevoked => "assignment_revoked",
            AuditEventType::AssignmentExtended => "assignment_extended",
            AuditEventType::ConditionAttached => "condition_attached",
            AuditEventType::ConditionUpdated => "condition_updated",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditEventType {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|event_type| event_type.as_str() == s).ok_or_else(|| AuthzError::InvalidInput {
            message: format!("Unknown audit event type '{}'", s),
        })
    }
}

/// Audit event result
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    /// Operation succeeded
    Success,
    /// Operation failed
    Failure,
    /// Access was denied
    Denied,
}

/// Audit event entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: String,

    pub event_type: AuditEventType,

    pub timestamp: DateTime<Utc>,

    /// User who performed the action
    pub actor: String,

    /// Target user (if applicable)
    pub target_user: Option<String>,

    /// Permission being checked
    pub permission: Option<String>,

    /// Context the action applied to
    pub context_id: Option<ContextId>,

    pub result: AuditResult,

    pub client_ip: Option<String>,

    /// Additional event details
    #[serde(default)]
    pub details: BTreeMap<String, String>,

    /// Request ID for correlation
    pub request_id: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, actor: impl Into<String>, result: AuditResult) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            event_type,
            timestamp: Utc::now(),
            actor: actor.into(),
            target_user: None,
            permission: None,
            context_id: None,
            result,
            client_ip: None,
            details: BTreeMap::new(),
            request_id: None,
        }
    }

    pub fn with_target_user(mut self, target_user: impl Into<String>) -> Self {
        self.target_user = Some(target_user.into());
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn with_context(mut self, context_id: ContextId) -> Self {
        self.context_id = Some(context_id);
        self
    }

    pub fn with_client_ip(mut self, client_ip: Option<String>) -> Self {
        self.client_ip = client_ip;
        self
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.details.insert(key.into(), value.to_string());
        self
    }
}

/// Bounded in-memory audit log mirrored to `tracing`
#[derive(Debug)]
pub struct AuditLogger {
    events: RwLock<VecDeque<AuditEvent>>,
    max_events: usize,
    enabled: bool,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self::with_max_events(10_000)
    }

    pub fn with_max_events(max_events: usize) -> Self {
        Self {
            events: RwLock::new(VecDeque::new()),
            max_events,
            enabled: true,
        }
    }

    /// Logger that records nothing
    pub fn disabled() -> Self {
        Self {
            events: RwLock::new(VecDeque::new()),
            max_events: 0,
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record an event
    pub fn log_event(&self, event: AuditEvent) {
        if !self.enabled {
            return;
        }

        match (event.event_type, event.result) {
            (AuditEventType::PermissionCheck, _) => {
                debug!(
                    event_type = %event.event_type,
                    actor = %event.actor,
                    permission = ?event.permission,
                    context_id = ?event.context_id,
                    result = ?event.result,
                    request_id = ?event.request_id,
                    "Audit event: {}", event.event_type
                );
            }
            (_, AuditResult::Success) => {
                info!(
                    event_type = %event.event_type,
                    actor = %event.actor,
                    target_user = ?event.target_user,
                    context_id = ?event.context_id,
                    details = ?event.details,
                    "Audit event: {}", event.event_type
                );
            }
            (_, AuditResult::Failure | AuditResult::Denied) => {
                warn!(
                    event_type = %event.event_type,
                    actor = %event.actor,
                    target_user = ?event.target_user,
                    context_id = ?event.context_id,
                    result = ?event.result,
                    details = ?event.details,
                    "Audit event: {} - {:?}", event.event_type, event.result
                );
            }
        }

        let mut events = self.events.write();
        events.push_back(event);

        while events.len() > self.max_events {
            events.pop_front();
        }
    }

    /// Restore previously persisted events, oldest first
    pub fn restore(&self, restored: Vec<AuditEvent>) {
        if !self.enabled {
            return;
        }

        let mut events = self.events.write();
        events.extend(restored);

        while events.len() > self.max_events {
            events.pop_front();
        }
    }

    pub fn log_permission_check(&self, user_id: &str, permission: &str, context_id: ContextId, allowed: bool, client_ip: Option<String>, request_id: Option<String>) {
        let result = if allowed { AuditResult::Success } else { AuditResult::Denied };

        let event = AuditEvent::new(AuditEventType::PermissionCheck, user_id, result)
            .with_permission(permission)
            .with_context(context_id)
            .with_client_ip(client_ip)
            .with_request_id(request_id);

        self.log_event(event);
    }

    pub fn log_role_created(&self, organization_id: &str, role_slug: &str, created_by: &str) {
        let event = AuditEvent::new(AuditEventType::RoleCreated, created_by, AuditResult::Success)
            .with_detail("organization_id", organization_id)
            .with_detail("role_slug", role_slug);

        self.log_event(event);
    }

    pub fn log_role_updated(&self, organization_id: &str, role_slug: &str, updated_by: &str) {
        let event = AuditEvent::new(AuditEventType::RoleUpdated, updated_by, AuditResult::Success)
            .with_detail("organization_id", organization_id)
            .with_detail("role_slug", role_slug);

        self.log_event(event);
    }

    pub fn log_role_deactivated(&self, organization_id: &str, role_slug: &str, deactivated_by: &str, assignments_deactivated: usize) {
        let event = AuditEvent::new(AuditEventType::RoleDeactivated, deactivated_by, AuditResult::Success)
            .with_detail("organization_id", organization_id)
            .with_detail("role_slug", role_slug)
            .with_detail("assignments_deactivated", assignments_deactivated);

        self.log_event(event);
    }

    pub fn log_role_cloned(&self, source_organization_id: &str, source_slug: &str, target_organization_id: &str, target_slug: &str, cloned_by: &str) {
        let event = AuditEvent::new(AuditEventType::RoleCloned, cloned_by, AuditResult::Success)
            .with_detail("source_organization_id", source_organization_id)
            .with_detail("source_slug", source_slug)
            .with_detail("organization_id", target_organization_id)
            .with_detail("role_slug", target_slug);

        self.log_event(event);
    }

    pub fn log_role_assigned(&self, user_id: &str, role_slug: &str, context_id: ContextId, assigned_by: &str, expires_at: Option<DateTime<Utc>>) {
        let mut event = AuditEvent::new(AuditEventType::RoleAssigned, assigned_by, AuditResult::Success)
            .with_target_user(user_id)
            .with_context(context_id)
            .with_detail("role_slug", role_slug);

        if let Some(expires_at) = expires_at {
            event = event.with_detail("expires_at", expires_at.to_rfc3339());
        }

        self.log_event(event);
    }

    pub fn log_assignment_revoked(&self, user_id: &str, role_slug: &str, context_id: ContextId, revoked_by: &str) {
        let event = AuditEvent::new(AuditEventType::AssignmentRevoked, revoked_by, AuditResult::Success)
            .with_target_user(user_id)
            .with_context(context_id)
            .with_detail("role_slug", role_slug);

        self.log_event(event);
    }

    pub fn log_assignment_extended(&self, user_id: &str, role_slug: &str, expires_at: DateTime<Utc>, extended_by: &str) {
        let event = AuditEvent::new(AuditEventType::AssignmentExtended, extended_by, AuditResult::Success)
            .with_target_user(user_id)
            .with_detail("role_slug", role_slug)
            .with_detail("expires_at", expires_at.to_rfc3339());

        self.log_event(event);
    }

    pub fn log_condition_changed(&self, event_type: AuditEventType, user_id: &str, condition_type: &str, actor: &str, is_active: bool) {
        let event = AuditEvent::new(event_type, actor, AuditResult::Success)
            .with_target_user(user_id)
            .with_detail("condition_type", condition_type)
            .with_detail("is_active", is_active);

        self.log_event(event);
    }

    /// Most recent events first
    pub fn get_events(&self, limit: Option<usize>) -> Vec<AuditEvent> {
        let events = self.events.read();
        events.iter().rev().take(limit.unwrap_or(usize::MAX)).cloned().collect()
    }

    /// Events where the user is the actor or the target, most recent first
    pub fn get_user_events(&self, user_id: &str, limit: Option<usize>) -> Vec<AuditEvent> {
        let events = self.events.read();
        events
            .iter()
            .rev()
            .filter(|event| event.actor == user_id || event.target_user.as_deref() == Some(user_id))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub fn get_events_by_type(&self, event_type: AuditEventType, limit: Option<usize>) -> Vec<AuditEvent> {
        let events = self.events.read();
        events.iter().rev().filter(|event| event.event_type == event_type).take(limit.unwrap_or(usize::MAX)).cloned().collect()
    }

    /// Every retained event, oldest first
    pub fn export(&self) -> Vec<AuditEvent> {
        self.events.read().iter().cloned().collect()
    }

    pub fn clear_events(&self) {
        self.events.write().clear();
        info!("Audit log cleared");
    }

    pub fn get_statistics(&self) -> AuditStatistics {
        let events = self.events.read();

        let mut stats = AuditStatistics {
            total_events: events.len(),
            ..Default::default()
        };

        for event in events.iter() {
            match event.result {
                AuditResult::Success => stats.successful_events += 1,
                AuditResult::Failure => stats.failed_events += 1,
                AuditResult::Denied => stats.denied_events += 1,
            }

            *stats.events_by_type.entry(event.event_type).or_insert(0) += 1;
        }

        stats
    }
}

/// Audit statistics
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AuditStatistics {
    pub total_events: usize,
    pub successful_events: usize,
    pub failed_events: usize,
    pub denied_events: usize,
    pub events_by_type: HashMap<AuditEventType, usize>,
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}
