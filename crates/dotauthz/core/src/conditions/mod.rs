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

//! ABAC conditions attached to role assignments
//!
//! A condition stores its rule as an opaque `condition_type` tag plus JSON
//! `condition_data`. Evaluation decodes the data into a [`ConditionRule`] and
//! is total: inactive, undecodable or failing conditions all evaluate to
//! false, and nothing here panics on stored data.

pub mod providers;
pub mod rules;
pub mod runtime;

pub use providers::{ConditionProviders, CustomConditionEvaluator, ProjectCountQuery, ProjectCountSource, SpendLedger, SpendQuery};
pub use rules::{BudgetRule, ConditionRule, CustomRule, EvaluationEnv, LocationRule, ProjectCountRule, TimeRule};
pub use runtime::RuntimeContext;

#[cfg(any(test, feature = "testing"))]
pub use providers::{MockProjectCountSource, MockSpendLedger};

use crate::assignments::AssignmentId;
use crate::error::{AuthzError, AuthzResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Condition identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionId(pub u64);

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    Time,
    Location,
    Budget,
    ProjectCount,
    Custom,
}

impl ConditionType {
    pub const ALL: [ConditionType; 5] = [ConditionType::Time, ConditionType::Location, ConditionType::Budget, ConditionType::ProjectCount, ConditionType::Custom];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::Time => "time",
            ConditionType::Location => "location",
            ConditionType::Budget => "budget",
            ConditionType::ProjectCount => "project_count",
            ConditionType::Custom => "custom",
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionType {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|condition_type| condition_type.as_str() == s).ok_or_else(|| AuthzError::InvalidInput {
            message: format!("Unknown condition type '{}'", s),
        })
    }
}

/// Condition definition before it is attached to an assignment
///
/// Also used as the entries of a custom role's conditions template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSpec {
    pub condition_type: ConditionType,

    #[serde(default)]
    pub condition_data: Value,
}

impl ConditionSpec {
    pub fn new(condition_type: ConditionType, condition_data: Value) -> Self {
        Self { condition_type, condition_data }
    }

    /// Condition data for an already typed rule
    pub fn from_rule(rule: &ConditionRule) -> AuthzResult<Self> {
        Ok(Self {
            condition_type: rule.condition_type(),
            condition_data: rule.to_data()?,
        })
    }

    /// Decode and validate the data
    pub fn rule(&self) -> AuthzResult<ConditionRule> {
        let rule = ConditionRule::decode(self.condition_type, &self.condition_data)?;
        rule.validate()?;
        Ok(rule)
    }
}

/// A condition attached to an assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: ConditionId,
    pub assignment_id: AssignmentId,
    pub condition_type: ConditionType,

    #[serde(default)]
    pub condition_data: Value,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Condition {
    pub fn spec(&self) -> ConditionSpec {
        ConditionSpec::new(self.condition_type, self.condition_data.clone())
    }

    /// Decoded rule of this condition
    pub fn rule(&self) -> AuthzResult<ConditionRule> {
        ConditionRule::decode(self.condition_type, &self.condition_data)
    }

    /// Evaluate the condition; never errors
    pub fn evaluate(&self, env: &EvaluationEnv<'_>) -> bool {
        if !self.is_active {
            return false;
        }

        match self.rule().and_then(|rule| rule.check(env)) {
            Ok(passed) => passed,
            Err(e) => {
                warn!(
                    condition_id = %self.id,
                    assignment_id = %self.assignment_id,
                    condition_type = %self.condition_type,
                    user_id = %env.user_id,
                    error = %e,
                    "Condition could not be evaluated; treating as failed"
                );
                false
            }
        }
    }
}

/// Conditions indexed by assignment
#[derive(Debug, Clone, Default)]
pub struct ConditionStore {
    conditions: HashMap<ConditionId, Condition>,
    by_assignment: HashMap<AssignmentId, Vec<ConditionId>>,
    next_id: u64,
}

impl ConditionStore {
    pub fn new() -> Self {
        Self {
            conditions: HashMap::new(),
            by_assignment: HashMap::new(),
            next_id: 1,
        }
    }

    /// Rebuild the store from persisted records
    ///
    /// Stored data is not re-validated; undecodable conditions simply fail
    /// at evaluation time.
    pub fn from_records(records: Vec<Condition>) -> AuthzResult<Self> {
        let mut store = Self::new();

        for condition in records {
            if store.conditions.contains_key(&condition.id) {
                return Err(AuthzError::Conflict {
                    message: format!("Duplicate condition id {}", condition.id),
                });
            }

            store.next_id = store.next_id.max(condition.id.0 + 1);
            store.by_assignment.entry(condition.assignment_id).or_default().push(condition.id);
            store.conditions.insert(condition.id, condition);
        }

        for ids in store.by_assignment.values_mut() {
            ids.sort();
        }

        Ok(store)
    }

    /// All records ordered by id
    pub fn records(&self) -> Vec<Condition> {
        let mut records: Vec<Condition> = self.conditions.values().cloned().collect();
        records.sort_by_key(|condition| condition.id);
        records
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Attach a validated condition to an assignment
    pub fn attach(&mut self, assignment_id: AssignmentId, spec: ConditionSpec) -> AuthzResult<Condition> {
        spec.rule()?;

        let id = ConditionId(self.next_id.max(1));
        self.next_id = id.0 + 1;

        let condition = Condition {
            id,
            assignment_id,
            condition_type: spec.condition_type,
            condition_data: spec.condition_data,
            is_active: true,
            created_at: Utc::now(),
        };

        self.by_assignment.entry(assignment_id).or_default().push(id);
        self.conditions.insert(id, condition.clone());
        Ok(condition)
    }

    /// Toggle a condition on or off
    pub fn set_active(&mut self, id: ConditionId, is_active: bool) -> AuthzResult<Condition> {
        let condition = self.conditions.get_mut(&id).ok_or_else(|| AuthzError::ConditionNotFound {
            message: format!("Condition {} not found", id),
        })?;

        condition.is_active = is_active;
        Ok(condition.clone())
    }

    pub fn get(&self, id: ConditionId) -> Option<&Condition> {
        self.conditions.get(&id)
    }

    /// Conditions attached to an assignment, in attach order
    pub fn for_assignment(&self, assignment_id: AssignmentId) -> Vec<&Condition> {
        self.by_assignment
            .get(&assignment_id)
            .map(|ids| ids.iter().filter_map(|id| self.conditions.get(id)).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env<'a>(runtime: &'a RuntimeContext, providers: &'a ConditionProviders) -> EvaluationEnv<'a> {
        EvaluationEnv {
            user_id: "u1",
            organization_id: Some("42"),
            runtime,
            providers,
        }
    }

    #[test]
    fn test_condition_type_parsing() {
        for condition_type in ConditionType::ALL {
            assert_eq!(condition_type.as_str().parse::<ConditionType>().unwrap(), condition_type);
        }
        assert!("weather".parse::<ConditionType>().is_err());
    }

    #[test]
    fn test_attach_validates_data() {
        let mut store = ConditionStore::new();

        let bad = ConditionSpec::new(ConditionType::Time, json!({"working_hours": "nine to five"}));
        assert!(matches!(store.attach(AssignmentId(1), bad), Err(AuthzError::InvalidCondition { .. })));

        let good = ConditionSpec::new(ConditionType::Time, json!({"working_hours": "09:00-17:00"}));
        let condition = store.attach(AssignmentId(1), good).unwrap();
        assert!(condition.is_active);
        assert_eq!(store.for_assignment(AssignmentId(1)).len(), 1);
        assert!(store.for_assignment(AssignmentId(2)).is_empty());
    }

    #[test]
    fn test_inactive_condition_fails_closed() {
        let mut store = ConditionStore::new();
        let condition = store.attach(AssignmentId(1), ConditionSpec::new(ConditionType::Location, json!({}))).unwrap();

        let runtime = RuntimeContext::now();
        let providers = ConditionProviders::new();
        assert!(condition.evaluate(&env(&runtime, &providers)));

        let deactivated = store.set_active(condition.id, false).unwrap();
        assert!(!deactivated.evaluate(&env(&runtime, &providers)));
    }

    #[test]
    fn test_malformed_stored_data_evaluates_false() {
        let condition = Condition {
            id: ConditionId(7),
            assignment_id: AssignmentId(1),
            condition_type: ConditionType::Location,
            condition_data: json!({"allowed_ips": "10.0.0.1"}),
            is_active: true,
            created_at: Utc::now(),
        };

        let runtime = RuntimeContext::now().with_client_ip("10.0.0.1".parse().unwrap());
        let providers = ConditionProviders::new();
        assert!(!condition.evaluate(&env(&runtime, &providers)));
    }

    #[test]
    fn test_from_records_restores_index_and_sequence() {
        let mut store = ConditionStore::new();
        store.attach(AssignmentId(3), ConditionSpec::new(ConditionType::Budget, json!({"max_amount": 10.0}))).unwrap();
        store.attach(AssignmentId(3), ConditionSpec::new(ConditionType::Time, Value::Null)).unwrap();

        let mut restored = ConditionStore::from_records(store.records()).unwrap();
        assert_eq!(restored.for_assignment(AssignmentId(3)).len(), 2);

        let next = restored.attach(AssignmentId(4), ConditionSpec::new(ConditionType::Time, Value::Null)).unwrap();
        assert_eq!(next.id, ConditionId(3));

        let mut records = store.records();
        records.push(records[0].clone());
        assert!(ConditionStore::from_records(records).is_err());
    }

    #[test]
    fn test_set_active_unknown_condition() {
        let mut store = ConditionStore::new();
        assert!(store.set_active(ConditionId(99), false).unwrap_err().is_not_found());
    }
}
