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

//! Collaborators consulted by conditions
//!
//! Spend history and active-project counts live outside this crate. Hosts
//! plug them in through these traits; custom conditions are registered by
//! name.

use crate::conditions::runtime::RuntimeContext;
use crate::error::AuthzResult;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Spend-history window for a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendQuery {
    pub user_id: String,
    pub organization_id: Option<String>,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// Historical spend ledger
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait SpendLedger: Send + Sync {
    /// Total amount spent inside the query window
    fn total_spent(&self, query: &SpendQuery) -> AuthzResult<f64>;
}

/// Active-project count lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectCountQuery {
    pub user_id: String,
    pub organization_id: Option<String>,
}

/// Source of a user's current active-project count
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait ProjectCountSource: Send + Sync {
    fn active_project_count(&self, query: &ProjectCountQuery) -> AuthzResult<u32>;
}

/// Caller-supplied logic behind `custom` conditions
pub trait CustomConditionEvaluator: Send + Sync {
    fn evaluate(&self, user_id: &str, params: &Value, runtime: &RuntimeContext) -> bool;
}

impl<F> CustomConditionEvaluator for F
where
    F: Fn(&str, &Value, &RuntimeContext) -> bool + Send + Sync,
{
    fn evaluate(&self, user_id: &str, params: &Value, runtime: &RuntimeContext) -> bool {
        self(user_id, params, runtime)
    }
}

/// Registry of collaborators available to condition evaluation
#[derive(Clone, Default)]
pub struct ConditionProviders {
    spend_ledger: Option<Arc<dyn SpendLedger>>,
    project_counts: Option<Arc<dyn ProjectCountSource>>,
    custom_evaluators: HashMap<String, Arc<dyn CustomConditionEvaluator>>,
}

impl ConditionProviders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spend_ledger(mut self, ledger: Arc<dyn SpendLedger>) -> Self {
        self.spend_ledger = Some(ledger);
        self
    }

    pub fn with_project_count_source(mut self, source: Arc<dyn ProjectCountSource>) -> Self {
        self.project_counts = Some(source);
        self
    }

    pub fn with_custom_evaluator(mut self, name: impl Into<String>, evaluator: Arc<dyn CustomConditionEvaluator>) -> Self {
        self.custom_evaluators.insert(name.into(), evaluator);
        self
    }

    pub fn spend_ledger(&self) -> Option<&dyn SpendLedger> {
        self.spend_ledger.as_deref()
    }

    pub fn project_counts(&self) -> Option<&dyn ProjectCountSource> {
        self.project_counts.as_deref()
    }

    pub fn custom_evaluator(&self, name: &str) -> Option<&dyn CustomConditionEvaluator> {
        self.custom_evaluators.get(name).map(|evaluator| evaluator.as_ref())
    }
}

impl fmt::Debug for ConditionProviders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut evaluators: Vec<&String> = self.custom_evaluators.keys().collect();
        evaluators.sort();

        f.debug_struct("ConditionProviders")
            .field("spend_ledger", &self.spend_ledger.is_some())
            .field("project_counts", &self.project_counts.is_some())
            .field("custom_evaluators", &evaluators)
            .finish()
    }
}
