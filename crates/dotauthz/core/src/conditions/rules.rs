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

//! Typed condition rules
//!
//! Each `condition_type` decodes its `condition_data` into one of the rule
//! structs below. Every sub-check is optional; an absent sub-check holds
//! vacuously. A rule that cannot be decoded or whose data cannot be parsed
//! reports an error, which the caller turns into a failed condition.

use crate::conditions::ConditionType;
use crate::conditions::providers::{ConditionProviders, ProjectCountQuery, SpendQuery};
use crate::conditions::runtime::RuntimeContext;
use crate::error::{AuthzError, AuthzResult};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::net::IpAddr;
use tracing::debug;

/// Inputs available while evaluating a condition
#[derive(Debug, Clone, Copy)]
pub struct EvaluationEnv<'a> {
    /// User the permission is being checked for
    pub user_id: &'a str,

    /// Organization the assignment belongs to, if any
    pub organization_id: Option<&'a str>,

    /// Request-time attributes
    pub runtime: &'a RuntimeContext,

    /// External collaborators
    pub providers: &'a ConditionProviders,
}

/// Decoded condition, one variant per condition type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "condition_type", content = "condition_data", rename_all = "snake_case")]
pub enum ConditionRule {
    Time(TimeRule),
    Location(LocationRule),
    Budget(BudgetRule),
    ProjectCount(ProjectCountRule),
    Custom(CustomRule),
}

impl ConditionRule {
    /// Decode raw condition data for a condition type
    pub fn decode(condition_type: ConditionType, data: &Value) -> AuthzResult<Self> {
        match condition_type {
            ConditionType::Time => decode_data(condition_type, data).map(ConditionRule::Time),
            ConditionType::Location => decode_data(condition_type, data).map(ConditionRule::Location),
            ConditionType::Budget => decode_data(condition_type, data).map(ConditionRule::Budget),
            ConditionType::ProjectCount => decode_data(condition_type, data).map(ConditionRule::ProjectCount),
            ConditionType::Custom => decode_data(condition_type, data).map(ConditionRule::Custom),
        }
    }

    pub fn condition_type(&self) -> ConditionType {
        match self {
            ConditionRule::Time(_) => ConditionType::Time,
            ConditionRule::Location(_) => ConditionType::Location,
            ConditionRule::Budget(_) => ConditionType::Budget,
            ConditionRule::ProjectCount(_) => ConditionType::ProjectCount,
            ConditionRule::Custom(_) => ConditionType::Custom,
        }
    }

    /// Raw `condition_data` for this rule
    pub fn to_data(&self) -> AuthzResult<Value> {
        let data = match self {
            ConditionRule::Time(rule) => serde_json::to_value(rule)?,
            ConditionRule::Location(rule) => serde_json::to_value(rule)?,
            ConditionRule::Budget(rule) => serde_json::to_value(rule)?,
            ConditionRule::ProjectCount(rule) => serde_json::to_value(rule)?,
            ConditionRule::Custom(rule) => serde_json::to_value(rule)?,
        };
        Ok(data)
    }

    /// Check that every string-encoded field parses
    pub fn validate(&self) -> AuthzResult<()> {
        match self {
            ConditionRule::Time(rule) => rule.validate(),
            ConditionRule::Location(rule) => rule.validate(),
            ConditionRule::Budget(rule) => rule.validate(),
            ConditionRule::ProjectCount(_) => Ok(()),
            ConditionRule::Custom(rule) => rule.validate(),
        }
    }

    /// Evaluate the rule; malformed data is an error, never a pass
    pub fn check(&self, env: &EvaluationEnv<'_>) -> AuthzResult<bool> {
        match self {
            ConditionRule::Time(rule) => rule.check(env.runtime.timestamp),
            ConditionRule::Location(rule) => rule.check(env.runtime),
            ConditionRule::Budget(rule) => rule.check(env),
            ConditionRule::ProjectCount(rule) => rule.check(env),
            ConditionRule::Custom(rule) => rule.check(env),
        }
    }
}

fn decode_data<T: DeserializeOwned>(condition_type: ConditionType, data: &Value) -> AuthzResult<T> {
    let data = if data.is_null() { Value::Object(Default::default()) } else { data.clone() };

    serde_json::from_value(data).map_err(|e| AuthzError::InvalidCondition {
        message: format!("{} condition: {}", condition_type, e),
    })
}

fn invalid(message: String) -> AuthzError {
    AuthzError::InvalidCondition { message }
}

/// Working hours, weekdays and a validity period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeRule {
    /// `"HH:MM-HH:MM"`, inclusive; wraps midnight when the start is after the end
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_hours: Option<String>,

    /// Weekday names, full or three-letter, case-insensitive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_days: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
}

impl TimeRule {
    pub fn validate(&self) -> AuthzResult<()> {
        if let Some(window) = &self.working_hours {
            parse_window(window)?;
        }
        if let Some(days) = &self.allowed_days {
            parse_days(days)?;
        }
        if let (Some(from), Some(until)) = (self.valid_from, self.valid_until) {
            if from > until {
                return Err(invalid(format!("valid_from {} is after valid_until {}", from, until)));
            }
        }
        Ok(())
    }

    pub fn check(&self, now: DateTime<Utc>) -> AuthzResult<bool> {
        if let Some(window) = &self.working_hours {
            let (start, end) = parse_window(window)?;
            let minute = (now.hour(), now.minute());
            let inside = if start <= end { start <= minute && minute <= end } else { minute >= start || minute <= end };
            if !inside {
                return Ok(false);
            }
        }

        if let Some(days) = &self.allowed_days {
            if !parse_days(days)?.contains(&now.weekday()) {
                return Ok(false);
            }
        }

        if self.valid_from.is_some_and(|from| now < from) {
            return Ok(false);
        }

        if self.valid_until.is_some_and(|until| now > until) {
            return Ok(false);
        }

        Ok(true)
    }
}

/// Window bounds as `(hour, minute)`; the end minute is inclusive
fn parse_window(window: &str) -> AuthzResult<((u32, u32), (u32, u32))> {
    let (start, end) = window.split_once('-').ok_or_else(|| invalid(format!("working_hours '{}' is not HH:MM-HH:MM", window)))?;

    let parse = |value: &str| {
        NaiveTime::parse_from_str(value.trim(), "%H:%M")
            .map(|time| (time.hour(), time.minute()))
            .map_err(|e| invalid(format!("working_hours '{}': {}", window, e)))
    };

    Ok((parse(start)?, parse(end)?))
}

fn parse_days(days: &[String]) -> AuthzResult<Vec<Weekday>> {
    days.iter()
        .map(|day| day.trim().parse::<Weekday>().map_err(|_| invalid(format!("unknown weekday '{}'", day))))
        .collect()
}

/// IP and region allow-lists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationRule {
    /// Addresses or CIDR blocks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_ips: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_regions: Option<Vec<String>>,
}

impl LocationRule {
    pub fn validate(&self) -> AuthzResult<()> {
        if let Some(entries) = &self.allowed_ips {
            for entry in entries {
                parse_ip_entry(entry)?;
            }
        }
        Ok(())
    }

    pub fn check(&self, runtime: &RuntimeContext) -> AuthzResult<bool> {
        if let Some(entries) = &self.allowed_ips {
            let Some(client_ip) = runtime.client_ip else {
                return Ok(false);
            };

            let mut allowed = false;
            for entry in entries {
                if parse_ip_entry(entry)?.contains(client_ip) {
                    allowed = true;
                    break;
                }
            }
            if !allowed {
                return Ok(false);
            }
        }

        if let Some(regions) = &self.allowed_regions {
            let Some(region) = runtime.region.as_deref() else {
                return Ok(false);
            };

            if !regions.iter().any(|allowed| allowed.trim().eq_ignore_ascii_case(region.trim())) {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

/// A single allow-list entry
enum IpEntry {
    Address(IpAddr),
    Network(IpNet),
}

impl IpEntry {
    fn contains(&self, ip: IpAddr) -> bool {
        match self {
            IpEntry::Address(address) => *address == ip,
            IpEntry::Network(network) => network.contains(&ip),
        }
    }
}

fn parse_ip_entry(entry: &str) -> AuthzResult<IpEntry> {
    let entry = entry.trim();
    if entry.contains('/') {
        entry.parse::<IpNet>().map(IpEntry::Network).map_err(|e| invalid(format!("allowed_ips entry '{}': {}", entry, e)))
    } else {
        entry.parse::<IpAddr>().map(IpEntry::Address).map_err(|e| invalid(format!("allowed_ips entry '{}': {}", entry, e)))
    }
}

/// Spending ceilings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetRule {
    /// Ceiling for a single requested amount
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<f64>,

    /// Ceiling on spend since the start of the current UTC day; needs a spend ledger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_limit: Option<f64>,

    /// Ceiling on spend since the start of the current UTC month; needs a spend ledger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_limit: Option<f64>,
}

impl BudgetRule {
    pub fn validate(&self) -> AuthzResult<()> {
        for (name, value) in [("max_amount", self.max_amount), ("daily_limit", self.daily_limit), ("monthly_limit", self.monthly_limit)] {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    return Err(invalid(format!("{} must be a non-negative number, got {}", name, value)));
                }
            }
        }
        Ok(())
    }

    pub fn check(&self, env: &EvaluationEnv<'_>) -> AuthzResult<bool> {
        self.validate()?;

        let amount = env.runtime.amount.unwrap_or(0.0);
        if !amount.is_finite() {
            return Err(invalid(format!("requested amount {} is not a finite number", amount)));
        }

        if self.max_amount.is_some_and(|max| amount > max) {
            return Ok(false);
        }

        if self.daily_limit.is_none() && self.monthly_limit.is_none() {
            return Ok(true);
        }

        let Some(ledger) = env.providers.spend_ledger() else {
            debug!(user_id = %env.user_id, "No spend ledger configured; cumulative budget limits not enforced");
            return Ok(true);
        };

        let now = env.runtime.timestamp;
        let windows = [(self.daily_limit, start_of_day(now)), (self.monthly_limit, start_of_month(now))];

        for (limit, from) in windows {
            let Some(limit) = limit else { continue };

            let query = SpendQuery {
                user_id: env.user_id.to_string(),
                organization_id: env.organization_id.map(str::to_string),
                from,
                to: now,
            };
            let spent = ledger.total_spent(&query)?;

            if spent + amount > limit {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN))
}

fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1).unwrap_or(now.date_naive());
    Utc.from_utc_datetime(&first.and_time(NaiveTime::MIN))
}

/// Ceiling on a user's active projects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectCountRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_projects: Option<u32>,
}

impl ProjectCountRule {
    pub fn check(&self, env: &EvaluationEnv<'_>) -> AuthzResult<bool> {
        let Some(max_projects) = self.max_projects else {
            return Ok(true);
        };

        let source = env.providers.project_counts().ok_or_else(|| AuthzError::Collaborator {
            message: "project_count condition declared but no project count source is configured".to_string(),
        })?;

        let query = ProjectCountQuery {
            user_id: env.user_id.to_string(),
            organization_id: env.organization_id.map(str::to_string),
        };

        Ok(source.active_project_count(&query)? <= max_projects)
    }
}

/// Delegates to a named, caller-registered evaluator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomRule {
    pub evaluator: String,

    #[serde(default)]
    pub params: Value,
}

impl CustomRule {
    pub fn validate(&self) -> AuthzResult<()> {
        if self.evaluator.trim().is_empty() {
            return Err(invalid("custom condition needs an evaluator name".to_string()));
        }
        Ok(())
    }

    pub fn check(&self, env: &EvaluationEnv<'_>) -> AuthzResult<bool> {
        let evaluator = env.providers.custom_evaluator(&self.evaluator).ok_or_else(|| AuthzError::Collaborator {
            message: format!("no custom condition evaluator registered as '{}'", self.evaluator),
        })?;

        Ok(evaluator.evaluate(env.user_id, &self.params, env.runtime))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::providers::{MockProjectCountSource, MockSpendLedger};
    use serde_json::json;
    use std::sync::Arc;

    // 2025-06-11 is a Wednesday
    fn wednesday_at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 11, hour, minute, 0).unwrap()
    }

    fn env<'a>(runtime: &'a RuntimeContext, providers: &'a ConditionProviders) -> EvaluationEnv<'a> {
        EvaluationEnv {
            user_id: "u1",
            organization_id: Some("42"),
            runtime,
            providers,
        }
    }

    #[test]
    fn test_decode_rejects_unknown_fields_and_bad_shapes() {
        assert!(ConditionRule::decode(ConditionType::Time, &json!({"working_hour": "09:00-17:00"})).is_err());
        assert!(ConditionRule::decode(ConditionType::Budget, &json!({"max_amount": "lots"})).is_err());
        assert!(ConditionRule::decode(ConditionType::Custom, &json!({})).is_err());
        assert_eq!(ConditionRule::decode(ConditionType::Location, &Value::Null).unwrap(), ConditionRule::Location(LocationRule::default()));
    }

    #[test]
    fn test_rule_data_round_trip() {
        let rule = ConditionRule::Budget(BudgetRule {
            max_amount: Some(5000.0),
            ..Default::default()
        });

        let data = rule.to_data().unwrap();
        assert_eq!(data, json!({"max_amount": 5000.0}));
        assert_eq!(ConditionRule::decode(ConditionType::Budget, &data).unwrap(), rule);
    }

    #[test]
    fn test_time_rule_working_hours() {
        let rule = TimeRule {
            working_hours: Some("09:00-17:00".to_string()),
            ..Default::default()
        };

        assert!(rule.check(wednesday_at(9, 0)).unwrap());
        assert!(rule.check(wednesday_at(17, 0)).unwrap());
        assert!(!rule.check(wednesday_at(8, 59)).unwrap());
        assert!(!rule.check(wednesday_at(17, 1)).unwrap());
    }

    #[test]
    fn test_time_rule_end_minute_includes_subseconds() {
        let rule = TimeRule {
            working_hours: Some("09:00-17:00".to_string()),
            ..Default::default()
        };

        let late_in_last_minute = wednesday_at(17, 0) + chrono::Duration::milliseconds(59_500);
        assert!(rule.check(late_in_last_minute).unwrap());
        assert!(!rule.check(late_in_last_minute + chrono::Duration::milliseconds(500)).unwrap());
    }

    #[test]
    fn test_time_rule_overnight_window() {
        let rule = TimeRule {
            working_hours: Some("22:00-06:00".to_string()),
            ..Default::default()
        };

        assert!(rule.check(wednesday_at(23, 30)).unwrap());
        assert!(rule.check(wednesday_at(5, 0)).unwrap());
        assert!(!rule.check(wednesday_at(12, 0)).unwrap());
    }

    #[test]
    fn test_time_rule_days_and_validity_period() {
        let rule = TimeRule {
            allowed_days: Some(vec!["Mon".to_string(), "wednesday".to_string()]),
            valid_from: Some(wednesday_at(0, 0)),
            valid_until: Some(wednesday_at(12, 0)),
            ..Default::default()
        };

        assert!(rule.check(wednesday_at(10, 0)).unwrap());
        assert!(!rule.check(wednesday_at(13, 0)).unwrap());
        assert!(!rule.check(wednesday_at(10, 0) + chrono::Duration::days(1)).unwrap());
    }

    #[test]
    fn test_time_rule_malformed_data_is_an_error() {
        let bad_window = TimeRule {
            working_hours: Some("9am to 5pm".to_string()),
            ..Default::default()
        };
        let bad_day = TimeRule {
            allowed_days: Some(vec!["someday".to_string()]),
            ..Default::default()
        };

        assert!(bad_window.check(wednesday_at(10, 0)).is_err());
        assert!(bad_day.check(wednesday_at(10, 0)).is_err());
        assert!(bad_window.validate().is_err());
    }

    #[test]
    fn test_empty_time_rule_is_vacuously_true() {
        assert!(TimeRule::default().check(wednesday_at(3, 0)).unwrap());
    }

    #[test]
    fn test_location_rule() {
        let rule = LocationRule {
            allowed_ips: Some(vec!["10.0.0.0/8".to_string(), "203.0.113.7".to_string()]),
            allowed_regions: Some(vec!["EU".to_string()]),
        };

        let inside = RuntimeContext::now().with_client_ip("10.1.2.3".parse().unwrap()).with_region("eu");
        let exact = RuntimeContext::now().with_client_ip("203.0.113.7".parse().unwrap()).with_region("EU");
        let outside = RuntimeContext::now().with_client_ip("192.168.1.1".parse().unwrap()).with_region("EU");
        let wrong_region = RuntimeContext::now().with_client_ip("10.1.2.3".parse().unwrap()).with_region("US");
        let no_ip = RuntimeContext::now().with_region("EU");

        assert!(rule.check(&inside).unwrap());
        assert!(rule.check(&exact).unwrap());
        assert!(!rule.check(&outside).unwrap());
        assert!(!rule.check(&wrong_region).unwrap());
        assert!(!rule.check(&no_ip).unwrap());
        assert!(LocationRule::default().check(&RuntimeContext::now()).unwrap());
    }

    #[test]
    fn test_location_rule_bad_entry_is_an_error() {
        let rule = LocationRule {
            allowed_ips: Some(vec!["10.0.0.0/99".to_string()]),
            allowed_regions: None,
        };
        let runtime = RuntimeContext::now().with_client_ip("10.0.0.1".parse().unwrap());

        assert!(rule.check(&runtime).is_err());
        assert!(rule.validate().is_err());
    }

    #[test]
    fn test_budget_max_amount() {
        let rule = BudgetRule {
            max_amount: Some(1000.0),
            ..Default::default()
        };
        let providers = ConditionProviders::new();

        let within = RuntimeContext::now().with_amount(1000.0);
        let over = RuntimeContext::now().with_amount(1000.01);
        let none = RuntimeContext::now();

        assert!(rule.check(&env(&within, &providers)).unwrap());
        assert!(!rule.check(&env(&over, &providers)).unwrap());
        assert!(rule.check(&env(&none, &providers)).unwrap());
    }

    #[test]
    fn test_budget_limits_without_ledger_are_not_enforced() {
        let rule = BudgetRule {
            daily_limit: Some(10.0),
            ..Default::default()
        };
        let providers = ConditionProviders::new();
        let runtime = RuntimeContext::now().with_amount(500.0);

        assert!(rule.check(&env(&runtime, &providers)).unwrap());
    }

    #[test]
    fn test_budget_daily_limit_uses_ledger() {
        let now = wednesday_at(15, 0);
        let mut ledger = MockSpendLedger::new();
        ledger
            .expect_total_spent()
            .withf(move |query| query.user_id == "u1" && query.organization_id.as_deref() == Some("42") && query.from == wednesday_at(0, 0) && query.to == now)
            .times(2)
            .returning(|_| Ok(800.0));

        let rule = BudgetRule {
            daily_limit: Some(1000.0),
            ..Default::default()
        };
        let providers = ConditionProviders::new().with_spend_ledger(Arc::new(ledger));

        let small = RuntimeContext::at(now).with_amount(150.0);
        let large = RuntimeContext::at(now).with_amount(250.0);

        assert!(rule.check(&env(&small, &providers)).unwrap());
        assert!(!rule.check(&env(&large, &providers)).unwrap());
    }

    #[test]
    fn test_budget_monthly_limit_window_starts_on_first_day() {
        let now = wednesday_at(15, 0);
        let mut ledger = MockSpendLedger::new();
        ledger
            .expect_total_spent()
            .withf(|query| query.from == Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap())
            .returning(|_| Ok(9_900.0));

        let rule = BudgetRule {
            monthly_limit: Some(10_000.0),
            ..Default::default()
        };
        let providers = ConditionProviders::new().with_spend_ledger(Arc::new(ledger));
        let runtime = RuntimeContext::at(now).with_amount(200.0);

        assert!(!rule.check(&env(&runtime, &providers)).unwrap());
    }

    #[test]
    fn test_budget_ledger_failure_is_an_error() {
        let mut ledger = MockSpendLedger::new();
        ledger.expect_total_spent().returning(|_| {
            Err(AuthzError::Collaborator {
                message: "ledger offline".to_string(),
            })
        });

        let rule = BudgetRule {
            daily_limit: Some(1.0),
            ..Default::default()
        };
        let providers = ConditionProviders::new().with_spend_ledger(Arc::new(ledger));
        let runtime = RuntimeContext::now();

        assert!(rule.check(&env(&runtime, &providers)).is_err());
    }

    #[test]
    fn test_project_count_rule() {
        let mut source = MockProjectCountSource::new();
        source.expect_active_project_count().withf(|query| query.user_id == "u1").returning(|_| Ok(3));

        let providers = ConditionProviders::new().with_project_count_source(Arc::new(source));
        let runtime = RuntimeContext::now();

        assert!(ProjectCountRule { max_projects: Some(3) }.check(&env(&runtime, &providers)).unwrap());
        assert!(!ProjectCountRule { max_projects: Some(2) }.check(&env(&runtime, &providers)).unwrap());
        assert!(ProjectCountRule { max_projects: None }.check(&env(&runtime, &providers)).unwrap());
    }

    #[test]
    fn test_project_count_without_source_is_an_error() {
        let providers = ConditionProviders::new();
        let runtime = RuntimeContext::now();

        assert!(ProjectCountRule { max_projects: Some(5) }.check(&env(&runtime, &providers)).is_err());
    }

    #[test]
    fn test_custom_rule_delegates_to_registered_evaluator() {
        let providers = ConditionProviders::new().with_custom_evaluator(
            "has_safety_induction",
            Arc::new(|user_id: &str, params: &Value, runtime: &RuntimeContext| user_id == "u1" && runtime.attributes.get("site") == params.get("site")),
        );

        let rule = CustomRule {
            evaluator: "has_safety_induction".to_string(),
            params: json!({"site": "north-yard"}),
        };
        let on_site = RuntimeContext::now().with_attribute("site", json!("north-yard"));
        let elsewhere = RuntimeContext::now().with_attribute("site", json!("south-yard"));

        assert!(rule.check(&env(&on_site, &providers)).unwrap());
        assert!(!rule.check(&env(&elsewhere, &providers)).unwrap());

        let unknown = CustomRule {
            evaluator: "missing".to_string(),
            params: Value::Null,
        };
        assert!(unknown.check(&env(&on_site, &providers)).is_err());
    }
}
