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

//! Runtime attributes supplied with a permission check

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::net::IpAddr;

/// Request-time attributes that ABAC conditions are evaluated against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeContext {
    /// Evaluation instant
    pub timestamp: DateTime<Utc>,

    /// Caller address supplied by the edge layer
    pub client_ip: Option<IpAddr>,

    /// Caller region supplied by the edge layer
    pub region: Option<String>,

    /// Amount requested by the operation being authorized
    pub amount: Option<f64>,

    /// Extra attributes for custom conditions
    #[serde(default)]
    pub attributes: HashMap<String, Value>,

    /// Request ID for correlation
    pub request_id: Option<String>,
}

impl RuntimeContext {
    /// Context evaluated at the current instant
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// Context evaluated at a fixed instant
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            client_ip: None,
            region: None,
            amount: None,
            attributes: HashMap::new(),
            request_id: None,
        }
    }

    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::now()
    }
}
