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

//! Context hierarchy
//!
//! Contexts scope where a role assignment applies. They nest as
//! system → organization → project and are stored as an arena of records
//! keyed by id, with each record pointing at its parent. Traversal is
//! iterative and bounded by a depth counter.

use crate::config::clamp_hierarchy_depth;
use crate::error::{AuthzError, AuthzResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use tracing::{debug, warn};

/// Context identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(pub u64);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Level of a context in the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    System,
    Organization,
    Project,
}

impl ContextType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextType::System => "system",
            ContextType::Organization => "organization",
            ContextType::Project => "project",
        }
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node in the context hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Unique context identifier
    pub id: ContextId,

    /// Hierarchy level
    pub context_type: ContextType,

    /// Organization or project identifier (none for the system context)
    pub resource_id: Option<String>,

    /// Parent context (none for the system context)
    pub parent_context_id: Option<ContextId>,

    /// Free-form metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Context {
    /// Uniqueness key of this context
    pub fn key(&self) -> ContextKey {
        ContextKey {
            context_type: self.context_type,
            resource_id: self.resource_id.clone(),
            parent_context_id: self.parent_context_id,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_context_id.is_none()
    }
}

/// Uniqueness key: `(type, resource_id, parent_context_id)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextKey {
    pub context_type: ContextType,
    pub resource_id: Option<String>,
    pub parent_context_id: Option<ContextId>,
}

impl ContextKey {
    pub fn system() -> Self {
        Self {
            context_type: ContextType::System,
            resource_id: None,
            parent_context_id: None,
        }
    }

    pub fn organization(organization_id: &str, system_context_id: ContextId) -> Self {
        Self {
            context_type: ContextType::Organization,
            resource_id: Some(organization_id.to_string()),
            parent_context_id: Some(system_context_id),
        }
    }

    pub fn project(project_id: &str, organization_context_id: ContextId) -> Self {
        Self {
            context_type: ContextType::Project,
            resource_id: Some(project_id.to_string()),
            parent_context_id: Some(organization_context_id),
        }
    }
}

/// Arena of contexts with a uniqueness index
#[derive(Debug, Clone)]
pub struct ContextTree {
    /// All contexts by id
    contexts: HashMap<ContextId, Context>,

    /// `(type, resource_id, parent)` → id
    unique_index: HashMap<ContextKey, ContextId>,

    /// Next identifier to hand out
    next_id: u64,

    /// Traversal guard
    max_depth: usize,
}

impl ContextTree {
    /// Create an empty tree
    pub fn new(max_depth: usize) -> Self {
        Self {
            contexts: HashMap::new(),
            unique_index: HashMap::new(),
            next_id: 1,
            max_depth: clamp_hierarchy_depth(max_depth),
        }
    }

    /// Rebuild a tree from persisted records
    pub fn from_records(records: Vec<Context>, max_depth: usize) -> AuthzResult<Self> {
        let mut tree = Self::new(max_depth);

        for context in records {
            let key = context.key();
            if tree.unique_index.contains_key(&key) {
                return Err(AuthzError::Conflict {
                    message: format!("Duplicate {} context for resource {:?}", context.context_type, context.resource_id),
                });
            }
            if tree.contexts.contains_key(&context.id) {
                return Err(AuthzError::Conflict {
                    message: format!("Duplicate context id {}", context.id),
                });
            }

            tree.next_id = tree.next_id.max(context.id.0 + 1);
            tree.unique_index.insert(key, context.id);
            tree.contexts.insert(context.id, context);
        }

        Ok(tree)
    }

    /// All records ordered by id
    pub fn records(&self) -> Vec<Context> {
        let mut records: Vec<Context> = self.contexts.values().cloned().collect();
        records.sort_by_key(|context| context.id);
        records
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Get a context by id
    pub fn get(&self, id: ContextId) -> Option<&Context> {
        self.contexts.get(&id)
    }

    /// Look up a context by its uniqueness key
    pub fn find(&self, key: &ContextKey) -> Option<&Context> {
        self.unique_index.get(key).and_then(|id| self.contexts.get(id))
    }

    pub fn find_system_context(&self) -> Option<&Context> {
        self.find(&ContextKey::system())
    }

    pub fn find_organization_context(&self, organization_id: &str) -> Option<&Context> {
        let system = self.find_system_context()?;
        self.find(&ContextKey::organization(organization_id, system.id))
    }

    pub fn find_project_context(&self, project_id: &str, organization_id: &str) -> Option<&Context> {
        let organization = self.find_organization_context(organization_id)?;
        self.find(&ContextKey::project(project_id, organization.id))
    }

    /// Get or create the singleton system context
    pub fn get_system_context(&mut self) -> Context {
        let id = self.get_or_insert(ContextKey::system());
        self.contexts[&id].clone()
    }

    /// Get or create the context of an organization
    pub fn get_organization_context(&mut self, organization_id: &str) -> AuthzResult<Context> {
        validate_resource_id("organization", organization_id)?;

        let system_id = self.get_or_insert(ContextKey::system());
        let id = self.get_or_insert(ContextKey::organization(organization_id, system_id));
        Ok(self.contexts[&id].clone())
    }

    /// Get or create the context of a project owned by an organization
    pub fn get_project_context(&mut self, project_id: &str, organization_id: &str) -> AuthzResult<Context> {
        validate_resource_id("project", project_id)?;

        let organization = self.get_organization_context(organization_id)?;
        let id = self.get_or_insert(ContextKey::project(project_id, organization.id));
        Ok(self.contexts[&id].clone())
    }

    /// Insert a context for the key unless one already exists
    fn get_or_insert(&mut self, key: ContextKey) -> ContextId {
        if let Some(id) = self.unique_index.get(&key) {
            return *id;
        }

        let id = ContextId(self.next_id);
        self.next_id += 1;

        let context = Context {
            id,
            context_type: key.context_type,
            resource_id: key.resource_id.clone(),
            parent_context_id: key.parent_context_id,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        };

        debug!(
            context_id = %id,
            context_type = %context.context_type,
            resource_id = ?context.resource_id,
            parent_context_id = ?context.parent_context_id,
            "Context created"
        );

        self.unique_index.insert(key, id);
        self.contexts.insert(id, context);
        id
    }

    /// Whether `ancestor` appears on the parent chain of `id`
    pub fn is_child_of(&self, id: ContextId, ancestor: ContextId) -> bool {
        let mut current = self.contexts.get(&id).and_then(|context| context.parent_context_id);
        let mut steps = 0;

        while let Some(parent_id) = current {
            if parent_id == ancestor {
                return true;
            }

            steps += 1;
            if steps >= self.max_depth {
                warn!(context_id = %id, max_depth = self.max_depth, "Context traversal exceeded maximum depth");
                return false;
            }

            current = self.contexts.get(&parent_id).and_then(|context| context.parent_context_id);
        }

        false
    }

    /// Ancestor chain of a context ordered root → self
    ///
    /// Stops at the highest reachable ancestor when a parent record is missing.
    /// Unknown ids yield an empty chain.
    pub fn get_hierarchy(&self, id: ContextId) -> Vec<&Context> {
        let mut chain = VecDeque::new();
        let mut current = self.contexts.get(&id);

        while let Some(context) = current {
            if chain.len() >= self.max_depth {
                warn!(context_id = %id, max_depth = self.max_depth, "Context hierarchy truncated at maximum depth");
                break;
            }

            chain.push_front(context);
            current = context.parent_context_id.and_then(|parent_id| self.contexts.get(&parent_id));
        }

        chain.into_iter().collect()
    }

    /// Identifiers of the ancestor chain ordered root → self
    pub fn chain_ids(&self, id: ContextId) -> Vec<ContextId> {
        self.get_hierarchy(id).into_iter().map(|context| context.id).collect()
    }

    /// Organization a context belongs to
    pub fn organization_of(&self, id: ContextId) -> Option<&str> {
        self.get_hierarchy(id)
            .into_iter()
            .find(|context| context.context_type == ContextType::Organization)
            .and_then(|context| context.resource_id.as_deref())
    }

    /// Set a metadata entry on a context
    pub fn set_metadata(&mut self, id: ContextId, key: String, value: String) -> AuthzResult<()> {
        let context = self.contexts.get_mut(&id).ok_or_else(|| AuthzError::ContextNotFound {
            message: format!("Context {} not found", id),
        })?;

        context.metadata.insert(key, value);
        Ok(())
    }
}

impl Default for ContextTree {
    fn default() -> Self {
        Self::new(3)
    }
}

fn validate_resource_id(kind: &str, resource_id: &str) -> AuthzResult<()> {
    if resource_id.trim().is_empty() {
        return Err(AuthzError::InvalidInput {
            message: format!("{} id must not be empty", kind),
        });
    }
    Ok(())
}
