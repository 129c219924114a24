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

//! Error handling for the authorization engine

use thiserror::Error;

/// Authorization engine error types
#[derive(Error, Debug)]
pub enum AuthzError {
    #[error("Role not found: {message}")]
    RoleNotFound { message: String },

    #[error("Context not found: {message}")]
    ContextNotFound { message: String },

    #[error("Assignment not found: {message}")]
    AssignmentNotFound { message: String },

    #[error("Condition not found: {message}")]
    ConditionNotFound { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Invalid condition data: {message}")]
    InvalidCondition { message: String },

    #[error("Collaborator error: {message}")]
    Collaborator { message: String },

    #[error("Serde JSON error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AuthzError {
    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            AuthzError::RoleNotFound { .. } => "role_not_found",
            AuthzError::ContextNotFound { .. } => "context_not_found",
            AuthzError::AssignmentNotFound { .. } => "assignment_not_found",
            AuthzError::ConditionNotFound { .. } => "condition_not_found",
            AuthzError::InvalidInput { .. } => "invalid_input",
            AuthzError::Conflict { .. } => "conflict",
            AuthzError::InvalidCondition { .. } => "invalid_condition",
            AuthzError::Collaborator { .. } => "collaborator_error",
            AuthzError::SerdeJsonError(_) => "json_error",
            AuthzError::IoError(_) => "io_error",
        }
    }

    /// Whether the error reports a missing record
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AuthzError::RoleNotFound { .. } | AuthzError::ContextNotFound { .. } | AuthzError::AssignmentNotFound { .. } | AuthzError::ConditionNotFound { .. }
        )
    }
}

/// Result type for authorization operations
pub type AuthzResult<T> = Result<T, AuthzError>;
