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

//! Role slug generation

use crate::error::{AuthzError, AuthzResult};

/// Slug used when a name normalises to nothing
const FALLBACK_SLUG: &str = "role";

/// Normalise a role name into a base slug
///
/// Lowercases alphanumerics and collapses every other run of characters
/// into a single underscore: `"Site Manager"` → `"site_manager"`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;

    for ch in name.chars() {
        if ch.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_separator = true;
        }
    }

    if slug.is_empty() { FALLBACK_SLUG.to_string() } else { slug }
}

/// First free slug among `base`, `base_1`, `base_2`, ...
///
/// Callers must hold whatever serializes inserts into the slug namespace
/// between this check and the insert.
pub fn unique_slug<F>(base: &str, is_taken: F, max_attempts: usize) -> AuthzResult<String>
where
    F: Fn(&str) -> bool,
{
    if !is_taken(base) {
        return Ok(base.to_string());
    }

    for suffix in 1..=max_attempts {
        let candidate = format!("{}_{}", base, suffix);
        if !is_taken(&candidate) {
            return Ok(candidate);
        }
    }

    Err(AuthzError::Conflict {
        message: format!("No free slug for '{}' after {} attempts", base, max_attempts),
    })
}
