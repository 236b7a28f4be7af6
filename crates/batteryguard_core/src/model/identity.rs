//! Verified caller identity supplied by the embedding layer.
//!
//! # Responsibility
//! - Carry the authenticated user context into audit-stamping write paths.
//!
//! # Invariants
//! - The identity is trusted as-is; verification and the ADMIN gate on
//!   settings/group edits happen in the caller, never here.

use serde::{Deserialize, Serialize};

/// Coarse role used by callers for their authorization decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Technician,
}

/// Verified `{userId, name, role}` triple for one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerIdentity {
    pub user_id: String,
    /// Display name stamped into `author`/`createdBy` audit fields.
    pub name: String,
    pub role: Role,
}

impl CallerIdentity {
    pub fn new(user_id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            name: name.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
