use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;

/// User roles.
///
/// The order of variants matters: it defines the privilege hierarchy.
/// `Worker` is the least privileged, `Admin` is the most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Reports incidents, watches training, comments and likes.
    Worker = 0,
    /// Publishes documents and videos, manages incident follow-up.
    Supervisor = 1,
    /// Full administrative access.
    Admin = 2,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Worker => write!(f, "worker"),
            Role::Supervisor => write!(f, "supervisor"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl Role {
    /// Parse a role from a string (case-insensitive).
    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "worker" => Some(Role::Worker),
            "supervisor" => Some(Role::Supervisor),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Returns `true` if `self` has at least the required role.
    pub fn has_access(&self, required: Role) -> bool {
        *self >= required
    }
}

/// The caller of a request, resolved from a valid token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl AuthenticatedUser {
    /// Fails with `Forbidden` unless the caller holds at least `role`.
    pub fn require(&self, role: Role) -> Result<(), AppError> {
        if self.role.has_access(role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!("Requires {} role", role)))
        }
    }

    /// Callers may act on their own resources; supervisors and above on any.
    pub fn can_manage(&self, owner_id: &str) -> bool {
        self.user_id == owner_id || self.role.has_access(Role::Supervisor)
    }
}
