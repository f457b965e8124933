//! Security principals and policies
//!
//! A Principal is a caller identity: a user name plus the roles granted
//! to it. A SecurityPolicy wraps a principal and travels with every task
//! query and transition. Principals are immutable once constructed, so a
//! policy captured at request time cannot be widened mid-operation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ── Principal ────────────────────────────────────────────────────────

/// A caller identity: user name plus granted roles
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    name: String,
    roles: HashSet<String>,
}

impl Principal {
    /// Create a principal with no roles
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            roles: HashSet::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roles(&self) -> &HashSet<String> {
        &self.roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// A principal with no name and no roles can never pass authorization
    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty() && self.roles.is_empty()
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

// ── Security Policy ──────────────────────────────────────────────────

/// The security context attached to task queries and transitions
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    principal: Principal,
}

impl SecurityPolicy {
    /// Build a policy carrying the given principal
    pub fn of(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
