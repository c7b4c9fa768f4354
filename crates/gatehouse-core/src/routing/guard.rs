use tracing::debug;

use crate::auth::{Requirement, SessionStore};

/// Result of a guard: continue, or send the user elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    Redirect(String),
}

impl GuardOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardOutcome::Allow)
    }
}

/// When in the navigation a guard runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardStage {
    /// While matching, before the route's subtree is loaded
    CanMatch,
    /// After the full route chain matched, before the view renders
    CanActivate,
}

/// Stateless access predicate attached to a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
    requirement: Requirement,
}

impl Guard {
    /// Any signed-in user
    pub fn authenticated() -> Self {
        Self {
            requirement: Requirement::Authenticated,
        }
    }

    /// Signed-in user holding `role`
    pub fn role(role: impl Into<String>) -> Self {
        Self {
            requirement: Requirement::role(role),
        }
    }

    pub fn requirement(&self) -> &Requirement {
        &self.requirement
    }

    /// Evaluate against the store as it is right now
    pub fn check(&self, store: &SessionStore, redirect_to: &str) -> GuardOutcome {
        if self.requirement.is_met(store) {
            GuardOutcome::Allow
        } else {
            debug!(requirement = ?self.requirement, redirect_to, "Guard denied");
            GuardOutcome::Redirect(redirect_to.to_string())
        }
    }
}
