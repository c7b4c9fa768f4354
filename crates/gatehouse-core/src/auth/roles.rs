//! Authentication and role predicates.
//!
//! Roles are compared by exact string match. There is no role hierarchy and
//! no wildcard role; a missing identity fails every check.

use super::session::{Session, SessionStore};

/// What a caller must hold to pass a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Authenticated,
    Role(String),
}

impl Requirement {
    pub fn role(role: impl Into<String>) -> Self {
        Requirement::Role(role.into())
    }

    /// Evaluate against one consistent view of the session
    pub fn is_met_by(&self, session: Option<&Session>) -> bool {
        match (self, session) {
            (_, None) => false,
            (Requirement::Authenticated, Some(_)) => true,
            (Requirement::Role(role), Some(session)) => session.identity().has_role(role),
        }
    }

    pub fn is_met(&self, store: &SessionStore) -> bool {
        let snapshot = store.snapshot();
        self.is_met_by(snapshot.as_deref())
    }
}

pub fn is_authenticated(store: &SessionStore) -> bool {
    Requirement::Authenticated.is_met(store)
}

pub fn has_role(store: &SessionStore, role: &str) -> bool {
    store.has_role(role)
}
