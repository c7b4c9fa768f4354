//! Authentication module for holding and restoring the user session.
//!
//! This module provides:
//! - `SessionStore`: the single holder of the credential and identity
//! - `Requirement`: role and authentication predicates over the store
//! - `Bootstrap`: the one-shot startup restore that runs before first render
//! - `AuthService`: the explicit logout action
//!
//! Nothing here is persisted. Every process start restores the session
//! from the refresh endpoint or falls back to guest.

pub mod bootstrap;
pub mod roles;
pub mod session;

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

pub use bootstrap::{
    Bootstrap, BootstrapOutcome, DemoSessionSource, IdentityPayload, RestoreError,
    SessionPayload, SessionSource,
};
pub use roles::{has_role, is_authenticated, Requirement};
pub use session::{Credential, Identity, Session, SessionState, SessionStore};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("credential is empty")]
    EmptyCredential,

    #[error("credential cannot be sent as a bearer header")]
    InvalidCredential,

    #[error("identity id is empty")]
    EmptyIdentityId,

    #[error("identity carries an empty role name")]
    EmptyRole,
}

/// User-facing session actions that are not part of startup.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<SessionStore>,
}

impl AuthService {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    /// Local logout: forget the credential and identity.
    pub fn logout(&self) {
        match self.store.current_identity() {
            Some(identity) => info!(user = %identity.id(), "Logging out"),
            None => info!("Logout requested with no active session"),
        }
        self.store.clear();
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logout_clears_store() {
        let store = Arc::new(SessionStore::new());
        store.set_session(
            Credential::new("tok1").unwrap(),
            Identity::new("u1", "Cameron Young", ["user"]).unwrap(),
        );
        let auth = AuthService::new(Arc::clone(&store));

        auth.logout();
        assert!(!store.is_authenticated());
        assert!(store.current_identity().is_none());

        // Logging out again is harmless
        auth.logout();
        assert!(!store.is_authenticated());
    }
}
