use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::header::HeaderValue;
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use super::SessionError;

/// The current session, `None` for both the pre-bootstrap and guest states.
pub type SessionState = Option<Arc<Session>>;

/// Opaque bearer token for the authenticated session.
///
/// The `Authorization` header value is built once at construction and
/// marked sensitive so it is redacted by HTTP-level debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    header: HeaderValue,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Result<Self, SessionError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(SessionError::EmptyCredential);
        }
        let mut header = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| SessionError::InvalidCredential)?;
        header.set_sensitive(true);
        Ok(Self { token, header })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// `Bearer <token>`, ready to be inserted as an `Authorization` header
    pub fn bearer_header(&self) -> HeaderValue {
        self.header.clone()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// The authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    id: String,
    display_name: String,
    roles: BTreeSet<String>,
}

impl Identity {
    /// Build an identity. Duplicate roles collapse; blank ids and blank
    /// role names are rejected so a half-formed identity is never stored.
    pub fn new<I, R>(
        id: impl Into<String>,
        display_name: impl Into<String>,
        roles: I,
    ) -> Result<Self, SessionError>
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(SessionError::EmptyIdentityId);
        }

        let mut set = BTreeSet::new();
        for role in roles {
            let role = role.into();
            if role.trim().is_empty() {
                return Err(SessionError::EmptyRole);
            }
            set.insert(role);
        }

        Ok(Self {
            id,
            display_name: display_name.into(),
            roles: set,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    /// Exact-match role membership
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// A credential together with the identity it belongs to.
///
/// There is no way to build a `Session` with only one half, so the store can
/// never hold a token without a principal or the other way round.
#[derive(Debug, Clone)]
pub struct Session {
    credential: Credential,
    identity: Identity,
    established_at: DateTime<Utc>,
}

impl Session {
    pub fn new(credential: Credential, identity: Identity) -> Self {
        Self {
            credential,
            identity,
            established_at: Utc::now(),
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn established_at(&self) -> DateTime<Utc> {
        self.established_at
    }

    fn matches(&self, credential: &Credential, identity: &Identity) -> bool {
        &self.credential == credential && &self.identity == identity
    }
}

/// Process-lifetime holder of the session state.
///
/// Created once at startup and shared as `Arc<SessionStore>`. Every read goes
/// through the store; nothing else keeps a copy of the credential. Writes
/// replace the whole state in one step, so readers on any thread see either
/// the old session or the new one, never a mix.
pub struct SessionStore {
    state: watch::Sender<SessionState>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self { state }
    }

    /// Replace the session. Calling again with an equal credential and
    /// identity leaves the state untouched and wakes no subscribers.
    pub fn set_session(&self, credential: Credential, identity: Identity) {
        let changed = self.state.send_if_modified(|state| {
            if state
                .as_ref()
                .is_some_and(|current| current.matches(&credential, &identity))
            {
                return false;
            }
            *state = Some(Arc::new(Session::new(credential, identity)));
            true
        });
        debug!(changed, "Session set");
    }

    /// Drop the session (logout, failed restore)
    pub fn clear(&self) {
        let changed = self.state.send_if_modified(|state| state.take().is_some());
        debug!(changed, "Session cleared");
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_some()
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.state
            .borrow()
            .as_ref()
            .is_some_and(|session| session.identity.has_role(role))
    }

    pub fn current_credential(&self) -> Option<Credential> {
        self.state
            .borrow()
            .as_ref()
            .map(|session| session.credential.clone())
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.state
            .borrow()
            .as_ref()
            .map(|session| session.identity.clone())
    }

    /// Both halves of the session from a single read
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Change feed for UI collaborators that re-render on login/logout
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
