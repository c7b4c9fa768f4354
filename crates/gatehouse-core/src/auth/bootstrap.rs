//! One-shot session restore that runs before the application renders.
//!
//! The host awaits [`Bootstrap::run`] before resolving any route or sending
//! any API request. A failed restore is a normal outcome: the store is
//! cleared and the user continues as a guest.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use super::session::{Credential, Identity, SessionStore};
use super::SessionError;
use crate::api::ApiError;

/// Response body of the refresh endpoint.
///
/// `accessToken`, `user` and `name` are accepted for servers that still
/// answer with the older field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    #[serde(alias = "accessToken")]
    pub credential: String,
    #[serde(alias = "user")]
    pub identity: IdentityPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityPayload {
    pub id: String,
    #[serde(rename = "displayName", alias = "name", default)]
    pub display_name: String,
    pub roles: Vec<String>,
}

impl SessionPayload {
    pub fn new(
        credential: impl Into<String>,
        id: impl Into<String>,
        display_name: impl Into<String>,
        roles: &[&str],
    ) -> Self {
        Self {
            credential: credential.into(),
            identity: IdentityPayload {
                id: id.into(),
                display_name: display_name.into(),
                roles: roles.iter().map(|r| r.to_string()).collect(),
            },
        }
    }

    /// Check the payload against the session schema
    pub fn validate(self) -> Result<(Credential, Identity), SessionError> {
        let credential = Credential::new(self.credential)?;
        let identity = Identity::new(
            self.identity.id,
            self.identity.display_name,
            self.identity.roles,
        )?;
        Ok((credential, identity))
    }
}

#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("no active session")]
    NoSession,

    #[error("session refresh rejected: {0}")]
    Rejected(#[from] ApiError),

    #[error("session refresh request failed: {0:#}")]
    Request(anyhow::Error),

    #[error("malformed session payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid session payload: {0}")]
    Invalid(#[from] SessionError),

    #[error("session refresh timed out after {0:?}")]
    TimedOut(Duration),
}

impl From<anyhow::Error> for RestoreError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<ApiError>() {
            Ok(api) => RestoreError::Rejected(api),
            Err(err) => RestoreError::Request(err),
        }
    }
}

/// Where a previously established session can be recovered from.
#[async_trait]
pub trait SessionSource: Send + Sync {
    async fn restore(&self) -> Result<SessionPayload, RestoreError>;
}

/// Answers with a fixed payload after a short delay.
///
/// Stands in for the refresh endpoint when running without a backend.
#[derive(Debug, Clone)]
pub struct DemoSessionSource {
    payload: Option<SessionPayload>,
    delay: Duration,
}

/// Delay used by the demo source to mimic a network round trip
const DEMO_DELAY_MS: u64 = 500;

impl DemoSessionSource {
    pub fn signed_in(payload: SessionPayload) -> Self {
        Self {
            payload: Some(payload),
            delay: Duration::from_millis(DEMO_DELAY_MS),
        }
    }

    pub fn guest() -> Self {
        Self {
            payload: None,
            delay: Duration::from_millis(DEMO_DELAY_MS),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl SessionSource for DemoSessionSource {
    async fn restore(&self) -> Result<SessionPayload, RestoreError> {
        tokio::time::sleep(self.delay).await;
        self.payload.clone().ok_or(RestoreError::NoSession)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Restored,
    Guest,
}

/// Startup session restore. Consumed by [`Bootstrap::run`], so it runs at
/// most once.
pub struct Bootstrap {
    source: Arc<dyn SessionSource>,
    timeout: Duration,
}

impl Bootstrap {
    pub fn new(source: Arc<dyn SessionSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Restore the session into `store`, or clear it. Never fails.
    pub async fn run(self, store: &SessionStore) -> BootstrapOutcome {
        info!("Attempting silent session refresh");

        match self.restore().await {
            Ok((credential, identity)) => {
                info!(
                    user = %identity.display_name(),
                    roles = identity.roles().len(),
                    "Session restored"
                );
                store.set_session(credential, identity);
                BootstrapOutcome::Restored
            }
            Err(e) => {
                info!(reason = %e, "No active session, continuing as guest");
                store.clear();
                BootstrapOutcome::Guest
            }
        }
    }

    async fn restore(&self) -> Result<(Credential, Identity), RestoreError> {
        debug!(timeout_ms = self.timeout.as_millis() as u64, "Calling session source");
        let payload = tokio::time::timeout(self.timeout, self.source.restore())
            .await
            .map_err(|_| RestoreError::TimedOut(self.timeout))??;
        Ok(payload.validate()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSource;

    #[async_trait]
    impl SessionSource for FailingSource {
        async fn restore(&self) -> Result<SessionPayload, RestoreError> {
            Err(RestoreError::Request(anyhow::anyhow!("connection refused")))
        }
    }

    fn bootstrap(source: impl SessionSource + 'static) -> Bootstrap {
        Bootstrap::new(Arc::new(source), Duration::from_secs(5))
    }

    fn signed_in(roles: &[&str]) -> DemoSessionSource {
        DemoSessionSource::signed_in(SessionPayload::new("tok1", "u1", "Cameron Young", roles))
            .with_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_successful_restore_sets_exact_session() {
        let store = SessionStore::new();
        let outcome = bootstrap(signed_in(&["user"])).run(&store).await;

        assert_eq!(outcome, BootstrapOutcome::Restored);
        assert_eq!(store.current_credential().unwrap().token(), "tok1");
        let identity = store.current_identity().unwrap();
        assert_eq!(identity.id(), "u1");
        assert_eq!(identity.display_name(), "Cameron Young");
        assert!(store.has_role("user"));
        assert!(!store.has_role("admin"));
    }

    #[tokio::test]
    async fn test_failed_restore_clears_store() {
        let store = SessionStore::new();
        store.set_session(
            Credential::new("stale").unwrap(),
            Identity::new("old", "Old", ["user"]).unwrap(),
        );

        let outcome = bootstrap(FailingSource).run(&store).await;
        assert_eq!(outcome, BootstrapOutcome::Guest);
        assert!(store.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_guest_source_yields_guest() {
        let store = SessionStore::new();
        let source = DemoSessionSource::guest().with_delay(Duration::ZERO);
        assert_eq!(bootstrap(source).run(&store).await, BootstrapOutcome::Guest);
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn test_invalid_payload_is_treated_as_no_session() {
        let store = SessionStore::new();
        let payload = SessionPayload::new("", "u1", "Cameron Young", &["user"]);
        let source = DemoSessionSource::signed_in(payload).with_delay(Duration::ZERO);

        assert_eq!(bootstrap(source).run(&store).await, BootstrapOutcome::Guest);
        assert!(store.current_identity().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_times_out_to_guest() {
        let store = SessionStore::new();
        let source = signed_in(&["user"]).with_delay(Duration::from_secs(60));
        let outcome = Bootstrap::new(Arc::new(source), Duration::from_secs(2))
            .run(&store)
            .await;

        assert_eq!(outcome, BootstrapOutcome::Guest);
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_payload_accepts_legacy_field_names() {
        let json = r#"{"accessToken":"tok1","user":{"id":"u1","name":"Cameron Young","roles":["user","admin"]}}"#;
        let payload: SessionPayload = serde_json::from_str(json).expect("legacy payload");
        assert_eq!(payload, SessionPayload::new("tok1", "u1", "Cameron Young", &["user", "admin"]));
    }

    #[test]
    fn test_payload_without_display_name_restores() {
        let json = r#"{"credential":"tok1","identity":{"id":"u1","roles":["user"]}}"#;
        let payload: SessionPayload = serde_json::from_str(json).expect("display name is optional");
        let (credential, identity) = payload.validate().expect("valid session");
        assert_eq!(credential.token(), "tok1");
        assert_eq!(identity.display_name(), "");
        assert!(identity.has_role("user"));
    }

    #[test]
    fn test_payload_missing_fields_is_rejected() {
        let missing_roles = r#"{"credential":"tok1","identity":{"id":"u1","displayName":"C"}}"#;
        assert!(serde_json::from_str::<SessionPayload>(missing_roles).is_err());

        let missing_id = r#"{"credential":"tok1","identity":{"displayName":"C","roles":[]}}"#;
        assert!(serde_json::from_str::<SessionPayload>(missing_id).is_err());

        let wrong_type = r#"{"credential":7,"identity":{"id":"u1","displayName":"C","roles":[]}}"#;
        assert!(serde_json::from_str::<SessionPayload>(wrong_type).is_err());
    }

    #[test]
    fn test_anyhow_api_error_maps_to_rejected() {
        let err: RestoreError = anyhow::Error::from(ApiError::Unauthorized).into();
        assert!(matches!(err, RestoreError::Rejected(ApiError::Unauthorized)));

        let err: RestoreError = anyhow::anyhow!("dns failure").into();
        assert!(matches!(err, RestoreError::Request(_)));
    }
}
