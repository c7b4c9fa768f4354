use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;

use crate::auth::{RestoreError, SessionPayload, SessionSource};

use super::ApiClient;

/// Restores the session from the backend refresh endpoint.
///
/// The request carries no explicit credential; the server recognises the
/// caller from the HttpOnly cookie held in the client's cookie store.
pub struct HttpSessionSource {
    api: ApiClient,
    refresh_path: String,
}

impl HttpSessionSource {
    pub fn new(api: ApiClient, refresh_path: impl Into<String>) -> Self {
        Self {
            api,
            refresh_path: refresh_path.into(),
        }
    }
}

#[async_trait]
impl SessionSource for HttpSessionSource {
    async fn restore(&self) -> Result<SessionPayload, RestoreError> {
        let request = self.api.request(Method::POST, &self.refresh_path)?;
        let response = self.api.send(request).await?;
        debug!(status = %response.status(), "Refresh endpoint answered");

        let body = response
            .text()
            .await
            .map_err(|e| RestoreError::Request(e.into()))?;
        Ok(serde_json::from_str(&body)?)
    }
}
