//! Attaches the session credential to outbound requests.
//!
//! Only requests to the application's own API namespace (same origin as the
//! configured base URL, path under the API prefix) get the header, so the
//! bearer token is never sent to third-party hosts.

use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use reqwest::{Request, Url};
use tracing::trace;

use crate::auth::SessionStore;

#[derive(Clone)]
pub struct RequestAuthorizer {
    store: Arc<SessionStore>,
    base_url: Url,
    api_prefix: String,
}

impl RequestAuthorizer {
    pub fn new(store: Arc<SessionStore>, base_url: Url, api_prefix: impl Into<String>) -> Self {
        Self {
            store,
            base_url,
            api_prefix: api_prefix.into(),
        }
    }

    /// Whether `url` points into the application's own API
    pub fn in_scope(&self, url: &Url) -> bool {
        url.origin() == self.base_url.origin() && url.path().starts_with(&self.api_prefix)
    }

    /// Add `Authorization: Bearer <credential>` when the request is in scope
    /// and a session exists; otherwise hand the request back untouched.
    pub fn authorize(&self, mut request: Request) -> Request {
        if !self.in_scope(request.url()) {
            return request;
        }

        let Some(credential) = self.store.current_credential() else {
            return request;
        };

        trace!(url = %request.url(), "Attaching bearer credential");
        request
            .headers_mut()
            .insert(AUTHORIZATION, credential.bearer_header());
        request
    }
}
