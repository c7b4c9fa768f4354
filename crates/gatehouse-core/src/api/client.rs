//! HTTP client for the application's backend.
//!
//! Every request goes through the `RequestAuthorizer` and is counted by
//! `InFlight` from dispatch until its response body has been consumed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Request, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::auth::SessionStore;
use crate::config::Config;

use super::{ApiError, InFlight, InFlightGuard, RequestAuthorizer};

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for the application backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    authorizer: RequestAuthorizer,
    in_flight: InFlight,
}

impl ApiClient {
    /// Create a new API client bound to `store`
    pub fn new(config: &Config, store: Arc<SessionStore>) -> Result<Self> {
        let base_url = config.base_url()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        let authorizer = RequestAuthorizer::new(store, base_url.clone(), config.api_prefix.clone());

        Ok(Self {
            client,
            base_url,
            authorizer,
            in_flight: InFlight::new(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Requests currently outstanding
    pub fn in_flight(&self) -> usize {
        self.in_flight.count()
    }

    /// Resolve `target` against the base URL. Absolute URLs pass through.
    pub fn resolve(&self, target: &str) -> Result<Url> {
        self.base_url
            .join(target)
            .with_context(|| format!("Invalid request target: {}", target))
    }

    /// Build a request for `target`; the bearer header is added by `dispatch`
    pub fn request(&self, method: Method, target: &str) -> Result<Request> {
        let url = self.resolve(target)?;
        self.client
            .request(method, url)
            .build()
            .with_context(|| format!("Failed to build request for {}", target))
    }

    /// Authorize and dispatch a request. The request stays counted as in
    /// flight until the returned response's body is read or dropped.
    pub async fn dispatch(&self, request: Request) -> Result<TrackedResponse> {
        let tracked = self.in_flight.track();
        let request = self.authorizer.authorize(request);
        let url = request.url().clone();
        debug!(method = %request.method(), %url, "Sending request");

        let response = self
            .client
            .execute(request)
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send request to {}", url))?;

        Ok(TrackedResponse {
            response,
            _tracked: tracked,
        })
    }

    /// Dispatch and fail on any non-success status
    pub async fn send(&self, request: Request) -> Result<TrackedResponse> {
        let response = self.dispatch(request).await?;
        Self::check_response(response).await
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: TrackedResponse) -> Result<TrackedResponse> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// GET `target` and parse the JSON body, backing off on 429
    pub async fn get_json<T: DeserializeOwned>(&self, target: &str) -> Result<T> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let request = self.request(Method::GET, target)?;
            let response = self.dispatch(request).await?;

            if response.status().as_u16() != 429 {
                let response = Self::check_response(response).await?;
                return response
                    .json()
                    .await
                    .with_context(|| format!("Failed to parse JSON response from {}", target));
            }

            retries += 1;
            if retries > MAX_RATE_LIMIT_RETRIES {
                return Err(ApiError::RateLimited.into());
            }
            warn!(path = target, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms *= 2; // Exponential backoff
        }
    }
}

/// A response whose request is still counted by [`InFlight`].
///
/// Headers have arrived but the body may still be streaming, so the count is
/// released only once the body has been read or the response is dropped.
pub struct TrackedResponse {
    response: Response,
    _tracked: InFlightGuard,
}

impl TrackedResponse {
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    pub fn url(&self) -> &Url {
        self.response.url()
    }

    pub async fn text(self) -> reqwest::Result<String> {
        self.response.text().await
    }

    pub async fn json<T: DeserializeOwned>(self) -> reqwest::Result<T> {
        self.response.json().await
    }

    /// Hand over the raw response. The request stops counting as in flight.
    pub fn into_response(self) -> Response {
        self.response
    }
}
