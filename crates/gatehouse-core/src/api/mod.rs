//! REST API plumbing for the application's own backend.
//!
//! This module provides:
//! - `ApiClient`: reqwest wrapper that authorizes and tracks every request
//! - `RequestAuthorizer`: attaches the bearer credential to in-scope requests
//! - `InFlight`: outstanding-request counter for loading indicators
//! - `HttpSessionSource`: the refresh call used at startup

pub mod authorizer;
pub mod client;
pub mod error;
pub mod in_flight;
pub mod refresh;

pub use authorizer::RequestAuthorizer;
pub use client::{ApiClient, TrackedResponse};
pub use error::ApiError;
pub use in_flight::{InFlight, InFlightGuard};
pub use refresh::HttpSessionSource;
