//! Client-side session and authorization core.
//!
//! The pieces fit together in a fixed order at startup:
//!
//! 1. `main` creates one `Arc<SessionStore>` for the life of the process.
//! 2. `Bootstrap::run` restores the session (or falls back to guest) and is
//!    awaited before anything renders.
//! 3. `Navigator` checks route guards against the store on every navigation.
//! 4. `ApiClient` sends every request through `RequestAuthorizer`, which adds
//!    the bearer header for the application's own API only.

pub mod api;
pub mod auth;
pub mod config;
pub mod routing;

pub use api::{ApiClient, ApiError, HttpSessionSource, RequestAuthorizer};
pub use auth::{
    AuthService, Bootstrap, BootstrapOutcome, Credential, Identity, Session, SessionStore,
};
pub use config::Config;
pub use routing::{Guard, GuardOutcome, Navigation, Navigator, RouteTable};
