//! Route access control.
//!
//! Guards decide whether a navigation may proceed; the navigator applies
//! them to the application's route tree and reports where the user ends up.

pub mod guard;
pub mod routes;

pub use guard::{Guard, GuardOutcome, GuardStage};
pub use routes::{Navigation, NavigationError, Navigator, Route, RouteKind, RouteTable};
