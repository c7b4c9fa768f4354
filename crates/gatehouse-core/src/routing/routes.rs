//! Route tree and the navigator that walks it.
//!
//! Matching follows a few fixed rules:
//! - views and redirects match only when they consume the rest of the path
//! - parents match a prefix and hand the remainder to their children
//! - `**` matches anything
//! - match guards run as soon as a route matches, before its children are
//!   looked at; activate guards run once the whole chain is known, parent
//!   first
//!
//! Every call to [`Navigator::navigate`] starts from scratch. Nothing about
//! a previous navigation is remembered.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::guard::{Guard, GuardOutcome, GuardStage};
use crate::auth::SessionStore;

/// Alias redirects followed per navigation before giving up
const MAX_REDIRECTS: usize = 8;

const WILDCARD: &str = "**";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteKind {
    View(String),
    Redirect(String),
    Parent,
}

#[derive(Debug, Clone)]
pub struct Route {
    path: String,
    kind: RouteKind,
    can_match: Vec<Guard>,
    can_activate: Vec<Guard>,
    children: Vec<Route>,
}

impl Route {
    fn new(path: impl Into<String>, kind: RouteKind) -> Self {
        Self {
            path: path.into(),
            kind,
            can_match: Vec::new(),
            can_activate: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn view(path: impl Into<String>, view: impl Into<String>) -> Self {
        Self::new(path, RouteKind::View(view.into()))
    }

    /// `to` is absolute when it starts with `/`, otherwise relative to the
    /// parent route
    pub fn redirect(path: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(path, RouteKind::Redirect(to.into()))
    }

    pub fn parent(path: impl Into<String>, children: Vec<Route>) -> Self {
        let mut route = Self::new(path, RouteKind::Parent);
        route.children = children;
        route
    }

    pub fn can_match(mut self, guard: Guard) -> Self {
        self.can_match.push(guard);
        self
    }

    pub fn can_activate(mut self, guard: Guard) -> Self {
        self.can_activate.push(guard);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn kind(&self) -> &RouteKind {
        &self.kind
    }

    fn segments(&self) -> Vec<&str> {
        split_path(&self.path)
    }
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// Public portfolio pages plus the protected admin area
    pub fn portfolio() -> Self {
        let mut routes = vec![Route::redirect("", "home")];
        for page in [
            "home",
            "profile",
            "projects",
            "skills",
            "timeline",
            "resume",
            "contact",
            "architecture",
            "portfolio/resume",
            "playground",
        ] {
            routes.push(Route::view(page, page));
        }

        routes.push(
            Route::parent(
                "admin",
                vec![
                    Route::redirect("", "dashboard"),
                    Route::view("dashboard", "admin/dashboard").can_activate(Guard::authenticated()),
                    Route::view("library", "admin/library").can_activate(Guard::role("admin")),
                ],
            )
            .can_match(Guard::authenticated()),
        );

        routes.push(Route::redirect(WILDCARD, "home"));
        Self::new(routes)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

/// Outcome of a single navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Granted {
        path: String,
        view: String,
    },
    Denied {
        attempted: String,
        stage: GuardStage,
        redirect_to: String,
    },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NavigationError {
    #[error("no route matches {0}")]
    NoMatch(String),

    #[error("too many redirects while navigating to {0}")]
    RedirectLoop(String),
}

enum Step<'a> {
    Matched { chain: Vec<&'a Route>, view: &'a str },
    Redirect(String),
    Denied(String),
}

/// Resolves paths against the route table using the live session.
pub struct Navigator {
    table: RouteTable,
    store: Arc<SessionStore>,
    public_route: String,
}

impl Navigator {
    pub fn new(table: RouteTable, store: Arc<SessionStore>, public_route: impl Into<String>) -> Self {
        Self {
            table,
            store,
            public_route: public_route.into(),
        }
    }

    pub fn public_route(&self) -> &str {
        &self.public_route
    }

    pub fn navigate(&self, path: &str) -> Result<Navigation, NavigationError> {
        let mut current = normalize(path);

        for _ in 0..=MAX_REDIRECTS {
            let segments = split_path(&current);
            let mut chain = Vec::new();
            let step = self
                .match_routes(&self.table.routes, &segments, &[], &mut chain)
                .ok_or_else(|| NavigationError::NoMatch(current.clone()))?;

            match step {
                Step::Redirect(to) => {
                    debug!(from = %current, to = %to, "Following route redirect");
                    current = normalize(&to);
                }
                Step::Denied(redirect_to) => {
                    return Ok(Navigation::Denied {
                        attempted: current,
                        stage: GuardStage::CanMatch,
                        redirect_to,
                    });
                }
                Step::Matched { chain, view } => {
                    return Ok(self.activate(current, &chain, view));
                }
            }
        }

        Err(NavigationError::RedirectLoop(normalize(path)))
    }

    fn match_routes<'a>(
        &self,
        routes: &'a [Route],
        segments: &[&str],
        consumed: &[&str],
        chain: &mut Vec<&'a Route>,
    ) -> Option<Step<'a>> {
        for route in routes {
            let own = route.segments();
            let wildcard = route.path == WILDCARD;

            let matched = if wildcard {
                true
            } else if let RouteKind::Parent = route.kind {
                segments.starts_with(&own)
            } else {
                segments == own.as_slice()
            };
            if !matched {
                continue;
            }

            for guard in &route.can_match {
                if let GuardOutcome::Redirect(to) = guard.check(&self.store, &self.public_route) {
                    return Some(Step::Denied(to));
                }
            }

            match &route.kind {
                RouteKind::View(view) => {
                    let mut full = chain.clone();
                    full.push(route);
                    return Some(Step::Matched { chain: full, view });
                }
                RouteKind::Redirect(to) => {
                    return Some(Step::Redirect(redirect_target(consumed, to)));
                }
                RouteKind::Parent => {
                    let rest = if wildcard { &[][..] } else { &segments[own.len()..] };
                    let mut here = consumed.to_vec();
                    here.extend_from_slice(&own);

                    chain.push(route);
                    if let Some(step) = self.match_routes(&route.children, rest, &here, chain) {
                        return Some(step);
                    }
                    chain.pop();
                }
            }
        }
        None
    }

    fn activate(&self, path: String, chain: &[&Route], view: &str) -> Navigation {
        for route in chain {
            for guard in &route.can_activate {
                if let GuardOutcome::Redirect(redirect_to) = guard.check(&self.store, &self.public_route) {
                    return Navigation::Denied {
                        attempted: path,
                        stage: GuardStage::CanActivate,
                        redirect_to,
                    };
                }
            }
        }
        Navigation::Granted {
            path,
            view: view.to_string(),
        }
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Drop query and fragment, collapse slashes, force a leading `/`
fn normalize(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    format!("/{}", split_path(path).join("/"))
}

fn redirect_target(consumed: &[&str], to: &str) -> String {
    if to.starts_with('/') {
        to.to_string()
    } else {
        let mut segments = consumed.to_vec();
        segments.extend(split_path(to));
        format!("/{}", segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Credential, Identity};

    fn navigator(roles: Option<&[&str]>) -> Navigator {
        let store = Arc::new(SessionStore::new());
        if let Some(roles) = roles {
            store.set_session(
                Credential::new("tok1").unwrap(),
                Identity::new("u1", "Cameron Young", roles.iter().copied()).unwrap(),
            );
        }
        Navigator::new(RouteTable::portfolio(), store, "/home")
    }

    fn granted(path: &str, view: &str) -> Navigation {
        Navigation::Granted {
            path: path.to_string(),
            view: view.to_string(),
        }
    }

    fn denied(attempted: &str, stage: GuardStage) -> Navigation {
        Navigation::Denied {
            attempted: attempted.to_string(),
            stage,
            redirect_to: "/home".to_string(),
        }
    }

    #[test]
    fn test_public_pages_for_guest() {
        let nav = navigator(None);
        assert_eq!(nav.navigate("/home").unwrap(), granted("/home", "home"));
        assert_eq!(nav.navigate("projects").unwrap(), granted("/projects", "projects"));
        assert_eq!(
            nav.navigate("/portfolio/resume?tab=2").unwrap(),
            granted("/portfolio/resume", "portfolio/resume")
        );
    }

    #[test]
    fn test_alias_redirects() {
        let nav = navigator(None);
        assert_eq!(nav.navigate("/").unwrap(), granted("/home", "home"));
        assert_eq!(nav.navigate("").unwrap(), granted("/home", "home"));
        assert_eq!(nav.navigate("/no/such/page").unwrap(), granted("/home", "home"));
    }

    #[test]
    fn test_guest_is_stopped_at_match_stage() {
        let nav = navigator(None);
        assert_eq!(nav.navigate("/admin").unwrap(), denied("/admin", GuardStage::CanMatch));
        assert_eq!(
            nav.navigate("/admin/library").unwrap(),
            denied("/admin/library", GuardStage::CanMatch)
        );
        assert_eq!(
            nav.navigate("/admin/dashboard").unwrap(),
            denied("/admin/dashboard", GuardStage::CanMatch)
        );
    }

    #[test]
    fn test_user_without_admin_role() {
        let nav = navigator(Some(&["user"]));
        assert_eq!(
            nav.navigate("/admin/dashboard").unwrap(),
            granted("/admin/dashboard", "admin/dashboard")
        );
        assert_eq!(
            nav.navigate("/admin").unwrap(),
            granted("/admin/dashboard", "admin/dashboard")
        );
        assert_eq!(
            nav.navigate("/admin/library").unwrap(),
            denied("/admin/library", GuardStage::CanActivate)
        );
    }

    #[test]
    fn test_admin_reaches_library() {
        let nav = navigator(Some(&["user", "admin"]));
        assert_eq!(
            nav.navigate("/admin/library").unwrap(),
            granted("/admin/library", "admin/library")
        );
    }

    #[test]
    fn test_unknown_admin_child_falls_through_to_wildcard() {
        let nav = navigator(Some(&["user"]));
        assert_eq!(nav.navigate("/admin/nope").unwrap(), granted("/home", "home"));
    }

    #[test]
    fn test_match_guard_runs_before_activate_guard() {
        let table = RouteTable::new(vec![Route::view("vault", "vault")
            .can_match(Guard::authenticated())
            .can_activate(Guard::role("admin"))]);
        let nav = Navigator::new(table, Arc::new(SessionStore::new()), "/home");
        assert_eq!(nav.navigate("/vault").unwrap(), denied("/vault", GuardStage::CanMatch));
    }

    #[test]
    fn test_each_navigation_sees_current_session() {
        let store = Arc::new(SessionStore::new());
        let nav = Navigator::new(RouteTable::portfolio(), Arc::clone(&store), "/home");
        assert!(matches!(nav.navigate("/admin/dashboard").unwrap(), Navigation::Denied { .. }));

        store.set_session(
            Credential::new("tok1").unwrap(),
            Identity::new("u1", "Cameron Young", ["user"]).unwrap(),
        );
        assert!(matches!(nav.navigate("/admin/dashboard").unwrap(), Navigation::Granted { .. }));

        store.clear();
        assert!(matches!(nav.navigate("/admin/dashboard").unwrap(), Navigation::Denied { .. }));
    }

    #[test]
    fn test_redirect_loop_is_reported() {
        let table = RouteTable::new(vec![Route::redirect("a", "/b"), Route::redirect("b", "/a")]);
        let nav = Navigator::new(table, Arc::new(SessionStore::new()), "/home");
        assert_eq!(
            nav.navigate("/a").unwrap_err(),
            NavigationError::RedirectLoop("/a".to_string())
        );
    }

    #[test]
    fn test_no_match_without_wildcard() {
        let table = RouteTable::new(vec![Route::view("home", "home")]);
        let nav = Navigator::new(table, Arc::new(SessionStore::new()), "/home");
        assert_eq!(
            nav.navigate("/elsewhere").unwrap_err(),
            NavigationError::NoMatch("/elsewhere".to_string())
        );
    }
}
