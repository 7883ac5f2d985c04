use std::fmt;

use shared::domain::InterviewId;

use crate::session::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    Dashboard,
    Interviews,
    NewInterview,
    InterviewDetails(InterviewId),
    Calendar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    /// Only meaningful without a session (login, registration).
    Public,
    Protected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Render,
    Redirect(Route),
}

impl Route {
    pub const HOME: Route = Route::Dashboard;

    /// Maps a view path onto a route. `None` for paths no view serves,
    /// including detail paths whose id is not a UUID.
    pub fn parse(path: &str) -> Option<Route> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            ["login"] => Some(Route::Login),
            ["register"] => Some(Route::Register),
            ["dashboard"] => Some(Route::Dashboard),
            ["interviews"] => Some(Route::Interviews),
            ["interviews", "new"] => Some(Route::NewInterview),
            ["interviews", id] => id.parse().ok().map(Route::InterviewDetails),
            ["calendar"] => Some(Route::Calendar),
            _ => None,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Register => "/register".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::Interviews => "/interviews".to_string(),
            Route::NewInterview => "/interviews/new".to_string(),
            Route::InterviewDetails(id) => format!("/interviews/{id}"),
            Route::Calendar => "/calendar".to_string(),
        }
    }

    pub fn access(&self) -> RouteAccess {
        match self {
            Route::Login | Route::Register => RouteAccess::Public,
            _ => RouteAccess::Protected,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

pub fn guard(route: Route, is_authenticated: bool) -> GuardDecision {
    match (route.access(), is_authenticated) {
        (RouteAccess::Protected, false) => GuardDecision::Redirect(Route::Login),
        (RouteAccess::Public, true) => GuardDecision::Redirect(Route::HOME),
        _ => GuardDecision::Render,
    }
}

/// Result of resolving a requested path against the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub requested: String,
    pub rendered: Route,
    pub redirected: bool,
}

/// Root and unknown paths land on the dashboard before the guard runs.
pub fn resolve(path: &str, is_authenticated: bool) -> Navigation {
    let (target, mut redirected) = match Route::parse(path) {
        Some(route) => (route, false),
        None => (Route::HOME, true),
    };
    let rendered = match guard(target, is_authenticated) {
        GuardDecision::Render => target,
        GuardDecision::Redirect(next) => {
            redirected = true;
            // A single hop always lands on a renderable route.
            next
        }
    };
    Navigation {
        requested: path.to_string(),
        rendered,
        redirected,
    }
}

pub async fn navigate(session: &SessionStore, path: &str) -> Navigation {
    resolve(path, session.is_authenticated().await)
}
