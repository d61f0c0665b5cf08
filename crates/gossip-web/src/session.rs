use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::{debug, warn};

use crate::WebState;

pub const SESSION_ID_COOKIE: &str = "SESSION_ID";

/// One week, in line with the backend's session expiry.
pub const COOKIE_MAX_AGE: time::Duration = time::Duration::weeks(1);

/// Which paths require a resolved session, and where to send visitors
/// that have none.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    protected: Vec<String>,
    signin_path: String,
}

impl SessionPolicy {
    pub fn new(signin_path: impl Into<String>) -> Self {
        Self {
            protected: Vec::new(),
            signin_path: signin_path.into(),
        }
    }

    /// Guard `prefix` and everything below it. `"/"` guards the whole site
    /// except the sign-in path.
    pub fn protect(mut self, prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        self.protected.push(prefix.trim_end_matches('/').to_string());
        self
    }

    pub fn signin_path(&self) -> &str {
        &self.signin_path
    }

    pub fn is_protected(&self, path: &str) -> bool {
        if path.trim_end_matches('/') == self.signin_path.trim_end_matches('/') {
            return false;
        }
        self.protected.iter().any(|prefix| {
            path.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }
}

/// Session cookie carrying `session_id`.
pub fn session_cookie(session_id: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_ID_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .max_age(COOKIE_MAX_AGE)
        .build()
}

pub fn redirect(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Resolve the session of requests to protected paths.
///
/// No cookie, or a cookie the backend does not recognise, redirects to the
/// sign-in page before the handler runs. Otherwise the [`SessionUser`]
/// is attached to the request extensions. Nothing is cached between
/// requests.
///
/// [`SessionUser`]: gossip_types::models::SessionUser
pub async fn resolve_session(
    State(state): State<WebState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    if !state.policy.is_protected(&path) {
        return next.run(req).await;
    }

    let session_id = jar
        .get(SESSION_ID_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());

    let Some(session_id) = session_id else {
        debug!(%path, "no session cookie, redirecting to sign-in");
        return redirect(state.policy.signin_path());
    };

    match state.api.current_user(&session_id).await {
        Ok(user) => {
            debug!(%path, username = %user.username, "session resolved");
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(e) => {
            warn!(%path, "session resolution failed: {}", e);
            redirect(state.policy.signin_path())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_match_on_segment_boundaries() {
        let policy = SessionPolicy::new("/signin").protect("/home").protect("/rooms/");
        assert!(policy.is_protected("/home"));
        assert!(policy.is_protected("/home/settings"));
        assert!(policy.is_protected("/rooms/R1"));
        assert!(!policy.is_protected("/homework"));
        assert!(!policy.is_protected("/signin"));
        assert!(!policy.is_protected("/"));
    }

    #[test]
    fn root_guard_never_covers_signin() {
        let policy = SessionPolicy::new("/signin").protect("/");
        assert!(policy.is_protected("/"));
        assert!(policy.is_protected("/home"));
        assert!(policy.is_protected("/rooms/R1"));
        assert!(!policy.is_protected("/signin"));
        assert!(!policy.is_protected("/signin/"));
    }

    #[test]
    fn session_cookie_is_locked_down() {
        let cookie = session_cookie("abc".into(), true).to_string();
        assert!(cookie.starts_with("SESSION_ID=abc"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=604800"));
    }

    #[test]
    fn development_cookie_is_not_secure() {
        let cookie = session_cookie("abc".into(), false).to_string();
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn redirect_is_found_with_location() {
        let res = redirect("/signin");
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers()[header::LOCATION], "/signin");
    }
}
