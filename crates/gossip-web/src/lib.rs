//! Server-rendered side of gossip: session resolution for protected routes
//! and the sign-in / sign-up / sign-out form actions.

pub mod auth;
pub mod pages;
pub mod session;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use gossip_client::ApiClient;

use crate::session::SessionPolicy;

pub type WebState = Arc<WebStateInner>;

pub struct WebStateInner {
    /// Client for the session backend (`auth/*`).
    pub api: ApiClient,
    pub policy: SessionPolicy,
    /// Mark the session cookie `Secure`. Off in development.
    pub secure_cookies: bool,
}

/// All routes, wrapped in the session middleware.
pub fn app(state: WebState) -> Router {
    Router::new()
        .route("/signin", post(auth::signin))
        .route("/signup", post(auth::signup))
        .route("/signout", post(auth::signout))
        .route(pages::HOME_PATH, get(pages::home))
        .route("/rooms/{room_id}", get(pages::room))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session::resolve_session,
        ))
        .with_state(state)
}
