use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use gossip_client::ClientError;
use gossip_types::api::{SignInInput, SignUpInput};

use crate::WebState;
use crate::pages::HOME_PATH;
use crate::session::{SESSION_ID_COOKIE, redirect, session_cookie};

#[derive(Debug, Deserialize)]
pub struct CredentialsForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl CredentialsForm {
    fn validate(&self) -> Result<(), AuthFormError> {
        if self.username.trim().is_empty() || self.password.is_empty() {
            return Err(AuthFormError::MissingField);
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum AuthFormError {
    #[error("username and password are required")]
    MissingField,

    #[error("{0}")]
    Rejected(String),

    #[error("session backend unavailable: {0}")]
    Backend(ClientError),
}

impl From<ClientError> for AuthFormError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Api { message, .. } => Self::Rejected(message),
            other => Self::Backend(other),
        }
    }
}

impl IntoResponse for AuthFormError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::MissingField => StatusCode::BAD_REQUEST,
            Self::Rejected(_) => StatusCode::UNAUTHORIZED,
            Self::Backend(_) => StatusCode::BAD_GATEWAY,
        };

        (status, self.to_string()).into_response()
    }
}

pub async fn signin(
    State(state): State<WebState>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> Result<(CookieJar, Response), AuthFormError> {
    form.validate()?;

    let grant = state
        .api
        .create_session(&SignInInput {
            username: form.username.clone(),
            password: form.password,
        })
        .await
        .inspect_err(|e| warn!(username = %form.username, "sign-in failed: {}", e))?;

    info!(username = %form.username, "signed in");
    let jar = jar.add(session_cookie(grant.session_id, state.secure_cookies));
    Ok((jar, redirect(HOME_PATH)))
}

pub async fn signup(
    State(state): State<WebState>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> Result<(CookieJar, Response), AuthFormError> {
    form.validate()?;

    let grant = state
        .api
        .register_session(&SignUpInput {
            username: form.username.clone(),
            email: None,
            password: form.password,
        })
        .await
        .inspect_err(|e| warn!(username = %form.username, "sign-up failed: {}", e))?;

    info!(username = %form.username, "signed up");
    let jar = jar.add(session_cookie(grant.session_id, state.secure_cookies));
    Ok((jar, redirect(HOME_PATH)))
}

/// Drop the session cookie. A backend failure still signs the browser out.
pub async fn signout(State(state): State<WebState>, jar: CookieJar) -> (CookieJar, Response) {
    if let Some(cookie) = jar.get(SESSION_ID_COOKIE) {
        if let Err(e) = state.api.with_session(cookie.value()).sign_out().await {
            warn!("backend sign-out failed: {}", e);
        }
    }

    let jar = jar.remove(Cookie::build(SESSION_ID_COOKIE).path("/"));
    (jar, redirect(state.policy.signin_path()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_are_rejected() {
        let form = CredentialsForm {
            username: "  ".into(),
            password: "pw".into(),
        };
        assert!(matches!(form.validate(), Err(AuthFormError::MissingField)));
    }

    #[test]
    fn backend_rejection_maps_to_unauthorized() {
        let err: AuthFormError = ClientError::Api {
            status: StatusCode::UNAUTHORIZED,
            message: "bad credentials".into(),
        }
        .into();
        assert_eq!(err.to_string(), "bad credentials");
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn missing_data_maps_to_bad_gateway() {
        let err: AuthFormError = ClientError::MissingData.into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
