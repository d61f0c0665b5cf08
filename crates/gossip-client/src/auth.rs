use gossip_types::api::{MeResponse, SessionGrant, SignInInput, SignUpInput};
use gossip_types::models::{SessionUser, User};

use crate::error::ClientError;
use crate::http::{ApiClient, ApiRequest};

impl ApiClient {
    // -- Cookie-based auth (forum backend) --

    pub async fn sign_in(&self, input: &SignInInput) -> Result<User, ClientError> {
        self.request(ApiRequest::post("auth/signin", input)?).await
    }

    pub async fn sign_up(&self, input: &SignUpInput) -> Result<User, ClientError> {
        self.request(ApiRequest::post("auth/signup", input)?).await
    }

    pub async fn sign_out(&self) -> Result<(), ClientError> {
        self.request_unit(ApiRequest::get("auth/signout")).await
    }

    pub async fn refresh(&self) -> Result<(), ClientError> {
        self.refresh_session().await
    }

    // -- Session-id auth (chat backend) --

    /// Sign in and receive a session id to carry in a cookie or header.
    pub async fn create_session(&self, input: &SignInInput) -> Result<SessionGrant, ClientError> {
        self.request(ApiRequest::post("auth/signin", input)?).await
    }

    /// Register and receive a session id for the new account.
    pub async fn register_session(&self, input: &SignUpInput) -> Result<SessionGrant, ClientError> {
        self.request(ApiRequest::post("auth/signup", input)?).await
    }

    /// Resolve the user owning `session_id`.
    pub async fn current_user(&self, session_id: &str) -> Result<SessionUser, ClientError> {
        let res: MeResponse = self
            .with_session(session_id)
            .request(ApiRequest::get("auth/me"))
            .await?;
        Ok(res.user)
    }
}
