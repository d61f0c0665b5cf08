use reqwest::{Client, Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use gossip_types::api::Envelope;

use crate::error::ClientError;

/// Header carrying the session id when cookies are not available.
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// Server message that marks an expired access token.
const EXPIRED_TOKEN_MARKER: &str = "Invalid access token";

const REFRESH_PATH: &str = "auth/refresh";

/// Which send of a request this is. A `Replay` is never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    First,
    Replay,
}

/// A request relative to the client's base URL. Immutable once built so it
/// can be replayed verbatim.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn post(path: impl Into<String>, body: &impl Serialize) -> Result<Self, ClientError> {
        Self::new(Method::POST, path).with_json(body)
    }

    pub fn put(path: impl Into<String>, body: &impl Serialize) -> Result<Self, ClientError> {
        Self::new(Method::PUT, path).with_json(body)
    }

    pub fn with_json(mut self, body: &impl Serialize) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }
}

/// Configured REST client: base URL, cookie store, optional session header.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
    session_id: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = Client::builder().cookie_store(true).build()?;
        Self::with_http(http, base_url)
    }

    /// Client with no cookie store, for servers acting on behalf of many
    /// users. Identity travels only in the session header.
    pub fn without_cookies(base_url: &str) -> Result<Self, ClientError> {
        Self::with_http(Client::new(), base_url)
    }

    pub fn with_http(http: Client, base_url: &str) -> Result<Self, ClientError> {
        // Url::join drops the last segment unless the base ends in '/'
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base = Url::parse(&normalized)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        Ok(Self {
            http,
            base,
            session_id: None,
        })
    }

    /// Copy of this client that sends `x-session-id` on every request.
    pub fn with_session(&self, session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            ..self.clone()
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Send a request and unwrap the envelope's `data`.
    ///
    /// An expired access token triggers one refresh followed by one replay of
    /// the same request. The replay's outcome is final.
    pub async fn request<T: DeserializeOwned>(&self, req: ApiRequest) -> Result<T, ClientError> {
        self.execute(&req).await?.ok_or(ClientError::MissingData)
    }

    /// Like [`request`](Self::request) for endpoints whose `data` is irrelevant.
    pub async fn request_unit(&self, req: ApiRequest) -> Result<(), ClientError> {
        self.execute::<Value>(&req).await.map(|_| ())
    }

    async fn execute<T: DeserializeOwned>(&self, req: &ApiRequest) -> Result<Option<T>, ClientError> {
        let mut attempt = Attempt::First;
        loop {
            match self.send_once(req, attempt).await {
                Err(err) if should_refresh(attempt, &err) => {
                    debug!(path = %req.path, "access token expired, refreshing");
                    if let Err(e) = self.refresh_session().await {
                        warn!(path = %req.path, "token refresh failed: {}", e);
                    }
                    attempt = Attempt::Replay;
                }
                result => return result,
            }
        }
    }

    /// Ask the server to rotate the access token. Never itself refreshed.
    pub(crate) async fn refresh_session(&self) -> Result<(), ClientError> {
        self.send_once::<Value>(&ApiRequest::get(REFRESH_PATH), Attempt::Replay)
            .await
            .map(|_| ())
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        req: &ApiRequest,
        attempt: Attempt,
    ) -> Result<Option<T>, ClientError> {
        let url = self
            .base
            .join(req.path.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", req.path, e)))?;

        debug!(method = %req.method, %url, ?attempt, "request");

        let mut builder = self.http.request(req.method.clone(), url);
        if let Some(session_id) = &self.session_id {
            builder = builder.header(SESSION_ID_HEADER, session_id);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        let res = builder.send().await.map_err(|e| {
            error!(method = %req.method, path = %req.path, "request error: {}", e);
            ClientError::Transport(e)
        })?;

        let status = res.status();
        let text = res.text().await.map_err(|e| {
            error!(path = %req.path, "failed reading response body: {}", e);
            ClientError::Transport(e)
        })?;

        decode_envelope(status, &text).inspect_err(|e| {
            warn!(method = %req.method, path = %req.path, "{}", e);
        })
    }
}

fn should_refresh(attempt: Attempt, err: &ClientError) -> bool {
    attempt == Attempt::First
        && err
            .server_message()
            .is_some_and(|m| m.contains(EXPIRED_TOKEN_MARKER))
}

/// Turn a raw response into the envelope's data.
fn decode_envelope<T: DeserializeOwned>(status: StatusCode, text: &str) -> Result<Option<T>, ClientError> {
    let envelope: Envelope<Value> = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(_) if !status.is_success() => {
            return Err(ClientError::Api {
                status,
                message: fallback_message(status),
            });
        }
        Err(e) => return Err(ClientError::Decode(e)),
    };

    if envelope.error || !status.is_success() {
        let message = if envelope.message.is_empty() {
            fallback_message(status)
        } else {
            envelope.message
        };
        return Err(ClientError::Api { status, message });
    }

    Ok(envelope.data.map(serde_json::from_value).transpose()?)
}

fn fallback_message(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}
