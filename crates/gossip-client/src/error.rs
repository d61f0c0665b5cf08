use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("server rejected request ({status}): {message}")]
    Api { status: StatusCode, message: String },

    #[error("response carried no data")]
    MissingData,

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// The remote call never produced a usable answer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Message reported by the server, if it reported one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Api { message, .. } => Some(message),
            _ => None,
        }
    }
}
