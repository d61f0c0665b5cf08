//! Client side of the gossip forum: REST wrapper, query cache, mutation
//! policy and the room chat transport.

pub mod auth;
pub mod cache;
pub mod chat;
pub mod comments;
pub mod error;
pub mod forum;
pub mod http;
pub mod keys;
pub mod posts;
pub mod users;

pub use cache::{CacheEvent, QueryCache, QueryKey};
pub use chat::{ChatConfig, ChatError, ChatRoom, ConnectionState, ReconnectPolicy};
pub use error::ClientError;
pub use forum::Forum;
pub use http::{ApiClient, ApiRequest, Attempt};
