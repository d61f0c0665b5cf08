use serde::Serialize;
use tracing::warn;

use gossip_types::api::{
    CreateCommentInput, CreatePostInput, SignInInput, SignUpInput, UpdateCommentInput,
    UpdateCommentScoreInput, UpdateMeInput, UpdatePostInput, UpdatePostScoreInput,
};
use gossip_types::models::{Comment, Post, User};

use crate::cache::{QueryCache, QueryKey};
use crate::error::ClientError;
use crate::http::ApiClient;
use crate::keys;

/// Forum resources behind a shared query cache.
///
/// Queries serve fresh cache entries without touching the network. Each
/// mutation, once the server accepts it, updates or invalidates exactly the
/// keys whose contents it changed.
#[derive(Clone)]
pub struct Forum {
    api: ApiClient,
    cache: QueryCache,
}

impl Forum {
    pub fn new(api: ApiClient) -> Self {
        Self::with_cache(api, QueryCache::new())
    }

    pub fn with_cache(api: ApiClient, cache: QueryCache) -> Self {
        Self { api, cache }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    fn remember<T: Serialize>(&self, key: QueryKey, value: &T) {
        if let Err(e) = self.cache.set(key.clone(), value) {
            warn!(%key, "could not cache mutation result: {}", e);
        }
    }

    // -- Queries --

    pub async fn posts(&self) -> Result<Vec<Post>, ClientError> {
        self.cache.fetch(keys::posts(), || self.api.get_posts()).await
    }

    pub async fn post(&self, id: &str) -> Result<Post, ClientError> {
        self.cache.fetch(keys::post(id), || self.api.get_post(id)).await
    }

    pub async fn comment(&self, id: &str) -> Result<Comment, ClientError> {
        self.cache.fetch(keys::comment(id), || self.api.get_comment(id)).await
    }

    pub async fn me(&self) -> Result<User, ClientError> {
        self.cache.fetch(keys::me(), || self.api.get_me()).await
    }

    pub async fn user(&self, id: &str) -> Result<User, ClientError> {
        self.cache.fetch(keys::user(id), || self.api.get_user(id)).await
    }

    // -- Auth mutations --

    pub async fn sign_in(&self, input: &SignInInput) -> Result<User, ClientError> {
        let user = self.api.sign_in(input).await?;
        self.remember(keys::me(), &user);
        Ok(user)
    }

    pub async fn sign_up(&self, input: &SignUpInput) -> Result<User, ClientError> {
        self.api.sign_up(input).await
    }

    /// The local session is forgotten even when the server call fails.
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        let res = self.api.sign_out().await;
        self.cache.reset(&keys::me());
        res
    }

    // -- User mutations --

    pub async fn update_me(&self, input: &UpdateMeInput) -> Result<User, ClientError> {
        let user = self.api.update_me(input).await?;
        self.remember(keys::me(), &user);
        Ok(user)
    }

    pub async fn delete_me(&self) -> Result<User, ClientError> {
        let user = self.api.delete_me().await?;
        self.cache.reset(&keys::me());
        Ok(user)
    }

    // -- Post mutations --

    pub async fn create_post(&self, input: &CreatePostInput) -> Result<Post, ClientError> {
        let post = self.api.create_post(input).await?;
        self.cache.invalidate(&keys::posts());
        self.remember(keys::post(&post.id), &post);
        Ok(post)
    }

    pub async fn update_post(&self, id: &str, input: &UpdatePostInput) -> Result<Post, ClientError> {
        let post = self.api.update_post(id, input).await?;
        self.cache.invalidate(&keys::posts());
        self.cache.invalidate(&keys::post(id));
        Ok(post)
    }

    pub async fn update_post_score(
        &self,
        id: &str,
        input: &UpdatePostScoreInput,
    ) -> Result<Post, ClientError> {
        let post = self.api.update_post_score(id, input).await?;
        self.cache.invalidate(&keys::posts());
        self.remember(keys::post(id), &post);
        Ok(post)
    }

    pub async fn delete_post(&self, id: &str) -> Result<Post, ClientError> {
        let post = self.api.delete_post(id).await?;
        self.cache.invalidate(&keys::posts());
        self.cache.reset(&keys::post(id));
        Ok(post)
    }

    // -- Comment mutations --

    pub async fn create_comment(&self, input: &CreateCommentInput) -> Result<Comment, ClientError> {
        let comment = self.api.create_comment(input).await?;
        self.cache.invalidate(&keys::posts());
        self.cache.invalidate(&keys::post(&comment.post_id));
        Ok(comment)
    }

    pub async fn update_comment(
        &self,
        id: &str,
        input: &UpdateCommentInput,
    ) -> Result<Comment, ClientError> {
        let comment = self.api.update_comment(id, input).await?;
        self.invalidate_comment(&comment, id);
        Ok(comment)
    }

    pub async fn update_comment_score(
        &self,
        id: &str,
        input: &UpdateCommentScoreInput,
    ) -> Result<Comment, ClientError> {
        let comment = self.api.update_comment_score(id, input).await?;
        self.invalidate_comment(&comment, id);
        Ok(comment)
    }

    pub async fn delete_comment(&self, id: &str) -> Result<Comment, ClientError> {
        let comment = self.api.delete_comment(id).await?;
        self.cache.invalidate(&keys::posts());
        self.cache.invalidate(&keys::post(&comment.post_id));
        self.cache.reset(&keys::comment(id));
        Ok(comment)
    }

    fn invalidate_comment(&self, comment: &Comment, id: &str) {
        self.cache.invalidate(&keys::posts());
        self.cache.invalidate(&keys::post(&comment.post_id));
        self.cache.invalidate(&keys::comment(id));
    }
}
