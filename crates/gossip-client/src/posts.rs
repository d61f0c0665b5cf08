use gossip_types::api::{CreatePostInput, UpdatePostInput, UpdatePostScoreInput};
use gossip_types::models::Post;

use crate::error::ClientError;
use crate::http::{ApiClient, ApiRequest};

impl ApiClient {
    pub async fn get_posts(&self) -> Result<Vec<Post>, ClientError> {
        self.request(ApiRequest::get("posts/get-posts")).await
    }

    pub async fn get_post(&self, id: &str) -> Result<Post, ClientError> {
        self.request(ApiRequest::get(format!("posts/get-post/{}", id))).await
    }

    pub async fn create_post(&self, input: &CreatePostInput) -> Result<Post, ClientError> {
        self.request(ApiRequest::post("posts/create-post/", input)?).await
    }

    pub async fn update_post(&self, id: &str, input: &UpdatePostInput) -> Result<Post, ClientError> {
        self.request(ApiRequest::put(format!("posts/update-post/{}", id), input)?)
            .await
    }

    pub async fn update_post_score(
        &self,
        id: &str,
        input: &UpdatePostScoreInput,
    ) -> Result<Post, ClientError> {
        self.request(ApiRequest::put(format!("posts/update-postscore/{}", id), input)?)
            .await
    }

    pub async fn delete_post(&self, id: &str) -> Result<Post, ClientError> {
        self.request(ApiRequest::delete(format!("posts/delete-post/{}", id)))
            .await
    }
}
