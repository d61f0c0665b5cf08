use gossip_types::api::{CreateCommentInput, UpdateCommentInput, UpdateCommentScoreInput};
use gossip_types::models::Comment;

use crate::error::ClientError;
use crate::http::{ApiClient, ApiRequest};

impl ApiClient {
    pub async fn get_comment(&self, id: &str) -> Result<Comment, ClientError> {
        self.request(ApiRequest::get(format!("comments/get-comment/{}", id)))
            .await
    }

    pub async fn create_comment(&self, input: &CreateCommentInput) -> Result<Comment, ClientError> {
        self.request(ApiRequest::post("comments/create-comment/", input)?)
            .await
    }

    pub async fn update_comment(
        &self,
        id: &str,
        input: &UpdateCommentInput,
    ) -> Result<Comment, ClientError> {
        self.request(ApiRequest::put(format!("comments/update-comment/{}", id), input)?)
            .await
    }

    pub async fn update_comment_score(
        &self,
        id: &str,
        input: &UpdateCommentScoreInput,
    ) -> Result<Comment, ClientError> {
        self.request(ApiRequest::put(format!("comments/update-commentscore/{}", id), input)?)
            .await
    }

    pub async fn delete_comment(&self, id: &str) -> Result<Comment, ClientError> {
        self.request(ApiRequest::delete(format!("comments/delete-comment/{}", id)))
            .await
    }
}
