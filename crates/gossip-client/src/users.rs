use gossip_types::api::UpdateMeInput;
use gossip_types::models::User;

use crate::error::ClientError;
use crate::http::{ApiClient, ApiRequest};

impl ApiClient {
    pub async fn get_user(&self, id: &str) -> Result<User, ClientError> {
        self.request(ApiRequest::get(format!("users/get-user/{}", id))).await
    }

    pub async fn get_me(&self) -> Result<User, ClientError> {
        self.request(ApiRequest::get("users/get-me")).await
    }

    pub async fn update_me(&self, input: &UpdateMeInput) -> Result<User, ClientError> {
        self.request(ApiRequest::put("users/update-me", input)?).await
    }

    pub async fn delete_me(&self) -> Result<User, ClientError> {
        self.request(ApiRequest::delete("users/delete-me")).await
    }
}
