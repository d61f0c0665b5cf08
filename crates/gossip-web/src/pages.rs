use axum::{Extension, Json, extract::Path};
use serde::Serialize;

use gossip_client::chat::connect_path;
use gossip_types::models::SessionUser;

pub const HOME_PATH: &str = "/home";

pub async fn home(Extension(user): Extension<SessionUser>) -> Json<SessionUser> {
    Json(user)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub room_id: String,
    pub user_id: String,
    pub username: String,
    /// Path the browser opens its room socket on.
    pub connect_path: String,
}

pub async fn room(
    Path(room_id): Path<String>,
    Extension(user): Extension<SessionUser>,
) -> Json<RoomView> {
    let connect_path = connect_path(&room_id, &user.username);
    Json(RoomView {
        room_id,
        user_id: user.user_id,
        username: user.username,
        connect_path,
    })
}
