//! Query keys used by the forum client. Mutations invalidate by these.

use crate::cache::QueryKey;

pub fn posts() -> QueryKey {
    QueryKey::new(["get-posts"])
}

pub fn post(id: &str) -> QueryKey {
    QueryKey::new(["get-post", id])
}

pub fn comment(id: &str) -> QueryKey {
    QueryKey::new(["get-comment", id])
}

pub fn me() -> QueryKey {
    QueryKey::new(["get-me"])
}

pub fn user(id: &str) -> QueryKey {
    QueryKey::new(["get-user", id])
}
