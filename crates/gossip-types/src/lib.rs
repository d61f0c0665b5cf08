//! Wire types shared by the gossip client, web layer and REPL.

pub mod api;
pub mod events;
pub mod models;
