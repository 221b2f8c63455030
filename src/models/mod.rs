pub mod analyst;
pub mod chat;
pub mod query;
pub mod websocket;
