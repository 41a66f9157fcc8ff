//! Request / response types for the `/api` routes consumed by the chat UI.

pub mod history;
pub mod messages;
