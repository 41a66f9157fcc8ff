//! Application services behind the HTTP handlers.

pub mod relay;
