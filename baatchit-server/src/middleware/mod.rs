//! HTTP middleware stack: CORS and per-request trace spans.

pub mod cors;
pub mod trace;
