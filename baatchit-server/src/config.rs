//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

use crate::entities::MergePolicy;

pub const DEFAULT_FALLBACK_REPLY: &str = "Agent is offline right now. Please try again shortly.";

/// Runtime configuration for baatchit-server.
///
/// Every field has a default so the server starts without any environment
/// variables set; only the agent URL and key normally need overriding.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:5000"`). A bare `PORT`
    /// variable replaces the port part.
    pub bind_address: String,

    /// SQLite database URL (default: `"sqlite://baatchit.db"`).
    pub database_url: String,

    /// Endpoint the relay POSTs conversation turns to.
    pub agent_url: String,

    /// Sent as `x-api-key`; omitted when unset.
    pub agent_api_key: Option<String>,

    /// Upper bound for one agent call, including cold starts.
    pub agent_timeout: Duration,

    /// Fixed per-deployment metadata forwarded with every agent request.
    pub agent_channel: String,
    pub agent_language: String,
    pub agent_locale: String,

    /// Text appended as the agent's reply when the agent call fails.
    pub fallback_reply: String,

    /// How returned intelligence snapshots combine with the stored one.
    pub intel_merge: MergePolicy,

    /// Comma-separated allowed CORS origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Serve Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build [`Config`] from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());
        let flag = |key: &str, default: bool| {
            lookup(key)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(default)
        };

        let mut bind_address = env_or("BAATCHIT_BIND", "0.0.0.0:5000");
        if let Some(port) = lookup("PORT").and_then(|p| p.parse::<u16>().ok()) {
            let host = bind_address
                .rsplit_once(':')
                .map(|(host, _)| host.to_owned())
                .unwrap_or_else(|| "0.0.0.0".to_owned());
            bind_address = format!("{host}:{port}");
        }

        Self {
            bind_address,
            database_url: env_or("BAATCHIT_DATABASE_URL", "sqlite://baatchit.db"),
            agent_url: env_or("BAATCHIT_AGENT_URL", "http://127.0.0.1:8000/api/honeypot"),
            agent_api_key: lookup("BAATCHIT_AGENT_API_KEY").filter(|k| !k.is_empty()),
            agent_timeout: Duration::from_secs(parse_or(
                lookup("BAATCHIT_AGENT_TIMEOUT_SECS"),
                30,
            )),
            agent_channel: env_or("BAATCHIT_AGENT_CHANNEL", "SMS"),
            agent_language: env_or("BAATCHIT_AGENT_LANGUAGE", "English"),
            agent_locale: env_or("BAATCHIT_AGENT_LOCALE", "IN"),
            fallback_reply: env_or("BAATCHIT_FALLBACK_REPLY", DEFAULT_FALLBACK_REPLY),
            intel_merge: parse_or(lookup("BAATCHIT_INTEL_MERGE"), MergePolicy::Replace),
            cors_allowed_origins: lookup("BAATCHIT_CORS_ORIGINS"),
            log_level: env_or("BAATCHIT_LOG", "info"),
            log_json: flag("BAATCHIT_LOG_JSON", false),
            enable_swagger: flag("BAATCHIT_ENABLE_SWAGGER", true),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.parse().ok()).unwrap_or(default)
}
