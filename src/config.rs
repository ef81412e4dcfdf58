use std::path::PathBuf;
use std::time::Duration;

use crate::api::DEFAULT_API_URL;
use crate::auth::oidc::{DEFAULT_SCOPES, OidcConfig};

pub const DEFAULT_AUTH_API_URL: &str = "http://localhost:8080/api/auth";
pub const DEFAULT_SESSION_FILE: &str = ".portfolio-session.json";

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub auth_api_url: String,
    pub oidc: Option<OidcSettings>,
    pub reorder_debounce: Duration,
    pub session_file: PathBuf,
}

/// Identity provider registration, present only when `OIDC_ISSUER` and
/// `OIDC_CLIENT_ID` are both set.
#[derive(Debug, Clone)]
pub struct OidcSettings {
    pub issuer: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub post_logout_redirect_uri: Option<String>,
    pub scopes: String,
}

impl OidcSettings {
    /// Keycloak-style endpoints under the issuer.
    pub fn endpoints(&self) -> OidcConfig {
        let config = OidcConfig::keycloak(&self.issuer, &self.client_id, &self.redirect_uri)
            .with_scopes(self.scopes.clone());
        match &self.post_logout_redirect_uri {
            Some(uri) => config.with_post_logout_redirect(uri.clone()),
            None => config,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            auth_api_url: DEFAULT_AUTH_API_URL.to_string(),
            oidc: None,
            reorder_debounce: Duration::from_millis(2500), // 2.5 seconds
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let oidc = match (optional("OIDC_ISSUER"), optional("OIDC_CLIENT_ID")) {
            (Some(issuer), Some(client_id)) => Some(OidcSettings {
                issuer,
                client_id,
                redirect_uri: string_or("OIDC_REDIRECT_URI", "http://localhost:5173/auth/callback"),
                post_logout_redirect_uri: optional("OIDC_POST_LOGOUT_REDIRECT_URI"),
                scopes: string_or("OIDC_SCOPES", DEFAULT_SCOPES),
            }),
            _ => None,
        };

        Self {
            api_url: string_or("API_URL", DEFAULT_API_URL),
            auth_api_url: string_or("AUTH_API_URL", DEFAULT_AUTH_API_URL),
            oidc,
            reorder_debounce: parse_duration_ms("REORDER_DEBOUNCE_MS", 2500),
            session_file: PathBuf::from(string_or("SESSION_FILE", DEFAULT_SESSION_FILE)),
        }
    }
}

pub(crate) fn optional(env_var: &str) -> Option<String> {
    std::env::var(env_var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn string_or(env_var: &str, default: &str) -> String {
    optional(env_var).unwrap_or_else(|| default.to_string())
}

pub(crate) fn parse_duration_ms(env_var: &str, default: u64) -> Duration {
    optional(env_var)
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or_else(|| Duration::from_millis(default))
}

/// `true`/`1`/`yes` (any case) are true, anything else is false.
pub(crate) fn parse_flag(env_var: &str) -> bool {
    optional(env_var)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}
