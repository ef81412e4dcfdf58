use reqwest::Url;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::AuthError;
use super::jwt::{self, UserProfile};
use super::pkce::{self, CHALLENGE_METHOD, Pkce};
use super::session::{Credentials, Session};
use super::storage::keys;

pub const DEFAULT_SCOPES: &str = "openid email profile";

/// Endpoints and client registration for an OIDC identity provider.
#[derive(Debug, Clone)]
pub struct OidcConfig {
    pub authorize_url: String,
    pub token_url: String,
    pub end_session_url: Option<String>,
    pub client_id: String,
    pub redirect_uri: String,
    pub post_logout_redirect_uri: Option<String>,
    pub scopes: String,
}

impl OidcConfig {
    /// Keycloak realm, e.g. `http://localhost:8080/realms/portfolio`.
    pub fn keycloak(issuer: &str, client_id: &str, redirect_uri: &str) -> Self {
        let base = issuer.trim_end_matches('/');
        Self {
            authorize_url: format!("{base}/protocol/openid-connect/auth"),
            token_url: format!("{base}/protocol/openid-connect/token"),
            end_session_url: Some(format!("{base}/protocol/openid-connect/logout")),
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            post_logout_redirect_uri: None,
            scopes: DEFAULT_SCOPES.to_string(),
        }
    }

    /// Authentik instance at `base` with the application registered as `slug`.
    pub fn authentik(base: &str, slug: &str, client_id: &str, redirect_uri: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authorize_url: format!("{base}/application/o/authorize/"),
            token_url: format!("{base}/application/o/token/"),
            end_session_url: Some(format!("{base}/application/o/{slug}/end-session/")),
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            post_logout_redirect_uri: None,
            scopes: DEFAULT_SCOPES.to_string(),
        }
    }

    /// Build the config from the provider's discovery document.
    pub async fn discover(
        http: &reqwest::Client,
        issuer: &str,
        client_id: &str,
        redirect_uri: &str,
    ) -> Result<Self, AuthError> {
        let url = format!(
            "{}/.well-known/openid-configuration",
            issuer.trim_end_matches('/')
        );
        debug!("Fetching OIDC discovery document from {url}");

        let response = http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Provider(format!(
                "discovery failed: HTTP {status}"
            )));
        }

        let metadata: ProviderMetadata = response.json().await?;
        Ok(Self {
            authorize_url: metadata.authorization_endpoint,
            token_url: metadata.token_endpoint,
            end_session_url: metadata.end_session_endpoint,
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.to_string(),
            post_logout_redirect_uri: None,
            scopes: DEFAULT_SCOPES.to_string(),
        })
    }

    pub fn with_post_logout_redirect(mut self, uri: impl Into<String>) -> Self {
        self.post_logout_redirect_uri = Some(uri.into());
        self
    }

    pub fn with_scopes(mut self, scopes: impl Into<String>) -> Self {
        self.scopes = scopes.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct ProviderMetadata {
    authorization_endpoint: String,
    token_endpoint: String,
    end_session_endpoint: Option<String>,
}

/// Where to send the user to start a login.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub state: String,
}

/// Query parameters the provider appends to the redirect URI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Extract the callback parameters from the full redirect URL.
    pub fn from_url(url: &str) -> Result<Self, AuthError> {
        let url = Url::parse(url).map_err(|e| AuthError::InvalidCallback(e.to_string()))?;
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            let value = Some(value.into_owned());
            match key.as_ref() {
                "code" => params.code = value,
                "state" => params.state = value,
                "error" => params.error = value,
                "error_description" => params.error_description = value,
                _ => {}
            }
        }
        Ok(params)
    }
}

/// Shorthand for [`CallbackParams::from_url`].
pub fn parse_callback_url(url: &str) -> Result<CallbackParams, AuthError> {
    CallbackParams::from_url(url)
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

/// Authorization-code + PKCE login against an OIDC provider.
pub struct OidcClient {
    config: OidcConfig,
    http: reqwest::Client,
    session: Arc<Session>,
}

impl OidcClient {
    pub fn new(config: OidcConfig, session: Arc<Session>) -> Self {
        Self::with_http(config, session, reqwest::Client::new())
    }

    pub fn with_http(config: OidcConfig, session: Arc<Session>, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            session,
        }
    }

    pub fn config(&self) -> &OidcConfig {
        &self.config
    }

    /// Start a login: persist a fresh verifier and state, return the provider URL.
    pub fn begin_login(&self) -> Result<AuthorizationRequest, AuthError> {
        let pkce = Pkce::generate();
        let state = pkce::random_state();

        let local = self.session.storage().local();
        local.set(keys::CODE_VERIFIER, &pkce.verifier, None)?;
        local.set(keys::OAUTH_STATE, &state, None)?;

        let url = Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("scope", self.config.scopes.as_str()),
                ("state", state.as_str()),
                ("code_challenge", pkce.challenge.as_str()),
                ("code_challenge_method", CHALLENGE_METHOD),
            ],
        )
        .map_err(|e| AuthError::Provider(format!("invalid authorize URL: {e}")))?;

        info!("Starting OIDC login");
        Ok(AuthorizationRequest { url, state })
    }

    /// Finish a login from the provider redirect.
    ///
    /// On any failure the session is cleared, the transient PKCE keys are
    /// removed and the error is recorded on the session.
    pub async fn handle_callback(&self, params: CallbackParams) -> Result<UserProfile, AuthError> {
        self.session.set_loading(true);
        let result = self.complete_login(params).await;
        self.forget_transient();

        match result {
            Ok(user) => {
                self.session.set_loading(false);
                info!(user_id = %user.id, "OIDC login completed");
                Ok(user)
            }
            Err(e) => {
                warn!(error = %e, "OIDC callback failed");
                self.session.clear();
                self.session.set_error(Some(e.to_string()));
                Err(e)
            }
        }
    }

    async fn complete_login(&self, params: CallbackParams) -> Result<UserProfile, AuthError> {
        if let Some(error) = params.error {
            let detail = params
                .error_description
                .map(|d| format!("{error}: {d}"))
                .unwrap_or(error);
            return Err(AuthError::Provider(detail));
        }

        let local = self.session.storage().local();
        let stored_state = local.get(keys::OAUTH_STATE);
        match (stored_state.as_deref(), params.state.as_deref()) {
            (Some(stored), Some(returned)) if stored == returned => {}
            _ => return Err(AuthError::StateMismatch),
        }

        let code = params.code.ok_or(AuthError::MissingCode)?;
        let verifier = local
            .get(keys::CODE_VERIFIER)
            .ok_or(AuthError::MissingVerifier)?;

        let tokens = self.exchange_code(&code, &verifier).await?;

        let profile_token = tokens.id_token.as_deref().unwrap_or(&tokens.access_token);
        let claims = jwt::decode_unverified(profile_token).map_err(AuthError::InvalidToken)?;
        let user = UserProfile::from_claims(&claims)
            .ok_or_else(|| AuthError::InvalidToken("token has no subject".to_string()))?;

        self.session.set_auth(Credentials {
            access_token: tokens.access_token,
            id_token: tokens.id_token,
            user: Some(user.clone()),
        });
        Ok(user)
    }

    async fn exchange_code(&self, code: &str, verifier: &str) -> Result<TokenResponse, AuthError> {
        debug!("Exchanging authorization code at {}", self.config.token_url);

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("code_verifier", verifier),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let detail = serde_json::from_slice::<TokenErrorBody>(&body)
                .ok()
                .and_then(|b| b.error_description.or(b.error))
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(AuthError::TokenExchange(detail));
        }

        serde_json::from_slice(&body).map_err(|e| AuthError::TokenExchange(e.to_string()))
    }

    fn forget_transient(&self) {
        let local = self.session.storage().local();
        for key in [keys::CODE_VERIFIER, keys::OAUTH_STATE] {
            if let Err(e) = local.remove(key) {
                warn!(key, error = %e, "Failed to remove transient login key");
            }
        }
    }

    /// Clear the session and return the provider's end-session URL, if it has one.
    pub fn logout(&self) -> Option<Url> {
        let id_token = self.session.id_token();
        self.session.clear();
        info!("Logged out");

        let end_session = self.config.end_session_url.as_deref()?;
        let mut url = Url::parse(end_session).ok()?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.config.client_id);
            if let Some(id_token) = &id_token {
                query.append_pair("id_token_hint", id_token);
            }
            if let Some(redirect) = &self.config.post_logout_redirect_uri {
                query.append_pair("post_logout_redirect_uri", redirect);
            }
        }
        Some(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::storage::SessionStorage;

    fn client() -> OidcClient {
        let config = OidcConfig::keycloak(
            "http://idp.local/realms/portfolio",
            "portfolio-web",
            "http://app.local/auth/callback",
        )
        .with_post_logout_redirect("http://app.local/");
        OidcClient::new(config, Arc::new(Session::new(SessionStorage::in_memory())))
    }

    #[test]
    fn begin_login_persists_state_and_builds_url() {
        let oidc = client();
        let request = oidc.begin_login().unwrap();

        let pairs: std::collections::HashMap<_, _> =
            request.url.query_pairs().into_owned().collect();
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["client_id"], "portfolio-web");
        assert_eq!(pairs["scope"], DEFAULT_SCOPES);
        assert_eq!(pairs["code_challenge_method"], "S256");
        assert_eq!(pairs["state"], request.state);

        let local = oidc.session.storage().local();
        assert_eq!(local.get(keys::OAUTH_STATE), Some(request.state));
        let verifier = local.get(keys::CODE_VERIFIER).unwrap();
        assert_eq!(pairs["code_challenge"], pkce::challenge_for(&verifier));
        assert!(
            request
                .url
                .as_str()
                .starts_with("http://idp.local/realms/portfolio/protocol/openid-connect/auth?")
        );
    }

    #[tokio::test]
    async fn state_mismatch_fails_without_session() {
        let oidc = client();
        oidc.begin_login().unwrap();

        let err = oidc
            .handle_callback(CallbackParams {
                code: Some("code".into()),
                state: Some("forged".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::StateMismatch));
        assert!(!oidc.session.is_authenticated());
        assert!(oidc.session.state().error.is_some());
        assert!(oidc.session.storage().local().get(keys::CODE_VERIFIER).is_none());
    }

    #[tokio::test]
    async fn provider_error_is_surfaced() {
        let oidc = client();
        let err = oidc
            .handle_callback(CallbackParams {
                error: Some("access_denied".into()),
                error_description: Some("user cancelled".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("access_denied"));
    }

    #[test]
    fn callback_params_from_redirect_url() {
        let params =
            parse_callback_url("http://app.local/auth/callback?code=abc&state=xyz&iss=foo")
                .unwrap();
        assert_eq!(params.code.as_deref(), Some("abc"));
        assert_eq!(params.state.as_deref(), Some("xyz"));
        assert!(params.error.is_none());
    }

    #[test]
    fn logout_builds_end_session_url() {
        let oidc = client();
        let url = oidc.logout().unwrap();
        assert!(url.as_str().contains("/protocol/openid-connect/logout?"));
        assert!(url.as_str().contains("post_logout_redirect_uri="));
    }

    #[test]
    fn authentik_endpoints_use_application_slug() {
        let config = OidcConfig::authentik("https://auth.local/", "portfolio", "web", "cb");
        assert_eq!(config.authorize_url, "https://auth.local/application/o/authorize/");
        assert_eq!(config.token_url, "https://auth.local/application/o/token/");
        assert_eq!(
            config.end_session_url.as_deref(),
            Some("https://auth.local/application/o/portfolio/end-session/")
        );
    }
}
