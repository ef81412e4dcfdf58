use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::AuthError;
use super::jwt::UserProfile;
use super::session::{Credentials, Session};

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateProfileRequest<'a> {
    username: &'a str,
    email: &'a str,
}

/// Body returned by `/login` and `/register`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Email/password login against the standalone auth service.
pub struct PasswordAuth {
    http: reqwest::Client,
    auth_url: String,
    api_url: String,
    session: Arc<Session>,
}

impl PasswordAuth {
    pub fn new(auth_url: &str, api_url: &str, session: Arc<Session>) -> Self {
        Self::with_http(auth_url, api_url, session, reqwest::Client::new())
    }

    pub fn with_http(
        auth_url: &str,
        api_url: &str,
        session: Arc<Session>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            http,
            auth_url: auth_url.trim_end_matches('/').to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    /// POST {auth}/login
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        let body = LoginRequest { email, password };
        self.authenticate("login", &body, "Login failed").await
    }

    /// POST {auth}/register
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, AuthError> {
        let body = RegisterRequest {
            username,
            email,
            password,
        };
        self.authenticate("register", &body, "Registration failed")
            .await
    }

    async fn authenticate<B: Serialize>(
        &self,
        action: &str,
        body: &B,
        fallback: &str,
    ) -> Result<AuthResponse, AuthError> {
        self.session.set_loading(true);
        self.session.set_error(None);

        let result = self.post_credentials(action, body, fallback).await;
        match result {
            Ok(response) => {
                self.session.set_auth(Credentials {
                    access_token: response.token.clone(),
                    id_token: None,
                    user: Some(response.user.clone()),
                });
                self.session.set_loading(false);
                info!(user_id = %response.user.id, "Password {action} succeeded");
                Ok(response)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn post_credentials<B: Serialize>(
        &self,
        action: &str,
        body: &B,
        fallback: &str,
    ) -> Result<AuthResponse, AuthError> {
        let url = format!("{}/{action}", self.auth_url);
        debug!("POST {url}");

        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(AuthError::Rejected(error_message(&bytes, fallback)));
        }
        serde_json::from_slice(&bytes).map_err(|e| AuthError::Rejected(e.to_string()))
    }

    /// GET {api}/profile
    pub async fn get_profile(&self) -> Result<UserProfile, AuthError> {
        let result = async {
            let response = self.profile_request(Method::GET)?.send().await?;
            let status = response.status();
            let bytes = response.bytes().await?;
            self.check_profile_status(status, &bytes, "Failed to fetch profile")?;
            serde_json::from_slice::<UserProfile>(&bytes)
                .map_err(|e| AuthError::Rejected(e.to_string()))
        }
        .await;

        match result {
            Ok(user) => {
                self.session.set_user(user.clone());
                Ok(user)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// PUT {api}/profile
    pub async fn update_profile(
        &self,
        username: &str,
        email: &str,
    ) -> Result<UserProfile, AuthError> {
        self.session.set_loading(true);
        let result = async {
            let response = self
                .profile_request(Method::PUT)?
                .json(&UpdateProfileRequest { username, email })
                .send()
                .await?;
            let status = response.status();
            let bytes = response.bytes().await?;
            self.check_profile_status(status, &bytes, "Failed to update profile")?;
            serde_json::from_slice::<UserProfile>(&bytes)
                .map_err(|e| AuthError::Rejected(e.to_string()))
        }
        .await;

        match result {
            Ok(user) => {
                self.session.set_user(user.clone());
                self.session.set_loading(false);
                Ok(user)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// DELETE {api}/profile. A successful delete ends the session.
    pub async fn delete_profile(&self) -> Result<(), AuthError> {
        self.session.set_loading(true);
        let result = async {
            let response = self.profile_request(Method::DELETE)?.send().await?;
            let status = response.status();
            let bytes = response.bytes().await?;
            self.check_profile_status(status, &bytes, "Failed to delete profile")
        }
        .await;

        match result {
            Ok(()) => {
                info!("Profile deleted");
                self.session.clear();
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Drop the local session. The auth service has no logout endpoint.
    pub fn logout(&self) {
        self.session.clear();
    }

    fn profile_request(&self, method: Method) -> Result<reqwest::RequestBuilder, AuthError> {
        let token = self.session.token().ok_or(AuthError::NotAuthenticated)?;
        let url = format!("{}/profile", self.api_url);
        debug!("{method} {url}");
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    fn check_profile_status(
        &self,
        status: StatusCode,
        body: &[u8],
        fallback: &str,
    ) -> Result<(), AuthError> {
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::UNAUTHORIZED {
            info!("Profile request unauthorized, clearing session");
            self.session.clear();
        }
        Err(AuthError::Rejected(error_message(body, fallback)))
    }

    fn fail(&self, error: AuthError) -> AuthError {
        warn!(error = %error, "Password auth request failed");
        self.session.set_error(Some(error.to_string()));
        error
    }
}

fn error_message(body: &[u8], fallback: &str) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}
