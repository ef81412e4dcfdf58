pub mod category;
pub mod image;
pub mod portfolio;
pub mod project;
pub mod section;
pub mod section_content;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::Session;
use crate::models::{ApiEnvelope, PaginatedEnvelope};

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// Failures of a backend call. The display string is what a store records as its `error`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Authentication expired")]
    AuthenticationExpired,
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{message}")]
    Api { status: StatusCode, message: String },
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// HTTP status of a rejected call, if the server answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            ApiError::AuthenticationExpired => Some(StatusCode::UNAUTHORIZED),
            ApiError::Http(e) => e.status(),
            _ => None,
        }
    }
}

/// Whether a call goes to a public route or an owner-scoped one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Owner,
}

/// HTTP client for the portfolio backend, bound to one session.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Arc<Session>) -> Self {
        Self::with_http(base_url, session, reqwest::Client::new())
    }

    pub fn with_http(base_url: &str, session: Arc<Session>, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Request to a public route, sent without credentials.
    pub fn public(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!("{method} {url}");
        self.http.request(method, url)
    }

    /// Request to an owner-scoped route. Fails without a usable token,
    /// clearing the session when the token has expired.
    pub fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        if !self.session.ensure_auth() {
            return Err(ApiError::NotAuthenticated);
        }
        let token = self.session.token().ok_or(ApiError::NotAuthenticated)?;
        let url = self.url(path);
        debug!("{method} {url} (authenticated)");
        Ok(self.http.request(method, url).bearer_auth(token))
    }

    /// Send a built request. A 401 on an owner call ends the session.
    pub async fn send(
        &self,
        access: Access,
        request: RequestBuilder,
    ) -> Result<Response, ApiError> {
        let response = request.send().await?;
        debug!(status = %response.status(), url = %response.url(), "Response received");

        if access == Access::Owner && response.status() == StatusCode::UNAUTHORIZED {
            info!("Backend rejected the token, clearing session");
            self.session.clear();
            return Err(ApiError::AuthenticationExpired);
        }
        Ok(response)
    }
}

/// Read `{data}` from a response. A success status without `data` is still a failure.
pub async fn read_data<T: DeserializeOwned>(
    response: Response,
    fallback: &str,
) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        return Err(rejection(status, &body, fallback));
    }

    let envelope: ApiEnvelope<T> = serde_json::from_slice(&body)?;
    match envelope.data {
        Some(data) => Ok(data),
        None => Err(ApiError::Api {
            status,
            message: envelope.error.unwrap_or_else(|| fallback.to_string()),
        }),
    }
}

/// Read a list from `{data: [...], page, limit}` (or a plain `{data: [...]}`).
pub async fn read_page<T: DeserializeOwned>(
    response: Response,
    fallback: &str,
) -> Result<Vec<T>, ApiError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        return Err(rejection(status, &body, fallback));
    }

    let envelope: PaginatedEnvelope<T> = serde_json::from_slice(&body)?;
    Ok(envelope.data.unwrap_or_default())
}

/// Accept any success status and ignore the body.
pub async fn expect_success(response: Response, fallback: &str) -> Result<(), ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.bytes().await?;
    Err(rejection(status, &body, fallback))
}

fn rejection(status: StatusCode, body: &[u8], fallback: &str) -> ApiError {
    let message = serde_json::from_slice::<ApiEnvelope<serde_json::Value>>(body)
        .ok()
        .and_then(|e| e.error.or(e.message))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| fallback.to_string());
    debug!(%status, %message, "Request rejected");
    ApiError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionStorage;

    #[test]
    fn rejection_prefers_server_error() {
        let err = rejection(
            StatusCode::BAD_REQUEST,
            br#"{"error":"title is required"}"#,
            "Failed to create portfolio",
        );
        assert_eq!(err.to_string(), "title is required");
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn rejection_falls_back_on_non_json() {
        let err = rejection(StatusCode::BAD_GATEWAY, b"<html>", "Failed to load portfolios");
        assert_eq!(err.to_string(), "Failed to load portfolios");
    }

    #[test]
    fn authed_without_session_is_rejected_locally() {
        let api = ApiClient::new(
            DEFAULT_API_URL,
            Arc::new(Session::new(SessionStorage::in_memory())),
        );
        assert!(matches!(
            api.authed(Method::GET, "/portfolios/own"),
            Err(ApiError::NotAuthenticated)
        ));
    }

    #[test]
    fn url_joins_base_and_path() {
        let api = ApiClient::new(
            "http://localhost:8000/api/",
            Arc::new(Session::new(SessionStorage::in_memory())),
        );
        assert_eq!(api.url("/portfolios/own"), "http://localhost:8000/api/portfolios/own");
    }
}
