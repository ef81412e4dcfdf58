pub mod cookies;
pub mod jwt;
pub mod oidc;
pub mod password;
pub mod pkce;
pub mod session;
pub mod storage;

pub use session::{AuthState, Credentials, Session};
pub use storage::{SessionStorage, StorageError};

/// Login and session failures. The display string is what the user sees.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid state parameter")]
    StateMismatch,
    #[error("Missing PKCE code verifier")]
    MissingVerifier,
    #[error("Missing authorization code")]
    MissingCode,
    #[error("Authentication failed: {0}")]
    Provider(String),
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Invalid callback URL: {0}")]
    InvalidCallback(String),
    #[error("No authentication token")]
    NotAuthenticated,
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),
}
