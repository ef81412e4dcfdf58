use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::jwt::{self, UserProfile};
use super::storage::{SessionStorage, keys};

/// The credential held by a signed-in session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub id_token: Option<String>,
    pub user: Option<UserProfile>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub authenticated: bool,
    pub credentials: Option<Credentials>,
    pub loading: bool,
    pub error: Option<String>,
}

impl AuthState {
    pub fn token(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.access_token.as_str())
    }

    pub fn user(&self) -> Option<&UserProfile> {
        self.credentials.as_ref().and_then(|c| c.user.as_ref())
    }
}

/// An explicitly constructed auth session.
///
/// State lives in a `watch` cell so UI layers can observe it; every change is
/// mirrored into the injected [`SessionStorage`].
pub struct Session {
    storage: SessionStorage,
    state: watch::Sender<AuthState>,
}

impl Session {
    pub fn new(storage: SessionStorage) -> Self {
        Self {
            storage,
            state: watch::Sender::new(AuthState::default()),
        }
    }

    pub fn storage(&self) -> &SessionStorage {
        &self.storage
    }

    /// Restore a previously persisted session. A stored user record that does
    /// not parse clears everything.
    pub fn init(&self) {
        let local = self.storage.local();
        let cookies = self.storage.cookies();

        let token = local
            .get(keys::AUTH_TOKEN)
            .or_else(|| local.get(keys::ACCESS_TOKEN))
            .or_else(|| cookies.and_then(|c| c.get(keys::COOKIE_AUTH_TOKEN)));
        let Some(token) = token else {
            debug!("No persisted session");
            return;
        };

        let id_token = local.get(keys::ID_TOKEN);
        let stored_user = local
            .get(keys::USER)
            .or_else(|| cookies.and_then(|c| c.get(keys::COOKIE_AUTH_USER)));

        let user = match stored_user {
            Some(raw) => match serde_json::from_str::<UserProfile>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(error = %e, "Stored user record is unreadable, clearing session");
                    self.clear();
                    return;
                }
            },
            None => id_token
                .as_deref()
                .or(Some(token.as_str()))
                .and_then(|t| jwt::decode_unverified(t).ok())
                .and_then(|claims| UserProfile::from_claims(&claims)),
        };

        info!("Restored persisted session");
        self.set_auth(Credentials {
            access_token: token,
            id_token,
            user,
        });
    }

    /// Install credentials and mirror them into both storage tiers.
    pub fn set_auth(&self, credentials: Credentials) {
        let token = credentials.access_token.as_str();
        self.storage.set_local(keys::AUTH_TOKEN, token);
        self.storage.set_local(keys::ACCESS_TOKEN, token);
        self.storage.set_cookie(keys::COOKIE_AUTH_TOKEN, token);

        match &credentials.id_token {
            Some(id_token) => self.storage.set_local(keys::ID_TOKEN, id_token),
            None => self.storage.remove_everywhere(keys::ID_TOKEN),
        }

        if let Some(user) = &credentials.user {
            self.persist_user(user);
        }

        self.state.send_modify(|state| {
            state.authenticated = true;
            state.credentials = Some(credentials);
            state.error = None;
        });
    }

    /// Replace the user record of the current session, e.g. after a profile update.
    pub fn set_user(&self, user: UserProfile) {
        self.persist_user(&user);
        self.state.send_modify(|state| {
            if let Some(credentials) = state.credentials.as_mut() {
                credentials.user = Some(user);
            }
        });
    }

    fn persist_user(&self, user: &UserProfile) {
        match serde_json::to_string(user) {
            Ok(raw) => {
                self.storage.set_local(keys::USER, &raw);
                self.storage.set_cookie(keys::COOKIE_AUTH_USER, &raw);
            }
            Err(e) => warn!(error = %e, "Failed to serialize user record"),
        }
    }

    /// Drop the in-memory credential and every persisted session key.
    pub fn clear(&self) {
        for key in keys::ALL {
            self.storage.remove_everywhere(key);
        }
        self.state.send_replace(AuthState::default());
        debug!("Session cleared");
    }

    pub fn set_loading(&self, loading: bool) {
        self.state.send_modify(|state| state.loading = loading);
    }

    pub fn set_error(&self, error: Option<String>) {
        self.state.send_modify(|state| {
            state.error = error;
            state.loading = false;
        });
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token().map(str::to_owned)
    }

    pub fn id_token(&self) -> Option<String> {
        self.state
            .borrow()
            .credentials
            .as_ref()
            .and_then(|c| c.id_token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().authenticated
    }

    /// True when there is no token or its `exp` is in the past.
    pub fn is_token_expired(&self) -> bool {
        self.is_token_expired_at(chrono::Utc::now().timestamp())
    }

    pub fn is_token_expired_at(&self, now: i64) -> bool {
        match self.token() {
            Some(token) => jwt::is_expired_at(&token, now),
            None => true,
        }
    }

    /// Whether an authenticated call may proceed. Clears the session when it may not.
    pub fn ensure_auth(&self) -> bool {
        if self.is_token_expired() {
            if self.token().is_some() {
                info!("Access token expired, clearing session");
            }
            self.clear();
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use serde_json::json;

    fn token_expiring_at(exp: i64) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &json!({ "sub": "owner-1", "exp": exp, "email": "o@example.com" }),
            &EncodingKey::from_secret(b"test"),
        )
        .unwrap()
    }

    fn fresh_token() -> String {
        token_expiring_at(chrono::Utc::now().timestamp() + 3600)
    }

    #[test]
    fn set_auth_mirrors_into_both_tiers() {
        let session = Session::new(SessionStorage::in_memory());
        let token = fresh_token();
        session.set_auth(Credentials {
            access_token: token.clone(),
            id_token: Some("id".into()),
            user: Some(UserProfile {
                id: "owner-1".into(),
                username: Some("owner".into()),
                email: None,
                name: None,
            }),
        });

        let storage = session.storage();
        assert_eq!(storage.local().get(keys::AUTH_TOKEN), Some(token.clone()));
        assert_eq!(storage.local().get(keys::ID_TOKEN).as_deref(), Some("id"));
        let cookies = storage.cookies().unwrap();
        assert_eq!(cookies.get(keys::COOKIE_AUTH_TOKEN), Some(token));
        assert!(cookies.get(keys::COOKIE_AUTH_USER).unwrap().contains("owner-1"));
        assert!(session.is_authenticated());
    }

    #[test]
    fn init_restores_and_derives_user_from_token() {
        let storage = SessionStorage::in_memory();
        let token = fresh_token();
        storage.local().set(keys::AUTH_TOKEN, &token, None).unwrap();

        let session = Session::new(storage);
        session.init();

        let state = session.state();
        assert!(state.authenticated);
        assert_eq!(state.user().map(|u| u.id.as_str()), Some("owner-1"));
    }

    #[test]
    fn init_with_corrupt_user_clears_everything() {
        let storage = SessionStorage::in_memory();
        storage.local().set(keys::AUTH_TOKEN, &fresh_token(), None).unwrap();
        storage.local().set(keys::USER, "{not json", None).unwrap();

        let session = Session::new(storage);
        session.init();

        assert!(!session.is_authenticated());
        assert!(session.storage().local().get(keys::AUTH_TOKEN).is_none());
    }

    #[test]
    fn ensure_auth_clears_expired_session() {
        let session = Session::new(SessionStorage::in_memory());
        session.set_auth(Credentials {
            access_token: token_expiring_at(chrono::Utc::now().timestamp() - 60),
            id_token: None,
            user: None,
        });

        assert!(!session.ensure_auth());
        assert!(!session.is_authenticated());
        assert!(session.token().is_none());
    }

    #[test]
    fn ensure_auth_without_token_is_false() {
        let session = Session::new(SessionStorage::in_memory());
        assert!(!session.ensure_auth());
    }

    #[test]
    fn subscribers_observe_changes() {
        let session = Session::new(SessionStorage::in_memory());
        let rx = session.subscribe();
        session.set_auth(Credentials {
            access_token: fresh_token(),
            id_token: None,
            user: None,
        });
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow().authenticated);
    }
}
