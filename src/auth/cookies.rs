use cookie::time::Duration as CookieDuration;
use cookie::{Cookie, SameSite};
use tracing::debug;

use super::jwt;
use super::storage::{COOKIE_TTL, keys};

/// Outcome of checking a request for a usable session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow { token: String },
    /// Send the visitor to `/login`; when present, `clear_cookie` is a
    /// `Set-Cookie` value that deletes the stale token.
    RedirectToLogin { clear_cookie: Option<String> },
}

pub const LOGIN_PATH: &str = "/login";

/// `Set-Cookie` value for a session entry (`Path=/`, `SameSite=Strict`, 7 days).
pub fn session_cookie(name: &str, value: &str) -> String {
    let max_age = CookieDuration::seconds(COOKIE_TTL.as_secs() as i64);
    Cookie::build((name.to_string(), value.to_string()))
        .path("/")
        .same_site(SameSite::Strict)
        .max_age(max_age)
        .build()
        .encoded()
        .to_string()
}

/// `Set-Cookie` value that expires `name` immediately.
pub fn removal_cookie(name: &str) -> String {
    let mut cookie = Cookie::build((name.to_string(), String::new()))
        .path("/")
        .build();
    cookie.make_removal();
    cookie.to_string()
}

/// Find a cookie's value in a raw `Cookie` request header.
pub fn find_cookie(header: &str, name: &str) -> Option<String> {
    Cookie::split_parse_encoded(header)
        .filter_map(Result::ok)
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}

/// Gate for owner-only pages: allow only with an unexpired `auth-token` cookie.
pub fn guard_protected(cookie_header: Option<&str>, now: i64) -> GuardDecision {
    let token = cookie_header.and_then(|h| find_cookie(h, keys::COOKIE_AUTH_TOKEN));

    let Some(token) = token else {
        debug!("No session cookie, redirecting to login");
        return GuardDecision::RedirectToLogin { clear_cookie: None };
    };

    if jwt::is_expired_at(&token, now) {
        debug!("Session cookie expired or unreadable, redirecting to login");
        return GuardDecision::RedirectToLogin {
            clear_cookie: Some(removal_cookie(keys::COOKIE_AUTH_TOKEN)),
        };
    }

    GuardDecision::Allow { token }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use serde_json::json;

    fn token(exp: i64) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &json!({ "sub": "u", "exp": exp }),
            &EncodingKey::from_secret(b"k"),
        )
        .unwrap()
    }

    #[test]
    fn session_cookie_attributes() {
        let rendered = session_cookie(keys::COOKIE_AUTH_USER, r#"{"id":"1"}"#);
        assert!(rendered.starts_with("auth-user="));
        assert!(rendered.contains("Path=/"));
        assert!(rendered.contains("SameSite=Strict"));
        assert!(rendered.contains("Max-Age=604800"));
        assert!(!rendered.contains('"'));
    }

    #[test]
    fn removal_cookie_expires_immediately() {
        let rendered = removal_cookie(keys::COOKIE_AUTH_TOKEN);
        assert!(rendered.starts_with("auth-token="));
        assert!(rendered.contains("Max-Age=0"));
    }

    #[test]
    fn guard_allows_fresh_token() {
        let fresh = token(2_000);
        let header = format!("theme=dark; auth-token={fresh}");
        assert_eq!(
            guard_protected(Some(&header), 1_000),
            GuardDecision::Allow { token: fresh }
        );
    }

    #[test]
    fn guard_redirects_without_cookie() {
        assert_eq!(
            guard_protected(None, 0),
            GuardDecision::RedirectToLogin { clear_cookie: None }
        );
        assert_eq!(
            guard_protected(Some("theme=dark"), 0),
            GuardDecision::RedirectToLogin { clear_cookie: None }
        );
    }

    #[test]
    fn guard_clears_expired_cookie() {
        let header = format!("auth-token={}", token(1_000));
        match guard_protected(Some(&header), 1_001) {
            GuardDecision::RedirectToLogin { clear_cookie } => {
                assert!(clear_cookie.unwrap().starts_with("auth-token="));
            }
            other => panic!("expected redirect, got {other:?}"),
        }
    }

    #[test]
    fn encoded_values_round_trip_through_header() {
        let set = session_cookie(keys::COOKIE_AUTH_USER, r#"{"id":"1"}"#);
        let pair = set.split(';').next().unwrap();
        assert_eq!(
            find_cookie(pair, keys::COOKIE_AUTH_USER).as_deref(),
            Some(r#"{"id":"1"}"#)
        );
    }
}
