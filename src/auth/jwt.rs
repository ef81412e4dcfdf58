use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Deserializer, Serialize};

/// Claims read from access and id tokens.
///
/// Tokens are decoded WITHOUT signature verification: the backend and the
/// identity provider are the authorities, the client only reads the payload
/// to show a profile and to check expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the identity provider's user id.
    pub sub: Option<String>,
    /// Token expiration (Unix timestamp).
    pub exp: Option<i64>,
    /// Token issued-at (Unix timestamp).
    pub iat: Option<i64>,
    pub iss: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub preferred_username: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    /// Numeric user id issued by the password auth service.
    pub user_id: Option<i64>,
}

impl TokenClaims {
    /// Best-effort display name: full name, then given + family, then username.
    pub fn display_name(&self) -> Option<String> {
        self.name
            .clone()
            .or_else(|| match (&self.given_name, &self.family_name) {
                (Some(given), Some(family)) => Some(format!("{given} {family}")),
                (Some(given), None) => Some(given.clone()),
                _ => None,
            })
            .or_else(|| self.preferred_username.clone())
    }

    /// Stable user id: `sub` for OIDC tokens, `user_id` for password tokens.
    pub fn user_id(&self) -> Option<String> {
        self.sub
            .clone()
            .or_else(|| self.user_id.map(|id| id.to_string()))
    }
}

/// Local view of the signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, alias = "preferred_username")]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl UserProfile {
    pub fn from_claims(claims: &TokenClaims) -> Option<Self> {
        Some(Self {
            id: claims.user_id()?,
            username: claims.preferred_username.clone(),
            email: claims.email.clone(),
            name: claims.display_name(),
        })
    }
}

/// The password auth service uses numeric ids, OIDC providers use strings.
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

/// Decode the payload of a JWT without verifying its signature or claims.
pub fn decode_unverified(token: &str) -> Result<TokenClaims, String> {
    let header = decode_header(token).map_err(|e| format!("Failed to decode header: {e}"))?;

    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| format!("Failed to decode token payload: {e}"))
}

/// Whether `token` is expired at `now` (Unix seconds).
///
/// Expired iff `exp < now`; a token whose `exp` equals `now` is still valid.
/// An undecodable token counts as expired, a token without `exp` does not.
pub fn is_expired_at(token: &str, now: i64) -> bool {
    match decode_unverified(token) {
        Ok(claims) => claims.exp.is_some_and(|exp| exp < now),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
    use serde_json::json;

    fn mint(claims: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"whatever-the-provider-uses"),
        )
        .unwrap()
    }

    #[test]
    fn decodes_without_knowing_the_key() {
        let token = mint(json!({
            "sub": "abc-123",
            "exp": 2_000_000_000i64,
            "email": "alice@example.com",
            "preferred_username": "alice",
            "given_name": "Alice",
            "family_name": "Smith",
        }));

        let claims = decode_unverified(&token).unwrap();
        assert_eq!(claims.user_id().as_deref(), Some("abc-123"));
        assert_eq!(claims.display_name().as_deref(), Some("Alice Smith"));

        let profile = UserProfile::from_claims(&claims).unwrap();
        assert_eq!(profile.username.as_deref(), Some("alice"));
        assert_eq!(profile.email.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn expiry_boundary_is_strict() {
        let token = mint(json!({ "sub": "u", "exp": 1_000 }));
        assert!(!is_expired_at(&token, 999));
        assert!(!is_expired_at(&token, 1_000));
        assert!(is_expired_at(&token, 1_001));
    }

    #[test]
    fn garbage_counts_as_expired() {
        assert!(is_expired_at("not.a.jwt", 0));
        assert!(is_expired_at("", 0));
    }

    #[test]
    fn missing_exp_is_not_expired() {
        let token = mint(json!({ "sub": "u" }));
        assert!(!is_expired_at(&token, i64::MAX));
    }

    #[test]
    fn numeric_user_id_becomes_string() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"id": 7, "username": "bob", "email": "b@x.io"}"#).unwrap();
        assert_eq!(profile.id, "7");
        assert_eq!(profile.username.as_deref(), Some("bob"));
    }
}
