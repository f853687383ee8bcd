//! HS256 session tokens.
//!
//! Only `HS256` is accepted when decoding, with no expiry leeway.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cognito_core::{Error, Result, User, UserProfile};

/// Claims carried in the auth cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Issued at, seconds since the epoch.
    #[serde(default)]
    pub iat: i64,
}

impl Claims {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            email: self.email.clone(),
            name: self.name.clone(),
            picture: self.picture.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,
    #[error("Invalid authentication token")]
    Invalid,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        }
    }
}

/// Signs and verifies session tokens with a shared secret.
#[derive(Clone)]
pub struct JwtCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry: Duration,
}

impl JwtCodec {
    pub fn new(secret: &str, expiry_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry: Duration::hours(expiry_hours),
        }
    }

    /// Issue a token for a signed-in user.
    pub fn issue(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        self.encode(&Claims {
            email: user.email.clone(),
            name: user.name.clone(),
            picture: user.picture.clone(),
            exp: (now + self.expiry).timestamp(),
            iat: now.timestamp(),
        })
    }

    pub fn encode(&self, claims: &Claims) -> Result<String> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("Failed to sign JWT: {}", e)))
    }

    /// Verify signature and expiry.
    pub fn decode(&self, token: &str) -> std::result::Result<Claims, TokenError> {
        self.verify(token, true)
    }

    /// Verify the signature only; expired tokens are accepted.
    ///
    /// Used by silent refresh, where the cookie has usually just expired.
    pub fn decode_allow_expired(&self, token: &str) -> std::result::Result<Claims, TokenError> {
        self.verify(token, false)
    }

    fn verify(&self, token: &str, validate_exp: bool) -> std::result::Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = validate_exp;
        if !validate_exp {
            validation.required_spec_claims.clear();
        }

        let data = jsonwebtoken::decode::<Claims>(token.trim(), &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(exp_offset_secs: i64) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            email: "writer@example.com".to_string(),
            name: Some("Writer".to_string()),
            picture: None,
            exp: now + exp_offset_secs,
            iat: now,
        }
    }

    #[test]
    fn test_encode_decode() {
        let codec = JwtCodec::new("secret", 168);
        let original = claims(3600);
        let token = codec.encode(&original).unwrap();

        assert_eq!(token.split('.').count(), 3);
        assert_eq!(codec.decode(&token).unwrap(), original);
    }

    #[test]
    fn test_expired_token() {
        let codec = JwtCodec::new("secret", 168);
        let token = codec.encode(&claims(-10)).unwrap();

        assert_eq!(codec.decode(&token), Err(TokenError::Expired));
        assert_eq!(
            codec.decode_allow_expired(&token).unwrap().email,
            "writer@example.com"
        );
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let token = JwtCodec::new("secret", 168).encode(&claims(3600)).unwrap();
        let other = JwtCodec::new("other", 168);

        assert_eq!(other.decode(&token), Err(TokenError::Invalid));
        assert_eq!(other.decode_allow_expired(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_tampered_payload_is_invalid() {
        let codec = JwtCodec::new("secret", 168);
        let token = codec.encode(&claims(3600)).unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let mut forged = claims(3600);
        forged.email = "intruder@example.com".to_string();
        let forged_token = JwtCodec::new("other", 168).encode(&forged).unwrap();
        let forged_payload = forged_token.split('.').nth(1).unwrap();
        let tampered = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert_eq!(codec.decode(&tampered), Err(TokenError::Invalid));
    }

    #[test]
    fn test_malformed_tokens() {
        let codec = JwtCodec::new("secret", 168);
        for token in ["", "abc", "a.b", "a.b.c.d", "!!.??.**"] {
            assert_eq!(codec.decode(token), Err(TokenError::Invalid), "{}", token);
        }
    }

    #[test]
    fn test_rejects_other_algorithms() {
        let codec = JwtCodec::new("secret", 168);
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS512),
            &claims(3600),
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert_eq!(codec.decode(&token), Err(TokenError::Invalid));

        // {"alg":"none","typ":"JWT"}
        let none_header = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0";
        let unsigned = format!("{}.{}.", none_header, token.split('.').nth(1).unwrap());
        assert_eq!(codec.decode(&unsigned), Err(TokenError::Invalid));
    }

    #[test]
    fn test_issue_uses_expiry_hours() {
        let codec = JwtCodec::new("secret", 2);
        let user = User {
            id: uuid::Uuid::new_v4(),
            email: "writer@example.com".to_string(),
            name: None,
            picture: Some("https://example.com/p.png".to_string()),
            created_at: Utc::now(),
            last_login_at: None,
        };
        let decoded = codec.decode(&codec.issue(&user).unwrap()).unwrap();

        assert_eq!(decoded.exp - decoded.iat, 2 * 3600);
        assert_eq!(decoded.picture.as_deref(), Some("https://example.com/p.png"));
    }
}
