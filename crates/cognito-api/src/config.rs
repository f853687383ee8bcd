//! Server settings loaded from the environment.
//!
//! `main` calls `dotenvy::dotenv()` first, so a `.env` file in the working
//! directory fills in anything not exported.

use std::fmt;

use cognito_core::defaults;

/// `SameSite` attribute for the auth cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    Strict,
    None,
}

impl SameSite {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "strict" => Self::Strict,
            "none" => Self::None,
            _ => Self::Lax,
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Lax => "Lax",
            Self::Strict => "Strict",
            Self::None => "None",
        };
        f.write_str(value)
    }
}

/// Runtime configuration for the API server.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub host: String,
    pub port: u16,

    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,

    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_auth_url: String,
    pub google_token_url: String,
    pub google_userinfo_url: String,

    pub cookie_secure: bool,
    pub cookie_domain: Option<String>,
    pub cookie_samesite: SameSite,
    /// Only this Google account may sign in when set.
    pub allowed_email: Option<String>,

    pub frontend_url: String,
    pub backend_url: String,

    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub ollama_url: String,
    pub ollama_model: String,

    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_period_secs: u64,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Settings {
    /// Read settings from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup; missing keys use defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let optional = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let flag = |key: &str, default: bool| {
            lookup(key)
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(default)
        };

        Self {
            database_url: string("DATABASE_URL", defaults::DATABASE_URL),
            host: string("HOST", defaults::SERVER_HOST),
            port: lookup("PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults::SERVER_PORT),

            jwt_secret: string("JWT_SECRET", defaults::JWT_SECRET_PLACEHOLDER),
            jwt_expiry_hours: lookup("JWT_EXPIRY_HOURS")
                .and_then(|v| v.trim().parse().ok())
                .filter(|h: &i64| *h > 0)
                .unwrap_or(defaults::JWT_EXPIRY_HOURS),

            google_client_id: string("GOOGLE_CLIENT_ID", ""),
            google_client_secret: string("GOOGLE_CLIENT_SECRET", ""),
            google_auth_url: string("GOOGLE_AUTH_URL", defaults::GOOGLE_AUTH_URL),
            google_token_url: string("GOOGLE_TOKEN_URL", defaults::GOOGLE_TOKEN_URL),
            google_userinfo_url: string("GOOGLE_USERINFO_URL", defaults::GOOGLE_USERINFO_URL),

            cookie_secure: flag("COOKIE_SECURE", true),
            cookie_domain: optional("COOKIE_DOMAIN"),
            cookie_samesite: SameSite::parse(&string("COOKIE_SAMESITE", "lax")),
            allowed_email: optional("ALLOWED_EMAIL"),

            frontend_url: trim_slash(string("FRONTEND_URL", defaults::FRONTEND_URL)),
            backend_url: trim_slash(string("BACKEND_URL", defaults::BACKEND_URL)),

            gemini_api_key: optional("GEMINI_API_KEY"),
            gemini_model: string("GEMINI_MODEL", defaults::GEMINI_MODEL),
            ollama_url: string("OLLAMA_URL", defaults::OLLAMA_URL),
            ollama_model: string("OLLAMA_MODEL", defaults::OLLAMA_MODEL),

            rate_limit_enabled: flag("RATE_LIMIT_ENABLED", false),
            rate_limit_requests: lookup("RATE_LIMIT_REQUESTS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults::RATE_LIMIT_REQUESTS),
            rate_limit_period_secs: lookup("RATE_LIMIT_PERIOD_SECS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults::RATE_LIMIT_PERIOD_SECS),
            max_body_bytes: lookup("MAX_BODY_BYTES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults::MAX_BODY_BYTES),
        }
    }

    /// Where Google sends the user back after consent.
    pub fn oauth_redirect_uri(&self) -> String {
        format!("{}/api/auth/callback", self.backend_url)
    }

    pub fn uses_placeholder_secret(&self) -> bool {
        self.jwt_secret == defaults::JWT_SECRET_PLACEHOLDER
    }

    /// Case-insensitive check against `ALLOWED_EMAIL`.
    pub fn is_email_allowed(&self, email: &str) -> bool {
        match &self.allowed_email {
            Some(allowed) => allowed.eq_ignore_ascii_case(email.trim()),
            None => true,
        }
    }

    /// Origins allowed by CORS: the frontend plus the local dev server.
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins = vec![self.frontend_url.clone()];
        if self.frontend_url != defaults::FRONTEND_URL {
            origins.push(defaults::FRONTEND_URL.to_string());
        }
        origins
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn trim_slash(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.port, 8000);
        assert_eq!(s.jwt_expiry_hours, 168);
        assert!(s.cookie_secure);
        assert_eq!(s.cookie_samesite, SameSite::Lax);
        assert!(s.cookie_domain.is_none());
        assert!(s.allowed_email.is_none());
        assert!(s.gemini_api_key.is_none());
        assert!(!s.rate_limit_enabled);
        assert!(s.uses_placeholder_secret());
        assert_eq!(s.oauth_redirect_uri(), "http://localhost:8000/api/auth/callback");
    }

    #[test]
    fn test_overrides() {
        let s = settings(&[
            ("PORT", "9000"),
            ("JWT_SECRET", "s3cret"),
            ("COOKIE_SECURE", "false"),
            ("COOKIE_SAMESITE", "None"),
            ("COOKIE_DOMAIN", ".example.com"),
            ("BACKEND_URL", "https://api.example.com/"),
            ("GEMINI_API_KEY", "  "),
        ]);
        assert_eq!(s.port, 9000);
        assert!(!s.uses_placeholder_secret());
        assert!(!s.cookie_secure);
        assert_eq!(s.cookie_samesite.to_string(), "None");
        assert_eq!(s.cookie_domain.as_deref(), Some(".example.com"));
        assert_eq!(s.oauth_redirect_uri(), "https://api.example.com/api/auth/callback");
        assert!(s.gemini_api_key.is_none());
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let s = settings(&[("PORT", "http"), ("JWT_EXPIRY_HOURS", "-3")]);
        assert_eq!(s.port, 8000);
        assert_eq!(s.jwt_expiry_hours, 168);
    }

    #[test]
    fn test_allowed_email_is_case_insensitive() {
        let s = settings(&[("ALLOWED_EMAIL", "Me@Example.com")]);
        assert!(s.is_email_allowed("me@example.com"));
        assert!(!s.is_email_allowed("other@example.com"));
        assert!(Settings::default().is_email_allowed("anyone@example.com"));
    }

    #[test]
    fn test_allowed_origins() {
        assert_eq!(Settings::default().allowed_origins(), vec!["http://localhost:5173"]);

        let s = settings(&[("FRONTEND_URL", "https://journal.example.com")]);
        assert_eq!(
            s.allowed_origins(),
            vec!["https://journal.example.com", "http://localhost:5173"]
        );
    }
}
