//! `Set-Cookie` builders and `Cookie` header parsing.

use axum::http::{header, HeaderMap};

use cognito_core::defaults::{AUTH_COOKIE_NAME, OAUTH_STATE_COOKIE_NAME, OAUTH_STATE_MAX_AGE_SECS};

use crate::config::{SameSite, Settings};

/// Attributes shared by every cookie the server sets.
struct CookieAttributes<'a> {
    secure: bool,
    same_site: SameSite,
    domain: Option<&'a str>,
}

impl<'a> CookieAttributes<'a> {
    fn from_settings(settings: &'a Settings) -> Self {
        Self {
            secure: settings.cookie_secure,
            same_site: settings.cookie_samesite,
            domain: settings.cookie_domain.as_deref(),
        }
    }

    fn render(&self, name: &str, value: &str, max_age: i64) -> String {
        let mut cookie = format!(
            "{}={}; HttpOnly; Path=/; Max-Age={}; SameSite={}",
            name, value, max_age, self.same_site
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        if let Some(domain) = self.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }
        cookie
    }
}

/// Session cookie carrying the JWT.
pub fn auth_cookie(settings: &Settings, token: &str) -> String {
    CookieAttributes::from_settings(settings).render(
        AUTH_COOKIE_NAME,
        token,
        settings.jwt_expiry_hours * 3600,
    )
}

pub fn clear_auth_cookie(settings: &Settings) -> String {
    CookieAttributes::from_settings(settings).render(AUTH_COOKIE_NAME, "", 0)
}

/// Short-lived cookie binding the OAuth `state` to this browser.
pub fn oauth_state_cookie(settings: &Settings, state: &str) -> String {
    CookieAttributes::from_settings(settings).render(
        OAUTH_STATE_COOKIE_NAME,
        state,
        OAUTH_STATE_MAX_AGE_SECS,
    )
}

pub fn clear_oauth_state_cookie(settings: &Settings) -> String {
    CookieAttributes::from_settings(settings).render(OAUTH_STATE_COOKIE_NAME, "", 0)
}

/// Value of the named cookie from all `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}
