//! Google OAuth 2.0 client: consent URL, code exchange, refresh and userinfo.

use std::time::Duration;

use reqwest::{header, Client};
use serde::Deserialize;
use tracing::{debug, instrument};

use cognito_core::defaults::{GOOGLE_OAUTH_SCOPES, OAUTH_HTTP_TIMEOUT_SECS};
use cognito_core::{Error, Result};

use crate::config::Settings;

/// Token endpoint response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    /// Only sent on first consent (or with `prompt=consent`) and on rotation.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Userinfo endpoint response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GoogleUserInfo {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Client for Google's OAuth endpoints.
#[derive(Clone)]
pub struct GoogleOAuthClient {
    http: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    auth_url: String,
    token_url: String,
    userinfo_url: String,
}

impl GoogleOAuthClient {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(OAUTH_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build OAuth HTTP client: {}", e)))?;

        Ok(Self {
            http,
            client_id: settings.google_client_id.clone(),
            client_secret: settings.google_client_secret.clone(),
            redirect_uri: settings.oauth_redirect_uri(),
            auth_url: settings.google_auth_url.clone(),
            token_url: settings.google_token_url.clone(),
            userinfo_url: settings.google_userinfo_url.clone(),
        })
    }

    /// Consent screen URL with offline access so Google returns a refresh token.
    pub fn authorization_url(&self, state: &str) -> String {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", GOOGLE_OAUTH_SCOPES),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ];
        format!("{}?{}", self.auth_url, form_encode(&params))
    }

    /// Exchange an authorization code for tokens.
    #[instrument(skip_all, fields(subsystem = "auth", component = "oauth", op = "exchange_code"))]
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        self.token_request(&params, "Token exchange failed").await
    }

    /// Trade a stored refresh token for a new access token.
    #[instrument(skip_all, fields(subsystem = "auth", component = "oauth", op = "refresh"))]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        self.token_request(&params, "Token refresh failed").await
    }

    #[instrument(skip_all, fields(subsystem = "auth", component = "oauth", op = "userinfo"))]
    pub async fn fetch_userinfo(&self, access_token: &str) -> Result<GoogleUserInfo> {
        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::Request(format!("Network error fetching user info: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Request(format!(
                "Failed to get user info: {} {}",
                status.as_u16(),
                body
            )));
        }

        let info: GoogleUserInfo = response.json().await?;
        debug!(has_email = info.email.is_some(), "Fetched Google user info");
        Ok(info)
    }

    async fn token_request(&self, params: &[(&str, &str)], context: &str) -> Result<TokenResponse> {
        let response = self
            .http
            .post(&self.token_url)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(form_encode(params))
            .send()
            .await
            .map_err(|e| Error::Request(format!("{}: network error: {}", context, e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Request(format!(
                "{}: {} {}",
                context,
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response.json().await?;
        debug!(
            has_access_token = token.access_token.is_some(),
            has_refresh_token = token.refresh_token.is_some(),
            "Token endpoint answered"
        );
        Ok(token)
    }
}

/// `application/x-www-form-urlencoded` body or query string.
fn form_encode(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_url() {
        let settings = Settings {
            google_client_id: "client-123".to_string(),
            ..Settings::default()
        };
        let client = GoogleOAuthClient::from_settings(&settings).unwrap();
        let url = client.authorization_url("st4te");

        assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8000%2Fapi%2Fauth%2Fcallback"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=openid%20email%20profile"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("state=st4te"));
    }

    #[test]
    fn test_form_encode() {
        assert_eq!(form_encode(&[("a", "1 2"), ("b", "x&y")]), "a=1%202&b=x%26y");
    }
}
