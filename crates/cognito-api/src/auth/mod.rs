//! Google sign-in and cookie sessions.

pub mod cookies;
pub mod extractor;
pub mod jwt;
pub mod oauth;

pub use extractor::CurrentUser;
pub use jwt::{Claims, JwtCodec, TokenError};
pub use oauth::{GoogleOAuthClient, GoogleUserInfo, TokenResponse};
