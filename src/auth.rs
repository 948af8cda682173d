//! Authentication for the API.
//!
//! A logged-in client carries a signed JWT in the `token` cookie. The token
//! only names the user; their permissions are loaded fresh from the database
//! on every request so revocations take effect immediately.

use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::error::ShopResult;
use crate::util::current_time;

/// The name of the cookie holding the login token.
pub const TOKEN_COOKIE: &str = "token";

/// How long a login lasts.
pub const TOKEN_LIFETIME: Duration = Duration::days(365);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs a login token for the given user.
pub fn issue_token(user_id: &str, secret: &str) -> ShopResult<String> {
    let now = current_time();
    let claims = Claims {
        user_id: user_id.to_owned(),
        iat: now.unix_timestamp(),
        exp: (now + TOKEN_LIFETIME).unix_timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(Into::into)
}

/// Checks the signature and expiry of a login token.
pub fn verify_token(token: &str, secret: &str) -> ShopResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(Into::into)
}

/// Finds the login token among the request's cookies, if there is one.
pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, value)| *name == TOKEN_COOKIE && !value.is_empty())
        .map(|(_name, value)| value)
}

/// The `Set-Cookie` value that logs a client in.
pub fn login_cookie(token: &str) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; Max-Age={}",
        TOKEN_COOKIE,
        token,
        TOKEN_LIFETIME.whole_seconds()
    )
}

/// The `Set-Cookie` value that logs a client out.
pub fn logout_cookie() -> String {
    format!("{}=; HttpOnly; Path=/; Max-Age=0", TOKEN_COOKIE)
}
