//! Error handling for the API.
//!
//! Resolvers report user-facing failures as plain [async_graphql::Error]s.
//! Anything that goes wrong talking to the database or a third-party
//! service is a [ShopError], which turns into a GraphQL error through its
//! `Display` impl or into an HTTP response at the server boundary.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// The error enum for infrastructure failures across the API.
///
/// See each variant for its corresponding HTTP status code.
#[derive(Debug, thiserror::Error)]
pub enum ShopError {
    /// \[500\] An error occured while interacting with the database.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// \[500\] The database schema could not be brought up to date.
    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    /// \[401\] The login token was malformed, forged, or expired.
    #[error("invalid login token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    /// \[500\] A password could not be hashed or verified.
    #[error("failed to hash password: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
    /// \[402\] The payment processor refused the charge.
    #[error("payment failed: {0}")]
    Payment(String),
    /// \[502\] An email couldn't be rendered or delivered.
    #[error("failed to send email: {0}")]
    Email(String),
    /// \[502\] A third-party API couldn't be reached.
    #[error("request to {service} failed: {source}")]
    Upstream {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

/// The return type for anything that talks to the outside world.
pub type ShopResult<T> = Result<T, ShopError>;

impl ShopError {
    pub fn status(&self) -> StatusCode {
        match self {
            ShopError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            ShopError::Payment(_) => StatusCode::PAYMENT_REQUIRED,
            ShopError::Email(_) | ShopError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ShopError::Database(_) | ShopError::Migration(_) | ShopError::Hashing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ShopError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = json!({
            "message": self.to_string(),
            "statusCode": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
