use std::sync::Arc;

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde_json::json;

/// Reasons an inbound request failed authorization.
///
/// The `Display` output of each variant is its client-facing description. Together with [`AuthError::code`] and
/// [`AuthError::status`] it forms the JSON body returned by the [`IntoResponse`] implementation.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("Authorization header is expected.")]
    MissingHeader,
    #[error("{0}")]
    MalformedHeader(&'static str),
    #[error("Unable to fetch signing keys.")]
    KeyFetchFailed(#[source] Arc<JwksError>),
    #[error("Unable to find the appropriate key.")]
    UnknownSigningKey,
    #[error("Unable to parse authentication token.")]
    TokenUnparseable(#[source] jsonwebtoken::errors::Error),
    #[error("Token expired.")]
    TokenExpired,
    #[error("Incorrect claims. Please, check the audience and issuer.")]
    InvalidClaims(#[source] jsonwebtoken::errors::Error),
    #[error("Permissions not included in JWT.")]
    ClaimsMissingPermissions,
    #[error("Permission not found.")]
    PermissionDenied,
}

pub(crate) const HEADER_MUST_START_WITH_BEARER: &str = "Authorization header must start with \"bearer\".";
pub(crate) const HEADER_TOKEN_NOT_FOUND: &str = "Token not found.";
pub(crate) const HEADER_MUST_BE_BEARER_TOKEN: &str = "Authorization header must be bearer token.";
pub(crate) const HEADER_MISSING_KID: &str = "Authorization malformed.";

impl AuthError {
    /// Machine-readable error code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "authorization_header_missing",
            AuthError::MalformedHeader(_)
            | AuthError::UnknownSigningKey
            | AuthError::TokenUnparseable(_) => "invalid_header",
            AuthError::KeyFetchFailed(_) => "key_fetch_failed",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidClaims(_) | AuthError::ClaimsMissingPermissions => "invalid_claims",
            AuthError::PermissionDenied => "unauthorized",
        }
    }

    /// Human-readable explanation, as sent to the client.
    pub fn description(&self) -> String {
        self.to_string()
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingHeader
            | AuthError::MalformedHeader(_)
            | AuthError::TokenExpired
            | AuthError::InvalidClaims(_) => StatusCode::UNAUTHORIZED,
            AuthError::UnknownSigningKey
            | AuthError::TokenUnparseable(_)
            | AuthError::ClaimsMissingPermissions => StatusCode::BAD_REQUEST,
            AuthError::KeyFetchFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::PermissionDenied => StatusCode::FORBIDDEN,
        }
    }

    /// Maps a failed `jsonwebtoken` decode onto the taxonomy above.
    pub(crate) fn from_validation(error: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match error.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidAudience
            | ErrorKind::InvalidIssuer
            | ErrorKind::ImmatureSignature
            | ErrorKind::MissingRequiredClaim(_) => AuthError::InvalidClaims(error),
            _ => AuthError::TokenUnparseable(error),
        }
    }
}

impl From<JwksError> for AuthError {
    fn from(error: JwksError) -> Self {
        AuthError::KeyFetchFailed(Arc::new(error))
    }
}

impl From<Arc<JwksError>> for AuthError {
    fn from(error: Arc<JwksError>) -> Self {
        AuthError::KeyFetchFailed(error)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "success": false,
            "error": status.as_u16(),
            "message": {
                "code": self.code(),
                "description": self.description(),
            },
        }));
        (status, body).into_response()
    }
}

/// Failures while retrieving a JWK set from its remote endpoint.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum JwksError {
    #[error("failed to fetch JWK set")]
    Request(#[from] reqwest::Error),
    #[error("received error response when fetching JWK set: {status_code}")]
    ErrorResponse { status_code: StatusCode },
    #[error("failed to decode JWK set")]
    Decode(#[source] reqwest::Error),
    #[error("JWK set fetch was cancelled")]
    Cancelled,
}
