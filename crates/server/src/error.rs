use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Failures of the credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("Invalid stored timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        #[source]
        source: time::error::Parse,
    },
    #[error("Failed to format timestamp: {0}")]
    Format(#[from] time::error::Format),
}

/// Coarse classification of [`OAuth2Error`], used to pick the response class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown client, redirect mismatch, failed client authentication.
    Client,
    /// Problems resuming an authorization after interaction.
    Authorization,
    /// The presented authorization code is not redeemable.
    GrantValidation,
    /// Malformed or unsupported protocol parameters.
    Request,
    /// Store, randomness and signing failures. Never detailed to the caller.
    Internal,
}

#[derive(Debug, Error)]
pub enum OAuth2Error {
    #[error("Unknown client \"{0}\"")]
    UnknownClient(String),
    #[error("Redirect URI does not match the one registered for client \"{0}\"")]
    RedirectMismatch(String),
    #[error("Client authentication failed")]
    InvalidClient,
    #[error("Unknown grant \"{0}\"")]
    UnknownGrant(String),
    #[error("Unauthorized grant \"{grant_id}\" for {reason}")]
    Forbidden { grant_id: String, reason: &'static str },
    #[error("Invalid or expired authorization transaction")]
    InvalidTransaction,
    #[error("User authentication required")]
    LoginRequired,
    #[error("Invalid grant: {0}")]
    InvalidGrant(&'static str),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Unsupported response type \"{0}\"")]
    UnsupportedResponseType(String),
    #[error("Unsupported grant type \"{0}\"")]
    UnsupportedGrantType(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Randomness source failure: {0}")]
    Randomness(String),
    #[error("Failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for OAuth2Error {
    fn from(err: sea_orm::DbErr) -> Self {
        OAuth2Error::Store(StoreError::Database(err))
    }
}

impl From<getrandom::Error> for OAuth2Error {
    fn from(err: getrandom::Error) -> Self {
        OAuth2Error::Randomness(err.to_string())
    }
}

impl OAuth2Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OAuth2Error::UnknownClient(_)
            | OAuth2Error::RedirectMismatch(_)
            | OAuth2Error::InvalidClient => ErrorKind::Client,
            OAuth2Error::UnknownGrant(_)
            | OAuth2Error::Forbidden { .. }
            | OAuth2Error::InvalidTransaction
            | OAuth2Error::LoginRequired => ErrorKind::Authorization,
            OAuth2Error::InvalidGrant(_) => ErrorKind::GrantValidation,
            OAuth2Error::InvalidRequest(_)
            | OAuth2Error::UnsupportedResponseType(_)
            | OAuth2Error::UnsupportedGrantType(_) => ErrorKind::Request,
            OAuth2Error::Store(_)
            | OAuth2Error::Randomness(_)
            | OAuth2Error::Signing(_)
            | OAuth2Error::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            OAuth2Error::InvalidClient | OAuth2Error::LoginRequired => StatusCode::UNAUTHORIZED,
            OAuth2Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            _ if self.kind() == ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// The protocol error code placed in the `error` field of the response.
    pub fn error_code(&self) -> &'static str {
        match self {
            OAuth2Error::UnknownClient(_) | OAuth2Error::InvalidClient => "invalid_client",
            OAuth2Error::Forbidden { .. } => "access_denied",
            OAuth2Error::LoginRequired => "login_required",
            OAuth2Error::InvalidGrant(_) => "invalid_grant",
            OAuth2Error::UnsupportedResponseType(_) => "unsupported_response_type",
            OAuth2Error::UnsupportedGrantType(_) => "unsupported_grant_type",
            OAuth2Error::RedirectMismatch(_)
            | OAuth2Error::UnknownGrant(_)
            | OAuth2Error::InvalidTransaction
            | OAuth2Error::InvalidRequest(_) => "invalid_request",
            OAuth2Error::Store(_)
            | OAuth2Error::Randomness(_)
            | OAuth2Error::Signing(_)
            | OAuth2Error::Internal(_) => "server_error",
        }
    }

    /// Description safe to hand to the requesting party.
    pub fn description(&self) -> Option<String> {
        match self.kind() {
            ErrorKind::Internal => None,
            _ => Some(self.to_string()),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl IntoResponse for OAuth2Error {
    fn into_response(self) -> Response {
        if self.kind() == ErrorKind::Internal {
            tracing::error!(error = %self, "OAuth2 request failed");
        } else {
            tracing::debug!(error = %self, "OAuth2 request rejected");
        }

        let body = ErrorResponse {
            error: self.error_code().to_string(),
            error_description: self.description(),
        };
        let mut response = (self.status(), Json(body)).into_response();
        if matches!(self, OAuth2Error::InvalidClient) {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Basic realm=\"Clients\""),
            );
        }
        response
    }
}
