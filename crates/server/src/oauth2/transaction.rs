//! Pending authorization transactions.
//!
//! While the user is away at the login or consent UI the authorize request is
//! carried as a short-lived HS256 token (`transaction_id`). `/continue` and the
//! consent form hand it back; nothing about an in-flight authorization is kept
//! server-side.
//!
//! A transaction sealed while a user is logged in names that user, and only
//! their session may redeem it. Transactions sealed for the login prompt are
//! unbound until the `/continue` after login seals them again.

use crate::error::OAuth2Error;
use crate::oauth2::{ResponseKind, Scope};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

const TRANSACTION_AUDIENCE: &str = "authorization-transaction";
pub const TRANSACTION_LIFETIME: i64 = 600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub client_id: String,
    pub redirect_uri: String,
    pub response_type: ResponseKind,
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    aud: String,
    exp: i64,
}

impl PendingAuthorization {
    pub fn new(
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        response_type: ResponseKind,
        scope: &Scope,
        state: Option<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            response_type,
            scope: scope.to_string(),
            state,
            user_id: None,
            aud: TRANSACTION_AUDIENCE.to_string(),
            exp: 0,
        }
    }

    pub fn bound_to(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// True only for a bound transaction whose user is `user_id`.
    pub fn is_held_by(&self, user_id: Option<&str>) -> bool {
        matches!((self.user_id.as_deref(), user_id), (Some(owner), Some(user)) if owner == user)
    }

    pub fn scopes(&self) -> Scope {
        Scope::parse(&self.scope)
    }

    pub fn expires_at(&self) -> i64 {
        self.exp
    }
}

#[derive(Clone)]
pub struct TransactionCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: i64,
}

impl TransactionCodec {
    pub fn new(secret: &str) -> Self {
        Self::with_lifetime(secret, TRANSACTION_LIFETIME)
    }

    pub fn with_lifetime(secret: &str, lifetime: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime,
        }
    }

    pub fn seal(&self, pending: &PendingAuthorization) -> Result<String, OAuth2Error> {
        let mut claims = pending.clone();
        claims.exp = OffsetDateTime::now_utc().unix_timestamp() + self.lifetime;
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    pub fn open(&self, transaction_id: &str) -> Result<PendingAuthorization, OAuth2Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[TRANSACTION_AUDIENCE]);
        validation.leeway = 0;

        decode::<PendingAuthorization>(transaction_id, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected authorization transaction");
                OAuth2Error::InvalidTransaction
            })
    }
}
