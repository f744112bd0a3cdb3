//! Identity token claim assembly and signing.
//!
//! Optional claims are gated twice: the scope element must have been granted
//! and the user record must actually carry a value. Absent attributes are
//! omitted from the token, never emitted as `null`.

use crate::entity::oauth2_user;
use crate::oauth2::{EMAIL_SCOPE, PHONE_SCOPE, PROFILE_SCOPE, Scope};
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub sid: String,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number_verified: Option<bool>,
    /// Hash of the device secret bound during this exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ds_hash: Option<String>,
}

/// Inputs to [`IdentityClaims::assemble`].
pub struct ClaimContext<'a> {
    pub issuer: &'a str,
    pub user: &'a oauth2_user::Model,
    pub client_id: &'a str,
    pub session_id: &'a str,
    pub scope: &'a Scope,
    pub device_secret: Option<&'a str>,
    pub issued_at: OffsetDateTime,
    pub lifetime: i64,
}

fn present(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|v| !v.is_empty()).map(String::from)
}

fn truthy(flag: bool) -> Option<bool> {
    flag.then_some(true)
}

impl IdentityClaims {
    pub fn assemble(ctx: &ClaimContext<'_>) -> Self {
        let iat = ctx.issued_at.unix_timestamp();
        let mut claims = IdentityClaims {
            iss: ctx.issuer.to_string(),
            sub: ctx.user.id.clone(),
            aud: ctx.client_id.to_string(),
            sid: ctx.session_id.to_string(),
            iat,
            exp: iat + ctx.lifetime,
            name: None,
            preferred_username: None,
            email: None,
            email_verified: None,
            phone_number: None,
            phone_number_verified: None,
            ds_hash: ctx.device_secret.map(device_secret_hash),
        };

        if ctx.scope.contains(PROFILE_SCOPE) {
            claims.name = present(&ctx.user.name);
            claims.preferred_username = present(&ctx.user.username);
        }
        if ctx.scope.contains(EMAIL_SCOPE) {
            claims.email = present(&ctx.user.email);
            claims.email_verified = truthy(ctx.user.email_verified);
        }
        if ctx.scope.contains(PHONE_SCOPE) {
            claims.phone_number = present(&ctx.user.phone_number);
            claims.phone_number_verified = truthy(ctx.user.phone_number_verified);
        }
        claims
    }
}

/// Native SSO `ds_hash`: base64url of the left half of SHA-256(device secret).
pub fn device_secret_hash(device_secret: &str) -> String {
    let digest = Sha256::digest(device_secret.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2])
}

/// Signs identity tokens with HS256 and the server-held key.
#[derive(Clone)]
pub struct IdTokenSigner {
    key: EncodingKey,
}

impl IdTokenSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn sign(&self, claims: &IdentityClaims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::new(Algorithm::HS256), claims, &self.key)
    }
}
