//! Client authentication at the token endpoint.
//!
//! Credentials arrive either as an HTTP Basic `Authorization` header or as
//! `client_id`/`client_secret` fields in the form body. Each source has its
//! own [`ClientAuthenticator`]; [`ClientAuthentication`] picks the right one.

use crate::error::OAuth2Error;
use crate::oauth2::Client;
use crate::oauth2::store::CredentialStore;
use async_trait::async_trait;
use axum::http::{HeaderMap, header::AUTHORIZATION};
use base64::Engine;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use subtle::ConstantTimeEq;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    HttpBasic,
    RequestBody,
}

#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub source: CredentialSource,
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("source", &self.source)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl ClientCredentials {
    /// Extract credentials from the request, preferring the Basic header.
    ///
    /// A present but malformed Basic header is rejected outright rather than
    /// falling back to the body.
    pub fn from_request(
        headers: &HeaderMap,
        body_client_id: Option<&str>,
        body_client_secret: Option<&str>,
    ) -> Result<Self, OAuth2Error> {
        if let Some(value) = headers.get(AUTHORIZATION) {
            let encoded = value
                .to_str()
                .ok()
                .and_then(|v| v.strip_prefix("Basic "))
                .ok_or(OAuth2Error::InvalidClient)?;
            return Self::from_basic(encoded.trim());
        }

        match (body_client_id, body_client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() => Ok(Self {
                source: CredentialSource::RequestBody,
                client_id: id.to_string(),
                client_secret: secret.to_string(),
            }),
            _ => Err(OAuth2Error::InvalidClient),
        }
    }

    fn from_basic(encoded: &str) -> Result<Self, OAuth2Error> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| OAuth2Error::InvalidClient)?;
        let decoded = String::from_utf8(decoded).map_err(|_| OAuth2Error::InvalidClient)?;
        let (id, secret) = decoded.split_once(':').ok_or(OAuth2Error::InvalidClient)?;
        if id.is_empty() {
            return Err(OAuth2Error::InvalidClient);
        }
        Ok(Self {
            source: CredentialSource::HttpBasic,
            client_id: id.to_string(),
            client_secret: secret.to_string(),
        })
    }
}

/// Verifies a presented client id/secret pair.
#[async_trait]
pub trait ClientAuthenticator: Send + Sync {
    fn source(&self) -> CredentialSource;

    async fn authenticate(&self, credentials: &ClientCredentials) -> Result<Client, OAuth2Error>;
}

#[derive(Clone)]
pub struct HttpBasicAuthenticator {
    db: Arc<DatabaseConnection>,
}

impl HttpBasicAuthenticator {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ClientAuthenticator for HttpBasicAuthenticator {
    fn source(&self) -> CredentialSource {
        CredentialSource::HttpBasic
    }

    async fn authenticate(&self, credentials: &ClientCredentials) -> Result<Client, OAuth2Error> {
        verify_secret(&self.db, credentials).await
    }
}

#[derive(Clone)]
pub struct ClientPasswordAuthenticator {
    db: Arc<DatabaseConnection>,
}

impl ClientPasswordAuthenticator {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ClientAuthenticator for ClientPasswordAuthenticator {
    fn source(&self) -> CredentialSource {
        CredentialSource::RequestBody
    }

    async fn authenticate(&self, credentials: &ClientCredentials) -> Result<Client, OAuth2Error> {
        verify_secret(&self.db, credentials).await
    }
}

/// The set of authenticators the token endpoint accepts.
#[derive(Clone)]
pub struct ClientAuthentication {
    authenticators: Vec<Arc<dyn ClientAuthenticator>>,
}

impl ClientAuthentication {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            authenticators: vec![
                Arc::new(HttpBasicAuthenticator::new(db.clone())),
                Arc::new(ClientPasswordAuthenticator::new(db)),
            ],
        }
    }

    #[tracing::instrument(skip_all, fields(client_id = %credentials.client_id, source = ?credentials.source))]
    pub async fn authenticate(
        &self,
        credentials: &ClientCredentials,
    ) -> Result<Client, OAuth2Error> {
        let authenticator = self
            .authenticators
            .iter()
            .find(|a| a.source() == credentials.source)
            .ok_or(OAuth2Error::InvalidClient)?;
        authenticator.authenticate(credentials).await
    }
}

async fn verify_secret(
    db: &DatabaseConnection,
    credentials: &ClientCredentials,
) -> Result<Client, OAuth2Error> {
    let Some(record) = CredentialStore::new(db)
        .find_client(&credentials.client_id)
        .await?
    else {
        tracing::debug!("Unknown client presented credentials");
        return Err(OAuth2Error::InvalidClient);
    };

    let matches = record
        .secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .is_some_and(|stored| secrets_match(stored, &credentials.client_secret));
    if !matches {
        tracing::warn!("Client secret mismatch");
        return Err(OAuth2Error::InvalidClient);
    }

    Ok(Client::from(record))
}

fn secrets_match(stored: &str, presented: &str) -> bool {
    stored.as_bytes().ct_eq(presented.as_bytes()).into()
}
