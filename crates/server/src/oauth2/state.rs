//! Shared state for the OAuth2 endpoints.

use crate::config::OAuth2Config;
use crate::oauth2::client_auth::ClientAuthentication;
use crate::oauth2::issuer::Issuer;
use crate::oauth2::transaction::TransactionCodec;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

#[derive(Clone)]
pub struct OAuth2State {
    pub db: Arc<DatabaseConnection>,
    pub issuer: Issuer,
    pub clients: ClientAuthentication,
    pub transactions: TransactionCodec,
    /// Public base URL, used as `iss` and for discovery
    pub issuer_url: String,
}

impl OAuth2State {
    pub fn new(db: Arc<DatabaseConnection>, config: &OAuth2Config) -> Self {
        Self {
            issuer: Issuer::new(db.clone(), config),
            clients: ClientAuthentication::new(db.clone()),
            transactions: TransactionCodec::new(&config.id_token_secret),
            issuer_url: config.issuer_url.trim_end_matches('/').to_string(),
            db,
        }
    }
}
