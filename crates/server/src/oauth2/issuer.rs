//! Grant and token issuer.
//!
//! The top of the flow turns an approved authorization into a code (or, for
//! the implicit-style grant, directly into an access token). The bottom of the
//! flow exchanges that code for tokens at the token endpoint.
//!
//! Response and exchange kinds are dispatched through [`Issuer::grant`] and
//! [`Issuer::exchange`]; each kind maps to exactly one handler.

use crate::config::OAuth2Config;
use crate::entity::{
    oauth2_access_token, oauth2_authorization_code, oauth2_grant, oauth2_refresh_token,
    oauth2_user,
};
use crate::error::{OAuth2Error, StoreError};
use crate::oauth2::claims::{ClaimContext, IdTokenSigner, IdentityClaims};
use crate::oauth2::device::bind_device;
use crate::oauth2::minter::{
    ACCESS_TOKEN_BYTES, AUTHORIZATION_CODE_BYTES, REFRESH_TOKEN_BYTES, random_value,
};
use crate::oauth2::store::CredentialStore;
use crate::oauth2::{
    Client, DEVICE_SSO_SCOPE, ExchangeKind, OPENID_SCOPE, ResponseKind, Scope,
};
use crate::timestamp::format_utc;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

/// Everything needed to hand out a credential for an approved request.
#[derive(Debug, Clone)]
pub struct Approval<'a> {
    pub client: &'a Client,
    pub redirect_uri: &'a str,
    pub user: &'a oauth2_user::Model,
    pub grant: &'a oauth2_grant::Model,
    pub scope: &'a Scope,
    pub session_id: &'a str,
}

/// The credential returned to the client through the redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantResponse {
    Code(String),
    Token(String),
}

/// Parameters of a token request beyond the client itself.
#[derive(Debug, Clone, Default)]
pub struct ExchangeRequest {
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub device_secret: Option<String>,
}

/// Extra response parameters accumulated during an exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeParams {
    pub expires_in: i64,
    pub device_secret: Option<String>,
    pub id_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    pub scope: Scope,
    pub params: ExchangeParams,
}

#[derive(Clone)]
pub struct Issuer {
    db: Arc<DatabaseConnection>,
    issuer_url: String,
    signer: IdTokenSigner,
    authorization_code_lifetime: i64,
    access_token_lifetime: i64,
    refresh_token_lifetime: i64,
    id_token_lifetime: i64,
}

impl Issuer {
    pub fn new(db: Arc<DatabaseConnection>, config: &OAuth2Config) -> Self {
        Self {
            db,
            issuer_url: config.issuer_url.clone(),
            signer: IdTokenSigner::new(&config.id_token_secret),
            authorization_code_lifetime: config.authorization_code_lifetime,
            access_token_lifetime: config.access_token_lifetime,
            refresh_token_lifetime: config.refresh_token_lifetime,
            id_token_lifetime: config.id_token_lifetime,
        }
    }

    /// Dispatch an approved authorization to the handler for its response kind.
    pub async fn grant(
        &self,
        kind: ResponseKind,
        approval: &Approval<'_>,
    ) -> Result<GrantResponse, OAuth2Error> {
        match kind {
            ResponseKind::Code => self.issue_code(approval).await.map(GrantResponse::Code),
            ResponseKind::Token => self
                .issue_token(approval.client, approval.user)
                .await
                .map(GrantResponse::Token),
        }
    }

    /// Dispatch a token request to the handler for its grant type.
    pub async fn exchange(
        &self,
        kind: ExchangeKind,
        client: &Client,
        request: &ExchangeRequest,
    ) -> Result<TokenSet, OAuth2Error> {
        match kind {
            ExchangeKind::AuthorizationCode => {
                let code = request
                    .code
                    .as_deref()
                    .ok_or_else(|| OAuth2Error::InvalidRequest("code is required".into()))?;
                self.exchange_code(
                    client,
                    code,
                    request.redirect_uri.as_deref(),
                    request.device_secret.as_deref(),
                )
                .await
            }
        }
    }

    /// Mint and persist a single-use authorization code.
    #[tracing::instrument(
        skip_all,
        fields(client_id = %approval.client.id, user_id = %approval.user.id, grant_id = %approval.grant.id)
    )]
    pub async fn issue_code(&self, approval: &Approval<'_>) -> Result<String, OAuth2Error> {
        let code = random_value(AUTHORIZATION_CODE_BYTES)?;
        let expires_at =
            OffsetDateTime::now_utc() + Duration::seconds(self.authorization_code_lifetime);

        let record = oauth2_authorization_code::Model {
            code: code.clone(),
            client_id: approval.client.id.clone(),
            redirect_uri: approval.redirect_uri.to_string(),
            user_id: approval.user.id.clone(),
            grant_id: approval.grant.id.clone(),
            scope: approval.scope.to_string(),
            session_id: approval.session_id.to_string(),
            expires_at: format_utc(expires_at)?,
        };
        CredentialStore::new(self.db.as_ref())
            .insert_authorization_code(record)
            .await?;

        tracing::info!(scope = %approval.scope, "Issued authorization code");
        Ok(code)
    }

    /// Implicit-style grant: an unscoped, non-expiring access token.
    #[tracing::instrument(skip_all, fields(client_id = %client.id, user_id = %user.id))]
    pub async fn issue_token(
        &self,
        client: &Client,
        user: &oauth2_user::Model,
    ) -> Result<String, OAuth2Error> {
        let token = random_value(ACCESS_TOKEN_BYTES)?;
        CredentialStore::new(self.db.as_ref())
            .insert_access_token(oauth2_access_token::Model {
                token: token.clone(),
                user_id: user.id.clone(),
                client_id: client.id.clone(),
                scope: None,
                expires_at: None,
            })
            .await?;

        tracing::info!("Issued access token through token grant");
        Ok(token)
    }

    /// Redeem an authorization code for access, refresh and identity tokens.
    ///
    /// All writes happen in one transaction that commits only after every
    /// step succeeded. A rejected code is left untouched; a failed insert
    /// leaves no tokens behind.
    #[tracing::instrument(skip_all, fields(client_id = %client.id))]
    pub async fn exchange_code(
        &self,
        client: &Client,
        code: &str,
        redirect_uri: Option<&str>,
        device_secret: Option<&str>,
    ) -> Result<TokenSet, OAuth2Error> {
        let txn = self.db.begin().await.map_err(StoreError::from)?;
        match self
            .redeem(&txn, client, code, redirect_uri, device_secret)
            .await
        {
            Ok(tokens) => {
                txn.commit().await.map_err(StoreError::from)?;
                Ok(tokens)
            }
            Err(e) => {
                if let Err(rollback) = txn.rollback().await {
                    tracing::error!(error = %rollback, "Failed to roll back code exchange");
                }
                Err(e)
            }
        }
    }

    async fn redeem(
        &self,
        txn: &DatabaseTransaction,
        client: &Client,
        code: &str,
        redirect_uri: Option<&str>,
        device_secret: Option<&str>,
    ) -> Result<TokenSet, OAuth2Error> {
        let store = CredentialStore::new(txn);
        let now = OffsetDateTime::now_utc();

        let row = store
            .redeem_authorization_code(code)
            .await?
            .ok_or(OAuth2Error::InvalidGrant("authorization code not found"))?;
        if row.client_id != client.id {
            tracing::warn!(code_client_id = %row.client_id, "Authorization code presented by another client");
            return Err(OAuth2Error::InvalidGrant(
                "authorization code was issued to another client",
            ));
        }
        if redirect_uri != Some(row.redirect_uri.as_str()) {
            return Err(OAuth2Error::InvalidGrant("redirect URI mismatch"));
        }
        if row.is_expired_at(now)? {
            return Err(OAuth2Error::InvalidGrant("authorization code expired"));
        }

        let scope = row.scopes();
        let mut params = ExchangeParams::default();

        let device = if scope.contains(DEVICE_SSO_SCOPE) {
            let bound = bind_device(&store, device_secret).await?;
            params.device_secret = Some(bound.device.secret.clone());
            Some(bound)
        } else {
            None
        };

        let access_token = random_value(ACCESS_TOKEN_BYTES)?;
        store
            .insert_access_token(oauth2_access_token::Model {
                token: access_token.clone(),
                user_id: row.user_id.clone(),
                client_id: row.client_id.clone(),
                scope: Some(scope.to_string()),
                expires_at: Some(format_utc(
                    now + Duration::seconds(self.access_token_lifetime),
                )?),
            })
            .await?;
        params.expires_in = self.access_token_lifetime;

        let refresh_token = random_value(REFRESH_TOKEN_BYTES)?;
        store
            .insert_refresh_token(oauth2_refresh_token::Model {
                token: refresh_token.clone(),
                grant_id: row.grant_id.clone(),
                expires_at: format_utc(now + Duration::seconds(self.refresh_token_lifetime))?,
            })
            .await?;

        if scope.contains(OPENID_SCOPE) {
            let user = store.find_user(&row.user_id).await?.ok_or_else(|| {
                OAuth2Error::Internal(format!("Failed to resolve user \"{}\"", row.user_id))
            })?;
            let claims = IdentityClaims::assemble(&ClaimContext {
                issuer: &self.issuer_url,
                user: &user,
                client_id: &row.client_id,
                session_id: &row.session_id,
                scope: &scope,
                device_secret: device.as_ref().map(|d| d.device.secret.as_str()),
                issued_at: now,
                lifetime: self.id_token_lifetime,
            });
            params.id_token = Some(self.signer.sign(&claims)?);
        }

        tracing::info!(
            user_id = %row.user_id,
            grant_id = %row.grant_id,
            scope = %scope,
            device_minted = device.as_ref().map(|d| d.minted),
            "Exchanged authorization code"
        );
        Ok(TokenSet {
            access_token,
            refresh_token,
            scope,
            params,
        })
    }
}
