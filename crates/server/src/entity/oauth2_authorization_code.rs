//! OAuth2 Authorization Code entity - single-use codes exchanged for tokens.

use crate::error::StoreError;
use crate::oauth2::Scope;
use crate::timestamp;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oauth2_authorization_code")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub user_id: String,
    pub grant_id: String,
    pub scope: String,
    /// Session that approved the request, carried into the `sid` claim
    pub session_id: String,
    /// UTC, `YYYY-MM-DD HH:MM:SS`
    pub expires_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn scopes(&self) -> Scope {
        Scope::parse(&self.scope)
    }

    pub fn expiry(&self) -> Result<OffsetDateTime, StoreError> {
        timestamp::parse_utc(&self.expires_at)
    }

    /// Check if this authorization code has expired at `now`
    pub fn is_expired_at(&self, now: OffsetDateTime) -> Result<bool, StoreError> {
        Ok(now > self.expiry()?)
    }
}
