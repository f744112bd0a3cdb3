//! OAuth2 Access Token entity.

use crate::error::StoreError;
use crate::timestamp;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oauth2_access_token")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub token: String,
    pub user_id: String,
    pub client_id: String,
    /// None for tokens issued through the implicit-style token grant
    pub scope: Option<String>,
    /// None for tokens issued through the implicit-style token grant
    pub expires_at: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn expiry(&self) -> Result<Option<OffsetDateTime>, StoreError> {
        self.expires_at
            .as_deref()
            .map(timestamp::parse_utc)
            .transpose()
    }
}
