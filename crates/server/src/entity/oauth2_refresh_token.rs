//! OAuth2 Refresh Token entity.
//!
//! Refresh tokens hang off the grant rather than an access token, so they stay
//! meaningful however many access tokens the grant has minted.

use crate::error::StoreError;
use crate::timestamp;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oauth2_refresh_token")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub token: String,
    pub grant_id: String,
    pub expires_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::oauth2_grant::Entity",
        from = "Column::GrantId",
        to = "super::oauth2_grant::Column::Id"
    )]
    Grant,
}

impl Related<super::oauth2_grant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Grant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn expiry(&self) -> Result<OffsetDateTime, StoreError> {
        timestamp::parse_utc(&self.expires_at)
    }
}
