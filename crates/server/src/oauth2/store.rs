//! Credential store: every read and write the authorization core performs.
//!
//! The store borrows any [`ConnectionTrait`], so the same operations run
//! against the pooled connection or inside a [`sea_orm::DatabaseTransaction`].
//! Code exchange relies on the latter to commit redemption and token inserts
//! as one unit.

use crate::entity::{
    oauth2_access_token, oauth2_authorization_code, oauth2_client, oauth2_device, oauth2_grant,
    oauth2_refresh_token, oauth2_user,
};
use crate::error::StoreError;
use crate::oauth2::Scope;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
};

pub struct CredentialStore<'c, C> {
    conn: &'c C,
}

impl<'c, C: ConnectionTrait> CredentialStore<'c, C> {
    pub fn new(conn: &'c C) -> Self {
        Self { conn }
    }

    pub async fn find_client(
        &self,
        client_id: &str,
    ) -> Result<Option<oauth2_client::Model>, StoreError> {
        Ok(oauth2_client::Entity::find_by_id(client_id)
            .one(self.conn)
            .await?)
    }

    pub async fn find_user(&self, user_id: &str) -> Result<Option<oauth2_user::Model>, StoreError> {
        Ok(oauth2_user::Entity::find_by_id(user_id)
            .one(self.conn)
            .await?)
    }

    pub async fn find_grant(
        &self,
        grant_id: &str,
    ) -> Result<Option<oauth2_grant::Model>, StoreError> {
        Ok(oauth2_grant::Entity::find_by_id(grant_id)
            .one(self.conn)
            .await?)
    }

    /// The grant for a (user, client) pair, if the user ever consented.
    pub async fn find_grant_for(
        &self,
        user_id: &str,
        client_id: &str,
    ) -> Result<Option<oauth2_grant::Model>, StoreError> {
        Ok(oauth2_grant::Entity::find()
            .filter(oauth2_grant::Column::UserId.eq(user_id))
            .filter(oauth2_grant::Column::ClientId.eq(client_id))
            .one(self.conn)
            .await?)
    }

    /// Record a consent decision.
    ///
    /// Creates the grant on first consent; afterwards the stored scope is the
    /// union of what was already granted and `scope`. Nothing is ever removed.
    pub async fn record_grant(
        &self,
        user_id: &str,
        client_id: &str,
        scope: &Scope,
    ) -> Result<oauth2_grant::Model, StoreError> {
        if let Some(existing) = self.find_grant_for(user_id, client_id).await? {
            let merged = existing.scopes().union(scope);
            if merged == existing.scopes() {
                return Ok(existing);
            }
            let mut active: oauth2_grant::ActiveModel = existing.into();
            active.scope = Set(merged.to_string());
            return Ok(active.update(self.conn).await?);
        }

        let grant = oauth2_grant::Model {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            client_id: client_id.to_string(),
            scope: scope.to_string(),
        };
        oauth2_grant::Entity::insert(oauth2_grant::ActiveModel::from(grant.clone()))
            .exec_without_returning(self.conn)
            .await?;
        Ok(grant)
    }

    pub async fn insert_authorization_code(
        &self,
        code: oauth2_authorization_code::Model,
    ) -> Result<(), StoreError> {
        oauth2_authorization_code::Entity::insert(oauth2_authorization_code::ActiveModel::from(
            code,
        ))
        .exec_without_returning(self.conn)
        .await?;
        Ok(())
    }

    /// Atomically read and invalidate an authorization code.
    ///
    /// The row is deleted as part of the lookup; it counts as redeemed only if
    /// this call removed it. A concurrent exchange of the same value therefore
    /// sees `None`. Inside a transaction the delete is undone on rollback.
    pub async fn redeem_authorization_code(
        &self,
        code: &str,
    ) -> Result<Option<oauth2_authorization_code::Model>, StoreError> {
        let Some(row) = oauth2_authorization_code::Entity::find_by_id(code)
            .one(self.conn)
            .await?
        else {
            return Ok(None);
        };

        let deleted = oauth2_authorization_code::Entity::delete_many()
            .filter(oauth2_authorization_code::Column::Code.eq(code))
            .exec(self.conn)
            .await?;
        if deleted.rows_affected != 1 {
            return Ok(None);
        }
        Ok(Some(row))
    }

    pub async fn insert_access_token(
        &self,
        token: oauth2_access_token::Model,
    ) -> Result<(), StoreError> {
        oauth2_access_token::Entity::insert(oauth2_access_token::ActiveModel::from(token))
            .exec_without_returning(self.conn)
            .await?;
        Ok(())
    }

    pub async fn insert_refresh_token(
        &self,
        token: oauth2_refresh_token::Model,
    ) -> Result<(), StoreError> {
        oauth2_refresh_token::Entity::insert(oauth2_refresh_token::ActiveModel::from(token))
            .exec_without_returning(self.conn)
            .await?;
        Ok(())
    }

    pub async fn find_device_by_secret(
        &self,
        secret: &str,
    ) -> Result<Option<oauth2_device::Model>, StoreError> {
        Ok(oauth2_device::Entity::find()
            .filter(oauth2_device::Column::Secret.eq(secret))
            .one(self.conn)
            .await?)
    }

    pub async fn insert_device(&self, secret: &str) -> Result<oauth2_device::Model, StoreError> {
        let device = oauth2_device::Model {
            id: uuid::Uuid::new_v4().to_string(),
            secret: secret.to_string(),
        };
        oauth2_device::Entity::insert(oauth2_device::ActiveModel::from(device.clone()))
            .exec_without_returning(self.conn)
            .await?;
        Ok(device)
    }
}
