//! Schema for the authorization server.
//!
//! Expiry columns hold UTC timestamps as `YYYY-MM-DD HH:MM:SS` strings.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OAuth2Client::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2Client::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    // NULL or empty for public clients
                    .col(ColumnDef::new(OAuth2Client::Secret).string().null())
                    .col(ColumnDef::new(OAuth2Client::Name).string().not_null())
                    .col(ColumnDef::new(OAuth2Client::RedirectUri).text().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OAuth2User::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2User::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OAuth2User::Name).string().null())
                    .col(ColumnDef::new(OAuth2User::Username).string().null())
                    .col(ColumnDef::new(OAuth2User::Email).string().null())
                    .col(
                        ColumnDef::new(OAuth2User::EmailVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(OAuth2User::PhoneNumber).string().null())
                    .col(
                        ColumnDef::new(OAuth2User::PhoneNumberVerified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OAuth2Grant::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2Grant::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OAuth2Grant::UserId).string().not_null())
                    .col(ColumnDef::new(OAuth2Grant::ClientId).string().not_null())
                    .col(ColumnDef::new(OAuth2Grant::Scope).text().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_oauth2_grant_user")
                            .from(OAuth2Grant::Table, OAuth2Grant::UserId)
                            .to(OAuth2User::Table, OAuth2User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_oauth2_grant_client")
                            .from(OAuth2Grant::Table, OAuth2Grant::ClientId)
                            .to(OAuth2Client::Table, OAuth2Client::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One grant per (user, client); consent widens it in place
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_oauth2_grant_user_client")
                    .table(OAuth2Grant::Table)
                    .col(OAuth2Grant::UserId)
                    .col(OAuth2Grant::ClientId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OAuth2AuthorizationCode::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2AuthorizationCode::Code)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2AuthorizationCode::ClientId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2AuthorizationCode::RedirectUri)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2AuthorizationCode::UserId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2AuthorizationCode::GrantId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2AuthorizationCode::Scope)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2AuthorizationCode::SessionId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2AuthorizationCode::ExpiresAt)
                            .string()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OAuth2AccessToken::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2AccessToken::Token)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(OAuth2AccessToken::UserId).string().not_null())
                    .col(
                        ColumnDef::new(OAuth2AccessToken::ClientId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OAuth2AccessToken::Scope).text().null())
                    .col(ColumnDef::new(OAuth2AccessToken::ExpiresAt).string().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OAuth2RefreshToken::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2RefreshToken::Token)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2RefreshToken::GrantId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OAuth2RefreshToken::ExpiresAt)
                            .string()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_oauth2_refresh_token_grant")
                            .from(OAuth2RefreshToken::Table, OAuth2RefreshToken::GrantId)
                            .to(OAuth2Grant::Table, OAuth2Grant::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OAuth2Device::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OAuth2Device::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(OAuth2Device::Secret)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_oauth2_authorization_code_expires_at")
                    .table(OAuth2AuthorizationCode::Table)
                    .col(OAuth2AuthorizationCode::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_oauth2_access_token_user_id")
                    .table(OAuth2AccessToken::Table)
                    .col(OAuth2AccessToken::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_oauth2_access_token_user_id")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_oauth2_authorization_code_expires_at")
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(Index::drop().name("idx_oauth2_grant_user_client").to_owned())
            .await?;

        // Dependents before the tables they reference
        manager
            .drop_table(Table::drop().table(OAuth2Device::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OAuth2RefreshToken::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OAuth2AccessToken::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OAuth2AuthorizationCode::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OAuth2Grant::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OAuth2User::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(OAuth2Client::Table).if_exists().to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum OAuth2Client {
    #[sea_orm(iden = "oauth2_client")]
    Table,
    Id,
    Secret,
    Name,
    RedirectUri,
}

#[derive(DeriveIden)]
enum OAuth2User {
    #[sea_orm(iden = "oauth2_user")]
    Table,
    Id,
    Name,
    Username,
    Email,
    EmailVerified,
    PhoneNumber,
    PhoneNumberVerified,
}

#[derive(DeriveIden)]
enum OAuth2Grant {
    #[sea_orm(iden = "oauth2_grant")]
    Table,
    Id,
    UserId,
    ClientId,
    Scope,
}

#[derive(DeriveIden)]
enum OAuth2AuthorizationCode {
    #[sea_orm(iden = "oauth2_authorization_code")]
    Table,
    Code,
    ClientId,
    RedirectUri,
    UserId,
    GrantId,
    Scope,
    SessionId,
    ExpiresAt,
}

#[derive(DeriveIden)]
enum OAuth2AccessToken {
    #[sea_orm(iden = "oauth2_access_token")]
    Table,
    Token,
    UserId,
    ClientId,
    Scope,
    ExpiresAt,
}

#[derive(DeriveIden)]
enum OAuth2RefreshToken {
    #[sea_orm(iden = "oauth2_refresh_token")]
    Table,
    Token,
    GrantId,
    ExpiresAt,
}

#[derive(DeriveIden)]
enum OAuth2Device {
    #[sea_orm(iden = "oauth2_device")]
    Table,
    Id,
    Secret,
}
