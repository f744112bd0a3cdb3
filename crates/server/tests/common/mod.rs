//! Shared fixtures for the integration tests.
//!
//! Every test gets its own `sqlite::memory:` database with the schema created
//! by raw SQL and a small fixed set of users and clients.

#![allow(dead_code)]

use native_sso_server::AppResources;
use native_sso_server::config::{AppConfig, OAuth2Config};
use native_sso_server::entity::{oauth2_client, oauth2_grant, oauth2_user};
use native_sso_server::oauth2::store::CredentialStore;
use native_sso_server::oauth2::{Client, Scope};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, Statement};
use std::sync::Arc;

pub const ISSUER: &str = "https://auth.example.com";
pub const SIGNING_KEY: &str = "0123456789abcdef0123456789abcdef";

/// Confidential client with a stored secret.
pub const CONFIDENTIAL: &str = "confidential-app";
pub const CONFIDENTIAL_SECRET: &str = "s3cret";
pub const CONFIDENTIAL_REDIRECT: &str = "https://cb.example/callback";

/// Second confidential client, for cross-client checks.
pub const OTHER: &str = "other-app";
pub const OTHER_SECRET: &str = "other-secret";
pub const OTHER_REDIRECT: &str = "https://other.example/callback";

/// Public client without a secret.
pub const PUBLIC: &str = "public-app";
pub const PUBLIC_REDIRECT: &str = "https://public.example/callback";

/// User with every profile attribute filled in.
pub const ALICE: &str = "user-alice";
/// User with no optional attributes.
pub const BOB: &str = "user-bob";

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE oauth2_client (
        id TEXT PRIMARY KEY,
        secret TEXT NULL,
        name TEXT NOT NULL,
        redirect_uri TEXT NOT NULL
    );"#,
    r#"CREATE TABLE oauth2_user (
        id TEXT PRIMARY KEY,
        name TEXT NULL,
        username TEXT NULL,
        email TEXT NULL,
        email_verified INTEGER NOT NULL DEFAULT 0,
        phone_number TEXT NULL,
        phone_number_verified INTEGER NOT NULL DEFAULT 0
    );"#,
    r#"CREATE TABLE oauth2_grant (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        client_id TEXT NOT NULL,
        scope TEXT NOT NULL,
        UNIQUE (user_id, client_id)
    );"#,
    r#"CREATE TABLE oauth2_authorization_code (
        code TEXT PRIMARY KEY,
        client_id TEXT NOT NULL,
        redirect_uri TEXT NOT NULL,
        user_id TEXT NOT NULL,
        grant_id TEXT NOT NULL,
        scope TEXT NOT NULL,
        session_id TEXT NOT NULL,
        expires_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE oauth2_access_token (
        token TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        client_id TEXT NOT NULL,
        scope TEXT NULL,
        expires_at TEXT NULL
    );"#,
    r#"CREATE TABLE oauth2_refresh_token (
        token TEXT PRIMARY KEY,
        grant_id TEXT NOT NULL,
        expires_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE oauth2_device (
        id TEXT PRIMARY KEY,
        secret TEXT NOT NULL UNIQUE
    );"#,
];

const SEED: &[&str] = &[
    r#"INSERT INTO oauth2_client (id, secret, name, redirect_uri)
       VALUES ('confidential-app', 's3cret', 'Confidential App', 'https://cb.example/callback');"#,
    r#"INSERT INTO oauth2_client (id, secret, name, redirect_uri)
       VALUES ('other-app', 'other-secret', 'Other App', 'https://other.example/callback');"#,
    r#"INSERT INTO oauth2_client (id, secret, name, redirect_uri)
       VALUES ('public-app', NULL, 'Public App', 'https://public.example/callback');"#,
    r#"INSERT INTO oauth2_user (id, name, username, email, email_verified, phone_number, phone_number_verified)
       VALUES ('user-alice', 'Alice Example', 'alice', 'alice@example.com', 1, '+15550100', 0);"#,
    r#"INSERT INTO oauth2_user (id, name, username, email, email_verified, phone_number, phone_number_verified)
       VALUES ('user-bob', NULL, NULL, NULL, 0, NULL, 0);"#,
];

pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.expect("connect");
    for sql in SCHEMA.iter().chain(SEED) {
        db.execute(Statement::from_string(DbBackend::Sqlite, *sql))
            .await
            .expect("prepare test database");
    }
    db
}

pub fn oauth2_config() -> OAuth2Config {
    OAuth2Config::new(ISSUER, SIGNING_KEY)
}

pub fn app_resources(db: DatabaseConnection) -> AppResources {
    AppResources {
        db: Arc::new(db),
        config: Arc::new(AppConfig {
            database_url: "sqlite::memory:".into(),
            listen_addr: "127.0.0.1:0".into(),
            oauth2: oauth2_config(),
        }),
    }
}

pub async fn client(db: &DatabaseConnection, id: &str) -> Client {
    let model: oauth2_client::Model = CredentialStore::new(db)
        .find_client(id)
        .await
        .expect("query client")
        .expect("seeded client");
    Client::from(model)
}

pub async fn user(db: &DatabaseConnection, id: &str) -> oauth2_user::Model {
    CredentialStore::new(db)
        .find_user(id)
        .await
        .expect("query user")
        .expect("seeded user")
}

pub async fn grant(
    db: &DatabaseConnection,
    user_id: &str,
    client_id: &str,
    scope: &str,
) -> oauth2_grant::Model {
    CredentialStore::new(db)
        .record_grant(user_id, client_id, &Scope::parse(scope))
        .await
        .expect("record grant")
}

pub async fn count(db: &DatabaseConnection, table: &str) -> i64 {
    let row = db
        .query_one(Statement::from_string(
            DbBackend::Sqlite,
            format!("SELECT COUNT(*) AS n FROM {table}"),
        ))
        .await
        .expect("count query")
        .expect("count row");
    row.try_get::<i64>("", "n").expect("count value")
}
