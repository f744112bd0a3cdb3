//! An OAuth2 authorization code server with OpenID Connect identity tokens
//! and native single-sign-on device binding.
//!
//! The [`oauth2`] module holds the authorization decision engine and the
//! token issuance pipeline; [`api`] wires them into an axum router.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;

pub mod api;
pub mod config;
pub mod entity;
pub mod error;
pub mod oauth2;
pub mod timestamp;

#[derive(Clone, Debug)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
}
