//! SeaORM entities for every record the authorization server persists.

pub mod oauth2_access_token;
pub mod oauth2_authorization_code;
pub mod oauth2_client;
pub mod oauth2_device;
pub mod oauth2_grant;
pub mod oauth2_refresh_token;
pub mod oauth2_user;
