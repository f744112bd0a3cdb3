//! OAuth2 authorization server with OpenID Connect identity tokens.
//!
//! ## Flow
//!
//! 1. `/authorize` validates the client and asks [`decision::decide`] whether
//!    the user must log in, consent, or can be approved right away.
//! 2. Interaction round-trips through the login and consent UIs and comes back
//!    through `/continue` with a sealed [`transaction::PendingAuthorization`].
//! 3. On approval the [`issuer::Issuer`] mints an authorization code (or, for
//!    `response_type=token`, an access token).
//! 4. `/token` authenticates the client and exchanges the code for access,
//!    refresh and identity tokens, optionally binding a native SSO device.

pub mod claims;
pub mod client_auth;
pub mod decision;
pub mod device;
pub mod endpoints;
pub mod issuer;
pub mod minter;
pub mod session;
pub mod state;
pub mod store;
pub mod transaction;
mod types;

pub use endpoints::{discovery_router, router};
pub use session::SessionInfo;
pub use state::OAuth2State;
pub use types::{
    Client, ClientType, DEVICE_SSO_SCOPE, EMAIL_SCOPE, ExchangeKind, OPENID_SCOPE, PHONE_SCOPE,
    PROFILE_SCOPE, ResponseKind, Scope,
};

/// OpenAPI tag for OAuth2 endpoints
pub const OAUTH2_TAG: &str = "OAuth2";
