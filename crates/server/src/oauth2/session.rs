//! The browser session as seen by the authorization endpoints.
//!
//! Cookie handling and login UI live in front of this service. Whatever
//! terminates the session inserts a [`SessionInfo`] request extension; the
//! endpoints read it through `Option<Extension<SessionInfo>>` and treat its
//! absence as an anonymous visitor.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    /// Set once the user has logged in
    pub user_id: Option<String>,
}

impl SessionInfo {
    pub fn anonymous(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: None,
        }
    }

    pub fn authenticated(session_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: Some(user_id.into()),
        }
    }
}
