//! Value types shared by the decision engine, the issuer and the endpoints.

use crate::entity::oauth2_client;
use crate::error::OAuth2Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const OPENID_SCOPE: &str = "openid";
pub const PROFILE_SCOPE: &str = "profile";
pub const EMAIL_SCOPE: &str = "email";
pub const PHONE_SCOPE: &str = "phone";
pub const DEVICE_SSO_SCOPE: &str = "device_sso";

/// An ordered, duplicate-free set of scope names.
///
/// Parsed from and rendered to the space-separated wire and storage form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope(Vec<String>);

impl Scope {
    pub fn parse(value: &str) -> Self {
        value.split_whitespace().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|s| s == name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Scope names in `self` that `other` does not contain.
    pub fn missing_from<'a>(&'a self, other: &Scope) -> Vec<&'a str> {
        self.iter().filter(|s| !other.contains(s)).collect()
    }

    pub fn is_subset_of(&self, other: &Scope) -> bool {
        self.iter().all(|s| other.contains(s))
    }

    /// `self` followed by every name of `other` not already present.
    pub fn union(&self, other: &Scope) -> Scope {
        self.iter().chain(other.iter()).collect()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Scope {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut names: Vec<String> = Vec::new();
        for name in iter {
            let name = name.as_ref();
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        Scope(names)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    Public,
    Confidential,
}

/// A client as seen by the authorization core: immutable for the request.
///
/// The secret is deliberately not carried past client authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub client_type: ClientType,
    pub redirect_uri: String,
}

impl From<oauth2_client::Model> for Client {
    fn from(model: oauth2_client::Model) -> Self {
        let client_type = if model.is_confidential() {
            ClientType::Confidential
        } else {
            ClientType::Public
        };
        Self {
            id: model.id,
            name: model.name,
            client_type,
            redirect_uri: model.redirect_uri,
        }
    }
}

/// What the authorization endpoint hands back on approval (`response_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Code,
    Token,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Code => "code",
            ResponseKind::Token => "token",
        }
    }
}

impl FromStr for ResponseKind {
    type Err = OAuth2Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(ResponseKind::Code),
            "token" => Ok(ResponseKind::Token),
            other => Err(OAuth2Error::UnsupportedResponseType(other.to_string())),
        }
    }
}

/// Grant types accepted at the token endpoint (`grant_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    AuthorizationCode,
}

impl FromStr for ExchangeKind {
    type Err = OAuth2Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(ExchangeKind::AuthorizationCode),
            other => Err(OAuth2Error::UnsupportedGrantType(other.to_string())),
        }
    }
}
