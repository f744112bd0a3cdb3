//! Authorization decision engine.
//!
//! Given who is asking, for which client and which scope, decide whether the
//! request may proceed, needs the user to log in, or needs (re)consent. The
//! steps run in a fixed order and never backtrack:
//!
//! 1. no authenticated user: login
//! 2. resuming with a grant id from the consent UI: approve that grant
//! 3. public client or non-code response type: always consent
//! 4. existing grant covering the requested scope: approve, otherwise
//!    consent (no grant) or reconsent (scope creep)

use crate::entity::{oauth2_grant, oauth2_user};
use crate::error::OAuth2Error;
use crate::oauth2::store::CredentialStore;
use crate::oauth2::{Client, ClientType, ResponseKind, Scope};
use sea_orm::ConnectionTrait;
use std::fmt;

/// The UI an interaction redirects to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Login,
    Consent,
    Reconsent,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Prompt::Login => "login",
            Prompt::Consent => "consent",
            Prompt::Reconsent => "reconsent",
        })
    }
}

/// The parts of the authorization request the engine looks at.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub kind: ResponseKind,
    pub scope: Scope,
}

/// Decision handed back by the consent UI when a flow resumes.
#[derive(Debug, Clone, Default)]
pub struct Locals {
    pub grant_id: Option<String>,
    pub scope: Option<Scope>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    Consent {
        client: Client,
        scope: Scope,
    },
    Reconsent {
        client: Client,
        grant: oauth2_grant::Model,
        scope: Scope,
    },
}

impl Interaction {
    pub fn prompt(&self) -> Prompt {
        match self {
            Interaction::Consent { .. } => Prompt::Consent,
            Interaction::Reconsent { .. } => Prompt::Reconsent,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    RequireLogin,
    RequireInteraction(Interaction),
    Approved {
        grant: oauth2_grant::Model,
        scope: Scope,
    },
}

impl Outcome {
    /// The prompt to show, or `None` once approved.
    pub fn prompt(&self) -> Option<Prompt> {
        match self {
            Outcome::RequireLogin => Some(Prompt::Login),
            Outcome::RequireInteraction(interaction) => Some(interaction.prompt()),
            Outcome::Approved { .. } => None,
        }
    }
}

#[tracing::instrument(
    skip_all,
    fields(client_id = %client.id, user_id = user.map(|u| u.id.as_str()))
)]
pub async fn decide<C: ConnectionTrait>(
    store: &CredentialStore<'_, C>,
    user: Option<&oauth2_user::Model>,
    client: &Client,
    request: &AuthorizationRequest,
    locals: &Locals,
) -> Result<Outcome, OAuth2Error> {
    let Some(user) = user else {
        return Ok(Outcome::RequireLogin);
    };

    if let Some(grant_id) = &locals.grant_id {
        return resume(store, user, client, request, locals, grant_id).await;
    }

    if client.client_type == ClientType::Public || request.kind != ResponseKind::Code {
        return Ok(consent(client, &request.scope));
    }

    let Some(grant) = store.find_grant_for(&user.id, &client.id).await? else {
        return Ok(consent(client, &request.scope));
    };

    let granted = grant.scopes();
    if request.scope.is_subset_of(&granted) {
        tracing::debug!(grant_id = %grant.id, "Existing grant covers requested scope");
        return Ok(Outcome::Approved {
            grant,
            scope: request.scope.clone(),
        });
    }

    tracing::debug!(
        grant_id = %grant.id,
        missing = ?request.scope.missing_from(&granted),
        "Requested scope exceeds existing grant"
    );
    Ok(Outcome::RequireInteraction(Interaction::Reconsent {
        client: client.clone(),
        grant,
        scope: request.scope.clone(),
    }))
}

async fn resume<C: ConnectionTrait>(
    store: &CredentialStore<'_, C>,
    user: &oauth2_user::Model,
    client: &Client,
    request: &AuthorizationRequest,
    locals: &Locals,
    grant_id: &str,
) -> Result<Outcome, OAuth2Error> {
    let grant = store
        .find_grant(grant_id)
        .await?
        .ok_or_else(|| OAuth2Error::UnknownGrant(grant_id.to_string()))?;

    if grant.user_id != user.id {
        return Err(OAuth2Error::Forbidden {
            grant_id: grant.id,
            reason: "user",
        });
    }
    if grant.client_id != client.id {
        return Err(OAuth2Error::Forbidden {
            grant_id: grant.id,
            reason: "client",
        });
    }

    let scope = locals
        .scope
        .clone()
        .unwrap_or_else(|| request.scope.clone());
    if !scope.is_subset_of(&grant.scopes()) {
        return Err(OAuth2Error::Forbidden {
            grant_id: grant.id,
            reason: "scope",
        });
    }

    Ok(Outcome::Approved { grant, scope })
}

fn consent(client: &Client, scope: &Scope) -> Outcome {
    Outcome::RequireInteraction(Interaction::Consent {
        client: client.clone(),
        scope: scope.clone(),
    })
}
