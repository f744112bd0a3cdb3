//! OAuth2 HTTP endpoints.
//!
//! - `GET /oauth2/authorize` starts an authorization
//! - `GET /oauth2/continue` resumes it after login or consent
//! - `POST /oauth2/consent` records the user's consent decision
//! - `POST /oauth2/token` exchanges an authorization code
//! - `GET /.well-known/openid-configuration` serves discovery metadata

use crate::error::{ErrorKind, ErrorResponse, OAuth2Error};
use crate::oauth2::client_auth::ClientCredentials;
use crate::oauth2::decision::{self, AuthorizationRequest, Interaction, Locals, Outcome};
use crate::oauth2::issuer::{Approval, ExchangeRequest, GrantResponse};
use crate::oauth2::session::SessionInfo;
use crate::oauth2::store::CredentialStore;
use crate::oauth2::transaction::PendingAuthorization;
use crate::oauth2::{
    Client, DEVICE_SSO_SCOPE, EMAIL_SCOPE, ExchangeKind, OAUTH2_TAG, OPENID_SCOPE, PHONE_SCOPE,
    PROFILE_SCOPE, ResponseKind, Scope, state::OAuth2State,
};
use axum::{
    Extension, Form, Json,
    extract::{Query, State},
    http::{
        HeaderMap,
        header::{CACHE_CONTROL, PRAGMA},
    },
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use url::{Url, form_urlencoded};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Where the login UI lives. It is handed a `return_to` URL.
const LOGIN_PATH: &str = "/login";
/// Where the consent UI lives. Reconsent appends the grant id.
const CONSENT_PATH: &str = "/consent";
const CONTINUE_PATH: &str = "/oauth2/continue";

/// Routes mounted under `/oauth2`.
pub fn router(state: OAuth2State) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(authorize))
        .routes(routes!(continue_authorization))
        .routes(routes!(consent))
        .routes(routes!(token))
        .with_state(state)
}

/// Routes mounted at the server root.
pub fn discovery_router(state: OAuth2State) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(openid_configuration))
        .with_state(state)
}

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct AuthorizeRequest {
    /// `code` or `token`
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    /// Must equal the registered redirect URI when present
    pub redirect_uri: Option<String>,
    /// Space-separated list of requested scopes
    pub scope: Option<String>,
    /// Opaque value returned unchanged to the client
    pub state: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ContinueRequest {
    pub transaction_id: String,
    /// Grant the consent UI recorded for this authorization
    pub grant_id: Option<String>,
    /// Scope the user approved
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConsentAction {
    Approve,
    Deny,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConsentForm {
    pub transaction_id: String,
    pub action: ConsentAction,
    /// Approved scope; defaults to everything requested
    pub scope: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Secret of a previously bound device, for native SSO
    pub device_secret: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: String,
    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_secret: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OpenIdConfiguration {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub response_types_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub subject_types_supported: Vec<String>,
    pub id_token_signing_alg_values_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub claims_supported: Vec<String>,
}

// =============================================================================
// Endpoints
// =============================================================================

/// OAuth2 Authorization endpoint.
#[tracing::instrument(skip(state, session))]
#[utoipa::path(
    get,
    path = "/authorize",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Authorize",
    summary = "Start an authorization",
    description = "Validates the client and redirect URI, then decides whether the request can be \
                   approved immediately or needs the user to log in or consent first.\n\n\
                   **Outcomes:**\n\
                   - Redirect to the login UI when no user is logged in\n\
                   - Redirect to the consent UI for new clients, public clients and widened scopes\n\
                   - Redirect back to the client with `code` (query) or `access_token` (fragment)\n\n\
                   **Supported scopes:** `openid`, `profile`, `email`, `phone`, `device_sso`",
    params(
        ("response_type" = String, Query, description = "`code` for the authorization code flow, `token` for the implicit grant."),
        ("client_id" = String, Query, description = "The client identifier."),
        ("redirect_uri" = Option<String>, Query, description = "Must equal the redirect URI registered for the client. Defaults to it."),
        ("scope" = Option<String>, Query, description = "Space-separated list of requested scopes."),
        ("state" = Option<String>, Query, description = "Opaque value returned unchanged in the final redirect."),
    ),
    responses(
        (status = 303, description = "Redirect to the login or consent UI, or back to the client"),
        (status = 400, description = "Unknown client or redirect URI mismatch", body = ErrorResponse),
    )
)]
pub async fn authorize(
    State(state): State<OAuth2State>,
    session: Option<Extension<SessionInfo>>,
    Query(params): Query<AuthorizeRequest>,
) -> Response {
    // Nothing may be redirected anywhere until the redirect URI is trusted.
    let (client, redirect_uri) = match registered_client(
        &state,
        params.client_id.as_deref(),
        params.redirect_uri.as_deref(),
    )
    .await
    {
        Ok(resolved) => resolved,
        Err(e) => return e.into_response(),
    };

    let kind = match params
        .response_type
        .as_deref()
        .unwrap_or_default()
        .parse::<ResponseKind>()
    {
        Ok(kind) => kind,
        Err(e) => {
            let placeholder = PendingAuthorization::new(
                &client.id,
                redirect_uri,
                ResponseKind::Code,
                &Scope::default(),
                params.state,
            );
            return fail(&placeholder, e);
        }
    };

    let scope = Scope::parse(params.scope.as_deref().unwrap_or_default());
    let pending = PendingAuthorization::new(&client.id, redirect_uri, kind, &scope, params.state);
    evaluate(&state, session.as_deref(), &client, pending, Locals::default()).await
}

/// Resume an authorization after the login or consent UI.
#[tracing::instrument(skip(state, session, params), fields(grant_id = ?params.grant_id))]
#[utoipa::path(
    get,
    path = "/continue",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Continue",
    summary = "Resume a pending authorization",
    description = "Re-enters the authorization decision with the transaction issued by `/authorize`. \
                   When `grant_id` is present the decision is taken from that grant, which must belong \
                   to the logged-in user and the requesting client. A transaction issued to a \
                   logged-in user is only accepted from that user's session.",
    params(
        ("transaction_id" = String, Query, description = "The pending authorization handed to the login or consent UI."),
        ("grant_id" = Option<String>, Query, description = "Grant recorded by the consent UI."),
        ("scope" = Option<String>, Query, description = "Scope approved by the user."),
    ),
    responses(
        (status = 303, description = "Redirect to the login or consent UI, or back to the client"),
        (status = 400, description = "Invalid, expired or foreign transaction", body = ErrorResponse),
    )
)]
pub async fn continue_authorization(
    State(state): State<OAuth2State>,
    session: Option<Extension<SessionInfo>>,
    Query(params): Query<ContinueRequest>,
) -> Response {
    let pending = match state.transactions.open(&params.transaction_id) {
        Ok(pending) => pending,
        Err(e) => return e.into_response(),
    };
    let session_user = session.as_deref().and_then(|s| s.user_id.as_deref());
    let bound = pending.user_id.is_some() || params.grant_id.is_some();
    if bound && !pending.is_held_by(session_user) {
        tracing::warn!(
            client_id = %pending.client_id,
            user_id = ?session_user,
            "Transaction presented by a different user"
        );
        return OAuth2Error::InvalidTransaction.into_response();
    }
    let client = match registered_client(
        &state,
        Some(&pending.client_id),
        Some(&pending.redirect_uri),
    )
    .await
    {
        Ok((client, _)) => client,
        Err(e) => return e.into_response(),
    };

    let locals = Locals {
        grant_id: params.grant_id,
        scope: params.scope.as_deref().map(Scope::parse),
    };
    evaluate(&state, session.as_deref(), &client, pending, locals).await
}

/// Record the user's consent decision.
#[tracing::instrument(skip(state, session, form), fields(action = ?form.action))]
#[utoipa::path(
    post,
    path = "/consent",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Consent",
    summary = "Approve or deny a pending authorization",
    description = "Submitted by the consent UI. Approving records the scope on the user's grant for \
                   the client (widening it if one exists) and continues the authorization. Denying \
                   redirects back to the client with `error=access_denied`.",
    request_body(
        content = ConsentForm,
        content_type = "application/x-www-form-urlencoded",
        description = "Consent decision"
    ),
    responses(
        (status = 303, description = "Redirect to `/oauth2/continue` or back to the client"),
        (status = 400, description = "Invalid, expired or foreign transaction", body = ErrorResponse),
        (status = 401, description = "No user is logged in", body = ErrorResponse),
    )
)]
pub async fn consent(
    State(state): State<OAuth2State>,
    session: Option<Extension<SessionInfo>>,
    Form(form): Form<ConsentForm>,
) -> Result<Response, OAuth2Error> {
    let user_id = session
        .as_deref()
        .and_then(|s| s.user_id.clone())
        .ok_or(OAuth2Error::LoginRequired)?;
    let pending = state.transactions.open(&form.transaction_id)?;
    if !pending.is_held_by(Some(&user_id)) {
        tracing::warn!(client_id = %pending.client_id, %user_id, "Consent for another user's transaction");
        return Err(OAuth2Error::InvalidTransaction);
    }

    if form.action == ConsentAction::Deny {
        tracing::info!(client_id = %pending.client_id, %user_id, "User denied authorization");
        return Ok(
            match client_error_uri(
                &pending,
                "access_denied",
                Some("The user denied the request"),
            ) {
                Ok(uri) => Redirect::to(&uri).into_response(),
                Err(e) => e.into_response(),
            },
        );
    }

    let requested = pending.scopes();
    let approved = form
        .scope
        .as_deref()
        .map(Scope::parse)
        .unwrap_or_else(|| requested.clone());
    if !approved.is_subset_of(&requested) {
        return Err(OAuth2Error::InvalidRequest(format!(
            "approved scope includes {:?} which was not requested",
            approved.missing_from(&requested)
        )));
    }

    let store = CredentialStore::new(state.db.as_ref());
    store
        .find_client(&pending.client_id)
        .await?
        .ok_or_else(|| OAuth2Error::UnknownClient(pending.client_id.clone()))?;
    let grant = store
        .record_grant(&user_id, &pending.client_id, &approved)
        .await?;
    tracing::info!(grant_id = %grant.id, scope = %approved, "Recorded consent");

    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("transaction_id", &form.transaction_id)
        .append_pair("grant_id", &grant.id)
        .append_pair("scope", &approved.to_string())
        .finish();
    Ok(Redirect::to(&format!("{CONTINUE_PATH}?{query}")).into_response())
}

/// OAuth2 Token endpoint.
#[tracing::instrument(skip(state, headers, params), fields(grant_type = ?params.grant_type))]
#[utoipa::path(
    post,
    path = "/token",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Token",
    summary = "Exchange an authorization code for tokens",
    description = "Redeems a single-use authorization code for an access token and a refresh token. \
                   An identity token is included when `openid` was granted. With `device_sso` the \
                   response carries a `device_secret` that later exchanges can present to bind to \
                   the same device.\n\n\
                   **Client authentication:** HTTP Basic, or `client_id` and `client_secret` in the body.",
    request_body(
        content = TokenRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Token request parameters"
    ),
    responses(
        (status = 200, description = "Tokens issued", body = TokenResponse),
        (status = 400, description = "Invalid, expired or already redeemed code", body = ErrorResponse),
        (status = 401, description = "Client authentication failed", body = ErrorResponse),
    )
)]
pub async fn token(
    State(state): State<OAuth2State>,
    headers: HeaderMap,
    Form(params): Form<TokenRequest>,
) -> Result<Response, OAuth2Error> {
    let credentials = ClientCredentials::from_request(
        &headers,
        params.client_id.as_deref(),
        params.client_secret.as_deref(),
    )?;
    let client = state.clients.authenticate(&credentials).await?;

    let kind: ExchangeKind = params
        .grant_type
        .as_deref()
        .ok_or_else(|| OAuth2Error::InvalidRequest("grant_type is required".into()))?
        .parse()?;
    let request = ExchangeRequest {
        code: params.code,
        redirect_uri: params.redirect_uri,
        device_secret: params.device_secret,
    };
    let tokens = state.issuer.exchange(kind, &client, &request).await?;

    let body = TokenResponse {
        access_token: tokens.access_token,
        token_type: "Bearer".to_string(),
        expires_in: tokens.params.expires_in,
        refresh_token: tokens.refresh_token,
        scope: tokens.scope.to_string(),
        id_token: tokens.params.id_token,
        device_secret: tokens.params.device_secret,
    };
    Ok((
        [(CACHE_CONTROL, "no-store"), (PRAGMA, "no-cache")],
        Json(body),
    )
        .into_response())
}

/// OpenID Connect Discovery document.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/.well-known/openid-configuration",
    tag = OAUTH2_TAG,
    operation_id = "OpenID Connect Discovery",
    summary = "OpenID Connect Discovery document",
    description = "Metadata about the endpoints, response types, scopes and claims this server supports.",
    responses(
        (status = 200, description = "OpenID Connect configuration document", body = OpenIdConfiguration),
    )
)]
pub async fn openid_configuration(State(state): State<OAuth2State>) -> Json<OpenIdConfiguration> {
    let strings = |values: &[&str]| values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
    Json(OpenIdConfiguration {
        issuer: state.issuer_url.clone(),
        authorization_endpoint: format!("{}/oauth2/authorize", state.issuer_url),
        token_endpoint: format!("{}/oauth2/token", state.issuer_url),
        response_types_supported: strings(&[
            ResponseKind::Code.as_str(),
            ResponseKind::Token.as_str(),
        ]),
        grant_types_supported: strings(&["authorization_code"]),
        subject_types_supported: strings(&["public"]),
        id_token_signing_alg_values_supported: strings(&["HS256"]),
        scopes_supported: strings(&[
            OPENID_SCOPE,
            PROFILE_SCOPE,
            EMAIL_SCOPE,
            PHONE_SCOPE,
            DEVICE_SSO_SCOPE,
        ]),
        token_endpoint_auth_methods_supported: strings(&[
            "client_secret_basic",
            "client_secret_post",
        ]),
        claims_supported: strings(&[
            "iss",
            "sub",
            "aud",
            "sid",
            "iat",
            "exp",
            "name",
            "preferred_username",
            "email",
            "email_verified",
            "phone_number",
            "phone_number_verified",
            "ds_hash",
        ]),
    })
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Look up the client and settle the redirect URI for this request.
async fn registered_client(
    state: &OAuth2State,
    client_id: Option<&str>,
    redirect_uri: Option<&str>,
) -> Result<(Client, String), OAuth2Error> {
    let client_id = client_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| OAuth2Error::InvalidRequest("client_id is required".into()))?;
    let record = CredentialStore::new(state.db.as_ref())
        .find_client(client_id)
        .await?
        .ok_or_else(|| OAuth2Error::UnknownClient(client_id.to_string()))?;

    let redirect_uri = match redirect_uri {
        Some(uri) if uri != record.redirect_uri => {
            tracing::warn!(client_id, redirect_uri = uri, "Redirect URI mismatch");
            return Err(OAuth2Error::RedirectMismatch(client_id.to_string()));
        }
        Some(uri) => uri.to_string(),
        None => record.redirect_uri.clone(),
    };
    Ok((Client::from(record), redirect_uri))
}

async fn evaluate(
    state: &OAuth2State,
    session: Option<&SessionInfo>,
    client: &Client,
    pending: PendingAuthorization,
    locals: Locals,
) -> Response {
    match proceed(state, session, client, &pending, &locals).await {
        Ok(response) => response,
        Err(e) => fail(&pending, e),
    }
}

async fn proceed(
    state: &OAuth2State,
    session: Option<&SessionInfo>,
    client: &Client,
    pending: &PendingAuthorization,
    locals: &Locals,
) -> Result<Response, OAuth2Error> {
    let store = CredentialStore::new(state.db.as_ref());
    let user = match session.and_then(|s| s.user_id.as_deref()) {
        Some(user_id) => {
            let user = store.find_user(user_id).await?;
            if user.is_none() {
                tracing::warn!(user_id, "Session refers to an unknown user");
            }
            user
        }
        None => None,
    };

    let request = AuthorizationRequest {
        kind: pending.response_type,
        scope: pending.scopes(),
    };
    let outcome = decision::decide(&store, user.as_ref(), client, &request, locals).await?;
    tracing::debug!(prompt = ?outcome.prompt(), "Authorization decision");

    match outcome {
        Outcome::RequireLogin => {
            let transaction_id = state.transactions.seal(pending)?;
            Ok(Redirect::to(&login_uri(&transaction_id)).into_response())
        }
        Outcome::RequireInteraction(interaction) => {
            let Some(user) = user.as_ref() else {
                return Err(OAuth2Error::LoginRequired);
            };
            let transaction_id = state
                .transactions
                .seal(&pending.clone().bound_to(&user.id))?;
            Ok(Redirect::to(&interaction_uri(&transaction_id, &interaction)).into_response())
        }
        Outcome::Approved { grant, scope } => {
            let (Some(user), Some(session)) = (user.as_ref(), session) else {
                return Err(OAuth2Error::LoginRequired);
            };
            let approval = Approval {
                client,
                redirect_uri: &pending.redirect_uri,
                user,
                grant: &grant,
                scope: &scope,
                session_id: &session.session_id,
            };
            let granted = state.issuer.grant(pending.response_type, &approval).await?;
            Ok(Redirect::to(&success_uri(pending, &granted)?).into_response())
        }
    }
}

fn login_uri(transaction_id: &str) -> String {
    let return_to = format!(
        "{CONTINUE_PATH}?{}",
        form_urlencoded::Serializer::new(String::new())
            .append_pair("transaction_id", transaction_id)
            .finish()
    );
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("return_to", &return_to)
        .finish();
    format!("{LOGIN_PATH}?{query}")
}

fn interaction_uri(transaction_id: &str, interaction: &Interaction) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("transaction_id", transaction_id);
    match interaction {
        Interaction::Consent { client, scope } => {
            query
                .append_pair("client_id", &client.id)
                .append_pair("scope", &scope.to_string());
            format!("{CONSENT_PATH}?{}", query.finish())
        }
        Interaction::Reconsent { grant, scope, .. } => {
            query.append_pair("scope", &scope.to_string());
            format!("{CONSENT_PATH}/{}?{}", grant.id, query.finish())
        }
    }
}

fn success_uri(
    pending: &PendingAuthorization,
    granted: &GrantResponse,
) -> Result<String, OAuth2Error> {
    let mut pairs = match granted {
        GrantResponse::Code(code) => vec![("code", code.as_str())],
        GrantResponse::Token(token) => {
            vec![("access_token", token.as_str()), ("token_type", "Bearer")]
        }
    };
    if let Some(state) = pending.state.as_deref() {
        pairs.push(("state", state));
    }
    client_redirect(&pending.redirect_uri, pending.response_type, &pairs)
}

fn client_error_uri(
    pending: &PendingAuthorization,
    error: &str,
    description: Option<&str>,
) -> Result<String, OAuth2Error> {
    let mut pairs = vec![("error", error)];
    if let Some(description) = description {
        pairs.push(("error_description", description));
    }
    if let Some(state) = pending.state.as_deref() {
        pairs.push(("state", state));
    }
    client_redirect(&pending.redirect_uri, pending.response_type, &pairs)
}

/// Code responses go in the query, token responses in the fragment.
fn client_redirect(
    redirect_uri: &str,
    kind: ResponseKind,
    pairs: &[(&str, &str)],
) -> Result<String, OAuth2Error> {
    let mut url = Url::parse(redirect_uri).map_err(|e| {
        OAuth2Error::Internal(format!("Registered redirect URI {redirect_uri:?} is invalid: {e}"))
    })?;
    match kind {
        ResponseKind::Code => {
            url.query_pairs_mut().extend_pairs(pairs);
        }
        ResponseKind::Token => {
            let fragment = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish();
            url.set_fragment(Some(&fragment));
        }
    }
    Ok(url.to_string())
}

/// Report a failed authorization to the client once its redirect URI is trusted.
fn fail(pending: &PendingAuthorization, error: OAuth2Error) -> Response {
    if error.kind() == ErrorKind::Internal {
        return error.into_response();
    }
    tracing::info!(
        client_id = %pending.client_id,
        error = %error,
        "Authorization failed, redirecting to client"
    );
    let description = error.description();
    match client_error_uri(pending, error.error_code(), description.as_deref()) {
        Ok(uri) => Redirect::to(&uri).into_response(),
        Err(e) => e.into_response(),
    }
}
