//! Grant and token issuer tests: code issuance, exchange validity rules,
//! device binding and identity token claims.

mod common;

use common::*;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use native_sso_server::entity::{
    oauth2_access_token, oauth2_authorization_code, oauth2_refresh_token, oauth2_user,
};
use native_sso_server::error::{ErrorKind, OAuth2Error};
use native_sso_server::oauth2::claims::{IdentityClaims, device_secret_hash};
use native_sso_server::oauth2::issuer::{
    Approval, ExchangeRequest, GrantResponse, Issuer, TokenSet,
};
use native_sso_server::oauth2::store::CredentialStore;
use native_sso_server::oauth2::{ExchangeKind, ResponseKind, Scope};
use native_sso_server::timestamp::format_utc;
use sea_orm::{DatabaseConnection, EntityTrait};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

const SESSION: &str = "session-1";

struct Fixture {
    db: Arc<DatabaseConnection>,
    issuer: Issuer,
}

async fn fixture() -> Fixture {
    let db = Arc::new(setup_db().await);
    let issuer = Issuer::new(db.clone(), &oauth2_config());
    Fixture { db, issuer }
}

impl Fixture {
    /// Record consent and issue a code the way an approved flow does.
    async fn approve(&self, user_id: &str, client_id: &str, scope: &str) -> String {
        let client = client(&self.db, client_id).await;
        let user = user(&self.db, user_id).await;
        let grant = grant(&self.db, user_id, client_id, scope).await;
        let scope = Scope::parse(scope);
        let approval = Approval {
            client: &client,
            redirect_uri: &client.redirect_uri,
            user: &user,
            grant: &grant,
            scope: &scope,
            session_id: SESSION,
        };
        match self.issuer.grant(ResponseKind::Code, &approval).await.unwrap() {
            GrantResponse::Code(code) => code,
            other => panic!("expected a code, got {other:?}"),
        }
    }

    async fn exchange(
        &self,
        client_id: &str,
        code: &str,
        redirect_uri: Option<&str>,
        device_secret: Option<&str>,
    ) -> Result<TokenSet, OAuth2Error> {
        let client = client(&self.db, client_id).await;
        let request = ExchangeRequest {
            code: Some(code.to_string()),
            redirect_uri: redirect_uri.map(String::from),
            device_secret: device_secret.map(String::from),
        };
        self.issuer
            .exchange(ExchangeKind::AuthorizationCode, &client, &request)
            .await
    }
}

fn decode_id_token(token: &str, audience: &str) -> IdentityClaims {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[audience]);
    validation.set_issuer(&[ISSUER]);
    decode::<IdentityClaims>(
        token,
        &DecodingKey::from_secret(SIGNING_KEY.as_bytes()),
        &validation,
    )
    .expect("valid identity token")
    .claims
}

#[tokio::test]
async fn end_to_end_code_flow() {
    let fx = fixture().await;
    let code = fx.approve(ALICE, CONFIDENTIAL, "openid profile").await;
    assert!(matches!(code.len(), 43 | 44), "unexpected code {code}");

    let tokens = fx
        .exchange(CONFIDENTIAL, &code, Some(CONFIDENTIAL_REDIRECT), None)
        .await
        .unwrap();

    assert_eq!(tokens.access_token.len(), 88);
    assert_eq!(tokens.refresh_token.len(), 88);
    assert_eq!(tokens.params.expires_in, 3600);
    assert_eq!(tokens.scope, Scope::parse("openid profile"));
    assert_eq!(tokens.params.device_secret, None);

    let claims = decode_id_token(tokens.params.id_token.as_deref().unwrap(), CONFIDENTIAL);
    assert_eq!(claims.sub, ALICE);
    assert_eq!(claims.sid, SESSION);
    assert_eq!(claims.name.as_deref(), Some("Alice Example"));
    assert_eq!(claims.preferred_username.as_deref(), Some("alice"));
    assert_eq!(claims.email, None);
    assert_eq!(claims.phone_number, None);
    assert_eq!(claims.ds_hash, None);
    assert_eq!(claims.exp - claims.iat, 3600);
}

#[tokio::test]
async fn exchange_persists_tokens() {
    let fx = fixture().await;
    let code = fx.approve(ALICE, CONFIDENTIAL, "openid").await;
    let tokens = fx
        .exchange(CONFIDENTIAL, &code, Some(CONFIDENTIAL_REDIRECT), None)
        .await
        .unwrap();

    let access = oauth2_access_token::Entity::find_by_id(tokens.access_token.clone())
        .one(fx.db.as_ref())
        .await
        .unwrap()
        .expect("access token row");
    assert_eq!(access.user_id, ALICE);
    assert_eq!(access.client_id, CONFIDENTIAL);
    assert_eq!(access.scope.as_deref(), Some("openid"));
    let expires = access.expiry().unwrap().expect("access token expiry");
    let remaining = expires - OffsetDateTime::now_utc();
    assert!(remaining > Duration::minutes(59) && remaining <= Duration::hours(1));

    let refresh = oauth2_refresh_token::Entity::find_by_id(tokens.refresh_token.clone())
        .one(fx.db.as_ref())
        .await
        .unwrap()
        .expect("refresh token row");
    let grant = CredentialStore::new(fx.db.as_ref())
        .find_grant_for(ALICE, CONFIDENTIAL)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refresh.grant_id, grant.id);
    let remaining = refresh.expiry().unwrap() - OffsetDateTime::now_utc();
    assert!(remaining > Duration::days(29));

    assert_eq!(count(&fx.db, "oauth2_authorization_code").await, 0);
}

#[tokio::test]
async fn code_is_single_use() {
    let fx = fixture().await;
    let code = fx.approve(ALICE, CONFIDENTIAL, "openid").await;

    fx.exchange(CONFIDENTIAL, &code, Some(CONFIDENTIAL_REDIRECT), None)
        .await
        .unwrap();
    let err = fx
        .exchange(CONFIDENTIAL, &code, Some(CONFIDENTIAL_REDIRECT), None)
        .await
        .unwrap_err();

    assert!(matches!(err, OAuth2Error::InvalidGrant(_)));
    assert_eq!(count(&fx.db, "oauth2_access_token").await, 1);
}

#[tokio::test]
async fn unknown_code_is_rejected() {
    let fx = fixture().await;
    let err = fx
        .exchange(CONFIDENTIAL, "nope", Some(CONFIDENTIAL_REDIRECT), None)
        .await
        .unwrap_err();
    assert!(matches!(err, OAuth2Error::InvalidGrant(_)));
}

#[tokio::test]
async fn code_presented_by_other_client_is_rejected_and_kept() {
    let fx = fixture().await;
    let code = fx.approve(ALICE, CONFIDENTIAL, "openid").await;

    let err = fx
        .exchange(OTHER, &code, Some(CONFIDENTIAL_REDIRECT), None)
        .await
        .unwrap_err();
    assert!(matches!(err, OAuth2Error::InvalidGrant(_)));
    assert_eq!(count(&fx.db, "oauth2_access_token").await, 0);

    // The rejected attempt rolled back, so the rightful client can still redeem.
    fx.exchange(CONFIDENTIAL, &code, Some(CONFIDENTIAL_REDIRECT), None)
        .await
        .unwrap();
}

#[tokio::test]
async fn redirect_uri_must_match() {
    let fx = fixture().await;
    let code = fx.approve(ALICE, CONFIDENTIAL, "openid").await;

    let mismatched = fx
        .exchange(CONFIDENTIAL, &code, Some("https://cb.example/other"), None)
        .await
        .unwrap_err();
    assert!(matches!(mismatched, OAuth2Error::InvalidGrant(_)));

    let missing = fx.exchange(CONFIDENTIAL, &code, None, None).await.unwrap_err();
    assert!(matches!(missing, OAuth2Error::InvalidGrant(_)));
}

#[tokio::test]
async fn expired_code_is_rejected() {
    let fx = fixture().await;
    let grant = grant(&fx.db, ALICE, CONFIDENTIAL, "openid").await;
    CredentialStore::new(fx.db.as_ref())
        .insert_authorization_code(oauth2_authorization_code::Model {
            code: "stale".into(),
            client_id: CONFIDENTIAL.into(),
            redirect_uri: CONFIDENTIAL_REDIRECT.into(),
            user_id: ALICE.into(),
            grant_id: grant.id,
            scope: "openid".into(),
            session_id: SESSION.into(),
            expires_at: format_utc(OffsetDateTime::now_utc() - Duration::seconds(5)).unwrap(),
        })
        .await
        .unwrap();

    let err = fx
        .exchange(CONFIDENTIAL, "stale", Some(CONFIDENTIAL_REDIRECT), None)
        .await
        .unwrap_err();
    assert!(matches!(err, OAuth2Error::InvalidGrant(reason) if reason.contains("expired")));
    assert_eq!(count(&fx.db, "oauth2_refresh_token").await, 0);
}

#[tokio::test]
async fn issued_code_expires_in_ten_minutes() {
    let fx = fixture().await;
    let code = fx.approve(ALICE, CONFIDENTIAL, "openid").await;
    let row = oauth2_authorization_code::Entity::find_by_id(code)
        .one(fx.db.as_ref())
        .await
        .unwrap()
        .unwrap();

    let remaining = row.expiry().unwrap() - OffsetDateTime::now_utc();
    assert!(remaining > Duration::minutes(9) && remaining <= Duration::minutes(10));
    assert_eq!(row.session_id, SESSION);
}

#[tokio::test]
async fn missing_code_parameter_is_a_request_error() {
    let fx = fixture().await;
    let client = client(&fx.db, CONFIDENTIAL).await;
    let err = fx
        .issuer
        .exchange(
            ExchangeKind::AuthorizationCode,
            &client,
            &ExchangeRequest::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, OAuth2Error::InvalidRequest(_)));
}

#[tokio::test]
async fn deleted_user_fails_exchange_without_issuing_anything() {
    let fx = fixture().await;
    let code = fx.approve(BOB, CONFIDENTIAL, "openid device_sso").await;
    oauth2_user::Entity::delete_by_id(BOB)
        .exec(fx.db.as_ref())
        .await
        .unwrap();

    let err = fx
        .exchange(CONFIDENTIAL, &code, Some(CONFIDENTIAL_REDIRECT), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(count(&fx.db, "oauth2_access_token").await, 0);
    assert_eq!(count(&fx.db, "oauth2_refresh_token").await, 0);
    assert_eq!(count(&fx.db, "oauth2_device").await, 0);
    // Redemption rolled back with the rest of the exchange.
    assert!(
        oauth2_authorization_code::Entity::find_by_id(code)
            .one(fx.db.as_ref())
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn no_identity_token_without_openid() {
    let fx = fixture().await;
    let code = fx.approve(ALICE, CONFIDENTIAL, "profile email").await;
    let tokens = fx
        .exchange(CONFIDENTIAL, &code, Some(CONFIDENTIAL_REDIRECT), None)
        .await
        .unwrap();
    assert_eq!(tokens.params.id_token, None);
}

#[tokio::test]
async fn identity_claims_follow_scope_and_profile() {
    let fx = fixture().await;
    let code = fx.approve(ALICE, CONFIDENTIAL, "openid email phone").await;
    let tokens = fx
        .exchange(CONFIDENTIAL, &code, Some(CONFIDENTIAL_REDIRECT), None)
        .await
        .unwrap();
    let claims = decode_id_token(tokens.params.id_token.as_deref().unwrap(), CONFIDENTIAL);

    assert_eq!(claims.name, None);
    assert_eq!(claims.email.as_deref(), Some("alice@example.com"));
    assert_eq!(claims.email_verified, Some(true));
    assert_eq!(claims.phone_number.as_deref(), Some("+15550100"));
    // Unverified phone numbers carry no verification claim at all.
    assert_eq!(claims.phone_number_verified, None);

    // A user without profile data yields only the base claims.
    let code = fx.approve(BOB, CONFIDENTIAL, "openid profile email phone").await;
    let tokens = fx
        .exchange(CONFIDENTIAL, &code, Some(CONFIDENTIAL_REDIRECT), None)
        .await
        .unwrap();
    let claims = decode_id_token(tokens.params.id_token.as_deref().unwrap(), CONFIDENTIAL);
    assert_eq!(claims.sub, BOB);
    assert_eq!(claims.name, None);
    assert_eq!(claims.preferred_username, None);
    assert_eq!(claims.email, None);
    assert_eq!(claims.email_verified, None);
    assert_eq!(claims.phone_number, None);
}

#[tokio::test]
async fn device_sso_mints_then_reuses_device() {
    let fx = fixture().await;

    let code = fx.approve(ALICE, CONFIDENTIAL, "openid device_sso").await;
    let first = fx
        .exchange(CONFIDENTIAL, &code, Some(CONFIDENTIAL_REDIRECT), None)
        .await
        .unwrap();
    let secret = first.params.device_secret.clone().expect("device secret");
    assert_eq!(secret.len(), 88);
    assert_eq!(count(&fx.db, "oauth2_device").await, 1);

    let claims = decode_id_token(first.params.id_token.as_deref().unwrap(), CONFIDENTIAL);
    assert_eq!(claims.ds_hash, Some(device_secret_hash(&secret)));

    // A different client presenting the secret binds to the same device.
    let code = fx.approve(ALICE, OTHER, "openid device_sso").await;
    let second = fx
        .exchange(OTHER, &code, Some(OTHER_REDIRECT), Some(&secret))
        .await
        .unwrap();
    assert_eq!(second.params.device_secret.as_deref(), Some(secret.as_str()));
    assert_eq!(count(&fx.db, "oauth2_device").await, 1);

    let claims = decode_id_token(second.params.id_token.as_deref().unwrap(), OTHER);
    assert_eq!(claims.ds_hash, Some(device_secret_hash(&secret)));
}

#[tokio::test]
async fn unknown_device_secret_mints_a_new_device() {
    let fx = fixture().await;
    let code = fx.approve(ALICE, CONFIDENTIAL, "device_sso").await;
    let tokens = fx
        .exchange(
            CONFIDENTIAL,
            &code,
            Some(CONFIDENTIAL_REDIRECT),
            Some("not-a-known-secret"),
        )
        .await
        .unwrap();

    let secret = tokens.params.device_secret.expect("device secret");
    assert_ne!(secret, "not-a-known-secret");
    assert_eq!(count(&fx.db, "oauth2_device").await, 1);
}

#[tokio::test]
async fn device_is_not_bound_without_scope() {
    let fx = fixture().await;
    let code = fx.approve(ALICE, CONFIDENTIAL, "openid").await;
    let tokens = fx
        .exchange(CONFIDENTIAL, &code, Some(CONFIDENTIAL_REDIRECT), Some("ignored"))
        .await
        .unwrap();

    assert_eq!(tokens.params.device_secret, None);
    assert_eq!(count(&fx.db, "oauth2_device").await, 0);
}

#[tokio::test]
async fn token_grant_issues_unscoped_token() {
    let fx = fixture().await;
    let client = client(&fx.db, PUBLIC).await;
    let user = user(&fx.db, ALICE).await;
    let grant = grant(&fx.db, ALICE, PUBLIC, "openid").await;
    let scope = Scope::parse("openid");
    let approval = Approval {
        client: &client,
        redirect_uri: PUBLIC_REDIRECT,
        user: &user,
        grant: &grant,
        scope: &scope,
        session_id: SESSION,
    };

    let GrantResponse::Token(token) = fx.issuer.grant(ResponseKind::Token, &approval).await.unwrap()
    else {
        panic!("expected an access token");
    };
    assert_eq!(token.len(), 88);

    let row = oauth2_access_token::Entity::find_by_id(token)
        .one(fx.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.client_id, PUBLIC);
    assert_eq!(row.scope, None);
    assert_eq!(row.expires_at, None);
    assert_eq!(count(&fx.db, "oauth2_authorization_code").await, 0);
}
