//! OpenAPI/Utoipa configuration.

use crate::api::health::MISC_TAG;
use crate::oauth2::{
    DEVICE_SSO_SCOPE, EMAIL_SCOPE, OAUTH2_TAG, OPENID_SCOPE, PHONE_SCOPE, PROFILE_SCOPE,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{
        AuthorizationCode, Flow, HttpAuthScheme, HttpBuilder, Implicit, OAuth2, Scopes,
        SecurityScheme,
    },
};

/// Security addon for OpenAPI documentation.
pub struct SecurityAddon;

impl Modify for SecurityAddon {
    #[tracing::instrument(skip(self, openapi))]
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        // Confidential clients at the token endpoint
        let basic = HttpBuilder::new()
            .scheme(HttpAuthScheme::Basic)
            .description(Some(
                "Client id and secret. May instead be sent as `client_id`/`client_secret` form fields.",
            ))
            .build();
        components.add_security_scheme("ClientBasic", SecurityScheme::Http(basic));

        let scopes = || {
            Scopes::from_iter([
                (OPENID_SCOPE, "Issue an OpenID Connect identity token"),
                (PROFILE_SCOPE, "Name and username claims"),
                (EMAIL_SCOPE, "Email address claims"),
                (PHONE_SCOPE, "Phone number claims"),
                (DEVICE_SSO_SCOPE, "Bind the session to a native SSO device"),
            ])
        };
        let oauth2 = OAuth2::new([
            Flow::AuthorizationCode(AuthorizationCode::new(
                "/oauth2/authorize",
                "/oauth2/token",
                scopes(),
            )),
            Flow::Implicit(Implicit::new("/oauth2/authorize", scopes())),
        ]);
        components.add_security_scheme("OAuth2", SecurityScheme::OAuth2(oauth2));
    }
}

/// OpenAPI documentation configuration.
#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Native SSO Authorization Server",
        version = "1.0.0",
        description = "OAuth2 authorization code server with OpenID Connect identity tokens and native SSO device binding."
    ),
    tags(
        (name = MISC_TAG, description = "Miscellaneous endpoints"),
        (name = OAUTH2_TAG, description = "OAuth2 and OpenID Connect endpoints")
    )
)]
pub struct ApiDoc;
