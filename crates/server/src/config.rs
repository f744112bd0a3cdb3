use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Minimum length, in bytes, of the identity token signing key.
pub const MIN_SIGNING_KEY_LEN: usize = 32;

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    pub oauth2: OAuth2Config,
}

/// Settings for the authorization server core. Lifetimes are in seconds.
#[derive(Clone, Debug, Deserialize)]
pub struct OAuth2Config {
    /// Value of the `iss` claim and base of the discovery document
    pub issuer_url: String,
    /// Symmetric key for HS256 identity tokens and authorization transactions
    pub id_token_secret: String,
    #[serde(default = "default_authorization_code_lifetime")]
    pub authorization_code_lifetime: i64,
    #[serde(default = "default_access_token_lifetime")]
    pub access_token_lifetime: i64,
    #[serde(default = "default_refresh_token_lifetime")]
    pub refresh_token_lifetime: i64,
    #[serde(default = "default_id_token_lifetime")]
    pub id_token_lifetime: i64,
}

impl OAuth2Config {
    /// Config with the default lifetimes.
    pub fn new(issuer_url: impl Into<String>, id_token_secret: impl Into<String>) -> Self {
        Self {
            issuer_url: issuer_url.into(),
            id_token_secret: id_token_secret.into(),
            authorization_code_lifetime: default_authorization_code_lifetime(),
            access_token_lifetime: default_access_token_lifetime(),
            refresh_token_lifetime: default_refresh_token_lifetime(),
            id_token_lifetime: default_id_token_lifetime(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "oauth2.issuer_url must not be empty".into(),
            ));
        }
        if self.id_token_secret.len() < MIN_SIGNING_KEY_LEN {
            return Err(ConfigError::Validation(format!(
                "oauth2.id_token_secret must be at least {MIN_SIGNING_KEY_LEN} bytes"
            )));
        }
        let lifetimes = [
            ("authorization_code_lifetime", self.authorization_code_lifetime),
            ("access_token_lifetime", self.access_token_lifetime),
            ("refresh_token_lifetime", self.refresh_token_lifetime),
            ("id_token_lifetime", self.id_token_lifetime),
        ];
        for (name, value) in lifetimes {
            if value <= 0 {
                return Err(ConfigError::Validation(format!(
                    "oauth2.{name} must be > 0"
                )));
            }
        }
        Ok(())
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_authorization_code_lifetime() -> i64 {
    600 // 10 minutes
}

fn default_access_token_lifetime() -> i64 {
    3600 // 1 hour
}

fn default_refresh_token_lifetime() -> i64 {
    86400 * 30 // 30 days
}

fn default_id_token_lifetime() -> i64 {
    3600
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Environment variables override file values using the key path separated by
/// double underscores (e.g. `OAUTH2__ID_TOKEN_SECRET`). The file is optional so
/// a deployment can be configured from the environment alone.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config.yaml").required(false))
        .add_source(Environment::default().separator("__"));
    load_config_with(builder)
}

/// Build and validate configuration from an arbitrary set of sources.
pub fn load_config_with(builder: ConfigBuilder<DefaultState>) -> Result<AppConfig, ConfigError> {
    let app: AppConfig = builder.build()?.try_deserialize()?;
    app.oauth2.validate()?;
    Ok(app)
}
