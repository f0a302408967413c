//! Relying-party settings.
//!
//! [`OidcSettings`] is built once, validated with [`OidcSettings::validate`]
//! and then shared read-only (behind an `Arc`) by every component.
//!
//! # Example (TOML)
//!
//! ```toml
//! issuer = "https://idp.example"
//! client_id = "spa"
//! response_type = "code"
//! scope = "openid profile email"
//! interaction_type = "redirect"
//!
//! [callbacks]
//! authentication_redirect = "https://app.example/oidc/callbacks/authentication-redirect"
//! logout_redirect = "https://app.example/oidc/callbacks/logout-redirect"
//!
//! [storage]
//! storage_type = "local"
//!
//! [session]
//! interval = "2s"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::OidcError;
use crate::jose::JsonWebKeySet;
use crate::metadata::EndpointSet;
use crate::OidcResult;

/// Response types this client can drive.
pub const VALID_RESPONSE_TYPES: [&str; 3] = ["id_token token", "id_token", "code"];

/// Root relying-party settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OidcSettings {
    /// Issuer identifier of the OpenID provider.
    pub issuer: String,

    /// Client identifier registered at the provider.
    pub client_id: String,

    /// Client secret, sent with the code exchange when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// One of `code`, `id_token`, `id_token token`.
    pub response_type: String,

    /// Space-separated scopes.
    pub scope: String,

    /// `query` or `fragment`; empty uses the response type default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mode: Option<String>,

    /// Default `prompt` parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Prompt>,

    /// Default `display` parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<Display>,

    /// Default `max_age` parameter in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age: Option<u64>,

    /// Default `ui_locales` parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_locales: Option<String>,

    /// Default `acr_values` parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acr_values: Option<String>,

    /// Default `resource` parameter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// Extra parameters appended to every authorization request.
    pub additional_parameters: IndexMap<String, String>,

    /// Data stored with every authentication request and returned on completion.
    pub authentication_state_data: BTreeMap<String, String>,

    /// Data carried through every logout round-trip.
    pub logout_state_data: BTreeMap<String, String>,

    /// Redirect the whole page or use a popup window.
    pub interaction_type: InteractionType,

    /// Discovery document URL. Defaults to `{issuer}/.well-known/openid-configuration`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_endpoint: Option<String>,

    /// Endpoints known up front. They take precedence over discovery.
    pub endpoints: EndpointSet,

    /// Signing keys known up front. When set the JWKS endpoint is never fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<JsonWebKeySet>,

    /// Callback URIs per interaction.
    pub callbacks: CallbackUris,

    /// Identity token handling.
    pub tokens: TokenSettings,

    /// HTTP client behaviour.
    pub http: HttpSettings,

    /// Popup window behaviour.
    pub popup: PopupSettings,

    /// Protocol state persistence.
    pub storage: StorageSettings,

    /// Session monitoring.
    pub session: SessionSettings,

    /// Log level or filter directives, applied when the host does not set `RUST_LOG`.
    pub log_level: String,
}

impl Default for OidcSettings {
    fn default() -> Self {
        Self {
            issuer: String::new(),
            client_id: String::new(),
            client_secret: None,
            response_type: "code".to_string(),
            scope: "openid profile".to_string(),
            response_mode: None,
            prompt: None,
            display: None,
            max_age: None,
            ui_locales: None,
            acr_values: None,
            resource: None,
            additional_parameters: IndexMap::new(),
            authentication_state_data: BTreeMap::new(),
            logout_state_data: BTreeMap::new(),
            interaction_type: InteractionType::Popup,
            metadata_endpoint: None,
            endpoints: EndpointSet::default(),
            jwks: None,
            callbacks: CallbackUris::default(),
            tokens: TokenSettings::default(),
            http: HttpSettings::default(),
            popup: PopupSettings::default(),
            storage: StorageSettings::default(),
            session: SessionSettings::default(),
            log_level: crate::observability::DEFAULT_LEVEL.to_string(),
        }
    }
}

impl OidcSettings {
    /// Creates settings for an issuer and client with defaults elsewhere.
    #[must_use]
    pub fn new(issuer: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// Sets the response type.
    #[must_use]
    pub fn with_response_type(mut self, response_type: impl Into<String>) -> Self {
        self.response_type = response_type.into();
        self
    }

    /// Sets the scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Sets the interaction type.
    #[must_use]
    pub fn with_interaction(mut self, interaction: InteractionType) -> Self {
        self.interaction_type = interaction;
        self
    }

    /// Sets the storage type.
    #[must_use]
    pub fn with_storage_type(mut self, storage_type: StorageType) -> Self {
        self.storage.storage_type = storage_type;
        self
    }

    /// Uses the default callback layout below `base`.
    ///
    /// Redirect callbacks live under `oidc/callbacks/`, popup and silent
    /// renew pages under `oidc/pages/`.
    #[must_use]
    pub fn with_default_callbacks(mut self, base: &Url) -> Self {
        let base = base.as_str().trim_end_matches('/');
        self.callbacks = CallbackUris {
            authentication_redirect: Some(format!("{base}/oidc/callbacks/authentication-redirect")),
            logout_redirect: Some(format!("{base}/oidc/callbacks/logout-redirect")),
            authentication_popup: Some(format!("{base}/oidc/pages/authentication-popup.html")),
            logout_popup: Some(format!("{base}/oidc/pages/logout-popup.html")),
            silent_renew: Some(format!("{base}/oidc/pages/silent-renew.html")),
        };
        self
    }

    /// Pre-seeds endpoints, bypassing discovery for the fields set.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: EndpointSet) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Pre-seeds signing keys, bypassing the JWKS endpoint.
    #[must_use]
    pub fn with_jwks(mut self, jwks: JsonWebKeySet) -> Self {
        self.jwks = Some(jwks);
        self
    }

    /// Allows `http` URLs for the issuer and every endpoint.
    ///
    /// # Warning
    ///
    /// This should only be used for testing.
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.http.allow_http = allow;
        self
    }

    /// The discovery document URL.
    pub fn metadata_url(&self) -> OidcResult<Url> {
        let raw = match &self.metadata_endpoint {
            Some(endpoint) if !endpoint.is_empty() => endpoint.clone(),
            _ => format!(
                "{}/.well-known/openid-configuration",
                self.issuer.trim_end_matches('/')
            ),
        };
        Url::parse(&raw).map_err(|e| OidcError::configuration(format!("Invalid metadata endpoint {raw}: {e}")))
    }

    /// The callback URI for authentication responses in the configured interaction.
    #[must_use]
    pub fn authentication_callback(&self) -> Option<&str> {
        self.authentication_callback_for(self.interaction_type)
    }

    /// The callback URI for authentication responses in `interaction`.
    #[must_use]
    pub fn authentication_callback_for(&self, interaction: InteractionType) -> Option<&str> {
        match interaction {
            InteractionType::Redirect => self.callbacks.authentication_redirect.as_deref(),
            InteractionType::Popup => self.callbacks.authentication_popup.as_deref(),
        }
        .filter(|uri| !uri.is_empty())
    }

    /// The callback URI for logout responses in the configured interaction.
    #[must_use]
    pub fn logout_callback(&self) -> Option<&str> {
        self.logout_callback_for(self.interaction_type)
    }

    /// The callback URI for logout responses in `interaction`.
    #[must_use]
    pub fn logout_callback_for(&self, interaction: InteractionType) -> Option<&str> {
        match interaction {
            InteractionType::Redirect => self.callbacks.logout_redirect.as_deref(),
            InteractionType::Popup => self.callbacks.logout_popup.as_deref(),
        }
        .filter(|uri| !uri.is_empty())
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns [`OidcError::Configuration`] describing the first problem found.
    pub fn validate(&self) -> OidcResult<()> {
        if self.issuer.is_empty() {
            return Err(OidcError::configuration("issuer cannot be empty"));
        }
        let issuer = Url::parse(&self.issuer)
            .map_err(|e| OidcError::configuration(format!("Invalid issuer {}: {e}", self.issuer)))?;
        if issuer.scheme() != "https" && !(issuer.scheme() == "http" && self.http.allow_http) {
            return Err(OidcError::configuration(format!(
                "Issuer must use https: {}",
                self.issuer
            )));
        }

        if self.client_id.is_empty() {
            return Err(OidcError::configuration("client_id cannot be empty"));
        }
        ResponseType::parse(&self.response_type)?;
        if self.scope.trim().is_empty() {
            return Err(OidcError::configuration("scope cannot be empty"));
        }
        if let Some(mode) = self.response_mode.as_deref()
            && !mode.is_empty()
            && mode != "query"
            && mode != "fragment"
        {
            return Err(OidcError::configuration(format!(
                "Invalid response_mode: '{mode}'. Must be query or fragment"
            )));
        }
        if let Some(prompt) = &self.prompt {
            prompt.validate()?;
        }

        ensure_storage_compatible(self.storage.storage_type, self.interaction_type)?;
        if self.storage.storage_type.survives_reload() && self.storage.prefix.is_empty() {
            return Err(OidcError::configuration(
                "storage prefix cannot be empty for persistent storage",
            ));
        }

        if self.authentication_callback().is_none() {
            return Err(OidcError::configuration(format!(
                "Missing authentication callback uri for {} interaction",
                self.interaction_type
            )));
        }
        for uri in self.callbacks.iter() {
            Url::parse(uri)
                .map_err(|e| OidcError::configuration(format!("Invalid callback uri {uri}: {e}")))?;
        }

        if self.tokens.max_token_size == 0 {
            return Err(OidcError::configuration("tokens.max_token_size must be > 0"));
        }
        if self.session.enabled && self.session.interval.is_zero() {
            return Err(OidcError::configuration("session.interval must be > 0"));
        }
        if self.http.timeout.is_zero() {
            return Err(OidcError::configuration("http.timeout must be > 0"));
        }

        self.metadata_url()?;
        Ok(())
    }
}

/// Rejects memory storage for redirect interaction.
///
/// A full page navigation drops in-memory state, so the response could never
/// be matched to its request.
pub fn ensure_storage_compatible(
    storage_type: StorageType,
    interaction: InteractionType,
) -> OidcResult<()> {
    if interaction == InteractionType::Redirect && !storage_type.survives_reload() {
        return Err(OidcError::configuration(
            "Memory storage cannot be used with redirect interaction",
        ));
    }
    Ok(())
}

/// Callback URIs registered with the provider.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CallbackUris {
    /// Authentication response in redirect mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication_redirect: Option<String>,
    /// Authentication response in popup mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication_popup: Option<String>,
    /// Logout response in redirect mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logout_redirect: Option<String>,
    /// Logout response in popup mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logout_popup: Option<String>,
    /// Silent renew page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silent_renew: Option<String>,
}

impl CallbackUris {
    fn iter(&self) -> impl Iterator<Item = &str> {
        [
            &self.authentication_redirect,
            &self.authentication_popup,
            &self.logout_redirect,
            &self.logout_popup,
            &self.silent_renew,
        ]
        .into_iter()
        .filter_map(|uri| uri.as_deref())
        .filter(|uri| !uri.is_empty())
    }
}

/// Identity token handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenSettings {
    /// Maximum accepted token size in bytes.
    pub max_token_size: usize,

    /// Tolerance applied to `iat`, `nbf` and `exp`.
    #[serde(with = "humantime_serde")]
    pub clock_skew: Duration,

    /// Drop `nonce`, `at_hash`, `iat`, `nbf`, `exp`, `aud`, `iss`, `c_hash` from user claims.
    pub filter_protocol_claims: bool,

    /// Merge claims from the userinfo endpoint.
    pub load_user_info: bool,

    /// Claim holding the display name.
    pub name_claim_key: String,

    /// Claim holding the roles.
    pub role_claim_key: String,

    /// Revoke the access token when signing out.
    pub revoke_access_token_on_signout: bool,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            max_token_size: 2 * 1024 * 1024,           // 2 MB
            clock_skew: Duration::from_secs(5 * 60), // 5 minutes
            filter_protocol_claims: true,
            load_user_info: true,
            name_claim_key: "name".to_string(),
            role_claim_key: "role".to_string(),
            revoke_access_token_on_signout: false,
        }
    }
}

/// HTTP client behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Request timeout.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Maximum accepted response size in bytes.
    pub max_response_size: usize,

    /// Allow plain `http` URLs. Testing only.
    pub allow_http: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),  // 5 seconds
            max_response_size: 1024 * 1024, // 1 MB
            allow_http: false,
        }
    }
}

/// Popup window behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PopupSettings {
    /// Target window name.
    pub window_name: String,

    /// Window features string.
    pub window_features: String,

    /// How long opening the popup may take.
    #[serde(with = "humantime_serde")]
    pub open_timeout: Duration,
}

impl Default for PopupSettings {
    fn default() -> Self {
        Self {
            window_name: "_blank".to_string(),
            window_features: "location=no,toolbar=no,width=500,height=500,left=100,top=100;"
                .to_string(),
            open_timeout: Duration::from_secs(5),
        }
    }
}

/// Protocol state persistence.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Key namespace prefix.
    pub prefix: String,

    /// Backing storage kind.
    pub storage_type: StorageType,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            prefix: "oidc".to_string(),
            storage_type: StorageType::Session,
        }
    }
}

/// Session monitoring.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Monitor the provider session after authentication.
    pub enabled: bool,

    /// Probe interval.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// How long a single probe may take.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Stop monitoring after a probe error.
    pub stop_on_error: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_millis(2000), // 2 seconds
            timeout: Duration::from_secs(5),
            stop_on_error: true,
        }
    }
}

/// How the user is sent to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    /// Navigate the current page.
    Redirect,
    /// Open a popup window.
    #[default]
    Popup,
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redirect => f.write_str("redirect"),
            Self::Popup => f.write_str("popup"),
        }
    }
}

/// Backing storage kind for protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Lost on reload.
    Memory,
    /// Per tab, survives reloads.
    #[default]
    Session,
    /// Shared and durable.
    Local,
}

impl StorageType {
    /// Returns `true` if state written before a navigation is still there after it.
    #[must_use]
    pub fn survives_reload(&self) -> bool {
        !matches!(self, Self::Memory)
    }
}

/// The `display` authorization parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Display {
    /// Full page.
    Page,
    /// Popup window.
    Popup,
    /// Touch device.
    Touch,
    /// Feature phone.
    Wap,
}

impl Display {
    /// The parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Popup => "popup",
            Self::Touch => "touch",
            Self::Wap => "wap",
        }
    }
}

/// The `prompt` authorization parameter, a set of flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct Prompt {
    /// `none`
    pub none: bool,
    /// `login`
    pub login: bool,
    /// `consent`
    pub consent: bool,
    /// `select_account`
    pub select_account: bool,
}

impl Prompt {
    /// `prompt=none`.
    pub const NONE: Self = Self {
        none: true,
        login: false,
        consent: false,
        select_account: false,
    };

    /// `prompt=login`.
    pub const LOGIN: Self = Self {
        none: false,
        login: true,
        consent: false,
        select_account: false,
    };

    /// Returns `true` if no flag is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !(self.none || self.login || self.consent || self.select_account)
    }

    /// `none` must not be combined with other values.
    pub fn validate(&self) -> OidcResult<()> {
        if self.none && (self.login || self.consent || self.select_account) {
            return Err(OidcError::configuration(
                "prompt=none cannot be combined with other prompt values",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = [
            (self.none, "none"),
            (self.consent, "consent"),
            (self.login, "login"),
            (self.select_account, "select_account"),
        ];
        let joined: Vec<&str> = values
            .into_iter()
            .filter_map(|(set, name)| set.then_some(name))
            .collect();
        f.write_str(&joined.join(" "))
    }
}

impl FromStr for Prompt {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut prompt = Self::default();
        for value in s.split_whitespace() {
            match value {
                "none" => prompt.none = true,
                "login" => prompt.login = true,
                "consent" => prompt.consent = true,
                "select_account" => prompt.select_account = true,
                other => return Err(format!("Unknown prompt value: {other}")),
            }
        }
        Ok(prompt)
    }
}

impl TryFrom<String> for Prompt {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Prompt> for String {
    fn from(prompt: Prompt) -> Self {
        prompt.to_string()
    }
}

/// A validated response type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseType {
    /// Authorization code flow with PKCE.
    Code,
    /// Implicit flow returning only an identity token.
    IdToken,
    /// Implicit flow returning an identity token and an access token.
    IdTokenToken,
}

impl ResponseType {
    /// Parses one of [`VALID_RESPONSE_TYPES`].
    pub fn parse(value: &str) -> OidcResult<Self> {
        match value {
            "code" => Ok(Self::Code),
            "id_token" => Ok(Self::IdToken),
            "id_token token" => Ok(Self::IdTokenToken),
            other => Err(OidcError::configuration(format!(
                "Invalid response type: '{other}'. Must be one of: {}",
                VALID_RESPONSE_TYPES.join(", ")
            ))),
        }
    }

    /// The parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::IdToken => "id_token",
            Self::IdTokenToken => "id_token token",
        }
    }

    /// Implicit-family response types start with `id_token`.
    #[must_use]
    pub fn is_implicit(&self) -> bool {
        matches!(self, Self::IdToken | Self::IdTokenToken)
    }

    /// The authorization code flow.
    #[must_use]
    pub fn is_code(&self) -> bool {
        matches!(self, Self::Code)
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub mod loader {
    //! Layered settings loading: a TOML file overridden by `OIDC_RP__*` variables.

    use std::path::Path;

    use config::{Config, Environment, File, FileFormat};

    use super::OidcSettings;
    use crate::OidcResult;
    use crate::error::OidcError;

    /// Loads settings from `path` (when it exists) and the environment, then validates.
    ///
    /// Nested keys use `__`, e.g. `OIDC_RP__SESSION__INTERVAL=5s`.
    pub fn load_settings(path: Option<&Path>) -> OidcResult<OidcSettings> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                return Err(OidcError::configuration(format!(
                    "Settings file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(File::from(path.to_path_buf()));
        }
        builder = builder.add_source(
            Environment::with_prefix("OIDC_RP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );
        build(builder)
    }

    /// Parses and validates settings from a TOML document.
    pub fn from_toml_str(content: &str) -> OidcResult<OidcSettings> {
        build(Config::builder().add_source(File::from_str(content, FileFormat::Toml)))
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> OidcResult<OidcSettings> {
        let settings: OidcSettings = builder
            .build()
            .map_err(|e| OidcError::configuration(format!("config build error: {e}")))?
            .try_deserialize()
            .map_err(|e| OidcError::configuration(format!("config deserialize error: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }
}
