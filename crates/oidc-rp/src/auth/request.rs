//! Authorization request construction.

use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::OidcResult;
use crate::browser::PopupRequest;
use crate::config::{
    Display, InteractionType, OidcSettings, PopupSettings, Prompt, ResponseType,
    ensure_storage_compatible,
};
use crate::crypto::{PkcePair, random_id};
use crate::error::{OidcError, ResponsePart};
use crate::metadata::MetadataResolver;

/// Per-call overrides for an authorization request.
///
/// Unset values fall back to the settings. Extra parameters and state data
/// extend the configured ones, with the per-call value winning on a shared key.
#[derive(Debug, Clone, Default)]
pub struct AuthParameters {
    pub interaction: Option<InteractionType>,
    pub scope: Option<String>,
    pub response_mode: Option<String>,
    pub prompt: Option<Prompt>,
    pub display: Option<Display>,
    pub max_age: Option<u64>,
    pub ui_locales: Option<String>,
    pub id_token_hint: Option<String>,
    pub login_hint: Option<String>,
    pub acr_values: Option<String>,
    pub resource: Option<String>,
    pub request: Option<String>,
    pub request_uri: Option<String>,
    pub additional_parameters: IndexMap<String, String>,
    pub state_data: BTreeMap<String, String>,
}

impl AuthParameters {
    #[must_use]
    pub fn with_interaction(mut self, interaction: InteractionType) -> Self {
        self.interaction = Some(interaction);
        self
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: Prompt) -> Self {
        self.prompt = Some(prompt);
        self
    }

    #[must_use]
    pub fn with_login_hint(mut self, hint: impl Into<String>) -> Self {
        self.login_hint = Some(hint.into());
        self
    }

    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_parameters.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_state_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.state_data.insert(key.into(), value.into());
        self
    }
}

/// The pending authentication request, persisted until its response arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRequestState {
    pub issuer: String,
    pub client_id: String,
    pub response_type: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,
    /// Only sent on the request, never stored.
    #[serde(skip)]
    pub code_challenge: Option<String>,
    pub redirect_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_mode: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl AuthRequestState {
    /// `id_token` and `id_token token`.
    #[must_use]
    pub fn is_implicit(&self) -> bool {
        self.response_type.starts_with("id_token")
    }

    #[must_use]
    pub fn is_code(&self) -> bool {
        self.response_type == "code"
    }

    /// Where the response to this request must appear.
    ///
    /// `query` when asked for explicitly or implied by the code flow,
    /// `fragment` otherwise.
    #[must_use]
    pub fn required_part(&self) -> ResponsePart {
        match self.response_mode.as_deref() {
            Some("query") => ResponsePart::Query,
            None | Some("") if self.is_code() => ResponsePart::Query,
            _ => ResponsePart::Fragment,
        }
    }
}

/// A built authorization request, ready to be persisted and started.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// The authorization endpoint URL with every parameter.
    pub url: Url,
    /// State to persist before starting the interaction.
    pub state: AuthRequestState,
    pub interaction: InteractionType,
    pub popup: PopupSettings,
}

impl AuthRequest {
    #[must_use]
    pub fn popup_request(&self) -> PopupRequest {
        PopupRequest::new(self.url.as_str(), &self.popup)
    }
}

/// Builds authorization requests.
#[derive(Debug, Clone)]
pub struct AuthRequestBuilder {
    settings: Arc<OidcSettings>,
    metadata: Arc<MetadataResolver>,
}

impl AuthRequestBuilder {
    pub fn new(settings: Arc<OidcSettings>, metadata: Arc<MetadataResolver>) -> Self {
        Self { settings, metadata }
    }

    /// Builds the authorization URL and the state to persist for it.
    ///
    /// Nothing is stored here. The caller must persist [`AuthRequest::state`]
    /// before starting the interaction.
    ///
    /// # Errors
    ///
    /// [`OidcError::Configuration`] for an unusable client configuration or a
    /// missing authorization endpoint. Discovery failures surface as
    /// [`OidcError::Transport`].
    pub async fn create_request(&self, params: AuthParameters) -> OidcResult<AuthRequest> {
        let settings = &self.settings;
        let interaction = params.interaction.unwrap_or(settings.interaction_type);

        if settings.client_id.is_empty() {
            return Err(OidcError::configuration("client_id cannot be empty"));
        }
        let response_type = ResponseType::parse(&settings.response_type)?;
        ensure_storage_compatible(settings.storage.storage_type, interaction)?;
        let redirect_uri = settings
            .authentication_callback_for(interaction)
            .ok_or_else(|| {
                OidcError::configuration(format!(
                    "Missing authentication callback uri for {interaction} interaction"
                ))
            })?
            .to_string();

        let prompt = params.prompt.or(settings.prompt);
        if let Some(prompt) = &prompt {
            prompt.validate()?;
        }
        let response_mode = params
            .response_mode
            .or_else(|| settings.response_mode.clone())
            .filter(|mode| !mode.is_empty());
        if let Some(mode) = response_mode.as_deref()
            && mode != "query"
            && mode != "fragment"
        {
            return Err(OidcError::configuration(format!(
                "Invalid response_mode: '{mode}'. Must be query or fragment"
            )));
        }

        let authorization_endpoint = self.metadata.authorization_endpoint().await?;
        let issuer = self.metadata.issuer().await?;
        let mut url = Url::parse(&authorization_endpoint).map_err(|e| {
            OidcError::configuration(format!(
                "Invalid authorization endpoint {authorization_endpoint}: {e}"
            ))
        })?;

        let state = random_id();
        let nonce = response_type.is_implicit().then(random_id);
        let pkce = response_type.is_code().then(PkcePair::generate);

        let scope = params.scope.unwrap_or_else(|| settings.scope.clone());
        let max_age = params.max_age.or(settings.max_age).map(|age| age.to_string());
        let mut extras = settings.additional_parameters.clone();
        extras.extend(params.additional_parameters);

        {
            let mut query = url.query_pairs_mut();
            let mut append = |name: &str, value: Option<&str>| {
                if let Some(value) = value.filter(|v| !v.is_empty()) {
                    query.append_pair(name, value);
                }
            };

            append("scope", Some(scope.as_str()));
            append("response_type", Some(response_type.as_str()));
            append("client_id", Some(settings.client_id.as_str()));
            append("redirect_uri", Some(redirect_uri.as_str()));
            append("state", Some(state.as_str()));
            append("response_mode", response_mode.as_deref());
            append("display", params.display.or(settings.display).map(|d| d.as_str()));
            append("prompt", prompt.map(|p| p.to_string()).as_deref());
            append("max_age", max_age.as_deref());
            append(
                "ui_locales",
                params.ui_locales.as_deref().or(settings.ui_locales.as_deref()),
            );
            append("id_token_hint", params.id_token_hint.as_deref());
            append("login_hint", params.login_hint.as_deref());
            append(
                "acr_values",
                params.acr_values.as_deref().or(settings.acr_values.as_deref()),
            );
            append(
                "resource",
                params.resource.as_deref().or(settings.resource.as_deref()),
            );
            append("request", params.request.as_deref());
            append("request_uri", params.request_uri.as_deref());
            append("nonce", nonce.as_deref());
            if let Some(pkce) = &pkce {
                append("code_challenge", Some(pkce.challenge.as_str()));
                append("code_challenge_method", Some(pkce.method.as_str()));
            }
            for (name, value) in &extras {
                append(name, Some(value.as_str()));
            }
        }

        let mut data = settings.authentication_state_data.clone();
        data.extend(params.state_data);

        tracing::debug!(
            "Created {} authentication request for client {} ({} interaction)",
            response_type,
            settings.client_id,
            interaction
        );

        Ok(AuthRequest {
            url,
            state: AuthRequestState {
                issuer,
                client_id: settings.client_id.clone(),
                response_type: response_type.as_str().to_string(),
                state,
                nonce,
                code_verifier: pkce.as_ref().map(|p| p.verifier.as_str().to_string()),
                code_challenge: pkce.as_ref().map(|p| p.challenge.as_str().to_string()),
                redirect_uri,
                response_mode,
                data,
            },
            interaction,
            popup: settings.popup.clone(),
        })
    }
}
