//! Logout requests and responses.
//!
//! The logout round-trip mirrors authentication without tokens: the request
//! carries an opaque `state` wrapping a random id and caller data, and the
//! provider echoes it back on the post-logout redirect.

use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::OidcResult;
use crate::browser::PopupRequest;
use crate::callback::{CallbackParameters, ensure_no_server_error};
use crate::config::{InteractionType, OidcSettings, PopupSettings, ensure_storage_compatible};
use crate::crypto::{base64url_decode, base64url_encode, random_id};
use crate::error::{OidcError, ProtocolError, ResponsePart};
use crate::metadata::MetadataResolver;

/// Per-call logout overrides.
#[derive(Debug, Clone, Default)]
pub struct LogoutParameters {
    pub interaction: Option<InteractionType>,
    /// Replaces the configured logout callback.
    pub post_logout_redirect_uri: Option<String>,
    /// Replaces the identity token of the current session.
    pub id_token_hint: Option<String>,
    pub additional_parameters: IndexMap<String, String>,
    /// Extends `logout_state_data` from the settings.
    pub state_data: BTreeMap<String, String>,
}

impl LogoutParameters {
    #[must_use]
    pub fn with_interaction(mut self, interaction: InteractionType) -> Self {
        self.interaction = Some(interaction);
        self
    }

    #[must_use]
    pub fn with_state_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.state_data.insert(key.into(), value.into());
        self
    }
}

/// The value wrapped in the logout `state` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestState {
    pub id: String,
    pub data: Option<BTreeMap<String, String>>,
}

/// The pending logout request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutRequestState {
    /// base64url of the JSON [`RequestState`].
    pub state: String,
}

impl LogoutRequestState {
    /// Wraps `request` into an opaque state value.
    pub fn encode(request: &RequestState) -> OidcResult<Self> {
        Ok(Self {
            state: base64url_encode(serde_json::to_vec(request)?),
        })
    }

    /// Unwraps the request id and data.
    pub fn request_state(&self) -> Result<RequestState, ProtocolError> {
        let bytes = base64url_decode(&self.state)
            .map_err(|e| ProtocolError::InvalidRequestState(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| ProtocolError::InvalidRequestState(e.to_string()))
    }
}

/// A built logout request.
#[derive(Debug, Clone)]
pub struct LogoutRequest {
    /// The end session URL with every parameter.
    pub url: Url,
    pub state: LogoutRequestState,
    pub interaction: InteractionType,
    pub popup: PopupSettings,
}

impl LogoutRequest {
    #[must_use]
    pub fn popup_request(&self) -> PopupRequest {
        PopupRequest::new(self.url.as_str(), &self.popup)
    }
}

/// Builds end session requests.
#[derive(Debug, Clone)]
pub struct LogoutRequestBuilder {
    settings: Arc<OidcSettings>,
    metadata: Arc<MetadataResolver>,
}

impl LogoutRequestBuilder {
    pub fn new(settings: Arc<OidcSettings>, metadata: Arc<MetadataResolver>) -> Self {
        Self { settings, metadata }
    }

    /// Builds the end session URL for the session that issued `id_token`.
    ///
    /// `id_token_hint` is only sent together with a post-logout redirect URI.
    ///
    /// # Errors
    ///
    /// [`OidcError::Configuration`] when the provider has no end session endpoint.
    pub async fn create_request(
        &self,
        id_token: Option<&str>,
        params: LogoutParameters,
    ) -> OidcResult<LogoutRequest> {
        let settings = &self.settings;
        let interaction = params.interaction.unwrap_or(settings.interaction_type);
        ensure_storage_compatible(settings.storage.storage_type, interaction)?;

        let end_session_endpoint = self.metadata.end_session_endpoint().await?;
        let mut url = Url::parse(&end_session_endpoint).map_err(|e| {
            OidcError::configuration(format!(
                "Invalid end session endpoint {end_session_endpoint}: {e}"
            ))
        })?;

        let redirect_uri = params
            .post_logout_redirect_uri
            .or_else(|| settings.logout_callback_for(interaction).map(str::to_string))
            .unwrap_or_default();
        let id_token_hint = params
            .id_token_hint
            .or_else(|| id_token.map(str::to_string))
            .unwrap_or_default();

        let mut data = settings.logout_state_data.clone();
        data.extend(params.state_data);
        let state = LogoutRequestState::encode(&RequestState {
            id: random_id(),
            data: (!data.is_empty()).then_some(data),
        })?;

        {
            let mut query = url.query_pairs_mut();
            if !redirect_uri.is_empty() {
                query.append_pair("post_logout_redirect_uri", &redirect_uri);
                if !id_token_hint.is_empty() {
                    query.append_pair("id_token_hint", &id_token_hint);
                }
            }
            query.append_pair("state", &state.state);
            for (name, value) in params.additional_parameters.iter().filter(|(_, v)| !v.is_empty()) {
                query.append_pair(name, value);
            }
        }

        tracing::debug!("Created logout request ({} interaction)", interaction);

        Ok(LogoutRequest {
            url,
            state,
            interaction,
            popup: settings.popup.clone(),
        })
    }
}

/// Parameters of a post-logout redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutResponse {
    pub part: ResponsePart,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub error_uri: Option<String>,
    pub state: Option<String>,
}

/// Validates post-logout redirects.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogoutResponseParser;

impl LogoutResponseParser {
    pub fn parse_url(url: &str) -> Result<LogoutResponse, ProtocolError> {
        let mut params = CallbackParameters::parse(url)?;
        Ok(LogoutResponse {
            part: params.part,
            error: params.take("error"),
            error_description: params.take("error_description"),
            error_uri: params.take("error_uri"),
            state: params.take("state"),
        })
    }

    /// Logout responses always come back in the query.
    pub fn ensure_valid_response(response: &LogoutResponse) -> Result<(), ProtocolError> {
        if response.part != ResponsePart::Query {
            return Err(ProtocolError::WrongResponsePart {
                expected: ResponsePart::Query,
            });
        }
        ensure_no_server_error(
            response.error.as_deref(),
            response.error_description.as_deref(),
            response.error_uri.as_deref(),
        )
    }

    /// A response without `state` is accepted. Otherwise it must match the stored request.
    pub fn ensure_valid_state(
        response: &LogoutResponse,
        stored: Option<&LogoutRequestState>,
    ) -> Result<(), ProtocolError> {
        let Some(state) = response.state.as_deref().filter(|s| !s.is_empty()) else {
            tracing::debug!("No logout state in response");
            return Ok(());
        };
        let stored = stored.ok_or(ProtocolError::StateNotFound)?;
        if stored.state != state {
            return Err(ProtocolError::InvalidState);
        }
        Ok(())
    }
}

/// Revokes the access token on sign-out.
///
/// Inert: the token is dropped locally and nothing is sent. It never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenRevocation;

impl TokenRevocation {
    pub async fn revoke(&self, access_token: Option<&str>) {
        tracing::debug!(
            "Access token revocation skipped (token present: {})",
            access_token.is_some()
        );
    }
}
