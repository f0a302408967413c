//! Authorization response parsing and validation.
//!
//! # Overview
//!
//! [`AuthResponseParser::complete`] runs the checks in order and stops at the
//! first failure:
//!
//! 1. the response is in the URL part implied by the request
//! 2. no `error` parameters
//! 3. `state` matches the stored request
//! 4. the flow carries what it should (`code` or `id_token`) and nothing else
//! 5. code flow only: the code is exchanged at the token endpoint
//! 6. the identity token is validated
//! 7. claims are extracted and optionally extended from userinfo
//!
//! # Security Considerations
//!
//! Identity tokens from the code exchange are accepted without a signature
//! check ([`SignaturePolicy::TrustedChannel`]). They come straight from the
//! token endpoint over TLS, in exchange for a code bound to this client by
//! PKCE. Implicit-flow tokens travel through the browser and are always
//! verified against the provider keys, with the stored nonce.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;

use super::request::AuthRequestState;
use crate::OidcResult;
use crate::callback::{CallbackParameters, ensure_no_server_error};
use crate::config::OidcSettings;
use crate::error::{ProtocolError, ResponsePart, TransportError};
use crate::http::HttpTransport;
use crate::jose::{Claims, DecodedToken, JwtValidator, SignaturePolicy, TokenExpectations};
use crate::metadata::MetadataResolver;
use crate::user::{OidcUser, UserSession};

/// Parameters of an authorization response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthResponse {
    /// Where the parameters were found, `None` only for a default value.
    pub part: Option<ResponsePart>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub error_uri: Option<String>,
    pub state: Option<String>,
    pub code: Option<String>,
    pub access_token: Option<String>,
    pub id_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
    pub session_state: Option<String>,
}

impl TryFrom<CallbackParameters> for AuthResponse {
    type Error = ProtocolError;

    fn try_from(mut params: CallbackParameters) -> Result<Self, Self::Error> {
        let expires_in = params
            .take("expires_in")
            .map(|value| {
                value
                    .parse()
                    .map_err(|_| ProtocolError::malformed_url(format!("invalid expires_in '{value}'")))
            })
            .transpose()?;
        Ok(Self {
            part: Some(params.part),
            error: params.take("error"),
            error_description: params.take("error_description"),
            error_uri: params.take("error_uri"),
            state: params.take("state"),
            code: params.take("code"),
            access_token: params.take("access_token"),
            id_token: params.take("id_token"),
            token_type: params.take("token_type"),
            expires_in,
            scope: params.take("scope"),
            session_state: params.take("session_state"),
        })
    }
}

/// Successful token endpoint answer.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TokenEndpointResponse {
    id_token: Option<String>,
    access_token: Option<String>,
    token_type: Option<String>,
    scope: Option<String>,
    expires_in: Option<u64>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Turns authorization responses into user sessions.
#[derive(Clone)]
pub struct AuthResponseParser {
    settings: Arc<OidcSettings>,
    metadata: Arc<MetadataResolver>,
    http: Arc<dyn HttpTransport>,
    validator: JwtValidator,
}

impl fmt::Debug for AuthResponseParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthResponseParser")
            .field("client_id", &self.settings.client_id)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

impl AuthResponseParser {
    pub fn new(
        settings: Arc<OidcSettings>,
        metadata: Arc<MetadataResolver>,
        http: Arc<dyn HttpTransport>,
    ) -> Self {
        let validator = JwtValidator::from_settings(&settings.tokens);
        Self {
            settings,
            metadata,
            http,
            validator,
        }
    }

    /// Extracts the response parameters from a callback URL.
    pub fn parse_url(&self, url: &str) -> OidcResult<AuthResponse> {
        Ok(AuthResponse::try_from(CallbackParameters::parse(url)?)?)
    }

    /// Parses `url` and completes it against `state`.
    pub async fn parse_response(
        &self,
        url: &str,
        state: &AuthRequestState,
    ) -> OidcResult<UserSession> {
        let response = self.parse_url(url)?;
        self.complete(response, state).await
    }

    /// Validates a parsed response against its stored request and builds the session.
    pub async fn complete(
        &self,
        mut response: AuthResponse,
        state: &AuthRequestState,
    ) -> OidcResult<UserSession> {
        Self::ensure_valid_response(&response, state)?;
        Self::ensure_valid_state(&response, state)?;
        Self::ensure_token_or_code_presence(&response, state)?;

        if state.is_code() {
            self.exchange_code(&mut response, state).await?;
        }

        let id_token = response
            .id_token
            .clone()
            .ok_or(ProtocolError::MissingIdToken)?;
        let decoded = self.validate_token(&id_token, state).await?;
        let claims = self
            .extract_claims(decoded.payload.claims, response.access_token.as_deref())
            .await?;

        let now = OffsetDateTime::now_utc();
        let expires_at = response.expires_in.and_then(|seconds| {
            let seconds = i64::try_from(seconds).ok()?;
            now.checked_add(time::Duration::seconds(seconds))
        });
        let tokens = &self.settings.tokens;

        tracing::debug!(
            "Authentication response accepted for subject {:?}",
            decoded.payload.subject
        );

        Ok(UserSession {
            access_token: response.access_token,
            id_token: Some(id_token),
            token_type: response.token_type,
            scopes: response
                .scope
                .as_deref()
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            session_state: response.session_state,
            expires_at,
            state: response.state,
            request_data: state.data.clone(),
            user: OidcUser::new(
                claims,
                state.issuer.clone(),
                &tokens.name_claim_key,
                &tokens.role_claim_key,
            ),
        })
    }

    /// Checks the response location, then the error parameters.
    pub fn ensure_valid_response(
        response: &AuthResponse,
        state: &AuthRequestState,
    ) -> Result<(), ProtocolError> {
        let expected = state.required_part();
        if response.part != Some(expected) {
            return Err(ProtocolError::WrongResponsePart { expected });
        }
        ensure_no_server_error(
            response.error.as_deref(),
            response.error_description.as_deref(),
            response.error_uri.as_deref(),
        )
    }

    /// Binds the response to its request through `state`.
    pub fn ensure_valid_state(
        response: &AuthResponse,
        state: &AuthRequestState,
    ) -> Result<(), ProtocolError> {
        match response.state.as_deref() {
            None | Some("") => Err(ProtocolError::MissingState),
            Some(value) if value != state.state => Err(ProtocolError::InvalidState),
            Some(_) => Ok(()),
        }
    }

    /// Implicit flows need an `id_token` and no `code`, the code flow the reverse.
    pub fn ensure_token_or_code_presence(
        response: &AuthResponse,
        state: &AuthRequestState,
    ) -> Result<(), ProtocolError> {
        let has_token = response.id_token.as_deref().is_some_and(|t| !t.is_empty());
        let has_code = response.code.as_deref().is_some_and(|c| !c.is_empty());

        if state.is_implicit() {
            if !has_token {
                return Err(ProtocolError::MissingIdToken);
            }
            if has_code {
                return Err(ProtocolError::UnexpectedCode);
            }
        } else {
            if !has_code {
                return Err(ProtocolError::MissingCode);
            }
            if has_token {
                return Err(ProtocolError::UnexpectedIdToken);
            }
        }
        Ok(())
    }

    /// Redeems the authorization code and merges the returned tokens into `response`.
    pub async fn exchange_code(
        &self,
        response: &mut AuthResponse,
        state: &AuthRequestState,
    ) -> OidcResult<()> {
        let token_endpoint = self.metadata.token_endpoint().await?;
        let code = response
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(ProtocolError::MissingCode)?;
        let verifier = state
            .code_verifier
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ProtocolError::InvalidRequestState("missing code_verifier".into()))?;

        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("client_id", self.settings.client_id.as_str()),
            ("code_verifier", verifier),
            ("code", code),
            ("redirect_uri", state.redirect_uri.as_str()),
        ];
        if let Some(secret) = self.settings.client_secret.as_deref().filter(|s| !s.is_empty()) {
            form.push(("client_secret", secret));
        }

        tracing::debug!("Exchanging authorization code at {}", token_endpoint);
        let reply = self.http.post_form(&token_endpoint, &form).await?;

        if let Some(error) = reply.body.get("error") {
            let error = error.as_str().unwrap_or("unknown_error");
            let message = match reply.body.get("error_description").and_then(Value::as_str) {
                Some(description) => format!("{error}: {description}"),
                None => error.to_string(),
            };
            return Err(TransportError::TokenEndpoint(message).into());
        }
        if !reply.is_success() {
            return Err(TransportError::TokenEndpoint(format!("HTTP {}", reply.status)).into());
        }

        let tokens: TokenEndpointResponse = serde_json::from_value(reply.body)
            .map_err(|e| TransportError::Parse(format!("Invalid token response: {e}")))?;

        if let Some(id_token) = non_empty(tokens.id_token) {
            response.id_token = Some(id_token);
        }
        if let Some(access_token) = non_empty(tokens.access_token) {
            response.access_token = Some(access_token);
        }
        if let Some(token_type) = non_empty(tokens.token_type) {
            response.token_type = Some(token_type);
        }
        if let Some(scope) = non_empty(tokens.scope) {
            response.scope = Some(scope);
        }
        if tokens.expires_in.is_some() {
            response.expires_in = tokens.expires_in;
        }
        Ok(())
    }

    /// Validates the identity token for the flow of `state`.
    pub async fn validate_token(
        &self,
        id_token: &str,
        state: &AuthRequestState,
    ) -> OidcResult<DecodedToken> {
        let keys = if state.is_implicit() {
            self.metadata.signing_keys().await?
        } else {
            Vec::new()
        };

        let (signature, nonce) = if state.is_implicit() {
            let nonce = state
                .nonce
                .as_deref()
                .ok_or_else(|| ProtocolError::InvalidRequestState("missing nonce".into()))?;
            (SignaturePolicy::Verify(&keys), Some(nonce))
        } else {
            (SignaturePolicy::TrustedChannel, None)
        };

        let expectations = TokenExpectations {
            issuer: &state.issuer,
            audience: &state.client_id,
            nonce,
            signature,
            now: OffsetDateTime::now_utc(),
        };
        Ok(self.validator.validate(id_token, &expectations)?)
    }

    /// User claims from a validated payload, extended with userinfo when enabled.
    ///
    /// Identity token claims win over userinfo claims with the same name.
    pub async fn extract_claims(
        &self,
        mut claims: Claims,
        access_token: Option<&str>,
    ) -> OidcResult<Claims> {
        let tokens = &self.settings.tokens;
        if tokens.filter_protocol_claims {
            claims.remove_protocol_claims();
        }

        if tokens.load_user_info
            && let Some(access_token) = access_token.filter(|t| !t.is_empty())
        {
            let endpoint = self.metadata.userinfo_endpoint().await?;
            let body = self.http.get_json(&endpoint, Some(access_token)).await?;
            let userinfo: Claims = serde_json::from_value(body)
                .map_err(|e| TransportError::Parse(format!("Invalid userinfo response: {e}")))?;
            tracing::debug!("Loaded {} userinfo claims", userinfo.len());
            claims.merge_missing(userinfo);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::request::{AuthParameters, AuthRequestBuilder};
    use crate::error::OidcError;
    use crate::jose::{JsonWebKeySet, JwsAlgorithm, TokenError};
    use crate::testing::{self, ISSUER, MockTransport, id_token_claims, idp_token};
    use serde_json::json;

    const TOKEN_URL: &str = "https://idp.example/connect/token";
    const USERINFO_URL: &str = "https://idp.example/connect/userinfo";
    const CALLBACK: &str = "https://app.example/oidc/pages/authentication-popup.html";

    struct Fixture {
        http: Arc<MockTransport>,
        builder: AuthRequestBuilder,
        parser: AuthResponseParser,
    }

    fn fixture(settings: OidcSettings, http: MockTransport) -> Fixture {
        let settings = Arc::new(settings);
        let http = Arc::new(http);
        let metadata = Arc::new(MetadataResolver::new(settings.clone(), http.clone()));
        Fixture {
            builder: AuthRequestBuilder::new(settings.clone(), metadata.clone()),
            parser: AuthResponseParser::new(settings, metadata, http.clone()),
            http,
        }
    }

    fn code_fixture() -> Fixture {
        let mut settings = testing::settings();
        settings.tokens.load_user_info = false;
        fixture(settings, MockTransport::idp())
    }

    fn state(response_type: &str) -> AuthRequestState {
        AuthRequestState {
            issuer: ISSUER.into(),
            client_id: "spa".into(),
            response_type: response_type.into(),
            state: "abc123".into(),
            nonce: response_type.starts_with("id_token").then(|| "n-0S6".to_string()),
            code_verifier: (response_type == "code").then(|| "v".repeat(43)),
            code_challenge: None,
            redirect_uri: CALLBACK.into(),
            response_mode: None,
            data: Default::default(),
        }
    }

    fn token_reply(id_token: &str) -> serde_json::Value {
        json!({
            "id_token": id_token,
            "access_token": "abc",
            "token_type": "Bearer",
            "expires_in": 3600,
            "scope": "openid profile"
        })
    }

    #[test]
    fn test_parse_url_fields() {
        let fx = code_fixture();
        let response = fx
            .parser
            .parse_url("https://app.example/cb#state=s&id_token=t&expires_in=60&session_state=x.y")
            .unwrap();
        assert_eq!(response.part, Some(ResponsePart::Fragment));
        assert_eq!(response.state.as_deref(), Some("s"));
        assert_eq!(response.id_token.as_deref(), Some("t"));
        assert_eq!(response.expires_in, Some(60));
        assert_eq!(response.session_state.as_deref(), Some("x.y"));

        let err = fx
            .parser
            .parse_url("https://app.example/cb#state=s&expires_in=soon")
            .unwrap_err();
        assert!(matches!(err, OidcError::Protocol(ProtocolError::MalformedUrl(_))));
    }

    #[test]
    fn test_wrong_response_part() {
        let response = AuthResponse {
            part: Some(ResponsePart::Fragment),
            state: Some("abc123".into()),
            code: Some("c".into()),
            ..AuthResponse::default()
        };
        let err = AuthResponseParser::ensure_valid_response(&response, &state("code")).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::WrongResponsePart {
                expected: ResponsePart::Query
            }
        ));

        let mut query_mode = state("id_token");
        query_mode.response_mode = Some("query".into());
        let response = AuthResponse {
            part: Some(ResponsePart::Query),
            ..AuthResponse::default()
        };
        assert!(AuthResponseParser::ensure_valid_response(&response, &query_mode).is_ok());
    }

    #[test]
    fn test_part_is_checked_before_errors() {
        let response = AuthResponse {
            part: Some(ResponsePart::Fragment),
            error: Some("access_denied".into()),
            ..AuthResponse::default()
        };
        assert!(matches!(
            AuthResponseParser::ensure_valid_response(&response, &state("code")),
            Err(ProtocolError::WrongResponsePart { .. })
        ));

        let response = AuthResponse {
            part: Some(ResponsePart::Query),
            error_description: Some("nope".into()),
            ..AuthResponse::default()
        };
        assert!(matches!(
            AuthResponseParser::ensure_valid_response(&response, &state("code")),
            Err(ProtocolError::ServerError { .. })
        ));
    }

    #[test]
    fn test_state_binding_for_every_flow_and_mode() {
        for response_type in ["code", "id_token", "id_token token"] {
            for mode in [None, Some("query"), Some("fragment")] {
                let mut stored = state(response_type);
                stored.response_mode = mode.map(str::to_string);
                let mismatched = AuthResponse {
                    part: Some(stored.required_part()),
                    state: Some("forged".into()),
                    ..AuthResponse::default()
                };
                assert!(matches!(
                    AuthResponseParser::ensure_valid_state(&mismatched, &stored),
                    Err(ProtocolError::InvalidState)
                ));
                let missing = AuthResponse {
                    state: None,
                    ..mismatched
                };
                assert!(matches!(
                    AuthResponseParser::ensure_valid_state(&missing, &stored),
                    Err(ProtocolError::MissingState)
                ));
            }
        }
    }

    #[test]
    fn test_token_or_code_presence() {
        let with = |code: Option<&str>, id_token: Option<&str>| AuthResponse {
            code: code.map(str::to_string),
            id_token: id_token.map(str::to_string),
            ..AuthResponse::default()
        };
        let check = AuthResponseParser::ensure_token_or_code_presence;

        assert!(check(&with(Some("c"), None), &state("code")).is_ok());
        assert!(matches!(
            check(&with(None, None), &state("code")),
            Err(ProtocolError::MissingCode)
        ));
        assert!(matches!(
            check(&with(Some("c"), Some("t")), &state("code")),
            Err(ProtocolError::UnexpectedIdToken)
        ));

        assert!(check(&with(None, Some("t")), &state("id_token")).is_ok());
        assert!(matches!(
            check(&with(None, None), &state("id_token token")),
            Err(ProtocolError::MissingIdToken)
        ));
        assert!(matches!(
            check(&with(Some("c"), Some("t")), &state("id_token")),
            Err(ProtocolError::UnexpectedCode)
        ));
    }

    #[tokio::test]
    async fn test_code_flow_example() {
        let fx = code_fixture();
        let request = fx.builder.create_request(AuthParameters::default()).await.unwrap();
        let claims = id_token_claims(None);
        fx.http.set_post(TOKEN_URL, 200, token_reply(&idp_token(&claims)));

        let url = format!("{CALLBACK}?code=xyz&state={}", request.state.state);
        let session = fx.parser.parse_response(&url, &request.state).await.unwrap();

        assert_eq!(session.user.claims.get("sub"), claims.get("sub"));
        assert_eq!(session.user.sub().unwrap(), Some("alice"));
        assert_eq!(session.access_token.as_deref(), Some("abc"));
        assert_eq!(session.token_type.as_deref(), Some("Bearer"));
        assert_eq!(session.scopes, vec!["openid", "profile"]);
        assert_eq!(session.state.as_ref(), Some(&request.state.state));
        let left = session.expires_in(OffsetDateTime::now_utc()).unwrap();
        assert!(left.as_secs() > 3500 && left.as_secs() <= 3600);

        let exchange = fx
            .http
            .requests()
            .into_iter()
            .find(|r| r.url == TOKEN_URL)
            .unwrap();
        assert_eq!(exchange.form_value("grant_type"), Some("authorization_code"));
        assert_eq!(exchange.form_value("client_id"), Some("spa"));
        assert_eq!(exchange.form_value("code"), Some("xyz"));
        assert_eq!(exchange.form_value("redirect_uri"), Some(CALLBACK));
        assert_eq!(
            exchange.form_value("code_verifier"),
            request.state.code_verifier.as_deref()
        );
        assert_eq!(exchange.form_value("client_secret"), None);
    }

    #[tokio::test]
    async fn test_round_trip_claims_equal_payload_minus_protocol_claims() {
        let fx = code_fixture();
        let request = fx.builder.create_request(AuthParameters::default()).await.unwrap();
        let payload = id_token_claims(None);
        fx.http.set_post(TOKEN_URL, 200, token_reply(&idp_token(&payload)));

        let url = format!("{CALLBACK}?state={}&code=xyz", request.state.state);
        let session = fx.parser.parse_response(&url, &request.state).await.unwrap();

        let mut expected: Claims = serde_json::from_value(payload).unwrap();
        expected.remove_protocol_claims();
        assert_eq!(session.user.claims, expected);
        assert!(!session.user.claims.contains("exp"));
        assert!(!session.user.claims.contains("at_hash"));
    }

    #[tokio::test]
    async fn test_code_flow_with_secret_and_unsigned_token() {
        let mut settings = testing::settings();
        settings.tokens.load_user_info = false;
        settings.client_secret = Some("s3cret".into());
        let fx = fixture(settings, MockTransport::idp());

        // not signed with any provider key
        let token = testing::mint(JwsAlgorithm::HS256, None, &id_token_claims(None), |data| {
            testing::hmac_sign(JwsAlgorithm::HS256, b"some-other-secret", data)
        });
        fx.http.set_post(TOKEN_URL, 200, token_reply(&token));

        let stored = state("code");
        let url = format!("{CALLBACK}?code=xyz&state=abc123");
        let session = fx.parser.parse_response(&url, &stored).await.unwrap();
        assert_eq!(session.user.sub().unwrap(), Some("alice"));

        let requests = fx.http.requests();
        let exchange = requests.last().unwrap();
        assert_eq!(exchange.form_value("client_secret"), Some("s3cret"));
        // trusted channel: no JWKS fetch
        assert_eq!(fx.http.count("https://idp.example/.well-known/jwks"), 0);
    }

    #[tokio::test]
    async fn test_token_endpoint_error() {
        let fx = code_fixture();
        fx.http.set_post(
            TOKEN_URL,
            400,
            json!({"error": "invalid_grant", "error_description": "code expired"}),
        );

        let err = fx
            .parser
            .parse_response(&format!("{CALLBACK}?code=xyz&state=abc123"), &state("code"))
            .await
            .unwrap_err();
        match err {
            OidcError::Transport(TransportError::TokenEndpoint(message)) => {
                assert_eq!(message, "invalid_grant: code expired");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_implicit_flow_verifies_signature_and_nonce() {
        let mut settings = testing::settings().with_response_type("id_token");
        settings.tokens.load_user_info = false;
        let fx = fixture(settings, MockTransport::idp());
        let stored = state("id_token");

        let good = idp_token(&id_token_claims(Some("n-0S6")));
        let session = fx
            .parser
            .parse_response(&format!("{CALLBACK}#id_token={good}&state=abc123"), &stored)
            .await
            .unwrap();
        assert_eq!(session.user.name().unwrap(), Some("Alice Liddell"));
        assert!(session.access_token.is_none());

        let wrong_nonce = idp_token(&id_token_claims(Some("other")));
        let err = fx
            .parser
            .parse_response(&format!("{CALLBACK}#id_token={wrong_nonce}&state=abc123"), &stored)
            .await
            .unwrap_err();
        assert!(matches!(err, OidcError::Token(TokenError::NonceMismatch)));

        let forged = testing::mint(
            JwsAlgorithm::ES256,
            Some(testing::IDP_KID),
            &id_token_claims(Some("n-0S6")),
            |data| testing::EcKey::generate(JwsAlgorithm::ES256).sign(data),
        );
        let err = fx
            .parser
            .parse_response(&format!("{CALLBACK}#id_token={forged}&state=abc123"), &stored)
            .await
            .unwrap_err();
        assert!(matches!(err, OidcError::Token(_)));
    }

    #[tokio::test]
    async fn test_userinfo_merge_keeps_token_claims() {
        let mut settings = testing::settings().with_response_type("id_token token");
        settings.jwks = Some(JsonWebKeySet::new(vec![testing::idp_jwk()]));
        let http = MockTransport::idp().with_get(
            USERINFO_URL,
            json!({"sub": "alice", "name": "Someone Else", "locale": "en-GB"}),
        );
        let fx = fixture(settings, http);

        let token = idp_token(&id_token_claims(Some("n-0S6")));
        let url = format!("{CALLBACK}#id_token={token}&access_token=at-1&state=abc123&token_type=Bearer");
        let session = fx
            .parser
            .parse_response(&url, &state("id_token token"))
            .await
            .unwrap();

        assert_eq!(session.user.name().unwrap(), Some("Alice Liddell"));
        assert_eq!(session.user.claims.string("locale").unwrap(), Some("en-GB"));
        let userinfo = fx
            .http
            .requests()
            .into_iter()
            .find(|r| r.url == USERINFO_URL)
            .unwrap();
        assert_eq!(userinfo.bearer.as_deref(), Some("at-1"));
    }

    #[tokio::test]
    async fn test_unfiltered_claims_keep_protocol_claims() {
        let mut settings = testing::settings();
        settings.tokens.filter_protocol_claims = false;
        settings.tokens.load_user_info = false;
        let fx = fixture(settings, MockTransport::idp());

        let claims: Claims = serde_json::from_value(id_token_claims(None)).unwrap();
        let extracted = fx.parser.extract_claims(claims.clone(), Some("abc")).await.unwrap();
        assert_eq!(extracted, claims);
    }
}
