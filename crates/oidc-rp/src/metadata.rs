//! Provider metadata: issuer, endpoints and signing keys.
//!
//! # Overview
//!
//! [`MetadataResolver`] answers endpoint and key lookups for the rest of the
//! crate. Values come from, in order of precedence:
//!
//! 1. endpoints and keys pre-seeded in [`OidcSettings`]
//! 2. the discovery document at [`OidcSettings::metadata_url`]
//! 3. the JWKS document at `jwks_uri`
//!
//! The discovery document is fetched lazily, on the first lookup of a field
//! that was not pre-seeded, and merged into the cached [`EndpointSet`]
//! first-write-wins. Only successful fetches are cached, so a failed fetch is
//! retried on the next lookup.
//!
//! # Security Considerations
//!
//! - The discovery document's `issuer` must equal the configured issuer,
//!   ignoring a trailing slash
//! - Fetches go through [`HttpTransport`], which refuses plain `http`

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::OidcResult;
use crate::config::OidcSettings;
use crate::error::{OidcError, TransportError};
use crate::http::HttpTransport;
use crate::jose::{JsonWebKeySet, SigningKey};

/// Provider endpoints. Every field is optional until resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSet {
    /// Issuer identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    /// Authorization endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,
    /// Token endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,
    /// Userinfo endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,
    /// RP-initiated logout endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,
    /// Session management frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_session_iframe: Option<String>,
    /// Token revocation endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revocation_endpoint: Option<String>,
    /// Key set document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,
}

impl EndpointSet {
    /// Fills fields that are still empty from `other`. Set fields never change.
    pub fn merge_missing(&mut self, other: EndpointSet) {
        for endpoint in Endpoint::ALL {
            let slot = self.slot_mut(endpoint);
            if slot.as_deref().is_none_or(str::is_empty)
                && let Some(value) = other.get(endpoint).filter(|v| !v.is_empty())
            {
                *slot = Some(value.to_string());
            }
        }
    }

    /// The value of one endpoint, `None` if unset or empty.
    #[must_use]
    pub fn get(&self, endpoint: Endpoint) -> Option<&str> {
        let value = match endpoint {
            Endpoint::Issuer => &self.issuer,
            Endpoint::Authorization => &self.authorization_endpoint,
            Endpoint::Token => &self.token_endpoint,
            Endpoint::Userinfo => &self.userinfo_endpoint,
            Endpoint::EndSession => &self.end_session_endpoint,
            Endpoint::CheckSession => &self.check_session_iframe,
            Endpoint::Revocation => &self.revocation_endpoint,
            Endpoint::Jwks => &self.jwks_uri,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }

    fn slot_mut(&mut self, endpoint: Endpoint) -> &mut Option<String> {
        match endpoint {
            Endpoint::Issuer => &mut self.issuer,
            Endpoint::Authorization => &mut self.authorization_endpoint,
            Endpoint::Token => &mut self.token_endpoint,
            Endpoint::Userinfo => &mut self.userinfo_endpoint,
            Endpoint::EndSession => &mut self.end_session_endpoint,
            Endpoint::CheckSession => &mut self.check_session_iframe,
            Endpoint::Revocation => &mut self.revocation_endpoint,
            Endpoint::Jwks => &mut self.jwks_uri,
        }
    }
}

/// One field of an [`EndpointSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `issuer`
    Issuer,
    /// `authorization_endpoint`
    Authorization,
    /// `token_endpoint`
    Token,
    /// `userinfo_endpoint`
    Userinfo,
    /// `end_session_endpoint`
    EndSession,
    /// `check_session_iframe`
    CheckSession,
    /// `revocation_endpoint`
    Revocation,
    /// `jwks_uri`
    Jwks,
}

impl Endpoint {
    /// Every endpoint, in discovery document order.
    pub const ALL: [Endpoint; 8] = [
        Self::Issuer,
        Self::Authorization,
        Self::Token,
        Self::Userinfo,
        Self::EndSession,
        Self::CheckSession,
        Self::Revocation,
        Self::Jwks,
    ];

    /// Human readable name used in errors.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Issuer => "issuer",
            Self::Authorization => "authorization",
            Self::Token => "token",
            Self::Userinfo => "userinfo",
            Self::EndSession => "end session",
            Self::CheckSession => "check session",
            Self::Revocation => "revocation",
            Self::Jwks => "jwks",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolves and caches provider metadata.
pub struct MetadataResolver {
    settings: Arc<OidcSettings>,
    http: Arc<dyn HttpTransport>,
    endpoints: RwLock<EndpointSet>,
    discovered: RwLock<bool>,
    jwks: RwLock<Option<JsonWebKeySet>>,
    // serializes discovery and JWKS fetches
    fetch: Mutex<()>,
}

impl fmt::Debug for MetadataResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataResolver")
            .field("issuer", &self.settings.issuer)
            .finish_non_exhaustive()
    }
}

impl MetadataResolver {
    /// Creates a resolver seeded with the endpoints and keys from `settings`.
    pub fn new(settings: Arc<OidcSettings>, http: Arc<dyn HttpTransport>) -> Self {
        let endpoints = settings.endpoints.clone();
        let jwks = settings.jwks.clone();
        Self {
            settings,
            http,
            endpoints: RwLock::new(endpoints),
            discovered: RwLock::new(false),
            jwks: RwLock::new(jwks),
            fetch: Mutex::new(()),
        }
    }

    /// Resolves one endpoint, fetching discovery on first need.
    ///
    /// # Errors
    ///
    /// [`OidcError::Configuration`] if the endpoint is still unknown after
    /// discovery, [`OidcError::Transport`] if discovery fails.
    pub async fn endpoint(&self, endpoint: Endpoint) -> OidcResult<String> {
        if let Some(value) = self.endpoints.read().await.get(endpoint) {
            return Ok(value.to_string());
        }

        self.ensure_discovered().await?;

        if let Some(value) = self.endpoints.read().await.get(endpoint) {
            return Ok(value.to_string());
        }
        if endpoint == Endpoint::Issuer {
            return Ok(self.settings.issuer.clone());
        }
        Err(OidcError::missing_endpoint(endpoint.name()))
    }

    /// The issuer identifier tokens must carry.
    pub async fn issuer(&self) -> OidcResult<String> {
        self.endpoint(Endpoint::Issuer).await
    }

    /// The authorization endpoint.
    pub async fn authorization_endpoint(&self) -> OidcResult<String> {
        self.endpoint(Endpoint::Authorization).await
    }

    /// The token endpoint.
    pub async fn token_endpoint(&self) -> OidcResult<String> {
        self.endpoint(Endpoint::Token).await
    }

    /// The userinfo endpoint.
    pub async fn userinfo_endpoint(&self) -> OidcResult<String> {
        self.endpoint(Endpoint::Userinfo).await
    }

    /// The end session endpoint.
    pub async fn end_session_endpoint(&self) -> OidcResult<String> {
        self.endpoint(Endpoint::EndSession).await
    }

    /// The check session frame URL.
    pub async fn check_session_iframe(&self) -> OidcResult<String> {
        self.endpoint(Endpoint::CheckSession).await
    }

    /// The revocation endpoint.
    pub async fn revocation_endpoint(&self) -> OidcResult<String> {
        self.endpoint(Endpoint::Revocation).await
    }

    /// Fetches discovery if it has not succeeded yet and returns every known endpoint.
    pub async fn endpoints(&self) -> OidcResult<EndpointSet> {
        self.ensure_discovered().await?;
        Ok(self.endpoints.read().await.clone())
    }

    /// The provider signing keys.
    ///
    /// Pre-seeded keys are returned as is. Otherwise the JWKS document is
    /// fetched once and cached.
    pub async fn signing_keys(&self) -> OidcResult<Vec<SigningKey>> {
        if let Some(jwks) = self.jwks.read().await.as_ref() {
            return Ok(jwks.keys.clone());
        }

        let jwks_uri = self.endpoint(Endpoint::Jwks).await?;

        let _guard = self.fetch.lock().await;
        if let Some(jwks) = self.jwks.read().await.as_ref() {
            return Ok(jwks.keys.clone());
        }

        let document = self.http.get_json(&jwks_uri, None).await?;
        let jwks: JsonWebKeySet = serde_json::from_value(document)
            .map_err(|e| TransportError::Parse(format!("Invalid JWKS from {jwks_uri}: {e}")))?;
        tracing::debug!("Fetched {} keys from {}", jwks.keys.len(), jwks_uri);

        let keys = jwks.keys.clone();
        *self.jwks.write().await = Some(jwks);
        Ok(keys)
    }

    async fn ensure_discovered(&self) -> OidcResult<()> {
        if *self.discovered.read().await {
            return Ok(());
        }

        let _guard = self.fetch.lock().await;
        if *self.discovered.read().await {
            return Ok(());
        }

        let url = self.settings.metadata_url()?;
        let document = self.http.get_json(url.as_str(), None).await?;
        let discovered: EndpointSet = serde_json::from_value(document)
            .map_err(|e| TransportError::Parse(format!("Invalid discovery document: {e}")))?;

        let expected = self.settings.issuer.trim_end_matches('/');
        match discovered.get(Endpoint::Issuer) {
            Some(actual) if actual.trim_end_matches('/') == expected => {}
            Some(actual) => return Err(TransportError::issuer_mismatch(expected, actual).into()),
            None => return Err(TransportError::issuer_mismatch(expected, "<none>").into()),
        }

        tracing::debug!("Fetched discovery document from {}", url);
        self.endpoints.write().await.merge_missing(discovered);
        *self.discovered.write().await = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpSettings;
    use crate::http::ReqwestTransport;
    use crate::testing::{self, ISSUER, MockTransport};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DISCOVERY_URL: &str = "https://idp.example/.well-known/openid-configuration";

    fn resolver(settings: OidcSettings, transport: &Arc<MockTransport>) -> MetadataResolver {
        MetadataResolver::new(Arc::new(settings), transport.clone())
    }

    #[test]
    fn test_merge_is_first_write_wins() {
        let mut endpoints = EndpointSet {
            token_endpoint: Some("https://a/token".into()),
            userinfo_endpoint: Some(String::new()),
            ..EndpointSet::default()
        };
        endpoints.merge_missing(EndpointSet {
            token_endpoint: Some("https://b/token".into()),
            userinfo_endpoint: Some("https://b/userinfo".into()),
            jwks_uri: Some("https://b/jwks".into()),
            ..EndpointSet::default()
        });

        assert_eq!(endpoints.get(Endpoint::Token), Some("https://a/token"));
        assert_eq!(endpoints.get(Endpoint::Userinfo), Some("https://b/userinfo"));
        assert_eq!(endpoints.get(Endpoint::Jwks), Some("https://b/jwks"));
        assert_eq!(endpoints.get(Endpoint::EndSession), None);
    }

    #[tokio::test]
    async fn test_discovery_is_fetched_once() {
        let transport = Arc::new(MockTransport::idp());
        let resolver = resolver(testing::settings(), &transport);

        assert_eq!(
            resolver.authorization_endpoint().await.unwrap(),
            "https://idp.example/connect/authorize"
        );
        assert_eq!(resolver.token_endpoint().await.unwrap(), "https://idp.example/connect/token");
        assert_eq!(resolver.issuer().await.unwrap(), ISSUER);
        assert_eq!(transport.count(DISCOVERY_URL), 1);
    }

    #[tokio::test]
    async fn test_seeded_endpoints_skip_discovery() {
        let transport = Arc::new(MockTransport::default());
        let settings = testing::settings().with_endpoints(EndpointSet {
            authorization_endpoint: Some("https://login.example/authorize".into()),
            ..EndpointSet::default()
        });
        let resolver = resolver(settings, &transport);

        assert_eq!(
            resolver.authorization_endpoint().await.unwrap(),
            "https://login.example/authorize"
        );
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_seeded_endpoint_wins_over_discovery() {
        let transport = Arc::new(MockTransport::idp());
        let settings = testing::settings().with_endpoints(EndpointSet {
            token_endpoint: Some("https://proxy.example/token".into()),
            ..EndpointSet::default()
        });
        let resolver = resolver(settings, &transport);

        let endpoints = resolver.endpoints().await.unwrap();
        assert_eq!(endpoints.get(Endpoint::Token), Some("https://proxy.example/token"));
        assert_eq!(
            endpoints.get(Endpoint::Userinfo),
            Some("https://idp.example/connect/userinfo")
        );
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_configuration_error() {
        let mut document = testing::discovery_document();
        document.as_object_mut().unwrap().remove("end_session_endpoint");
        let transport = Arc::new(MockTransport::default().with_get(DISCOVERY_URL, document));
        let resolver = resolver(testing::settings(), &transport);

        let err = resolver.end_session_endpoint().await.unwrap_err();
        assert!(matches!(err, OidcError::Configuration(msg) if msg == "Missing end session endpoint"));
        // a second lookup does not refetch a successful discovery
        let _ = resolver.end_session_endpoint().await;
        assert_eq!(transport.count(DISCOVERY_URL), 1);
    }

    #[tokio::test]
    async fn test_failed_discovery_is_retried() {
        let transport = Arc::new(MockTransport::default());
        let resolver = resolver(testing::settings(), &transport);

        assert!(matches!(
            resolver.token_endpoint().await,
            Err(OidcError::Transport(TransportError::HttpStatus { status: 404, .. }))
        ));
        assert!(resolver.token_endpoint().await.is_err());
        assert_eq!(transport.count(DISCOVERY_URL), 2);
    }

    #[tokio::test]
    async fn test_issuer_mismatch() {
        let mut document = testing::discovery_document();
        document["issuer"] = json!("https://evil.example");
        let transport = Arc::new(MockTransport::default().with_get(DISCOVERY_URL, document));
        let resolver = resolver(testing::settings(), &transport);

        assert!(matches!(
            resolver.token_endpoint().await,
            Err(OidcError::Transport(TransportError::IssuerMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn test_discovery_without_issuer_is_rejected() {
        let mut document = testing::discovery_document();
        document.as_object_mut().unwrap().remove("issuer");
        let transport = Arc::new(MockTransport::default().with_get(DISCOVERY_URL, document));
        let resolver = resolver(testing::settings(), &transport);

        let err = resolver.token_endpoint().await.unwrap_err();
        assert!(matches!(
            err,
            OidcError::Transport(TransportError::IssuerMismatch { ref actual, .. }) if actual == "<none>"
        ));
        // nothing from the rejected document is kept
        assert!(resolver.token_endpoint().await.is_err());
        assert_eq!(transport.count(DISCOVERY_URL), 2);
    }

    #[tokio::test]
    async fn test_issuer_trailing_slash_is_ignored() {
        let mut document = testing::discovery_document();
        document["issuer"] = json!("https://idp.example/");
        let transport = Arc::new(MockTransport::default().with_get(DISCOVERY_URL, document));
        let resolver = resolver(testing::settings(), &transport);

        assert_eq!(resolver.issuer().await.unwrap(), "https://idp.example/");
    }

    #[tokio::test]
    async fn test_signing_keys_cached() {
        let transport = Arc::new(MockTransport::idp());
        let resolver = resolver(testing::settings(), &transport);

        let keys = resolver.signing_keys().await.unwrap();
        assert_eq!(keys, vec![testing::idp_jwk()]);
        resolver.signing_keys().await.unwrap();
        assert_eq!(transport.count("https://idp.example/.well-known/jwks"), 1);
    }

    #[tokio::test]
    async fn test_seeded_keys_skip_fetch() {
        let transport = Arc::new(MockTransport::default());
        let jwks = JsonWebKeySet::new(vec![SigningKey::symmetric("c2VjcmV0")]);
        let resolver = resolver(testing::settings().with_jwks(jwks.clone()), &transport);

        assert_eq!(resolver.signing_keys().await.unwrap(), jwks.keys);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_discovery_over_http() {
        let server = MockServer::start().await;
        let issuer = server.uri();
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": issuer,
                "authorization_endpoint": format!("{issuer}/authorize"),
                "jwks_uri": format!("{issuer}/jwks"),
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "keys": [{"kty": "RSA", "kid": "k1", "n": "AQAB", "e": "AQAB"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let settings = OidcSettings::new(issuer.clone(), "spa").with_allow_http(true);
        let http = ReqwestTransport::new(HttpSettings {
            allow_http: true,
            ..HttpSettings::default()
        })
        .unwrap();
        let resolver = MetadataResolver::new(Arc::new(settings), Arc::new(http));

        assert_eq!(
            resolver.authorization_endpoint().await.unwrap(),
            format!("{issuer}/authorize")
        );
        let keys = resolver.signing_keys().await.unwrap();
        assert_eq!(keys[0].kid.as_deref(), Some("k1"));
        resolver.signing_keys().await.unwrap();
    }
}
