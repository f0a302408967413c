//! HTTP transport used for discovery, JWKS, token and userinfo requests.
//!
//! # Overview
//!
//! - [`HttpTransport`] - the two request shapes the relying party needs
//! - [`ReqwestTransport`] - the default implementation over `reqwest`
//!
//! # Security Considerations
//!
//! - Only HTTPS URLs are requested unless `allow_http` is set (testing only)
//! - Requests time out after the configured window
//! - Response bodies above the configured size are rejected

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::config::HttpSettings;
use crate::error::TransportError;

/// A JSON response with its status code.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Parsed JSON body, `Null` when the body was empty.
    pub body: Value,
}

impl HttpResponse {
    /// Returns `true` for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound HTTP used by the relying party.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// GETs a JSON document, optionally with a bearer token.
    ///
    /// Non-success statuses are errors.
    async fn get_json(&self, url: &str, bearer: Option<&str>) -> Result<Value, TransportError>;

    /// POSTs a form and returns the JSON answer whatever its status.
    ///
    /// The token endpoint reports failures as a JSON body with a 4xx status,
    /// so the status is left to the caller.
    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<HttpResponse, TransportError>;
}

/// [`HttpTransport`] over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    settings: HttpSettings,
}

impl ReqwestTransport {
    /// Creates a transport with the timeout from `settings`.
    pub fn new(settings: HttpSettings) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| TransportError::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, settings })
    }

    fn validate_scheme(&self, url: &str) -> Result<(), TransportError> {
        let parsed = Url::parse(url).map_err(|e| TransportError::Network(format!("{url}: {e}")))?;
        match parsed.scheme() {
            "https" => Ok(()),
            "http" if self.settings.allow_http => Ok(()),
            _ => Err(TransportError::InvalidScheme(url.to_string())),
        }
    }

    async fn read_json(
        &self,
        url: &str,
        mut response: reqwest::Response,
    ) -> Result<HttpResponse, TransportError> {
        let status = response.status().as_u16();
        let max_size = self.settings.max_response_size;

        if let Some(len) = response.content_length()
            && len as usize > max_size
        {
            return Err(TransportError::ResponseTooLarge { max_size });
        }

        // the advertised length is optional, so the cap is enforced while reading
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?
        {
            if bytes.len() + chunk.len() > max_size {
                tracing::debug!("Response from {} exceeds {} bytes", url, max_size);
                return Err(TransportError::ResponseTooLarge { max_size });
            }
            bytes.extend_from_slice(&chunk);
        }

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            match serde_json::from_slice(&bytes) {
                Ok(body) => body,
                Err(_) if !(200..300).contains(&status) => {
                    return Err(TransportError::HttpStatus {
                        status,
                        url: url.to_string(),
                    });
                }
                Err(e) => {
                    tracing::debug!("Failed to parse JSON from {}: {}", url, e);
                    return Err(TransportError::Parse(e.to_string()));
                }
            }
        };

        Ok(HttpResponse { status, body })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get_json(&self, url: &str, bearer: Option<&str>) -> Result<Value, TransportError> {
        self.validate_scheme(url)?;
        tracing::debug!("GET {}", url);

        let mut request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        Ok(self.read_json(url, response).await?.body)
    }

    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<HttpResponse, TransportError> {
        self.validate_scheme(url)?;
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        self.read_json(url, response).await
    }
}
