//! Relying-party error types.
//!
//! Every fallible operation in this crate returns [`OidcError`]. The variants
//! map one-to-one onto the failure categories a host application needs to
//! distinguish:
//!
//! - [`OidcError::Configuration`] - invalid or missing settings, surfaced before a flow starts
//! - [`OidcError::Protocol`] - the authorization server response violates the protocol
//! - [`OidcError::Token`] - an identity token failed validation
//! - [`OidcError::Transport`] - a metadata, token or userinfo request failed
//! - [`OidcError::Timeout`] - a popup or a session probe exceeded its window
//! - [`OidcError::Storage`] - the state store could not be read or written
//!
//! None of these are retried internally. Metadata is only cached on success, so
//! a failed discovery fetch is attempted again on the next use.

use std::fmt;
use std::time::Duration;

use crate::jose::TokenError;

/// Top-level error returned by relying-party operations.
#[derive(Debug, thiserror::Error)]
pub enum OidcError {
    /// Settings are missing or inconsistent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The authorization or logout response violates the protocol.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An identity token failed validation.
    #[error(transparent)]
    Token(#[from] TokenError),

    /// An HTTP exchange with the authorization server failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An interaction exceeded its time window.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// The operation that timed out.
        operation: &'static str,
        /// The configured window.
        after: Duration,
    },

    /// The backing store failed.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl OidcError {
    /// Create a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a configuration error for an endpoint the provider does not expose.
    #[must_use]
    pub fn missing_endpoint(name: &str) -> Self {
        Self::Configuration(format!("Missing {name} endpoint"))
    }

    /// Create a timeout error.
    #[must_use]
    pub fn timeout(operation: &'static str, after: Duration) -> Self {
        Self::Timeout { operation, after }
    }

    /// Create a storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Returns the coarse category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Protocol(_) => ErrorCategory::Protocol,
            Self::Token(_) => ErrorCategory::TokenValidation,
            Self::Transport(_) => ErrorCategory::Transport,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::Storage(_) => ErrorCategory::Storage,
        }
    }

    /// Returns `true` if retrying the same operation later may succeed.
    ///
    /// Only transport failures and timeouts qualify. Protocol and token
    /// failures are final for the response that produced them.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout { .. })
    }
}

impl From<serde_json::Error> for OidcError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("Failed to serialize state: {err}"))
    }
}

/// Coarse error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Invalid settings.
    Configuration,
    /// Protocol violations in server responses.
    Protocol,
    /// Identity token validation failures.
    TokenValidation,
    /// HTTP failures.
    Transport,
    /// Popup or probe timeouts.
    Timeout,
    /// State store failures.
    Storage,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Configuration => "configuration",
            Self::Protocol => "protocol",
            Self::TokenValidation => "token_validation",
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::Storage => "storage",
        };
        f.write_str(name)
    }
}

/// The part of a callback URL that carries the response parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponsePart {
    /// Parameters after `?`.
    Query,
    /// Parameters after `#`.
    Fragment,
}

impl fmt::Display for ResponsePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => f.write_str("query"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// Protocol violations detected while parsing authorization or logout responses.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The callback URL could not be parsed into parameters.
    #[error("Malformed callback URL: {0}")]
    MalformedUrl(String),

    /// The callback URL carries neither a query nor a fragment.
    #[error("The callback URL does not contain a response")]
    MissingResponse,

    /// The response was returned in the wrong part of the URL.
    #[error("Invalid response mode: the response must be in the {expected}")]
    WrongResponsePart {
        /// Where the response was expected.
        expected: ResponsePart,
    },

    /// The authorization server reported an error.
    #[error("{}", format_server_error(.error, .description.as_deref(), .uri.as_deref()))]
    ServerError {
        /// The `error` parameter.
        error: String,
        /// The `error_description` parameter.
        description: Option<String>,
        /// The `error_uri` parameter.
        uri: Option<String>,
    },

    /// No pending request state exists in the store.
    #[error("State not found")]
    StateNotFound,

    /// The stored request was issued for a different issuer or client.
    #[error("Stored state does not match the current configuration: {0}")]
    StateMismatch(String),

    /// The response does not carry a `state` parameter.
    #[error("The response does not contain a state")]
    MissingState,

    /// The response `state` differs from the stored request.
    #[error("The response state does not match the request state")]
    InvalidState,

    /// An implicit-flow response without an `id_token`.
    #[error("The response does not contain an id_token")]
    MissingIdToken,

    /// A code-flow response carrying an `id_token`.
    #[error("Unexpected id_token in the code flow response")]
    UnexpectedIdToken,

    /// A code-flow response without a `code`.
    #[error("The response does not contain an authorization code")]
    MissingCode,

    /// An implicit-flow response carrying a `code`.
    #[error("Unexpected code in the implicit flow response")]
    UnexpectedCode,

    /// Session monitoring requires the `session_state` of the last response.
    #[error("The user session does not contain a session_state")]
    MissingSessionState,

    /// The logout `state` could not be decoded.
    #[error("Invalid request state: {0}")]
    InvalidRequestState(String),
}

impl ProtocolError {
    /// Create a `MalformedUrl` error.
    #[must_use]
    pub fn malformed_url(detail: impl Into<String>) -> Self {
        Self::MalformedUrl(detail.into())
    }

    /// Create a `ServerError` from response parameters.
    #[must_use]
    pub fn server_error(
        error: impl Into<String>,
        description: Option<String>,
        uri: Option<String>,
    ) -> Self {
        Self::ServerError {
            error: error.into(),
            description,
            uri,
        }
    }

    /// Create a `StateMismatch` error.
    #[must_use]
    pub fn state_mismatch(detail: impl Into<String>) -> Self {
        Self::StateMismatch(detail.into())
    }

    /// Returns `true` if this error is about request/response state binding.
    #[must_use]
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            Self::StateNotFound
                | Self::StateMismatch(_)
                | Self::MissingState
                | Self::InvalidState
                | Self::InvalidRequestState(_)
        )
    }

    /// Returns `true` if the authorization server itself reported the error.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ServerError { .. })
    }
}

fn format_server_error(error: &str, description: Option<&str>, uri: Option<&str>) -> String {
    let mut message = format!("Authorization server error: {error}");
    if let Some(description) = description {
        message.push_str(&format!(" ({description})"));
    }
    if let Some(uri) = uri {
        message.push_str(&format!(" see {uri}"));
    }
    message
}

/// HTTP failures while talking to the authorization server.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent or the connection failed.
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("HTTP error: status {status} from {url}")]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// The requested URL.
        url: String,
    },

    /// The response body exceeded the configured limit.
    #[error("Response exceeds maximum size of {max_size} bytes")]
    ResponseTooLarge {
        /// The maximum allowed size.
        max_size: usize,
    },

    /// The response body was not the expected JSON.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// The URL scheme is not allowed.
    #[error("Invalid URL scheme for {0}: only HTTPS is allowed")]
    InvalidScheme(String),

    /// The token endpoint rejected the code exchange.
    #[error("Error retrieving the token: {0}")]
    TokenEndpoint(String),

    /// The discovery document names a different issuer.
    #[error("Issuer mismatch: expected {expected}, got {actual}")]
    IssuerMismatch {
        /// The configured issuer.
        expected: String,
        /// The issuer in the discovery document.
        actual: String,
    },
}

impl TransportError {
    /// Create an `IssuerMismatch` error.
    #[must_use]
    pub fn issuer_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::IssuerMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Returns `true` for failures that happened before a response was received.
    #[must_use]
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}
