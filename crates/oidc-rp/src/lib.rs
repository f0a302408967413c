//! # oidc-rp
//!
//! OpenID Connect relying-party engine for browser-hosted applications.
//!
//! This crate provides:
//! - Authorization requests for the code flow with PKCE and the implicit flows
//! - Authorization and logout response validation
//! - JWS identity token validation (HMAC, RSA PKCS#1 and ECDSA)
//! - Provider session monitoring
//! - Protocol state persistence across redirects and popups
//!
//! ## Overview
//!
//! The host supplies the pieces that live outside the engine: a [`Browser`]
//! to navigate or open popups, a [`Storage`] backing, and optionally a
//! [`CheckSessionFrame`]. [`UserManager`] ties everything together.
//!
//! ## Modules
//!
//! - [`config`] - Relying-party settings and the layered loader
//! - [`auth`] - Authorization requests and responses
//! - [`logout`] - End session requests and responses
//! - [`jose`] - JWS parsing, signature verification and claim validation
//! - [`metadata`] - Discovery and signing key resolution
//! - [`session`] - Check session polling
//! - [`storage`] - Protocol state persistence
//! - [`manager`] - Flow orchestration
//! - [`http`] - HTTP transport to the provider

pub mod auth;
pub mod browser;
pub mod callback;
pub mod config;
pub mod crypto;
pub mod error;
pub mod http;
pub mod jose;
pub mod logout;
pub mod manager;
pub mod metadata;
pub mod observability;
pub mod session;
pub mod storage;
pub mod user;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{AuthParameters, AuthRequest, AuthRequestBuilder, AuthRequestState, AuthResponse, AuthResponseParser};
pub use browser::{Browser, PopupRequest};
pub use config::{
    CallbackUris, Display, HttpSettings, InteractionType, OidcSettings, PopupSettings, Prompt,
    ResponseType, SessionSettings, StorageSettings, StorageType, TokenSettings,
};
pub use error::{ErrorCategory, OidcError, ProtocolError, ResponsePart, TransportError};
pub use http::{HttpResponse, HttpTransport, ReqwestTransport};
pub use jose::{Claims, DecodedToken, JsonWebKeySet, JwtValidator, SigningKey, TokenError};
pub use logout::{LogoutParameters, LogoutRequest, LogoutRequestState, RequestState};
pub use manager::{ObserverId, SessionExpiring, UserEvent, UserManager, UserManagerBuilder};
pub use metadata::{EndpointSet, MetadataResolver};
pub use session::{CheckSessionFrame, SessionCheck, SessionMonitor};
pub use storage::{FileStorage, MemoryStorage, StateStore, Storage};
pub use user::{OidcUser, UserSession};

/// Type alias for relying-party results.
pub type OidcResult<T> = Result<T, OidcError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use oidc_rp::prelude::*;
/// ```
pub mod prelude {
    pub use crate::OidcResult;
    pub use crate::auth::{AuthParameters, AuthRequest};
    pub use crate::browser::{Browser, PopupRequest};
    pub use crate::config::{InteractionType, OidcSettings, StorageType};
    pub use crate::error::{ErrorCategory, OidcError, ProtocolError};
    pub use crate::logout::{LogoutParameters, RequestState};
    pub use crate::manager::{SessionExpiring, UserEvent, UserManager};
    pub use crate::session::CheckSessionFrame;
    pub use crate::storage::{FileStorage, MemoryStorage, Storage};
    pub use crate::user::{OidcUser, UserSession};
}
