//! Authentication requests and responses.
//!
//! # Overview
//!
//! - [`AuthRequestBuilder`] - authorization URL plus the state to persist for it
//! - [`AuthResponseParser`] - callback URL to [`crate::UserSession`]
//!
//! Supported response types are `code` (with PKCE S256), `id_token` and
//! `id_token token`.

pub mod request;
pub mod response;

pub use request::{AuthParameters, AuthRequest, AuthRequestBuilder, AuthRequestState};
pub use response::{AuthResponse, AuthResponseParser};
