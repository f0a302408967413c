//! Provider session monitoring.
//!
//! # Overview
//!
//! After sign-in the provider's check session frame is polled with
//! `"{client_id} {session_state}"`. It answers `unchanged`, `changed` or
//! `error`. [`SessionMonitor`] runs that loop and reports anything other than
//! `unchanged` as a [`SessionCheck`].

pub mod monitor;

pub use monitor::SessionMonitor;

use std::fmt;

use async_trait::async_trait;

use crate::OidcResult;
use crate::error::{ErrorCategory, OidcError};

/// The provider's check session frame, hosted by the embedding application.
#[async_trait]
pub trait CheckSessionFrame: Send + Sync {
    /// Loads the frame from `url`. Messages are posted to `origin`.
    async fn load(&self, url: &str, origin: &str) -> OidcResult<()>;

    /// Posts a probe and returns the raw reply.
    async fn post(&self, message: &str) -> OidcResult<String>;
}

/// Classification of a probe reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// `unchanged`
    Valid,
    /// `changed`
    Changed,
    /// `error`, or a reply outside the protocol.
    Error,
}

impl SessionStatus {
    /// Classifies a frame reply. Anything but the three protocol values is an error.
    #[must_use]
    pub fn from_reply(reply: &str) -> Self {
        match reply {
            "unchanged" => Self::Valid,
            "changed" => Self::Changed,
            _ => Self::Error,
        }
    }
}

/// An event raised by the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCheck {
    /// The provider session changed. The monitor has stopped.
    Changed,
    /// A probe failed or returned an unexpected reply.
    Error {
        /// `Timeout` when the frame did not answer in time, `Protocol` for an
        /// `error` or non-conforming reply.
        category: ErrorCategory,
        message: String,
    },
}

impl SessionCheck {
    /// A failure raised by the frame or by the probe timeout.
    #[must_use]
    pub fn failure(error: &OidcError) -> Self {
        Self::Error {
            category: error.category(),
            message: error.to_string(),
        }
    }

    /// A reply the frame sent that is not `unchanged` or `changed`.
    #[must_use]
    pub fn bad_reply(reply: &str) -> Self {
        let message = if reply == "error" {
            "check session frame returned error".to_string()
        } else {
            format!("unexpected reply \"{reply}\"")
        };
        Self::Error {
            category: ErrorCategory::Protocol,
            message,
        }
    }

    /// The error category, `None` for [`SessionCheck::Changed`].
    #[must_use]
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::Changed => None,
            Self::Error { category, .. } => Some(*category),
        }
    }
}

impl fmt::Display for SessionCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Changed => f.write_str("Provider session changed"),
            Self::Error { message, .. } => write!(f, "Session check failed: {message}"),
        }
    }
}
