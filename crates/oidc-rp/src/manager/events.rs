//! Notifications published by the user manager.

use std::fmt;
use std::sync::Arc;

use crate::error::ErrorCategory;
use crate::user::UserSession;

/// A state transition of the user manager.
#[derive(Debug, Clone)]
pub enum UserEvent {
    /// A session was established or restored.
    UserLoaded(Box<UserSession>),
    /// The session was removed.
    UserUnloaded,
    /// The provider reported a session change. `cleared` is false when an
    /// observer cancelled the sign-out.
    SessionChanged { cleared: bool },
    /// The session monitor could not check the provider session.
    SessionError {
        category: ErrorCategory,
        message: String,
    },
    /// A public operation failed.
    Error {
        operation: &'static str,
        message: String,
    },
}

/// Passed to session expiring observers. Cancelling keeps the local session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionExpiring {
    cancelled: bool,
}

impl SessionExpiring {
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Handle returned by observer registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub(crate) u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

pub(crate) type ExpiringObserver = Arc<dyn Fn(&mut SessionExpiring) + Send + Sync>;
