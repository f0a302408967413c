//! Navigation and popup windows, provided by the host.

use std::time::Duration;

use async_trait::async_trait;

use crate::OidcResult;
use crate::config::PopupSettings;

/// A popup window to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupRequest {
    /// The provider URL to load.
    pub url: String,
    /// Target window name.
    pub window_name: String,
    /// Window features string.
    pub window_features: String,
    /// How long opening may take.
    pub timeout: Duration,
}

impl PopupRequest {
    /// A popup for `url` with the given window settings.
    #[must_use]
    pub fn new(url: impl Into<String>, settings: &PopupSettings) -> Self {
        Self {
            url: url.into(),
            window_name: settings.window_name.clone(),
            window_features: settings.window_features.clone(),
            timeout: settings.open_timeout,
        }
    }
}

/// Host navigation.
///
/// Implementations only start the interaction. The response comes back later
/// as a callback URL handed to the user manager.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Navigates the current page to `url`.
    async fn navigate(&self, url: &str) -> OidcResult<()>;

    /// Opens a popup window.
    async fn open_popup(&self, request: &PopupRequest) -> OidcResult<()>;
}
