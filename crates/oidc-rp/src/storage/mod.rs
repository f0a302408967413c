//! Protocol state persistence.
//!
//! # Overview
//!
//! - [`Storage`] - string key/value backing provided by the host
//! - [`MemoryStorage`] - lost on reload, popup interaction only
//! - [`FileStorage`] - JSON document on disk
//! - [`StateStore`] - typed access to the three records the flows need
//!
//! # Storage layout
//!
//! | Key | Value |
//! |-----|-------|
//! | `{prefix}.auth-request-state` | pending [`AuthRequestState`] |
//! | `{prefix}.logout-request-state` | pending [`LogoutRequestState`] |
//! | `{prefix}.user-state` | current [`UserSession`] |
//!
//! # Security Considerations
//!
//! The authentication request record is single use. It is deleted as soon as
//! it is read, before any validation, so a replayed callback URL finds nothing
//! and fails with [`ProtocolError::StateNotFound`].

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::OidcResult;
use crate::auth::AuthRequestState;
use crate::config::OidcSettings;
use crate::error::ProtocolError;
use crate::logout::LogoutRequestState;
use crate::user::UserSession;

const AUTH_REQUEST_STATE: &str = "auth-request-state";
const LOGOUT_REQUEST_STATE: &str = "logout-request-state";
const USER_STATE: &str = "user-state";

/// Key/value backing for protocol state.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> OidcResult<Option<String>>;

    async fn set(&self, key: &str, value: String) -> OidcResult<()>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> OidcResult<()>;

    /// Whether values outlive a full page navigation.
    fn survives_reload(&self) -> bool;
}

/// Typed, namespaced access to protocol state.
#[derive(Clone)]
pub struct StateStore {
    storage: Arc<dyn Storage>,
    settings: Arc<OidcSettings>,
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("prefix", &self.settings.storage.prefix)
            .field("survives_reload", &self.storage.survives_reload())
            .finish()
    }
}

impl StateStore {
    pub fn new(storage: Arc<dyn Storage>, settings: Arc<OidcSettings>) -> Self {
        Self { storage, settings }
    }

    /// Whether the backing storage outlives a page navigation.
    pub fn survives_reload(&self) -> bool {
        self.storage.survives_reload()
    }

    fn key(&self, name: &str) -> String {
        format!("{}.{}", self.settings.storage.prefix, name)
    }

    async fn write<T: Serialize>(&self, name: &str, value: &T) -> OidcResult<()> {
        let key = self.key(name);
        tracing::trace!("Storing {}", key);
        self.storage.set(&key, serde_json::to_string(value)?).await
    }

    async fn read<T: DeserializeOwned>(&self, name: &str) -> OidcResult<Option<T>> {
        match self.storage.get(&self.key(name)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, name: &str) -> OidcResult<()> {
        let key = self.key(name);
        tracing::trace!("Removing {}", key);
        self.storage.remove(&key).await
    }

    pub async fn set_auth_state(&self, state: &AuthRequestState) -> OidcResult<()> {
        self.write(AUTH_REQUEST_STATE, state).await
    }

    /// Takes the pending authentication request out of storage.
    ///
    /// The record is removed whatever happens next.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::StateNotFound`] when nothing is pending, and
    /// [`ProtocolError::StateMismatch`] when the record was written for another
    /// issuer or client.
    pub async fn get_auth_state(&self) -> OidcResult<AuthRequestState> {
        let key = self.key(AUTH_REQUEST_STATE);
        let raw = self
            .storage
            .get(&key)
            .await?
            .ok_or(ProtocolError::StateNotFound)?;
        self.storage.remove(&key).await?;

        let state: AuthRequestState = serde_json::from_str(&raw)?;
        let settings = &self.settings;
        if state.issuer.trim_end_matches('/') != settings.issuer.trim_end_matches('/') {
            return Err(ProtocolError::state_mismatch(format!(
                "issuer {} differs from {}",
                state.issuer, settings.issuer
            ))
            .into());
        }
        if state.client_id != settings.client_id {
            return Err(ProtocolError::state_mismatch(format!(
                "client_id {} differs from {}",
                state.client_id, settings.client_id
            ))
            .into());
        }

        tracing::debug!("Loaded {} authentication request state", state.response_type);
        Ok(state)
    }

    pub async fn remove_auth_state(&self) -> OidcResult<()> {
        self.delete(AUTH_REQUEST_STATE).await
    }

    pub async fn set_logout_state(&self, state: &LogoutRequestState) -> OidcResult<()> {
        self.write(LOGOUT_REQUEST_STATE, state).await
    }

    /// The pending logout request.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::StateNotFound`] when nothing is pending.
    pub async fn get_logout_state(&self) -> OidcResult<LogoutRequestState> {
        self.find_logout_state()
            .await?
            .ok_or_else(|| ProtocolError::StateNotFound.into())
    }

    /// The pending logout request, if any.
    pub async fn find_logout_state(&self) -> OidcResult<Option<LogoutRequestState>> {
        self.read(LOGOUT_REQUEST_STATE).await
    }

    pub async fn remove_logout_state(&self) -> OidcResult<()> {
        self.delete(LOGOUT_REQUEST_STATE).await
    }

    pub async fn set_user_state(&self, session: &UserSession) -> OidcResult<()> {
        self.write(USER_STATE, session).await
    }

    pub async fn get_user_state(&self) -> OidcResult<Option<UserSession>> {
        self.read(USER_STATE).await
    }

    pub async fn remove_user_state(&self) -> OidcResult<()> {
        self.delete(USER_STATE).await
    }
}
