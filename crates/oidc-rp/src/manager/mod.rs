//! Flow orchestration.
//!
//! # Overview
//!
//! [`UserManager`] composes the request builders, response parsers, state
//! store and session monitor into the relying-party operations:
//!
//! - [`UserManager::begin_authentication`] / [`UserManager::complete_authentication`]
//! - [`UserManager::begin_logout`] / [`UserManager::complete_logout`]
//! - [`UserManager::load_user`]
//!
//! It owns the single [`UserSession`] and publishes every transition as a
//! [`UserEvent`].
//!
//! # Ordering
//!
//! Begin and complete operations are serialized by a flow guard. The request
//! state is written before the browser is asked to navigate, so a response can
//! never arrive ahead of its own state record.
//!
//! # Error reporting
//!
//! A failed public operation is logged once at error level and published as
//! [`UserEvent::Error`]. Session monitor failures have no caller; they are
//! logged at warn level and published as [`UserEvent::SessionError`].

pub mod events;

pub use events::{ObserverId, SessionExpiring, UserEvent};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock as StdRwLock, Weak};

use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock, broadcast, mpsc};

use self::events::ExpiringObserver;
use crate::OidcResult;
use crate::auth::{AuthParameters, AuthRequest, AuthRequestBuilder, AuthResponseParser};
use crate::browser::{Browser, PopupRequest};
use crate::config::{InteractionType, OidcSettings};
use crate::error::{ErrorCategory, OidcError};
use crate::http::{HttpTransport, ReqwestTransport};
use crate::logout::{
    LogoutParameters, LogoutRequest, LogoutRequestBuilder, LogoutResponseParser, RequestState,
    TokenRevocation,
};
use crate::metadata::MetadataResolver;
use crate::session::{CheckSessionFrame, SessionCheck, SessionMonitor};
use crate::storage::{StateStore, Storage};
use crate::user::UserSession;

const EVENT_CAPACITY: usize = 64;

/// Assembles a [`UserManager`].
pub struct UserManagerBuilder {
    settings: OidcSettings,
    storage: Arc<dyn Storage>,
    browser: Arc<dyn Browser>,
    http: Option<Arc<dyn HttpTransport>>,
    frame: Option<Arc<dyn CheckSessionFrame>>,
}

impl fmt::Debug for UserManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserManagerBuilder")
            .field("issuer", &self.settings.issuer)
            .field("client_id", &self.settings.client_id)
            .field("session_frame", &self.frame.is_some())
            .finish_non_exhaustive()
    }
}

impl UserManagerBuilder {
    /// Uses `http` instead of a reqwest client built from the settings.
    #[must_use]
    pub fn with_http(mut self, http: Arc<dyn HttpTransport>) -> Self {
        self.http = Some(http);
        self
    }

    /// Enables session monitoring through `frame`.
    #[must_use]
    pub fn with_session_frame(mut self, frame: Arc<dyn CheckSessionFrame>) -> Self {
        self.frame = Some(frame);
        self
    }

    /// Validates the settings and builds the manager.
    ///
    /// # Errors
    ///
    /// [`OidcError::Configuration`] for invalid settings or a storage backend
    /// that does not match `storage.storage_type`, and a transport error when
    /// the HTTP client cannot be built.
    pub fn build(self) -> OidcResult<UserManager> {
        let settings = self.settings;
        settings.validate()?;

        let storage_type = settings.storage.storage_type;
        if self.storage.survives_reload() != storage_type.survives_reload() {
            return Err(OidcError::configuration(format!(
                "Storage backend does not match storage type {storage_type:?}"
            )));
        }

        let http: Arc<dyn HttpTransport> = match self.http {
            Some(http) => http,
            None => Arc::new(ReqwestTransport::new(settings.http.clone())?),
        };

        let settings = Arc::new(settings);
        let metadata = Arc::new(MetadataResolver::new(settings.clone(), http.clone()));
        let monitor = match self.frame {
            Some(frame) if settings.session.enabled => Some(SessionMonitor::new(
                settings.clone(),
                metadata.clone(),
                frame,
            )),
            Some(_) => None,
            None => {
                if settings.session.enabled {
                    tracing::debug!("No check session frame, session monitoring disabled");
                }
                None
            }
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let inner = Inner {
            auth_requests: AuthRequestBuilder::new(settings.clone(), metadata.clone()),
            auth_responses: AuthResponseParser::new(settings.clone(), metadata.clone(), http),
            logout_requests: LogoutRequestBuilder::new(settings.clone(), metadata.clone()),
            revocation: TokenRevocation,
            store: StateStore::new(self.storage, settings.clone()),
            browser: self.browser,
            monitor,
            flow: Mutex::new(()),
            session: RwLock::new(None),
            events,
            observers: StdRwLock::new(Vec::new()),
            next_observer: AtomicU64::new(1),
            settings,
            metadata,
        };

        tracing::debug!(
            "User manager ready for {} at {}",
            inner.settings.client_id,
            inner.settings.issuer
        );
        Ok(UserManager {
            inner: Arc::new(inner),
        })
    }
}

/// Orchestrates authentication and logout for one client.
#[derive(Clone)]
pub struct UserManager {
    inner: Arc<Inner>,
}

impl fmt::Debug for UserManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserManager")
            .field("issuer", &self.inner.settings.issuer)
            .field("client_id", &self.inner.settings.client_id)
            .field("monitoring", &self.is_monitoring())
            .finish_non_exhaustive()
    }
}

impl UserManager {
    pub fn builder(
        settings: OidcSettings,
        storage: Arc<dyn Storage>,
        browser: Arc<dyn Browser>,
    ) -> UserManagerBuilder {
        UserManagerBuilder {
            settings,
            storage,
            browser,
            http: None,
            frame: None,
        }
    }

    pub fn settings(&self) -> &OidcSettings {
        &self.inner.settings
    }

    pub fn metadata(&self) -> &MetadataResolver {
        &self.inner.metadata
    }

    /// A stream of every state transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<UserEvent> {
        self.inner.events.subscribe()
    }

    /// The current session.
    pub async fn user(&self) -> Option<UserSession> {
        self.inner.session.read().await.clone()
    }

    /// Whether the provider session is being polled.
    pub fn is_monitoring(&self) -> bool {
        self.inner.monitor.as_ref().is_some_and(SessionMonitor::is_armed)
    }

    /// Registers an observer called when the provider reports a session
    /// change. Calling [`SessionExpiring::cancel`] keeps the local session.
    pub fn on_session_expiring<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&mut SessionExpiring) + Send + Sync + 'static,
    {
        let id = ObserverId(self.inner.next_observer.fetch_add(1, Ordering::Relaxed));
        self.inner
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(observer)));
        tracing::trace!("Registered {}", id);
        id
    }

    /// Removes an observer. Returns `false` if it was already removed.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = self
            .inner
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(registered, _)| *registered != id);
        before != observers.len()
    }

    /// Restores the stored session, if it has not expired.
    pub async fn load_user(&self) -> OidcResult<Option<UserSession>> {
        let result = self.inner.load_user().await;
        self.report("load_user", result)
    }

    /// Builds an authorization request, stores its state and hands the URL to
    /// the browser.
    ///
    /// # Errors
    ///
    /// [`OidcError::Timeout`] when the popup does not open in time. The stored
    /// state is kept so a late response can still complete.
    pub async fn begin_authentication(&self, params: AuthParameters) -> OidcResult<AuthRequest> {
        let result = self.inner.begin_authentication(params).await;
        self.report("begin_authentication", result)
    }

    /// Completes the authorization response in `url` and establishes the session.
    pub async fn complete_authentication(&self, url: &str) -> OidcResult<UserSession> {
        let result = self.inner.complete_authentication(url).await;
        self.report("complete_authentication", result)
    }

    /// Signs the current user out locally and sends them to the provider's end
    /// session endpoint. Returns `None` when nobody is signed in.
    pub async fn begin_logout(&self, params: LogoutParameters) -> OidcResult<Option<LogoutRequest>> {
        let result = self.inner.begin_logout(params).await;
        self.report("begin_logout", result)
    }

    /// Validates the post-logout redirect in `url` and returns the data of the
    /// logout request, if one was pending.
    pub async fn complete_logout(&self, url: &str) -> OidcResult<Option<RequestState>> {
        let result = self.inner.complete_logout(url).await;
        self.report("complete_logout", result)
    }

    fn report<T>(&self, operation: &'static str, result: OidcResult<T>) -> OidcResult<T> {
        match &result {
            Ok(_) => tracing::trace!("UserManager.{} succeeded", operation),
            Err(e) => {
                tracing::error!("{} failed: {}", operation, e);
                self.inner.publish(UserEvent::Error {
                    operation,
                    message: e.to_string(),
                });
            }
        }
        result
    }
}

struct Inner {
    settings: Arc<OidcSettings>,
    metadata: Arc<MetadataResolver>,
    auth_requests: AuthRequestBuilder,
    auth_responses: AuthResponseParser,
    logout_requests: LogoutRequestBuilder,
    revocation: TokenRevocation,
    store: StateStore,
    browser: Arc<dyn Browser>,
    monitor: Option<SessionMonitor>,
    flow: Mutex<()>,
    session: RwLock<Option<UserSession>>,
    events: broadcast::Sender<UserEvent>,
    observers: StdRwLock<Vec<(ObserverId, ExpiringObserver)>>,
    next_observer: AtomicU64,
}

impl Inner {
    fn publish(&self, event: UserEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    async fn load_user(self: &Arc<Self>) -> OidcResult<Option<UserSession>> {
        let _flow = self.flow.lock().await;

        let Some(session) = self.store.get_user_state().await? else {
            tracing::debug!("No stored user session");
            return Ok(None);
        };
        if session.is_expired(OffsetDateTime::now_utc()) {
            tracing::debug!("Stored user session has expired");
            self.store.remove_user_state().await?;
            return Ok(None);
        }

        self.set_user(&session).await;
        Ok(Some(session))
    }

    async fn begin_authentication(&self, params: AuthParameters) -> OidcResult<AuthRequest> {
        let _flow = self.flow.lock().await;

        let request = self.auth_requests.create_request(params).await?;
        self.store.set_auth_state(&request.state).await?;

        match request.interaction {
            InteractionType::Redirect => self.browser.navigate(request.url.as_str()).await?,
            InteractionType::Popup => self.open_popup(&request.popup_request()).await?,
        }
        Ok(request)
    }

    async fn complete_authentication(self: &Arc<Self>, url: &str) -> OidcResult<UserSession> {
        let _flow = self.flow.lock().await;

        // a malformed URL must not consume the pending request
        let response = self.auth_responses.parse_url(url)?;
        let state = self.store.get_auth_state().await?;
        let session = self.auth_responses.complete(response, &state).await?;

        self.store.set_user_state(&session).await?;
        self.set_user(&session).await;
        Ok(session)
    }

    async fn begin_logout(&self, params: LogoutParameters) -> OidcResult<Option<LogoutRequest>> {
        let _flow = self.flow.lock().await;

        let Some(session) = self.session.read().await.clone() else {
            tracing::debug!("No user session to sign out");
            return Ok(None);
        };

        let request = self
            .logout_requests
            .create_request(session.id_token.as_deref(), params)
            .await?;
        if self.settings.tokens.revoke_access_token_on_signout {
            self.revocation.revoke(session.access_token.as_deref()).await;
        }
        self.store.set_logout_state(&request.state).await?;
        self.clear_user().await?;

        match request.interaction {
            InteractionType::Redirect => self.browser.navigate(request.url.as_str()).await?,
            InteractionType::Popup => self.open_popup(&request.popup_request()).await?,
        }
        Ok(Some(request))
    }

    async fn complete_logout(&self, url: &str) -> OidcResult<Option<RequestState>> {
        let _flow = self.flow.lock().await;

        let response = LogoutResponseParser::parse_url(url)?;
        LogoutResponseParser::ensure_valid_response(&response)?;
        let stored = self.store.find_logout_state().await?;
        LogoutResponseParser::ensure_valid_state(&response, stored.as_ref())?;
        self.store.remove_logout_state().await?;

        tracing::debug!("Logout completed");
        Ok(stored.map(|s| s.request_state()).transpose()?)
    }

    async fn open_popup(&self, popup: &PopupRequest) -> OidcResult<()> {
        tokio::time::timeout(popup.timeout, self.browser.open_popup(popup))
            .await
            .map_err(|_| OidcError::timeout("Popup opening", popup.timeout))?
    }

    async fn set_user(self: &Arc<Self>, session: &UserSession) {
        *self.session.write().await = Some(session.clone());
        self.publish(UserEvent::UserLoaded(Box::new(session.clone())));
        self.start_monitor(session).await;
    }

    async fn clear_user(&self) -> OidcResult<()> {
        if let Some(monitor) = &self.monitor {
            monitor.stop();
        }
        self.store.remove_user_state().await?;
        if self.session.write().await.take().is_some() {
            self.publish(UserEvent::UserUnloaded);
        }
        Ok(())
    }

    async fn start_monitor(self: &Arc<Self>, session: &UserSession) {
        let Some(monitor) = &self.monitor else {
            return;
        };
        let Some(session_state) = session.session_state.clone().filter(|s| !s.is_empty()) else {
            tracing::debug!("No session_state in response, session monitoring skipped");
            monitor.stop();
            return;
        };

        match monitor.start(session).await {
            Ok(checks) => {
                tokio::spawn(watch_session(Arc::downgrade(self), session_state, checks));
            }
            Err(e) => self.session_error(e.category(), e.to_string()),
        }
    }

    fn session_error(&self, category: ErrorCategory, message: String) {
        tracing::warn!("Session monitoring failed ({}): {}", category, message);
        self.publish(UserEvent::SessionError { category, message });
    }

    fn expiring_observers(&self) -> Vec<ExpiringObserver> {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect()
    }

    async fn on_session_check(&self, check: SessionCheck, session_state: &str) {
        match check {
            SessionCheck::Error { category, message } => self.session_error(category, message),
            SessionCheck::Changed => {
                let mut expiring = SessionExpiring::default();
                for observer in self.expiring_observers() {
                    observer(&mut expiring);
                }
                if expiring.is_cancelled() {
                    tracing::debug!("Provider session changed, sign-out cancelled by observer");
                    self.publish(UserEvent::SessionChanged { cleared: false });
                    return;
                }

                let _flow = self.flow.lock().await;
                let current = self
                    .session
                    .read()
                    .await
                    .as_ref()
                    .and_then(|s| s.session_state.clone());
                if current.as_deref() != Some(session_state) {
                    tracing::debug!("Ignoring session change of a replaced session");
                    return;
                }
                if let Err(e) = self.clear_user().await {
                    self.session_error(e.category(), e.to_string());
                }
                self.publish(UserEvent::SessionChanged { cleared: true });
            }
        }
    }
}

async fn watch_session(
    inner: Weak<Inner>,
    session_state: String,
    mut checks: mpsc::UnboundedReceiver<SessionCheck>,
) {
    while let Some(check) = checks.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.on_session_check(check, &session_state).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::config::StorageType;
    use crate::error::ProtocolError;
    use crate::storage::MemoryStorage;
    use crate::testing::{self, MockTransport, id_token_claims, idp_token};

    const TOKEN_URL: &str = "https://idp.example/connect/token";
    const AUTH_STATE_KEY: &str = "oidc.auth-request-state";
    const LOGOUT_STATE_KEY: &str = "oidc.logout-request-state";

    #[derive(Default)]
    struct RecordingBrowser {
        storage: Option<Arc<MemoryStorage>>,
        hang: bool,
        navigations: StdMutex<Vec<String>>,
        popups: StdMutex<Vec<PopupRequest>>,
        pending_keys: StdMutex<Vec<Vec<&'static str>>>,
    }

    impl RecordingBrowser {
        async fn record_pending(&self) {
            let Some(storage) = &self.storage else {
                return;
            };
            let mut keys = Vec::new();
            for key in [AUTH_STATE_KEY, LOGOUT_STATE_KEY] {
                if storage.get(key).await.unwrap().is_some() {
                    keys.push(key);
                }
            }
            self.pending_keys.lock().unwrap().push(keys);
        }
    }

    #[async_trait]
    impl Browser for RecordingBrowser {
        async fn navigate(&self, url: &str) -> OidcResult<()> {
            self.record_pending().await;
            self.navigations.lock().unwrap().push(url.to_string());
            Ok(())
        }

        async fn open_popup(&self, request: &PopupRequest) -> OidcResult<()> {
            self.record_pending().await;
            if self.hang {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            self.popups.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    struct FixedFrame(&'static str);

    #[async_trait]
    impl CheckSessionFrame for FixedFrame {
        async fn load(&self, _url: &str, _origin: &str) -> OidcResult<()> {
            Ok(())
        }

        async fn post(&self, _message: &str) -> OidcResult<String> {
            Ok(self.0.to_string())
        }
    }

    struct Fixture {
        manager: UserManager,
        http: Arc<MockTransport>,
        storage: Arc<MemoryStorage>,
        browser: Arc<RecordingBrowser>,
    }

    fn memory_settings() -> OidcSettings {
        let mut settings = testing::settings().with_storage_type(StorageType::Memory);
        settings.tokens.load_user_info = false;
        settings.session.interval = Duration::from_millis(10);
        settings.session.timeout = Duration::from_millis(200);
        settings
    }

    fn fixture(settings: OidcSettings, hang: bool, frame: Option<&'static str>) -> Fixture {
        let storage = Arc::new(MemoryStorage::new());
        let http = Arc::new(MockTransport::idp());
        let browser = Arc::new(RecordingBrowser {
            storage: Some(storage.clone()),
            hang,
            ..RecordingBrowser::default()
        });
        let mut builder = UserManager::builder(settings, storage.clone(), browser.clone())
            .with_http(http.clone());
        if let Some(reply) = frame {
            builder = builder.with_session_frame(Arc::new(FixedFrame(reply)));
        }
        Fixture {
            manager: builder.build().unwrap(),
            http,
            storage,
            browser,
        }
    }

    impl Fixture {
        async fn sign_in(&self) -> UserSession {
            let request = self
                .manager
                .begin_authentication(AuthParameters::default())
                .await
                .unwrap();
            self.http.set_post(
                TOKEN_URL,
                200,
                json!({
                    "id_token": idp_token(&id_token_claims(None)),
                    "access_token": "abc",
                    "token_type": "Bearer",
                    "expires_in": 3600,
                    "scope": "openid profile"
                }),
            );
            let url = format!(
                "{}?code=xyz&state={}&session_state=ss-1",
                request.state.redirect_uri, request.state.state
            );
            self.manager.complete_authentication(&url).await.unwrap()
        }
    }

    async fn next_event(
        events: &mut broadcast::Receiver<UserEvent>,
        matches: impl Fn(&UserEvent) -> bool,
    ) -> UserEvent {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = events.recv().await.unwrap();
                if matches(&event) {
                    return event;
                }
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_code_flow_through_popup() {
        let fx = fixture(memory_settings(), false, None);
        let mut events = fx.manager.subscribe();

        let session = fx.sign_in().await;

        // state was stored before the popup opened
        assert_eq!(
            fx.browser.pending_keys.lock().unwrap().as_slice(),
            &[vec![AUTH_STATE_KEY]]
        );
        let popups = fx.browser.popups.lock().unwrap().clone();
        assert_eq!(popups.len(), 1);
        assert!(popups[0].url.starts_with("https://idp.example/connect/authorize?"));
        assert!(fx.browser.navigations.lock().unwrap().is_empty());

        assert_eq!(session.user.sub().unwrap(), Some("alice"));
        assert_eq!(session.session_state.as_deref(), Some("ss-1"));
        assert_eq!(fx.manager.user().await, Some(session.clone()));
        assert!(fx.storage.get("oidc.user-state").await.unwrap().is_some());
        assert!(fx.storage.get(AUTH_STATE_KEY).await.unwrap().is_none());

        let loaded = next_event(&mut events, |e| matches!(e, UserEvent::UserLoaded(_))).await;
        let UserEvent::UserLoaded(loaded) = loaded else {
            unreachable!()
        };
        assert_eq!(*loaded, session);
    }

    #[tokio::test]
    async fn test_replayed_callback_fails_with_state_not_found() {
        let fx = fixture(memory_settings(), false, None);
        let request = fx
            .manager
            .begin_authentication(AuthParameters::default())
            .await
            .unwrap();
        fx.http.set_post(
            TOKEN_URL,
            200,
            json!({"id_token": idp_token(&id_token_claims(None)), "access_token": "abc"}),
        );
        let url = format!(
            "{}?code=xyz&state={}",
            request.state.redirect_uri, request.state.state
        );
        fx.manager.complete_authentication(&url).await.unwrap();

        let mut events = fx.manager.subscribe();
        let err = fx.manager.complete_authentication(&url).await.unwrap_err();
        assert!(matches!(err, OidcError::Protocol(ProtocolError::StateNotFound)));

        let event = next_event(&mut events, |e| matches!(e, UserEvent::Error { .. })).await;
        assert!(matches!(
            event,
            UserEvent::Error { operation: "complete_authentication", ref message } if message == "State not found"
        ));
    }

    #[tokio::test]
    async fn test_malformed_callback_keeps_request_state() {
        let fx = fixture(memory_settings(), false, None);
        fx.manager
            .begin_authentication(AuthParameters::default())
            .await
            .unwrap();

        let err = fx.manager.complete_authentication("not a url").await.unwrap_err();
        assert!(matches!(err, OidcError::Protocol(ProtocolError::MalformedUrl(_))));
        assert!(fx.storage.get(AUTH_STATE_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_popup_timeout_keeps_request_state() {
        let mut settings = memory_settings();
        settings.popup.open_timeout = Duration::from_millis(20);
        let fx = fixture(settings, true, None);

        let err = fx
            .manager
            .begin_authentication(AuthParameters::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OidcError::Timeout { operation: "Popup opening", .. }
        ));
        assert!(fx.storage.get(AUTH_STATE_KEY).await.unwrap().is_some());
    }

    #[test]
    fn test_storage_must_match_settings() {
        let browser = Arc::new(RecordingBrowser::default());

        let redirect = memory_settings().with_interaction(InteractionType::Redirect);
        let err = UserManager::builder(redirect, Arc::new(MemoryStorage::new()), browser.clone())
            .with_http(Arc::new(MockTransport::idp()))
            .build()
            .unwrap_err();
        assert!(matches!(err, OidcError::Configuration(_)));

        // settings promise persistent storage, backend is in memory
        let err = UserManager::builder(
            testing::settings(),
            Arc::new(MemoryStorage::new()),
            browser,
        )
        .with_http(Arc::new(MockTransport::idp()))
        .build()
        .unwrap_err();
        assert!(err.to_string().contains("Storage backend does not match"));
    }

    #[tokio::test]
    async fn test_logout_round_trip() {
        let fx = fixture(memory_settings(), false, None);
        let session = fx.sign_in().await;
        let mut events = fx.manager.subscribe();

        let request = fx
            .manager
            .begin_logout(LogoutParameters::default().with_state_data("return_to", "/bye"))
            .await
            .unwrap()
            .unwrap();

        assert!(request.url.as_str().starts_with("https://idp.example/connect/endsession?"));
        let hint = request
            .url
            .query_pairs()
            .find(|(k, _)| k == "id_token_hint")
            .map(|(_, v)| v.into_owned());
        assert_eq!(hint, session.id_token);
        assert_eq!(fx.manager.user().await, None);
        assert!(fx.storage.get("oidc.user-state").await.unwrap().is_none());
        assert_eq!(
            fx.browser.pending_keys.lock().unwrap().last().unwrap(),
            &vec![LOGOUT_STATE_KEY]
        );
        next_event(&mut events, |e| matches!(e, UserEvent::UserUnloaded)).await;

        let callback = format!(
            "https://app.example/oidc/pages/logout-popup.html?state={}",
            request.state.state
        );
        let completed = fx.manager.complete_logout(&callback).await.unwrap().unwrap();
        assert_eq!(completed.data.unwrap()["return_to"], "/bye");
        assert!(fx.storage.get(LOGOUT_STATE_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_with_foreign_state_is_rejected() {
        let fx = fixture(memory_settings(), false, None);
        fx.sign_in().await;
        fx.manager
            .begin_logout(LogoutParameters::default())
            .await
            .unwrap();

        let err = fx
            .manager
            .complete_logout("https://app.example/oidc/pages/logout-popup.html?state=forged")
            .await
            .unwrap_err();
        assert!(matches!(err, OidcError::Protocol(ProtocolError::InvalidState)));
        assert!(fx.storage.get(LOGOUT_STATE_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_logout_without_user_does_nothing() {
        let fx = fixture(memory_settings(), false, None);
        let request = fx
            .manager
            .begin_logout(LogoutParameters::default())
            .await
            .unwrap();
        assert!(request.is_none());
        assert!(fx.browser.popups.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_user_restores_stored_session() {
        let fx = fixture(memory_settings(), false, None);
        let session = fx.sign_in().await;

        let browser = Arc::new(RecordingBrowser::default());
        let restored = UserManager::builder(memory_settings(), fx.storage.clone(), browser.clone())
            .with_http(fx.http.clone())
            .build()
            .unwrap();
        assert_eq!(restored.load_user().await.unwrap(), Some(session.clone()));
        assert_eq!(restored.user().await, Some(session.clone()));

        let mut expired = session;
        expired.expires_at = Some(OffsetDateTime::now_utc() - time::Duration::minutes(1));
        StateStore::new(fx.storage.clone(), Arc::new(memory_settings()))
            .set_user_state(&expired)
            .await
            .unwrap();
        let stale = UserManager::builder(memory_settings(), fx.storage.clone(), browser)
            .with_http(fx.http.clone())
            .build()
            .unwrap();
        assert_eq!(stale.load_user().await.unwrap(), None);
        assert!(fx.storage.get("oidc.user-state").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_change_signs_user_out() {
        let fx = fixture(memory_settings(), false, Some("changed"));
        let mut events = fx.manager.subscribe();
        fx.sign_in().await;

        let event = next_event(&mut events, |e| matches!(e, UserEvent::SessionChanged { .. })).await;
        assert!(matches!(event, UserEvent::SessionChanged { cleared: true }));
        assert_eq!(fx.manager.user().await, None);
        assert!(!fx.manager.is_monitoring());
    }

    #[tokio::test]
    async fn test_observer_can_cancel_session_change() {
        let fx = fixture(memory_settings(), false, Some("changed"));
        let id = fx.manager.on_session_expiring(SessionExpiring::cancel);
        let mut events = fx.manager.subscribe();
        fx.sign_in().await;

        let event = next_event(&mut events, |e| matches!(e, UserEvent::SessionChanged { .. })).await;
        assert!(matches!(event, UserEvent::SessionChanged { cleared: false }));
        assert!(fx.manager.user().await.is_some());

        assert!(fx.manager.unsubscribe(id));
        assert!(!fx.manager.unsubscribe(id));
    }

    #[tokio::test]
    async fn test_session_errors_are_published() {
        let fx = fixture(memory_settings(), false, Some("error"));
        let mut events = fx.manager.subscribe();
        fx.sign_in().await;

        let event = next_event(&mut events, |e| matches!(e, UserEvent::SessionError { .. })).await;
        assert!(matches!(
            event,
            UserEvent::SessionError { category: ErrorCategory::Protocol, ref message } if message.contains("error")
        ));
        // the provider session is unknown, not changed
        assert!(fx.manager.user().await.is_some());
    }
}
