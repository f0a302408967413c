//! Polling loop over the check session frame.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{OnceCell, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use url::Url;

use super::{CheckSessionFrame, SessionCheck, SessionStatus};
use crate::OidcResult;
use crate::config::OidcSettings;
use crate::error::{OidcError, ProtocolError};
use crate::metadata::MetadataResolver;
use crate::user::UserSession;

const STOPPED: u64 = 0;

/// Polls the provider session of the signed-in user.
///
/// At most one run is armed at a time. Each run gets a generation number and
/// only the task of the armed generation may probe or disarm, so a task that
/// outlives its run cannot touch the next one.
pub struct SessionMonitor {
    settings: Arc<OidcSettings>,
    metadata: Arc<MetadataResolver>,
    frame: Arc<dyn CheckSessionFrame>,
    loaded: OnceCell<()>,
    next_generation: AtomicU64,
    armed: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for SessionMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionMonitor")
            .field("armed", &self.is_armed())
            .field("frame_loaded", &self.loaded.initialized())
            .finish_non_exhaustive()
    }
}

impl SessionMonitor {
    pub fn new(
        settings: Arc<OidcSettings>,
        metadata: Arc<MetadataResolver>,
        frame: Arc<dyn CheckSessionFrame>,
    ) -> Self {
        Self {
            settings,
            metadata,
            frame,
            loaded: OnceCell::new(),
            next_generation: AtomicU64::new(STOPPED),
            armed: Arc::new(AtomicU64::new(STOPPED)),
            task: Mutex::new(None),
        }
    }

    /// Starts monitoring `session`, stopping any previous run first.
    ///
    /// The frame is loaded on the first start only. The returned channel
    /// receives a [`SessionCheck`] for every change or error and closes when
    /// the run ends.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::MissingSessionState`] without a `session_state`, a
    /// configuration error when the provider has no check session frame, or
    /// the frame loading error.
    pub async fn start(
        &self,
        session: &UserSession,
    ) -> OidcResult<mpsc::UnboundedReceiver<SessionCheck>> {
        self.stop();

        let session_state = session
            .session_state
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or(ProtocolError::MissingSessionState)?;

        let frame_url = self.metadata.check_session_iframe().await?;
        let origin = Url::parse(&frame_url)
            .map_err(|e| OidcError::configuration(format!("Invalid check session frame {frame_url}: {e}")))?
            .origin()
            .ascii_serialization();
        self.loaded
            .get_or_try_init(|| async {
                tracing::debug!("Loading check session frame {}", frame_url);
                self.frame.load(&frame_url, &origin).await
            })
            .await?;

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.armed.store(generation, Ordering::SeqCst);

        let (events, receiver) = mpsc::unbounded_channel();
        let probe = Probe {
            generation,
            armed: self.armed.clone(),
            frame: self.frame.clone(),
            message: format!("{} {}", self.settings.client_id, session_state),
            interval: self.settings.session.interval,
            timeout: self.settings.session.timeout,
            stop_on_error: self.settings.session.stop_on_error,
            events,
        };
        let handle = tokio::spawn(probe.run());
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        tracing::debug!("Session monitor armed (generation {})", generation);
        Ok(receiver)
    }

    /// Disarms the monitor. Calling it while stopped does nothing.
    pub fn stop(&self) {
        let previous = self.armed.swap(STOPPED, Ordering::SeqCst);
        if let Some(handle) = self.task.lock().unwrap_or_else(PoisonError::into_inner).take() {
            handle.abort();
        }
        if previous != STOPPED {
            tracing::debug!("Session monitor stopped (generation {})", previous);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst) != STOPPED
    }
}

impl Drop for SessionMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One armed run.
struct Probe {
    generation: u64,
    armed: Arc<AtomicU64>,
    frame: Arc<dyn CheckSessionFrame>,
    message: String,
    interval: std::time::Duration,
    timeout: std::time::Duration,
    stop_on_error: bool,
    events: mpsc::UnboundedSender<SessionCheck>,
}

impl Probe {
    fn is_current(&self) -> bool {
        self.armed.load(Ordering::SeqCst) == self.generation
    }

    fn disarm(&self) {
        let _ = self.armed.compare_exchange(
            self.generation,
            STOPPED,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    async fn run(self) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if !self.is_current() {
                break;
            }

            let check = match tokio::time::timeout(self.timeout, self.frame.post(&self.message)).await {
                Ok(Ok(reply)) => match SessionStatus::from_reply(&reply) {
                    SessionStatus::Valid => None,
                    SessionStatus::Changed => Some(SessionCheck::Changed),
                    SessionStatus::Error => Some(SessionCheck::bad_reply(&reply)),
                },
                Ok(Err(e)) => Some(SessionCheck::failure(&e)),
                Err(_) => Some(SessionCheck::failure(&OidcError::timeout(
                    "Session check",
                    self.timeout,
                ))),
            };

            // stopped while the probe was in flight
            if !self.is_current() {
                break;
            }

            match check {
                None => tracing::trace!("Provider session unchanged"),
                Some(SessionCheck::Changed) => {
                    tracing::debug!("Provider session changed");
                    self.disarm();
                    let _ = self.events.send(SessionCheck::Changed);
                    break;
                }
                Some(failure) => {
                    tracing::debug!("{}", failure);
                    if self.stop_on_error {
                        self.disarm();
                    }
                    let delivered = self.events.send(failure).is_ok();
                    if self.stop_on_error || !delivered {
                        self.disarm();
                        break;
                    }
                }
            }
        }
    }
}
