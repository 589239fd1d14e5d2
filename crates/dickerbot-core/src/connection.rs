//! Communicator connection state machine.
//!
//! ```text
//! Idle         --ShortPress, provisioned-->  Connecting
//! Connecting   --WiFi up, session confirmed-->  Connected
//! Connecting   --association retries exhausted-->  Idle
//! Connected    --session dropped-->  Disconnected   (safe state enforced)
//! Disconnected --transport reconnected-->  Connected
//! Disconnected --ShortPress-->  Connecting
//! ```
//!
//! Transitions are driven only by gestures, the association timer and
//! session events, never by telemetry. WiFi association is checked once
//! per retry interval from the poll loop instead of sleeping.
//!
//! The manager reports what happened as a [`Transition`]; the node turns
//! that into side effects. In particular, [`Transition::SessionDropped`]
//! obliges the node to run the safety enforcer before anything else.

use dickerbot_protocol::ConnectionCredentials;
use tracing::{debug, info, warn};

use crate::config::RetryPolicy;
use crate::credentials::{load_credentials, CredentialStore};
use crate::gesture::GestureEvent;
use crate::hal::{SessionEvent, SessionTransport, WifiRadio};

/// Connection state of the Communicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

/// Sub-state of `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for WiFi; `attempts` status checks done so far.
    Associating { attempts: u32, next_check_ms: u64 },
    /// WiFi is up, waiting for the transport to confirm the session.
    OpeningSession,
}

/// Observable outcome of one state-machine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing changed.
    None,
    /// A short press found no stored credentials.
    NotProvisioned,
    /// WiFi association started.
    AssociationStarted,
    /// An association check failed, another one is scheduled.
    AssociationRetry { attempt: u32 },
    /// All association checks failed; back to `Idle`.
    AssociationFailed { attempts: u32 },
    /// WiFi is up and the session is being opened.
    SessionOpening,
    /// The session is established.
    SessionUp,
    /// `Connected -> Disconnected`. The drivetrain must be made safe now.
    SessionDropped,
    /// Stored credentials were cleared.
    CredentialsCleared,
}

/// Owns the connection state of the Communicator node.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    state: ConnectionState,
    phase: Option<Phase>,
    target: Option<ConnectionCredentials>,
    policy: RetryPolicy,
}

impl ConnectionManager {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            state: ConnectionState::Idle,
            phase: None,
            target: None,
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Association checks made by the attempt in progress.
    pub fn association_attempts(&self) -> u32 {
        match self.phase {
            Some(Phase::Associating { attempts, .. }) => attempts,
            _ => 0,
        }
    }

    /// React to a classified button press.
    pub fn handle_gesture<S, W, T>(
        &mut self,
        gesture: GestureEvent,
        now_ms: u64,
        store: &mut S,
        radio: &mut W,
        session: &mut T,
    ) -> Transition
    where
        S: CredentialStore + ?Sized,
        W: WifiRadio + ?Sized,
        T: SessionTransport + ?Sized,
    {
        match gesture {
            GestureEvent::ShortPress => match self.state {
                ConnectionState::Idle => self.start(now_ms, store, radio),
                ConnectionState::Disconnected => {
                    info!("Restarting connection from Disconnected");
                    session.close();
                    self.start(now_ms, store, radio)
                }
                ConnectionState::Connecting if self.phase == Some(Phase::OpeningSession) => {
                    // The session may never come up against a wrong address.
                    info!("Restarting connection while the session is opening");
                    session.close();
                    self.start(now_ms, store, radio)
                }
                ConnectionState::Connecting | ConnectionState::Connected => {
                    debug!("Short press ignored while {:?}", self.state);
                    Transition::None
                }
            },
            GestureEvent::LongPress => {
                // Only the stored record goes; an attempt in flight or an
                // open session keeps running.
                match store.clear() {
                    Ok(()) => info!("Credentials cleared"),
                    Err(e) => warn!("Failed to clear credentials: {}", e),
                }
                Transition::CredentialsCleared
            }
            GestureEvent::Ignored => Transition::None,
        }
    }

    fn start<S, W>(&mut self, now_ms: u64, store: &mut S, radio: &mut W) -> Transition
    where
        S: CredentialStore + ?Sized,
        W: WifiRadio + ?Sized,
    {
        let Some(credentials) = load_credentials(store) else {
            warn!("Not provisioned, staying idle");
            self.reset();
            return Transition::NotProvisioned;
        };

        info!("Associating with '{}'", credentials.ssid);
        radio.begin(&credentials.ssid, &credentials.password);
        self.state = ConnectionState::Connecting;
        self.phase = Some(Phase::Associating {
            attempts: 0,
            next_check_ms: now_ms + self.policy.interval_ms,
        });
        self.target = Some(credentials);
        Transition::AssociationStarted
    }

    fn reset(&mut self) {
        self.state = ConnectionState::Idle;
        self.phase = None;
        self.target = None;
    }

    /// Advance WiFi association. Makes at most one status check per call,
    /// and only once the retry interval has elapsed.
    pub fn poll_association<W, T>(&mut self, now_ms: u64, radio: &mut W, session: &mut T) -> Transition
    where
        W: WifiRadio + ?Sized,
        T: SessionTransport + ?Sized,
    {
        let Some(Phase::Associating {
            attempts,
            next_check_ms,
        }) = self.phase
        else {
            return Transition::None;
        };
        if now_ms < next_check_ms {
            return Transition::None;
        }

        let attempts = attempts + 1;
        if radio.is_associated() {
            let Some(target) = self.target.as_ref() else {
                self.reset();
                return Transition::None;
            };
            info!(
                "WiFi associated after {} checks, opening session to {}:{}",
                attempts, target.host, target.port
            );
            session.open(&target.host, target.port);
            self.phase = Some(Phase::OpeningSession);
            return Transition::SessionOpening;
        }

        if attempts >= self.policy.max_attempts {
            warn!("WiFi association failed after {} attempts", attempts);
            self.reset();
            return Transition::AssociationFailed { attempts };
        }

        self.phase = Some(Phase::Associating {
            attempts,
            next_check_ms: next_check_ms + self.policy.interval_ms,
        });
        Transition::AssociationRetry { attempt: attempts }
    }

    /// React to a session transport event.
    pub fn handle_session_event(&mut self, event: &SessionEvent) -> Transition {
        match (event, self.state) {
            (SessionEvent::Connected, ConnectionState::Connecting)
                if self.phase == Some(Phase::OpeningSession) =>
            {
                info!("Session established");
                self.state = ConnectionState::Connected;
                self.phase = None;
                Transition::SessionUp
            }
            (SessionEvent::Connected, ConnectionState::Disconnected) => {
                info!("Session re-established");
                self.state = ConnectionState::Connected;
                Transition::SessionUp
            }
            (SessionEvent::Disconnected, ConnectionState::Connected) => {
                warn!("Session dropped");
                self.state = ConnectionState::Disconnected;
                Transition::SessionDropped
            }
            (SessionEvent::Text(_), _) => Transition::None,
            (event, state) => {
                debug!("Session event {:?} ignored while {:?}", event, state);
                Transition::None
            }
        }
    }
}
