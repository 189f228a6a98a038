//! Primary session controller
//!
//! Orchestrates the hardware-encoded stream: pauses the secondary path's
//! camera delivery, prepares a fresh engine with validated parameters,
//! starts the outbound protocol engine, and forwards its events as
//! observable notifications. Every failure path unwinds to a well-defined
//! state: the engine is dropped, the secondary path resumes, and the phase
//! returns to Idle. The camera is never left held by a half-initialized
//! session.
//!
//! Path switches are serialized by a single switch mutex: a start arriving
//! while a stop is unwinding queues behind it, never interleaves.

pub mod engine;

pub use engine::{ConnectionListener, EngineFactory, StreamEngine, ViewerId, ViewerListener};

use crate::camera::CameraController;
use crate::config::StreamConfig;
use crate::errors::StreamError;
use crate::net;
use crossbeam_channel::{Receiver, Sender};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Preparing,
    Active,
    Stopping,
}

/// Observable notifications surfaced by the controller. Read-only for the
/// caller; only `ConnectionFailed` feeds back into session state.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    EndpointPublished(String),
    ConnectionEstablished,
    ConnectionFailed(String),
    ViewerConnected(ViewerId),
    ViewerDisconnected(ViewerId),
    ViewerBitrate(ViewerId, u64),
    AuthSuccess,
    AuthFailure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionErrorKind {
    AlreadyActive,
    EncoderInit,
    ProtocolStart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    pub kind: SessionErrorKind,
    pub message: String,
}

impl SessionError {
    pub fn already_active() -> Self {
        Self {
            kind: SessionErrorKind::AlreadyActive,
            message: "session is already active".to_string(),
        }
    }

    pub fn encoder_init(error: StreamError) -> Self {
        Self {
            kind: SessionErrorKind::EncoderInit,
            message: error.to_string(),
        }
    }

    pub fn protocol_start(error: StreamError) -> Self {
        Self {
            kind: SessionErrorKind::ProtocolStart,
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SessionError {}

struct SessionInner {
    camera: Arc<CameraController>,
    factory: EngineFactory,
    phase: Mutex<SessionPhase>,
    engine: Mutex<Option<Box<dyn StreamEngine>>>,
    // Serializes path switches. Held across every start/stop transition.
    switch: Mutex<()>,
    events_tx: Sender<SessionEvent>,
    events_rx: Receiver<SessionEvent>,
    viewers: Mutex<HashSet<ViewerId>>,
}

/// Lifecycle controller for the primary (hardware-encoded) delivery path.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<SessionInner>,
}

impl SessionController {
    pub fn new(camera: Arc<CameraController>, factory: EngineFactory) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Self {
            inner: Arc::new(SessionInner {
                camera,
                factory,
                phase: Mutex::new(SessionPhase::Idle),
                engine: Mutex::new(None),
                switch: Mutex::new(()),
                events_tx,
                events_rx,
                viewers: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Receiver for session event notifications.
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.inner.events_rx.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        *self.inner.phase.lock().expect("lock poisoned")
    }

    pub fn is_active(&self) -> bool {
        self.phase() == SessionPhase::Active
    }

    /// Viewers currently observed on the stream. Single-viewer by design;
    /// a second simultaneous viewer is accepted but best-effort.
    pub fn viewer_count(&self) -> usize {
        self.inner.viewers.lock().expect("lock poisoned").len()
    }

    /// Start the encoded stream with `config`.
    ///
    /// Pauses (never releases) the secondary path's camera delivery, then
    /// prepares video and audio on a fresh engine. Any failure unwinds
    /// fully: engine dropped, secondary path resumed, phase back to Idle.
    /// A second start without an intervening stop is rejected.
    pub fn start(&self, config: &StreamConfig) -> Result<(), SessionError> {
        let inner = &self.inner;
        let _switch = inner.switch.lock().expect("lock poisoned");

        {
            let mut phase = inner.phase.lock().expect("lock poisoned");
            if *phase != SessionPhase::Idle {
                return Err(SessionError::already_active());
            }
            *phase = SessionPhase::Preparing;
        }

        inner.camera.pause();

        let mut engine = match (inner.factory)(config) {
            Ok(engine) => engine,
            Err(e) => return Err(self.unwind_preparing(SessionError::encoder_init(e))),
        };
        if let Err(e) = engine.prepare_video(config) {
            return Err(self.unwind_preparing(SessionError::encoder_init(e)));
        }
        if let Err(e) = engine.prepare_audio() {
            return Err(self.unwind_preparing(SessionError::encoder_init(e)));
        }

        let connection = Arc::new(ConnectionEvents {
            inner: inner.clone(),
        });
        let viewers = Arc::new(ViewerEvents {
            inner: inner.clone(),
        });
        if let Err(e) = engine.start(connection, viewers) {
            return Err(self.unwind_preparing(SessionError::protocol_start(e)));
        }

        *inner.engine.lock().expect("lock poisoned") = Some(engine);
        *inner.phase.lock().expect("lock poisoned") = SessionPhase::Active;

        if net::ViewerEndpoint::resolve(config).is_none() {
            log::warn!("No LAN-reachable address; publishing placeholder endpoint");
        }
        let url = net::build_url(config);
        log::info!("Streaming at {}", url);
        let _ = inner.events_tx.send(SessionEvent::EndpointPublished(url));
        Ok(())
    }

    /// Stop the encoded stream and resume the secondary path.
    ///
    /// Idempotent: stopping an Idle session is a no-op that changes no
    /// state and emits no events.
    pub fn stop(&self) {
        let inner = &self.inner;
        let _switch = inner.switch.lock().expect("lock poisoned");

        {
            let mut phase = inner.phase.lock().expect("lock poisoned");
            if *phase == SessionPhase::Idle {
                return;
            }
            *phase = SessionPhase::Stopping;
        }

        if let Some(mut engine) = inner.engine.lock().expect("lock poisoned").take() {
            engine.stop();
        }
        inner.viewers.lock().expect("lock poisoned").clear();
        *inner.phase.lock().expect("lock poisoned") = SessionPhase::Idle;
        inner.camera.resume();
        log::info!("Stream session stopped");
    }

    /// Restart with new parameters. The engine cannot reconfigure in
    /// place, so an active session is stopped before the fresh start.
    pub fn apply_config(&self, config: &StreamConfig) -> Result<(), SessionError> {
        if self.is_active() {
            self.stop();
        }
        self.start(config)
    }

    // Failure unwind shared by every prepare/start error and by
    // connection-failed. The engine was dropped by the caller; the phase
    // is still Preparing and the switch lock is held.
    fn unwind_preparing(&self, err: SessionError) -> SessionError {
        self.inner.camera.resume();
        *self.inner.phase.lock().expect("lock poisoned") = SessionPhase::Idle;
        log::warn!("Stream start failed: {}", err);
        err
    }
}

// Connection-event capability handed to the engine.
struct ConnectionEvents {
    inner: Arc<SessionInner>,
}

impl ConnectionListener for ConnectionEvents {
    fn on_connection_established(&self) {
        log::info!("RTSP ready");
        let _ = self.inner.events_tx.send(SessionEvent::ConnectionEstablished);
    }

    fn on_connection_failed(&self, reason: &str) {
        log::warn!("Connection failed: {}", reason);
        let _ = self
            .inner
            .events_tx
            .send(SessionEvent::ConnectionFailed(reason.to_string()));
        force_idle(&self.inner);
    }

    fn on_auth_success(&self) {
        let _ = self.inner.events_tx.send(SessionEvent::AuthSuccess);
    }

    fn on_auth_failure(&self) {
        log::warn!("Viewer authentication failed");
        let _ = self.inner.events_tx.send(SessionEvent::AuthFailure);
    }
}

// Viewer-event capability handed to the engine.
struct ViewerEvents {
    inner: Arc<SessionInner>,
}

impl ViewerListener for ViewerEvents {
    fn on_viewer_connected(&self, viewer: ViewerId) {
        let mut viewers = self.inner.viewers.lock().expect("lock poisoned");
        viewers.insert(viewer);
        if viewers.len() > 1 {
            log::warn!("{} viewers connected; only one is supported", viewers.len());
        }
        let _ = self
            .inner
            .events_tx
            .send(SessionEvent::ViewerConnected(viewer));
    }

    fn on_viewer_disconnected(&self, viewer: ViewerId) {
        self.inner.viewers.lock().expect("lock poisoned").remove(&viewer);
        let _ = self
            .inner
            .events_tx
            .send(SessionEvent::ViewerDisconnected(viewer));
    }

    fn on_viewer_bitrate(&self, viewer: ViewerId, bitrate_bps: u64) {
        let _ = self
            .inner
            .events_tx
            .send(SessionEvent::ViewerBitrate(viewer, bitrate_bps));
    }
}

// Forced unwind to Idle on a connection failure, reusing the stop path.
// Called from engine threads: if a path switch is already in flight the
// switch itself settles the state, so contention is not an error.
fn force_idle(inner: &Arc<SessionInner>) {
    let _switch = match inner.switch.try_lock() {
        Ok(guard) => guard,
        Err(_) => {
            log::debug!("Switch in flight during connection failure; state settles there");
            return;
        }
    };

    {
        let mut phase = inner.phase.lock().expect("lock poisoned");
        if *phase != SessionPhase::Active {
            return;
        }
        *phase = SessionPhase::Stopping;
    }

    if let Some(mut engine) = inner.engine.lock().expect("lock poisoned").take() {
        engine.stop();
    }
    inner.viewers.lock().expect("lock poisoned").clear();
    *inner.phase.lock().expect("lock poisoned") = SessionPhase::Idle;
    inner.camera.resume();
}
