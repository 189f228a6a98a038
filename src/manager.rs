//! Stream session lifecycle manager
//!
//! Facade owning the configuration store, the camera resource controller,
//! the frame relay, and the primary session controller. All state
//! mutations funnel through here on the caller's control context; the
//! camera and engine threads only ever deliver data into queues and event
//! channels.

use crate::camera::{CameraController, CameraDevice};
use crate::config::{ConfigStore, ConfigUpdate, StreamConfig};
use crate::errors::StreamError;
use crate::net;
use crate::relay::FrameRelay;
use crate::session::{EngineFactory, SessionController, SessionError, SessionEvent};
use crossbeam_channel::Receiver;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Overall camera-ownership state. Once a camera is attached, exactly one
/// of Previewing and Streaming holds; Idle only before a camera is
/// attached or after teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Previewing,
    Streaming,
}

pub struct StreamManager {
    config: Mutex<ConfigStore>,
    camera: Arc<CameraController>,
    relay: Arc<FrameRelay>,
    session: SessionController,
}

impl StreamManager {
    /// Build a manager with settings persisted at `settings_path` and the
    /// given engine factory for the primary path.
    ///
    /// Callers are expected to preflight camera permissions (see
    /// [`crate::permissions`]); a denied permission is fatal to any
    /// streaming attempt and should be surfaced without retry.
    pub fn new<P: AsRef<Path>>(settings_path: P, factory: EngineFactory) -> Self {
        let camera = Arc::new(CameraController::new());
        let relay = Arc::new(FrameRelay::new());
        let session = SessionController::new(camera.clone(), factory);
        Self {
            config: Mutex::new(ConfigStore::load(settings_path)),
            camera,
            relay,
            session,
        }
    }

    /// Take ownership of the camera device and start the secondary relay
    /// path. Transitions Idle -> Previewing.
    pub fn attach_camera(&self, device: Box<dyn CameraDevice>) -> Result<(), StreamError> {
        self.camera.acquire(device)?;
        self.relay.start(&self.camera)?;
        Ok(())
    }

    /// Start the primary encoded stream with the current config.
    pub fn start_streaming(&self) -> Result<(), SessionError> {
        let config = self.config.lock().expect("lock poisoned").config();
        self.session.start(&config)
    }

    /// Stop the primary stream; ownership returns to the relay. No-op when
    /// not streaming.
    pub fn stop_streaming(&self) {
        self.session.stop();
    }

    /// Validate and apply new settings, persisting the merged result.
    ///
    /// A change arriving while streaming forces a stop, then a fresh start
    /// with the new parameters; the encoder cannot reconfigure in place.
    pub fn apply_settings(&self, update: &ConfigUpdate) -> StreamConfig {
        let was_active = self.session.is_active();
        if was_active {
            self.session.stop();
        }
        let config = self.config.lock().expect("lock poisoned").apply(update);
        if was_active {
            if let Err(e) = self.session.start(&config) {
                log::warn!("Restart with new settings failed: {}", e);
            }
        }
        config
    }

    pub fn config(&self) -> StreamConfig {
        self.config.lock().expect("lock poisoned").config()
    }

    pub fn state(&self) -> SessionState {
        if self.session.is_active() {
            SessionState::Streaming
        } else if self.camera.is_held() {
            SessionState::Previewing
        } else {
            SessionState::Idle
        }
    }

    /// Primary endpoint URL for the current config, recomputed on every
    /// call (placeholder host when no LAN address is available).
    pub fn endpoint_url(&self) -> String {
        net::build_url(&self.config())
    }

    /// Secondary relay URL.
    pub fn mjpeg_url(&self) -> String {
        net::mjpeg_url()
    }

    /// Session event notifications (endpoint published, viewers, auth).
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.session.events()
    }

    /// The relay, for serving over HTTP.
    pub fn relay(&self) -> Arc<FrameRelay> {
        self.relay.clone()
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    /// Stop everything and close the camera. Transitions to Idle.
    pub fn shutdown(&self) {
        self.session.stop();
        self.relay.stop(&self.camera);
        self.relay.close();
        self.camera.release();
        log::info!("Stream manager shut down");
    }
}

impl Drop for StreamManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
