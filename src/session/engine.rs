//! Stream engine seam
//!
//! The hardware encoder and the outbound RTSP protocol engine are external
//! collaborators. This module defines the narrow surface the session
//! controller drives, plus the two listener capabilities it hands the
//! engine for event delivery. The listener interface is split in two on
//! purpose: connection-level events and per-viewer events are unrelated
//! concerns, and an engine may wire them to different internals.

use crate::config::StreamConfig;
use crate::errors::StreamError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Opaque handle for a connected viewer. Created and destroyed by the
/// protocol engine; only observed by the session controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewerId(Uuid);

impl ViewerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ViewerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ViewerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Connection-level events from the protocol engine. Invoked on engine
/// threads, never on the control context.
pub trait ConnectionListener: Send + Sync {
    fn on_connection_established(&self);
    fn on_connection_failed(&self, reason: &str);
    fn on_auth_success(&self);
    fn on_auth_failure(&self);
}

/// Per-viewer events from the protocol engine. Invoked on engine threads.
pub trait ViewerListener: Send + Sync {
    fn on_viewer_connected(&self, viewer: ViewerId);
    fn on_viewer_disconnected(&self, viewer: ViewerId);
    fn on_viewer_bitrate(&self, viewer: ViewerId, bitrate_bps: u64);
}

/// Hardware encoder + outbound protocol engine.
///
/// Engines are single-shot: parameters cannot change in place, so a fresh
/// engine is built for every session start. `prepare_video` and
/// `prepare_audio` must both succeed before `start`; any failure obliges
/// the caller to drop the half-initialized engine.
pub trait StreamEngine: Send {
    fn prepare_video(&mut self, config: &StreamConfig) -> Result<(), StreamError>;
    fn prepare_audio(&mut self) -> Result<(), StreamError>;
    fn start(
        &mut self,
        connection: Arc<dyn ConnectionListener>,
        viewers: Arc<dyn ViewerListener>,
    ) -> Result<(), StreamError>;
    fn stop(&mut self);
}

/// Builds a fresh engine for a session start.
pub type EngineFactory =
    Box<dyn Fn(&StreamConfig) -> Result<Box<dyn StreamEngine>, StreamError> + Send + Sync>;
