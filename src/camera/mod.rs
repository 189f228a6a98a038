//! Camera resource control
//!
//! The physical camera is the one hard mutual-exclusion point in the
//! system. [`CameraController`] holds the single open device handle and
//! gives both delivery paths cheap pause/resume semantics: pausing stops
//! frame delivery but keeps the device open, so switching between the
//! motion-JPEG relay and the encoded session never pays a full reopen.
//!
//! Backend faults during pause/resume are absorbed here. Camera drivers on
//! older devices throw spuriously on rapid state changes; those errors are
//! logged and the operation becomes a no-op, leaving the controller in its
//! last-known-good state.

pub mod nokhwa_backend;
pub mod synthetic;

use crate::errors::StreamError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Frame pixel data as delivered by a camera backend.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    /// Source format tag, e.g. "RGB8" or "MJPEG".
    pub format: String,
    pub timestamp: DateTime<Utc>,
}

impl RawFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: impl Into<String>) -> Self {
        Self {
            data: Bytes::from(data),
            width,
            height,
            format: format.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Callback invoked on the backend's delivery thread for every raw frame.
///
/// Runs on a foreign thread: it must never block on control-path locks.
pub type FrameCallback = Box<dyn FnMut(RawFrame) + Send>;

/// A camera hardware backend.
///
/// Implementations retain the last-registered callback across
/// `stop_delivery`/`start_delivery`, which is what makes pause/resume
/// cheap. Dropping the device closes it.
pub trait CameraDevice: Send {
    fn set_frame_callback(&mut self, callback: FrameCallback) -> Result<(), StreamError>;
    fn clear_frame_callback(&mut self) -> Result<(), StreamError>;
    fn start_delivery(&mut self) -> Result<(), StreamError>;
    fn stop_delivery(&mut self) -> Result<(), StreamError>;
}

// Process-wide count of open device handles. The at-most-one invariant is
// enforced at acquire time and observable by tests.
static OPEN_HANDLES: AtomicUsize = AtomicUsize::new(0);

/// Number of camera device handles currently open in this process.
pub fn open_handle_count() -> usize {
    OPEN_HANDLES.load(Ordering::SeqCst)
}

struct ControllerInner {
    device: Option<Box<dyn CameraDevice>>,
    delivering: bool,
}

/// Exclusive owner of the physical camera.
pub struct CameraController {
    inner: Mutex<ControllerInner>,
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraController {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ControllerInner {
                device: None,
                delivering: false,
            }),
        }
    }

    /// Take exclusive ownership of `device`. Fails with `DeviceBusy` if any
    /// handle is already open anywhere in the process.
    pub fn acquire(&self, device: Box<dyn CameraDevice>) -> Result<(), StreamError> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if inner.device.is_some() {
            return Err(StreamError::DeviceBusy(
                "camera already held by this controller".to_string(),
            ));
        }
        if OPEN_HANDLES
            .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(StreamError::DeviceBusy(
                "another camera handle is open in this process".to_string(),
            ));
        }
        inner.device = Some(device);
        inner.delivering = false;
        log::info!("Camera device acquired");
        Ok(())
    }

    /// Whether a device handle is currently held.
    pub fn is_held(&self) -> bool {
        self.inner.lock().expect("lock poisoned").device.is_some()
    }

    /// Whether frame delivery is currently enabled.
    pub fn is_delivering(&self) -> bool {
        self.inner.lock().expect("lock poisoned").delivering
    }

    /// Register the frame callback used by delivery.
    pub fn set_frame_callback(&self, callback: FrameCallback) -> Result<(), StreamError> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        match inner.device.as_mut() {
            Some(device) => device.set_frame_callback(callback),
            None => Err(StreamError::HardwareFault("no camera acquired".to_string())),
        }
    }

    /// Deregister the frame callback.
    pub fn clear_frame_callback(&self) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if let Some(device) = inner.device.as_mut() {
            if let Err(e) = device.clear_frame_callback() {
                log::warn!("clear_frame_callback failed: {}", e);
            }
        }
    }

    /// Stop frame delivery but retain the open device handle.
    ///
    /// Backend faults are logged and swallowed; the handle stays open.
    pub fn pause(&self) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if let Some(device) = inner.device.as_mut() {
            match device.stop_delivery() {
                Ok(()) => inner.delivering = false,
                Err(e) => log::warn!("pause camera failed: {}", e),
            }
        }
    }

    /// Re-enable frame delivery using the last-registered callback.
    ///
    /// Backend faults are logged and swallowed.
    pub fn resume(&self) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if let Some(device) = inner.device.as_mut() {
            match device.start_delivery() {
                Ok(()) => inner.delivering = true,
                Err(e) => log::warn!("resume camera failed: {}", e),
            }
        }
    }

    /// Fully close the device.
    pub fn release(&self) {
        let mut inner = self.inner.lock().expect("lock poisoned");
        if let Some(mut device) = inner.device.take() {
            if let Err(e) = device.stop_delivery() {
                log::warn!("stop during release failed: {}", e);
            }
            drop(device);
            inner.delivering = false;
            OPEN_HANDLES.fetch_sub(1, Ordering::SeqCst);
            log::info!("Camera device released");
        }
    }
}

impl Drop for CameraController {
    fn drop(&mut self) {
        self.release();
    }
}
