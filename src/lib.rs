//! LocalCam: turn a device camera into a single-viewer LAN video source
//!
//! This crate owns the stream session lifecycle: exclusive camera
//! ownership, arbitration between two mutually-exclusive delivery paths,
//! validated runtime configuration, and a stable viewer-facing endpoint.
//!
//! # Delivery paths
//! - **Primary**: a hardware-encoded RTSP stream driven through the
//!   [`session::StreamEngine`] seam, published at
//!   `rtsp://<lan-ipv4>:<port>/live`.
//! - **Secondary**: a lightweight motion-JPEG relay served over HTTP on a
//!   fixed port, with a `?action=snapshot` single-image variant.
//!
//! The two paths never run concurrently against the camera: starting the
//! primary session pauses (never releases) the relay's frame delivery, and
//! stopping it hands delivery back.
//!
//! # Usage
//! ```rust,no_run
//! use localcam::camera::synthetic::SyntheticCamera;
//! use localcam::StreamManager;
//!
//! let manager = StreamManager::new(
//!     "settings.json",
//!     Box::new(|_config| Err(localcam::StreamError::EncoderInitFailure(
//!         "no engine linked".to_string(),
//!     ))),
//! );
//! let camera = SyntheticCamera::new(640, 480, 15);
//! manager.attach_camera(Box::new(camera)).expect("camera busy");
//! println!("MJPEG preview at {}", manager.mjpeg_url());
//! ```

pub mod camera;
pub mod config;
pub mod errors;
pub mod manager;
pub mod net;
pub mod permissions;
pub mod relay;
pub mod session;

// Re-exports for convenience
pub use config::{ConfigStore, ConfigUpdate, StreamConfig};
pub use errors::StreamError;
pub use manager::{SessionState, StreamManager};
pub use net::ViewerEndpoint;
pub use relay::FrameRelay;
pub use session::{SessionController, SessionEvent, SessionPhase};

/// Initialize logging for the streaming system
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "localcam=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_metadata() {
        assert_eq!(NAME, "localcam");
        assert!(!VERSION.is_empty());
        assert!(!DESCRIPTION.is_empty());
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
    }
}
