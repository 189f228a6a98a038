//! Hardware camera backend built on nokhwa's callback camera
//!
//! Frames arrive on nokhwa's capture thread. MJPEG-native buffers are
//! passed through untouched; everything else is decoded to RGB8 before it
//! reaches the registered [`FrameCallback`].

use crate::camera::{CameraDevice, FrameCallback, RawFrame};
use crate::errors::StreamError;
use nokhwa::{
    pixel_format::RgbFormat,
    utils::{CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType},
    Buffer, CallbackCamera,
};
use std::sync::{Arc, Mutex};

/// Physical camera device delivering frames via callback.
pub struct NokhwaCamera {
    camera: CallbackCamera,
    callback: Arc<Mutex<Option<FrameCallback>>>,
    device_id: String,
}

impl NokhwaCamera {
    /// Open the camera with the given device id (a numeric index).
    pub fn open(device_id: &str) -> Result<Self, StreamError> {
        let index = device_id
            .parse::<u32>()
            .map_err(|_| StreamError::ConfigError(format!("invalid device id: {}", device_id)))?;

        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
        let callback: Arc<Mutex<Option<FrameCallback>>> = Arc::new(Mutex::new(None));

        let sink = callback.clone();
        let camera = CallbackCamera::new(CameraIndex::Index(index), requested, move |buffer| {
            if let Some(frame) = convert_buffer(buffer) {
                if let Some(cb) = sink.lock().expect("lock poisoned").as_mut() {
                    cb(frame);
                }
            }
        })
        .map_err(|e| StreamError::HardwareFault(format!("failed to open camera: {}", e)))?;

        Ok(Self {
            camera,
            callback,
            device_id: device_id.to_string(),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl CameraDevice for NokhwaCamera {
    fn set_frame_callback(&mut self, callback: FrameCallback) -> Result<(), StreamError> {
        *self.callback.lock().expect("lock poisoned") = Some(callback);
        Ok(())
    }

    fn clear_frame_callback(&mut self) -> Result<(), StreamError> {
        *self.callback.lock().expect("lock poisoned") = None;
        Ok(())
    }

    fn start_delivery(&mut self) -> Result<(), StreamError> {
        self.camera
            .open_stream()
            .map_err(|e| StreamError::HardwareFault(format!("failed to start delivery: {}", e)))
    }

    fn stop_delivery(&mut self) -> Result<(), StreamError> {
        self.camera
            .stop_stream()
            .map_err(|e| StreamError::HardwareFault(format!("failed to stop delivery: {}", e)))
    }
}

impl Drop for NokhwaCamera {
    fn drop(&mut self) {
        let _ = self.camera.stop_stream();
    }
}

fn convert_buffer(buffer: Buffer) -> Option<RawFrame> {
    let resolution = buffer.resolution();
    if buffer.source_frame_format() == FrameFormat::MJPEG {
        return Some(RawFrame::new(
            buffer.buffer_bytes().to_vec(),
            resolution.width_x,
            resolution.height_y,
            "MJPEG",
        ));
    }

    match buffer.decode_image::<RgbFormat>() {
        Ok(decoded) => Some(RawFrame::new(
            decoded.into_raw(),
            resolution.width_x,
            resolution.height_y,
            "RGB8",
        )),
        Err(e) => {
            log::debug!("Dropping undecodable frame: {}", e);
            None
        }
    }
}
