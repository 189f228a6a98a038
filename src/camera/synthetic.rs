//! Synthetic camera backend
//!
//! Generates gradient test frames on a worker thread at a fixed rate,
//! enabling offline development and deterministic tests without hardware.

use crate::camera::{CameraDevice, FrameCallback, RawFrame};
use crate::errors::StreamError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

struct Shared {
    callback: Mutex<Option<FrameCallback>>,
    delivering: AtomicBool,
    shutdown: AtomicBool,
}

/// Thread-driven camera that produces RGB8 gradient frames.
pub struct SyntheticCamera {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
    width: u32,
    height: u32,
    interval: Duration,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            shared: Arc::new(Shared {
                callback: Mutex::new(None),
                delivering: AtomicBool::new(false),
                shutdown: AtomicBool::new(false),
            }),
            thread: None,
            width,
            height,
            interval: Duration::from_millis(1000 / fps.max(1) as u64),
        }
    }

    fn ensure_thread(&mut self) {
        if self.thread.is_some() {
            return;
        }
        let shared = self.shared.clone();
        let (width, height, interval) = (self.width, self.height, self.interval);
        let handle = std::thread::Builder::new()
            .name("localcam-synthetic-camera".to_string())
            .spawn(move || delivery_loop(shared, width, height, interval))
            .expect("spawn synthetic camera thread");
        self.thread = Some(handle);
    }
}

impl CameraDevice for SyntheticCamera {
    fn set_frame_callback(&mut self, callback: FrameCallback) -> Result<(), StreamError> {
        *self.shared.callback.lock().expect("lock poisoned") = Some(callback);
        Ok(())
    }

    fn clear_frame_callback(&mut self) -> Result<(), StreamError> {
        *self.shared.callback.lock().expect("lock poisoned") = None;
        Ok(())
    }

    fn start_delivery(&mut self) -> Result<(), StreamError> {
        self.ensure_thread();
        self.shared.delivering.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_delivery(&mut self) -> Result<(), StreamError> {
        self.shared.delivering.store(false, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

fn delivery_loop(shared: Arc<Shared>, width: u32, height: u32, interval: Duration) {
    let mut frame_number = 0u64;
    while !shared.shutdown.load(Ordering::SeqCst) {
        if shared.delivering.load(Ordering::SeqCst) {
            let frame = gradient_frame(frame_number, width, height);
            if let Some(callback) = shared.callback.lock().expect("lock poisoned").as_mut() {
                callback(frame);
            }
            frame_number += 1;
        }
        std::thread::sleep(interval);
    }
}

/// RGB gradient that varies by position and frame number, so consecutive
/// frames are distinguishable downstream.
fn gradient_frame(frame_number: u64, width: u32, height: u32) -> RawFrame {
    let base = (frame_number % 256) as u8;
    let mut data = vec![0u8; (width * height * 3) as usize];
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            data[idx] = base.wrapping_add((x % 256) as u8);
            data[idx + 1] = base.wrapping_add((y % 256) as u8);
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
        }
    }
    RawFrame::new(data, width, height, "RGB8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_frame_correct_size() {
        let frame = gradient_frame(0, 320, 240);
        assert_eq!(frame.width, 320);
        assert_eq!(frame.height, 240);
        assert_eq!(frame.data.len(), 320 * 240 * 3);
        assert_eq!(frame.format, "RGB8");
    }

    #[test]
    fn test_gradient_frames_differ() {
        let frame0 = gradient_frame(0, 32, 32);
        let frame1 = gradient_frame(1, 32, 32);
        assert_ne!(frame0.data[0], frame1.data[0]);
    }

    #[test]
    fn test_delivery_respects_pause() {
        use std::sync::atomic::AtomicUsize;

        let mut camera = SyntheticCamera::new(32, 32, 60);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        camera
            .set_frame_callback(Box::new(move |_| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        camera.start_delivery().unwrap();
        std::thread::sleep(Duration::from_millis(120));
        camera.stop_delivery().unwrap();
        let delivered = count.load(Ordering::SeqCst);
        assert!(delivered > 0, "expected frames while delivering");

        std::thread::sleep(Duration::from_millis(120));
        let after_pause = count.load(Ordering::SeqCst);
        // A frame already in flight may land, but delivery must stop.
        assert!(after_pause <= delivered + 1);
    }
}
