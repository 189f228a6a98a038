//! Motion-JPEG frame relay (secondary delivery path)
//!
//! A camera frame callback JPEG-encodes every delivered frame and pushes it
//! into a small bounded queue. When the queue is full the oldest buffered
//! frame is evicted before the new one is enqueued, so a slow consumer can
//! never block the camera thread or grow memory without bound. Consumers
//! pull with [`FrameRelay::next_frame`], a blocking read with no timeout;
//! consumer-disconnect detection belongs to the HTTP layer, not here.

pub mod http;

use crate::camera::{CameraController, RawFrame};
use crate::errors::StreamError;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};

/// Fixed JPEG quality for relayed frames.
pub const JPEG_QUALITY: u8 = 70;

/// Bounded queue capacity. Small on purpose: the relay serves the freshest
/// frames, not a backlog.
pub const QUEUE_CAPACITY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Stopped,
    Running,
}

struct QueueInner {
    frames: VecDeque<Bytes>,
    capacity: usize,
    dropped: u64,
    closed: bool,
}

/// Bounded FIFO of encoded JPEG buffers, newest-frame-wins on overflow.
struct FrameQueue {
    inner: Mutex<QueueInner>,
    cv: Condvar,
}

impl FrameQueue {
    fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                frames: VecDeque::with_capacity(capacity),
                capacity: capacity.max(1),
                dropped: 0,
                closed: false,
            }),
            cv: Condvar::new(),
        }
    }

    fn push_evict_oldest(&self, frame: Bytes) {
        let mut g = self.inner.lock().expect("lock poisoned");
        if g.closed {
            return;
        }
        if g.frames.len() >= g.capacity {
            g.frames.pop_front();
            g.dropped = g.dropped.saturating_add(1);
        }
        g.frames.push_back(frame);
        self.cv.notify_one();
    }

    fn pop_blocking(&self) -> Option<Bytes> {
        let mut g = self.inner.lock().expect("lock poisoned");
        loop {
            if let Some(frame) = g.frames.pop_front() {
                return Some(frame);
            }
            if g.closed {
                return None;
            }
            g = self.cv.wait(g).expect("lock poisoned");
        }
    }

    fn drain(&self) {
        let mut g = self.inner.lock().expect("lock poisoned");
        g.frames.clear();
    }

    fn dropped(&self) -> u64 {
        self.inner.lock().expect("lock poisoned").dropped
    }

    fn len(&self) -> usize {
        self.inner.lock().expect("lock poisoned").frames.len()
    }

    fn close(&self) {
        let mut g = self.inner.lock().expect("lock poisoned");
        g.closed = true;
        self.cv.notify_all();
    }
}

/// Secondary delivery path: camera frames -> JPEG -> bounded queue -> HTTP.
pub struct FrameRelay {
    queue: Arc<FrameQueue>,
    state: Mutex<RelayState>,
}

impl Default for FrameRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRelay {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(FrameQueue::new(QUEUE_CAPACITY)),
            state: Mutex::new(RelayState::Stopped),
        }
    }

    pub fn state(&self) -> RelayState {
        *self.state.lock().expect("lock poisoned")
    }

    /// Register the JPEG-producing frame callback on the camera and enable
    /// delivery.
    pub fn start(&self, camera: &CameraController) -> Result<(), StreamError> {
        {
            let mut state = self.state.lock().expect("lock poisoned");
            if *state == RelayState::Running {
                return Ok(());
            }
            *state = RelayState::Running;
        }

        let queue = self.queue.clone();
        let registered = camera.set_frame_callback(Box::new(move |frame| {
            // Runs on the camera thread: encode, push, never wait.
            match encode_jpeg(&frame) {
                Ok(jpeg) => queue.push_evict_oldest(jpeg),
                Err(e) => log::debug!("Dropping unencodable frame: {}", e),
            }
        }));
        if let Err(e) = registered {
            *self.state.lock().expect("lock poisoned") = RelayState::Stopped;
            return Err(e);
        }
        camera.resume();
        log::info!("Frame relay running");
        Ok(())
    }

    /// Deregister the callback and discard buffered frames.
    pub fn stop(&self, camera: &CameraController) {
        {
            let mut state = self.state.lock().expect("lock poisoned");
            if *state == RelayState::Stopped {
                return;
            }
            *state = RelayState::Stopped;
        }
        camera.pause();
        camera.clear_frame_callback();
        self.queue.drain();
        log::info!("Frame relay stopped");
    }

    /// Blocking pull of the next JPEG frame. Returns `None` only after
    /// [`FrameRelay::close`].
    pub fn next_frame(&self) -> Option<Bytes> {
        self.queue.pop_blocking()
    }

    /// Frames evicted because the consumer fell behind.
    pub fn dropped_frames(&self) -> u64 {
        self.queue.dropped()
    }

    /// Frames currently buffered.
    pub fn queued_frames(&self) -> usize {
        self.queue.len()
    }

    /// Unblock all consumers permanently. Used at teardown.
    pub fn close(&self) {
        self.queue.close();
    }
}

/// Encode a raw frame as JPEG at the fixed relay quality. Frames the
/// hardware already encoded as MJPEG pass through untouched.
fn encode_jpeg(frame: &RawFrame) -> Result<Bytes, StreamError> {
    if frame.format == "MJPEG" {
        return Ok(frame.data.clone());
    }
    if frame.format != "RGB8" {
        return Err(StreamError::RelayError(format!(
            "unsupported frame format: {}",
            frame.format
        )));
    }

    let img = image::RgbImage::from_vec(frame.width, frame.height, frame.data.to_vec())
        .ok_or_else(|| StreamError::RelayError("frame size mismatch".to_string()))?;
    let dynamic_img = image::DynamicImage::ImageRgb8(img);

    let mut out = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    dynamic_img
        .write_with_encoder(encoder)
        .map_err(|e| StreamError::RelayError(format!("jpeg encode failed: {}", e)))?;
    Ok(Bytes::from(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frame_bytes(n: u8) -> Bytes {
        Bytes::from(vec![n; 8])
    }

    #[test]
    fn test_queue_evicts_oldest_when_full() {
        let queue = FrameQueue::new(3);
        for n in 0..5u8 {
            queue.push_evict_oldest(frame_bytes(n));
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.dropped(), 2);
        // The survivors are the most recent frames, in arrival order.
        assert_eq!(queue.pop_blocking().unwrap()[0], 2);
        assert_eq!(queue.pop_blocking().unwrap()[0], 3);
        assert_eq!(queue.pop_blocking().unwrap()[0], 4);
    }

    #[test]
    fn test_pop_unblocks_on_close() {
        let queue = Arc::new(FrameQueue::new(2));
        let queue_clone = queue.clone();
        let consumer = std::thread::spawn(move || queue_clone.pop_blocking());
        std::thread::sleep(std::time::Duration::from_millis(50));
        queue.close();
        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn test_push_after_close_is_ignored() {
        let queue = FrameQueue::new(2);
        queue.close();
        queue.push_evict_oldest(frame_bytes(1));
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_encode_jpeg_produces_jpeg_magic() {
        let frame = RawFrame::new(vec![128u8; 32 * 24 * 3], 32, 24, "RGB8");
        let jpeg = encode_jpeg(&frame).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "missing JPEG SOI marker");
    }

    #[test]
    fn test_encode_mjpeg_passthrough() {
        let payload = vec![0xFFu8, 0xD8, 0x01, 0x02];
        let frame = RawFrame::new(payload.clone(), 32, 24, "MJPEG");
        let jpeg = encode_jpeg(&frame).unwrap();
        assert_eq!(&jpeg[..], &payload[..]);
    }

    #[test]
    fn test_encode_rejects_size_mismatch() {
        let frame = RawFrame::new(vec![0u8; 10], 32, 24, "RGB8");
        assert!(encode_jpeg(&frame).is_err());
    }

    proptest! {
        #[test]
        fn prop_queue_never_exceeds_capacity(
            capacity in 1usize..8,
            pushes in proptest::collection::vec(0u8..=255, 0..64),
        ) {
            let queue = FrameQueue::new(capacity);
            for &n in &pushes {
                queue.push_evict_oldest(frame_bytes(n));
            }
            prop_assert!(queue.len() <= capacity);
            prop_assert_eq!(queue.len(), pushes.len().min(capacity));

            // Retained frames are exactly the tail of the push sequence.
            let retained_from = pushes.len().saturating_sub(capacity);
            for &expected in &pushes[retained_from..] {
                let frame = queue.pop_blocking().unwrap();
                prop_assert_eq!(frame[0], expected);
            }
        }
    }
}
