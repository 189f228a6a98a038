//! End-to-end tests for the secondary delivery path: synthetic camera ->
//! relay queue -> MJPEG HTTP server.

use localcam::camera::synthetic::SyntheticCamera;
use localcam::camera::CameraController;
use localcam::relay::http::MjpegServer;
use localcam::relay::FrameRelay;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

// The open-handle invariant is process-wide; run these tests one at a time.
fn serial() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

async fn running_server() -> (Arc<CameraController>, Arc<FrameRelay>, std::net::SocketAddr) {
    let camera = Arc::new(CameraController::new());
    camera
        .acquire(Box::new(SyntheticCamera::new(64, 48, 30)))
        .expect("camera acquire");
    let relay = Arc::new(FrameRelay::new());
    relay.start(&camera).expect("relay start");

    let server = MjpegServer::bind(relay.clone(), 0).await.expect("bind");
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(server.run());
    (camera, relay, addr)
}

#[tokio::test]
async fn test_snapshot_returns_single_jpeg() {
    let _guard = serial();
    let (camera, relay, addr) = running_server().await;

    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream
        .write_all(b"GET /?action=snapshot HTTP/1.1\r\nHost: localcam\r\n\r\n")
        .await
        .expect("request");

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.expect("response");
    let text = String::from_utf8_lossy(&response);

    assert!(text.starts_with("HTTP/1.1 200 OK"), "bad status: {}", &text[..40.min(text.len())]);
    assert!(text.contains("Content-Type: image/jpeg"));

    let body_start = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("header terminator")
        + 4;
    assert_eq!(&response[body_start..body_start + 2], &[0xFF, 0xD8], "missing JPEG SOI");

    relay.close();
    camera.release();
}

#[tokio::test]
async fn test_stream_uses_multipart_replace() {
    let _guard = serial();
    let (camera, relay, addr) = running_server().await;

    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localcam\r\n\r\n")
        .await
        .expect("request");

    // Read the response head plus at least one part header.
    let mut received = Vec::new();
    let mut chunk = [0u8; 2048];
    while received.len() < 256 {
        let n = stream.read(&mut chunk).await.expect("read");
        if n == 0 {
            break;
        }
        received.extend_from_slice(&chunk[..n]);
    }
    let text = String::from_utf8_lossy(&received);

    assert!(text.starts_with("HTTP/1.1 200 OK"));
    assert!(text.contains("multipart/x-mixed-replace"), "missing content type: {}", text);
    assert!(text.contains("Content-Type: image/jpeg"), "no frame part seen: {}", text);

    drop(stream);
    relay.close();
    camera.release();
}

#[tokio::test]
async fn test_relay_eviction_under_stalled_consumer() {
    let _guard = serial();
    let camera = Arc::new(CameraController::new());
    camera
        .acquire(Box::new(SyntheticCamera::new(64, 48, 60)))
        .expect("camera acquire");
    let relay = Arc::new(FrameRelay::new());
    relay.start(&camera).expect("relay start");

    // Nobody consumes: the queue must cap at its fixed capacity and evict.
    tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    assert!(relay.queued_frames() <= localcam::relay::QUEUE_CAPACITY);
    assert!(relay.dropped_frames() > 0, "expected evictions under a stalled consumer");

    relay.close();
    camera.release();
}
