//! Minimal HTTP server for the motion-JPEG relay
//!
//! Serves two things on a fixed port distinct from the RTSP port: a
//! continuous `multipart/x-mixed-replace` JPEG stream, and a single-image
//! snapshot at `?action=snapshot`. No auth, no TLS, no other surface.
//!
//! The relay's `next_frame` is a blocking call, so every pull is moved off
//! the async reactor with `spawn_blocking`. A failed write means the viewer
//! disconnected; the connection task ends, which is the consumer-disconnect
//! detection the relay itself does not perform.

use crate::relay::FrameRelay;
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const BOUNDARY: &str = "localcamframe";

#[derive(Debug, Error)]
pub enum RelayServerError {
    #[error("failed to bind MJPEG port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

/// HTTP front-end for a [`FrameRelay`].
pub struct MjpegServer {
    listener: TcpListener,
    relay: Arc<FrameRelay>,
}

impl MjpegServer {
    /// Bind the relay port on all interfaces. Pass port 0 to let the OS
    /// choose (tests).
    pub async fn bind(relay: Arc<FrameRelay>, port: u16) -> Result<Self, RelayServerError> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|source| RelayServerError::Bind { port, source })?;
        Ok(Self { listener, relay })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept viewers until the task is dropped.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    log::info!("MJPEG viewer connected: {}", peer);
                    let relay = self.relay.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, relay).await {
                            log::debug!("MJPEG viewer {} gone: {}", peer, e);
                        }
                        log::info!("MJPEG viewer disconnected: {}", peer);
                    });
                }
                Err(e) => {
                    log::warn!("MJPEG accept failed: {}", e);
                }
            }
        }
    }
}

async fn handle_client(mut stream: TcpStream, relay: Arc<FrameRelay>) -> std::io::Result<()> {
    let mut buf = [0u8; 1024];
    let n = stream.read(&mut buf).await?;
    let request = String::from_utf8_lossy(&buf[..n]);
    let target = request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();

    if target.contains("action=snapshot") {
        serve_snapshot(&mut stream, &relay).await
    } else {
        serve_stream(&mut stream, &relay).await
    }
}

async fn serve_snapshot(stream: &mut TcpStream, relay: &Arc<FrameRelay>) -> std::io::Result<()> {
    match pull_frame(relay).await {
        Some(frame) => {
            let header = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                frame.len()
            );
            stream.write_all(header.as_bytes()).await?;
            stream.write_all(&frame).await?;
            stream.flush().await
        }
        None => {
            stream
                .write_all(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await
        }
    }
}

async fn serve_stream(stream: &mut TcpStream, relay: &Arc<FrameRelay>) -> std::io::Result<()> {
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: multipart/x-mixed-replace; boundary={}\r\nConnection: close\r\n\r\n",
        BOUNDARY
    );
    stream.write_all(header.as_bytes()).await?;

    while let Some(frame) = pull_frame(relay).await {
        let part = format!(
            "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
            BOUNDARY,
            frame.len()
        );
        stream.write_all(part.as_bytes()).await?;
        stream.write_all(&frame).await?;
        stream.write_all(b"\r\n").await?;
        stream.flush().await?;
    }
    Ok(())
}

async fn pull_frame(relay: &Arc<FrameRelay>) -> Option<Bytes> {
    let relay = relay.clone();
    tokio::task::spawn_blocking(move || relay.next_frame())
        .await
        .unwrap_or(None)
}
