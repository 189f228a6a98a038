//! Network endpoint resolution
//!
//! Discovers the device's LAN-reachable IPv4 address and composes the
//! viewer-facing URLs. Nothing here is cached: the address is re-resolved
//! and the URLs recomposed on every call, so a port change or a network
//! change is reflected immediately.

use crate::config::StreamConfig;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

/// Fixed listening port for the secondary motion-JPEG relay, distinct from
/// the configurable RTSP port.
pub const MJPEG_PORT: u16 = 8080;

/// Resolve the first LAN-reachable, non-loopback IPv4 address of this host.
///
/// Uses a routing probe: an unconnected UDP socket is "connected" to a
/// public address, which asks the OS to select the outbound interface. No
/// datagram is ever sent. Returns `None` when no network is attached,
/// which is a reportable condition, not an error.
pub fn resolve_lan_address() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    match socket.local_addr() {
        Ok(SocketAddr::V4(addr)) if !addr.ip().is_loopback() && !addr.ip().is_unspecified() => {
            Some(*addr.ip())
        }
        _ => None,
    }
}

/// Derived viewer-facing endpoint for the primary stream. Never stored;
/// rebuild it whenever the config or network state may have changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerEndpoint {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl ViewerEndpoint {
    /// Resolve the current endpoint for `config`. `None` means no
    /// LAN-reachable address exists right now; show a placeholder.
    pub fn resolve(config: &StreamConfig) -> Option<Self> {
        resolve_lan_address().map(|host| Self {
            host,
            port: config.port,
        })
    }
}

impl fmt::Display for ViewerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rtsp://{}:{}/live", self.host, self.port)
    }
}

/// Primary stream URL, with an unroutable placeholder host when no network
/// is attached.
pub fn build_url(config: &StreamConfig) -> String {
    match ViewerEndpoint::resolve(config) {
        Some(endpoint) => endpoint.to_string(),
        None => format!("rtsp://0.0.0.0:{}/live", config.port),
    }
}

/// Secondary relay URL (continuous MJPEG stream).
pub fn mjpeg_url() -> String {
    match resolve_lan_address() {
        Some(host) => format!("http://{}:{}/", host, MJPEG_PORT),
        None => format!("http://0.0.0.0:{}/", MJPEG_PORT),
    }
}

/// Single-image variant of the secondary relay URL.
pub fn snapshot_url() -> String {
    format!("{}?action=snapshot", mjpeg_url())
}
