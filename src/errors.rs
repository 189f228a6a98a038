use std::fmt;

#[derive(Debug)]
pub enum StreamError {
    PermissionDenied(String),
    DeviceBusy(String),
    HardwareFault(String),
    ConfigError(String),
    EncoderInitFailure(String),
    ProtocolStartFailure(String),
    NetworkUnavailable(String),
    RelayError(String),
    IoError(String),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StreamError::PermissionDenied(msg) => write!(f, "Permission denied: {}", msg),
            StreamError::DeviceBusy(msg) => write!(f, "Camera device busy: {}", msg),
            StreamError::HardwareFault(msg) => write!(f, "Camera hardware fault: {}", msg),
            StreamError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            StreamError::EncoderInitFailure(msg) => write!(f, "Encoder initialization failed: {}", msg),
            StreamError::ProtocolStartFailure(msg) => write!(f, "Protocol engine start failed: {}", msg),
            StreamError::NetworkUnavailable(msg) => write!(f, "Network unavailable: {}", msg),
            StreamError::RelayError(msg) => write!(f, "Frame relay error: {}", msg),
            StreamError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for StreamError {}
