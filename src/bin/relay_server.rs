// LocalCam relay server
// Serves the motion-JPEG preview path over HTTP and prints the viewer
// endpoints. The primary RTSP path needs a linked stream engine and is not
// started here.

use localcam::camera::nokhwa_backend::NokhwaCamera;
use localcam::camera::synthetic::SyntheticCamera;
use localcam::camera::CameraDevice;
use localcam::net::MJPEG_PORT;
use localcam::permissions::{self, PermissionStatus};
use localcam::relay::http::MjpegServer;
use localcam::{StreamError, StreamManager};
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    localcam::init_logging();

    let args: Vec<String> = env::args().collect();
    let synthetic = args.iter().any(|a| a == "--synthetic");
    let device_id = args
        .iter()
        .position(|a| a == "--device")
        .and_then(|i| args.get(i + 1))
        .cloned()
        .unwrap_or_else(|| "0".to_string());

    let device: Box<dyn CameraDevice> = if synthetic {
        log::info!("Using synthetic camera");
        Box::new(SyntheticCamera::new(640, 480, 15))
    } else {
        let info = permissions::check_permission_detailed();
        if info.status == PermissionStatus::Denied {
            return Err(StreamError::PermissionDenied(info.message).into());
        }
        Box::new(NokhwaCamera::open(&device_id)?)
    };

    let manager = StreamManager::new(
        "localcam-settings.json",
        Box::new(|_config| {
            Err(StreamError::EncoderInitFailure(
                "no stream engine linked in this binary".to_string(),
            ))
        }),
    );
    manager.attach_camera(device)?;

    if localcam::net::resolve_lan_address().is_none() {
        log::warn!("No LAN-reachable IPv4 address; endpoints shown with a placeholder host");
    }
    println!("MJPEG preview:  {}", manager.mjpeg_url());
    println!("Snapshot:       {}?action=snapshot", manager.mjpeg_url());
    println!("RTSP endpoint:  {} (requires a stream engine)", manager.endpoint_url());

    let server = MjpegServer::bind(manager.relay(), MJPEG_PORT).await?;

    let (tx, rx) = std::sync::mpsc::channel::<()>();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })?;

    tokio::select! {
        _ = server.run() => {}
        _ = tokio::task::spawn_blocking(move || {
            let _ = rx.recv();
        }) => {
            log::info!("Interrupt received, shutting down");
        }
    }

    manager.shutdown();
    Ok(())
}
