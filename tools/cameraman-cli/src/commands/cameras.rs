//! Probe configured cameras.

use std::path::PathBuf;

use cameraman_capture_engine::{Camera, CameraRegistry};

pub async fn run(config: Option<PathBuf>, json: bool, verbose: bool) -> anyhow::Result<()> {
    let config = super::load_config(config, verbose)?;

    let cameras: Vec<Camera> = config.cameras.iter().cloned().map(Camera::from).collect();
    let registry = CameraRegistry::new(cameras, config.policy.probe_timeout())?;
    let statuses = registry.probe_all().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    println!("{:>8}  {:<24}  {:<6}  STREAM", "CAMERA", "ADDRESS", "STATUS");
    for (camera, status) in registry.list_all().iter().zip(&statuses) {
        println!(
            "{:>8}  {:<24}  {:<6}  {}",
            camera.number,
            camera.address,
            if status.is_up { "up" } else { "down" },
            camera.stream_uri
        );
    }

    let up = statuses.iter().filter(|s| s.is_up).count();
    println!();
    println!("{up} of {} cameras reachable", statuses.len());

    Ok(())
}
