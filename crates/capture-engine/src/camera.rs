//! Camera catalog and liveness probing.

use std::sync::Arc;
use std::time::Duration;

use cameraman_common::config::CameraConfig;
use cameraman_common::error::{CameramanError, CameramanResult};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::task::JoinSet;

/// A network camera. Immutable once the registry is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Camera {
    /// Unique positive camera number.
    pub number: u32,
    /// `host:port` used for liveness probing.
    pub address: String,
    /// Capture source locator.
    pub stream_uri: String,
}

impl From<CameraConfig> for Camera {
    fn from(config: CameraConfig) -> Self {
        Self {
            number: config.number,
            address: config.address,
            stream_uri: config.stream_uri,
        }
    }
}

impl std::fmt::Display for Camera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Camera no.{} host at {}", self.number, self.address)
    }
}

/// Point-in-time reachability of one camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CameraStatus {
    pub number: u32,
    pub address: String,
    pub is_up: bool,
}

/// Reachability check against a camera's network address.
#[async_trait::async_trait]
pub trait LivenessProbe: Send + Sync {
    /// Returns whether the camera answered. Never fails.
    async fn is_up(&self, camera: &Camera) -> bool;
}

/// Probe that opens a TCP connection to the camera address.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(Duration::from_millis(250))
    }
}

#[async_trait::async_trait]
impl LivenessProbe for TcpProbe {
    async fn is_up(&self, camera: &Camera) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(camera.address.as_str())).await
        {
            Ok(Ok(_stream)) => {
                tracing::debug!(camera = camera.number, address = %camera.address, "Camera is up");
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    camera = camera.number,
                    address = %camera.address,
                    error = %e,
                    "Camera is unreachable"
                );
                false
            }
            Err(_) => {
                tracing::warn!(
                    camera = camera.number,
                    address = %camera.address,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Camera is unreachable (probe timed out)"
                );
                false
            }
        }
    }
}

/// Catalog of known cameras, ordered by number.
pub struct CameraRegistry {
    cameras: Vec<Camera>,
    probe: Arc<dyn LivenessProbe>,
}

impl CameraRegistry {
    /// Build a registry probing cameras over TCP with the given timeout.
    pub fn new(cameras: Vec<Camera>, probe_timeout: Duration) -> CameramanResult<Self> {
        Self::with_probe(cameras, Arc::new(TcpProbe::new(probe_timeout)))
    }

    /// Build a registry with a custom liveness probe.
    pub fn with_probe(
        mut cameras: Vec<Camera>,
        probe: Arc<dyn LivenessProbe>,
    ) -> CameramanResult<Self> {
        if cameras.is_empty() {
            return Err(CameramanError::config("Camera catalog is empty"));
        }
        cameras.sort_by_key(|c| c.number);
        if let Some(pair) = cameras.windows(2).find(|w| w[0].number == w[1].number) {
            return Err(CameramanError::config(format!(
                "Camera no.{} is configured more than once",
                pair[0].number
            )));
        }
        if cameras.first().is_some_and(|c| c.number == 0) {
            return Err(CameramanError::config("Camera numbers must be positive"));
        }

        tracing::info!(cameras = cameras.len(), "Initialized camera registry");
        Ok(Self { cameras, probe })
    }

    /// Find a camera by its number.
    pub fn lookup(&self, number: u32) -> CameramanResult<&Camera> {
        self.cameras
            .binary_search_by_key(&number, |c| c.number)
            .map(|idx| &self.cameras[idx])
            .map_err(|_| CameramanError::unknown_camera(number))
    }

    /// Check whether a camera is reachable right now.
    pub async fn probe(&self, camera: &Camera) -> bool {
        self.probe.is_up(camera).await
    }

    /// All cameras, ordered by number.
    pub fn list_all(&self) -> &[Camera] {
        &self.cameras
    }

    /// Probe every camera concurrently.
    pub async fn probe_all(&self) -> Vec<CameraStatus> {
        let mut probes = JoinSet::new();
        for (idx, camera) in self.cameras.iter().enumerate() {
            let probe = Arc::clone(&self.probe);
            let camera = camera.clone();
            probes.spawn(async move { (idx, probe.is_up(&camera).await) });
        }

        let mut up = vec![false; self.cameras.len()];
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok((idx, is_up)) => up[idx] = is_up,
                Err(e) => tracing::warn!(error = %e, "Camera probe task failed"),
            }
        }

        self.cameras
            .iter()
            .zip(up)
            .map(|(camera, is_up)| CameraStatus {
                number: camera.number,
                address: camera.address.clone(),
                is_up,
            })
            .collect()
    }
}

impl std::fmt::Debug for CameraRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraRegistry")
            .field("cameras", &self.cameras)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe(Vec<u32>);

    #[async_trait::async_trait]
    impl LivenessProbe for FixedProbe {
        async fn is_up(&self, camera: &Camera) -> bool {
            self.0.contains(&camera.number)
        }
    }

    fn camera(number: u32, address: &str) -> Camera {
        Camera {
            number,
            address: address.to_string(),
            stream_uri: format!("rtsp://{address}/stream"),
        }
    }

    #[test]
    fn test_lookup_and_order() {
        let registry = CameraRegistry::with_probe(
            vec![camera(222, "10.0.0.2:554"), camera(7, "10.0.0.7:554")],
            Arc::new(FixedProbe(vec![])),
        )
        .unwrap();

        let numbers: Vec<u32> = registry.list_all().iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![7, 222]);
        assert_eq!(registry.lookup(222).unwrap().address, "10.0.0.2:554");
        assert!(matches!(
            registry.lookup(3),
            Err(CameramanError::UnknownCamera { ref number }) if number == "3"
        ));
    }

    #[test]
    fn test_rejects_empty_and_duplicate_catalogs() {
        let probe: Arc<dyn LivenessProbe> = Arc::new(FixedProbe(vec![]));
        assert!(CameraRegistry::with_probe(vec![], probe.clone()).is_err());
        assert!(CameraRegistry::with_probe(
            vec![camera(1, "a:1"), camera(1, "b:1")],
            probe.clone()
        )
        .is_err());
        assert!(CameraRegistry::with_probe(vec![camera(0, "a:1")], probe).is_err());
    }

    #[tokio::test]
    async fn test_probe_all_keeps_number_order() {
        let registry = CameraRegistry::with_probe(
            vec![camera(3, "c:1"), camera(1, "a:1"), camera(2, "b:1")],
            Arc::new(FixedProbe(vec![1, 3])),
        )
        .unwrap();

        let statuses = registry.probe_all().await;
        let summary: Vec<(u32, bool)> = statuses.iter().map(|s| (s.number, s.is_up)).collect();
        assert_eq!(summary, vec![(1, true), (2, false), (3, true)]);
    }

    #[tokio::test]
    async fn test_tcp_probe_detects_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let probe = TcpProbe::default();

        assert!(probe.is_up(&camera(1, &addr.to_string())).await);

        drop(listener);
        assert!(!probe.is_up(&camera(1, &addr.to_string())).await);
    }

    #[tokio::test]
    async fn test_tcp_probe_handles_unresolvable_address() {
        let probe = TcpProbe::new(Duration::from_millis(50));
        assert!(!probe.is_up(&camera(1, "not-an-address")).await);
    }
}
