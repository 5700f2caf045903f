//! Service configuration.
//!
//! Configuration is read from a JSON file once at startup. Every section
//! except the camera catalog has defaults; the catalog may also be supplied
//! through the `CAMERAS_CONFIG` environment variable as a JSON list of
//! compact `"<number>-<host:port>-<stream uri>"` entries, which replaces the
//! catalog from the file.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{CameramanError, CameramanResult};

/// Environment variable holding a compact camera catalog.
pub const CAMERAS_CONFIG_ENV: &str = "CAMERAS_CONFIG";

/// Placeholder replaced with the camera stream URI in capture arguments.
pub const SOURCE_PLACEHOLDER: &str = "{source}";

/// Placeholder replaced with the recording output path in capture arguments.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Upper bound on a camera liveness probe.
pub const MAX_PROBE_TIMEOUT_MS: u64 = 250;

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Directory that receives one output file per recording.
    pub output_dir: PathBuf,

    /// File extension of recording artifacts (container format).
    pub output_extension: String,

    /// Static camera catalog.
    pub cameras: Vec<CameraConfig>,

    /// External capture process settings.
    pub capture: CaptureConfig,

    /// Recording duration policy.
    pub policy: PolicyConfig,

    /// HTTP listener settings.
    pub server: ServerConfig,

    /// Bearer tokens accepted by the API.
    pub auth: AuthConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// One camera catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Unique positive camera number.
    pub number: u32,

    /// `host:port` used for liveness probing.
    pub address: String,

    /// Capture source locator handed to the capture process.
    pub stream_uri: String,
}

/// External capture process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Executable to launch.
    pub program: String,

    /// Argument template. `{source}` and `{output}` are substituted.
    pub args: Vec<String>,

    /// How long to wait for a graceful exit before killing the process.
    pub graceful_stop_timeout_secs: u64,
}

/// Recording duration policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Recordings are never torn down before reaching this length.
    pub min_duration_secs: u64,

    /// Recordings running longer than this are stopped by the reaper.
    pub max_duration_secs: u64,

    /// Reaper scan interval.
    pub reaper_interval_secs: u64,

    /// Liveness probe connect timeout.
    pub probe_timeout_ms: u64,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
}

/// Accepted API tokens, mapped to the identity they authenticate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub tokens: BTreeMap<String, String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "cameraman=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path (appended to).
    pub file: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output").join("video"),
            output_extension: "mp4".to_string(),
            cameras: Vec::new(),
            capture: CaptureConfig::default(),
            policy: PolicyConfig::default(),
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        let args = [
            "-loglevel",
            "warning",
            "-rtsp_transport",
            "tcp",
            "-i",
            SOURCE_PLACEHOLDER,
            "-r",
            "25",
            "-c",
            "copy",
            "-map",
            "0",
            OUTPUT_PLACEHOLDER,
        ];
        Self {
            program: "ffmpeg".to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            graceful_stop_timeout_secs: 10,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_duration_secs: 3,
            max_duration_secs: 60 * 60,
            reaper_interval_secs: 60,
            probe_timeout_ms: 250,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8081".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl CaptureConfig {
    pub fn graceful_stop_timeout(&self) -> Duration {
        Duration::from_secs(self.graceful_stop_timeout_secs)
    }
}

impl PolicyConfig {
    pub fn min_duration(&self) -> Duration {
        Duration::from_secs(self.min_duration_secs)
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl CameraConfig {
    /// Parse the compact `"<number>-<host:port>-<stream uri>"` form.
    ///
    /// Only the first two dashes separate fields, so the stream URI may
    /// itself contain dashes.
    pub fn parse_compact(entry: &str) -> CameramanResult<Self> {
        let mut parts = entry.splitn(3, '-');
        let (Some(number), Some(address), Some(stream_uri)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(CameramanError::config(format!(
                "Camera entry {entry:?} is not of the form <number>-<host:port>-<uri>"
            )));
        };

        let number = number.trim().parse::<u32>().map_err(|e| {
            CameramanError::config(format!("Camera entry {entry:?} has a bad number: {e}"))
        })?;

        Ok(Self {
            number,
            address: address.trim().to_string(),
            stream_uri: stream_uri.trim().to_string(),
        })
    }

    fn validate(&self) -> CameramanResult<()> {
        if self.number == 0 {
            return Err(CameramanError::config("Camera numbers must be positive"));
        }
        let valid_address = self
            .address
            .rsplit_once(':')
            .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
        if !valid_address {
            return Err(CameramanError::config(format!(
                "Camera no.{} address {:?} is not host:port",
                self.number, self.address
            )));
        }
        if self.stream_uri.trim().is_empty() {
            return Err(CameramanError::config(format!(
                "Camera no.{} has an empty stream URI",
                self.number
            )));
        }
        Ok(())
    }
}

/// Parse the JSON value of `CAMERAS_CONFIG`.
pub fn cameras_from_compact_json(raw: &str) -> CameramanResult<Vec<CameraConfig>> {
    let entries: Vec<String> = serde_json::from_str(raw).map_err(|e| {
        CameramanError::config(format!("{CAMERAS_CONFIG_ENV} is not a JSON list of strings: {e}"))
    })?;
    entries
        .iter()
        .map(|entry| CameraConfig::parse_compact(entry))
        .collect()
}

impl ServiceConfig {
    /// Load, apply environment overrides, and validate.
    ///
    /// A missing file is only tolerated when the camera catalog comes from
    /// the environment; every other problem is a fatal configuration error.
    pub fn load(path: Option<&Path>) -> CameramanResult<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(config_file_path);
        let env_cameras = std::env::var(CAMERAS_CONFIG_ENV).ok();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path).map_err(|e| {
                CameramanError::config(format!("Failed to read {}: {e}", config_path.display()))
            })?;
            Self::from_json(&content).map_err(|e| {
                CameramanError::config(format!("Failed to parse {}: {e}", config_path.display()))
            })?
        } else if env_cameras.is_some() {
            tracing::info!(
                path = %config_path.display(),
                "Config file not found, using defaults with {CAMERAS_CONFIG_ENV}"
            );
            Self::default()
        } else {
            return Err(CameramanError::config(format!(
                "Config file {} not found and {CAMERAS_CONFIG_ENV} is not set",
                config_path.display()
            )));
        };

        if let Some(raw) = env_cameras {
            config.cameras = cameras_from_compact_json(&raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document without validating it.
    pub fn from_json(content: &str) -> CameramanResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Check the invariants the service relies on at startup.
    pub fn validate(&self) -> CameramanResult<()> {
        if self.cameras.is_empty() {
            return Err(CameramanError::config("Camera catalog is empty"));
        }

        let mut seen = HashSet::new();
        for camera in &self.cameras {
            camera.validate()?;
            if !seen.insert(camera.number) {
                return Err(CameramanError::config(format!(
                    "Camera no.{} is configured more than once",
                    camera.number
                )));
            }
        }

        if self.capture.program.trim().is_empty() {
            return Err(CameramanError::config("Capture program is empty"));
        }
        if !self.capture.args.iter().any(|a| a.contains(OUTPUT_PLACEHOLDER)) {
            return Err(CameramanError::config(format!(
                "Capture arguments must reference {OUTPUT_PLACEHOLDER}"
            )));
        }
        if self.output_extension.is_empty() || self.output_extension.contains('/') {
            return Err(CameramanError::config(format!(
                "Invalid output extension {:?}",
                self.output_extension
            )));
        }
        if self.policy.reaper_interval_secs == 0 || self.policy.probe_timeout_ms == 0 {
            return Err(CameramanError::config(
                "Reaper interval and probe timeout must be positive",
            ));
        }
        if self.policy.probe_timeout_ms > MAX_PROBE_TIMEOUT_MS {
            return Err(CameramanError::config(format!(
                "Probe timeout {}ms exceeds the {MAX_PROBE_TIMEOUT_MS}ms limit",
                self.policy.probe_timeout_ms
            )));
        }
        if self.policy.max_duration_secs < self.policy.min_duration_secs {
            return Err(CameramanError::config(
                "Maximum recording duration is below the minimum",
            ));
        }

        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("cameraman").join("config.json")
}
