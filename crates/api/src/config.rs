//! Layered application configuration
//!
//! Built-in defaults, then an optional TOML file (`drowsiness.toml`, or the
//! path in `DROWSINESS_CONFIG`), then `DROWSINESS__SECTION__KEY` environment
//! variables.

use camera_capture::CameraConfig;
use cloud_sync::CloudConfig;
use dms::{validate_alert_duration, AlertDurations, DmsConfig, Thresholds, ValidationError};
use monitor::{MonitorConfig, SettingsSnapshot};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "DROWSINESS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "drowsiness.toml";
pub const ENV_PREFIX: &str = "DROWSINESS";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub camera: CameraSection,
    pub detection: DetectionSection,
    pub models: ModelsSection,
    pub affect: AffectSection,
    pub storage: StorageSection,
    pub mqtt: Option<MqttSection>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraSection {
    /// Directory of frames to replay
    pub source: PathBuf,
    pub fps: u32,
    pub looping: bool,
    pub warmup_frames: u32,
    pub mirror: bool,
    pub read_backoff_ms: u64,
    pub throttle_ms: u64,
}

impl Default for CameraSection {
    fn default() -> Self {
        Self {
            source: PathBuf::from("frames"),
            fps: 30,
            looping: true,
            warmup_frames: 10,
            mirror: true,
            read_backoff_ms: 100,
            throttle_ms: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionSection {
    pub eye_threshold: f32,
    pub mouth_threshold: f32,
    pub drowsiness_seconds: f64,
    pub yawning_seconds: f64,
    pub face_confidence: f32,
}

impl Default for DetectionSection {
    fn default() -> Self {
        Self {
            eye_threshold: 0.25,
            mouth_threshold: 0.5,
            drowsiness_seconds: 2.0,
            yawning_seconds: 1.0,
            face_confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsSection {
    pub face_mesh: Option<String>,
    pub emotion: Option<String>,
}

impl Default for ModelsSection {
    fn default() -> Self {
        Self {
            face_mesh: Some("models/face_mesh.onnx".to_string()),
            emotion: Some("models/emotion-ferplus-8.onnx".to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AffectSection {
    pub enabled: bool,
    pub interval_seconds: u64,
    pub grace_seconds: u64,
}

impl Default for AffectSection {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 10,
            grace_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// `None` disables persistence
    pub database_url: Option<String>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            database_url: Some("sqlite://drowsiness.db".to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MqttSection {
    pub host: String,
    pub port: u16,
    pub driver_id: String,
    pub topic_prefix: String,
}

impl Default for MqttSection {
    fn default() -> Self {
        let cloud = CloudConfig::default();
        Self {
            host: cloud.broker_host,
            port: cloud.broker_port,
            driver_id: cloud.driver_id,
            topic_prefix: cloud.topic_prefix,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load from the default locations
    pub fn load() -> Result<Self, config::ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    /// Load with `path` as the (optional) file layer
    pub fn load_from(path: &Path) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Initial live settings, validated like runtime updates
    pub fn settings(&self) -> Result<SettingsSnapshot, ValidationError> {
        let d = &self.detection;
        Ok(SettingsSnapshot {
            thresholds: Thresholds::new(d.eye_threshold, d.mouth_threshold)?,
            durations: AlertDurations {
                drowsiness: validate_alert_duration(d.drowsiness_seconds)?,
                yawning: Duration::from_secs_f64(d.yawning_seconds.max(0.0)),
            },
        })
    }

    pub fn dms_config(&self) -> DmsConfig {
        DmsConfig {
            face_confidence: self.detection.face_confidence,
            landmark_model_path: self.models.face_mesh.clone(),
            ..Default::default()
        }
    }

    pub fn camera_config(&self) -> CameraConfig {
        CameraConfig {
            source: self.camera.source.clone(),
            fps: self.camera.fps,
            looping: self.camera.looping,
        }
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            warmup_frames: self.camera.warmup_frames,
            read_backoff: Duration::from_millis(self.camera.read_backoff_ms),
            throttle: Duration::from_millis(self.camera.throttle_ms),
            mirror: self.camera.mirror,
            affect_grace: Duration::from_secs(self.affect.grace_seconds),
        }
    }

    pub fn affect_interval(&self) -> Duration {
        Duration::from_secs(self.affect.interval_seconds)
    }
}

impl From<&MqttSection> for CloudConfig {
    fn from(section: &MqttSection) -> Self {
        CloudConfig {
            broker_host: section.host.clone(),
            broker_port: section.port,
            driver_id: section.driver_id.clone(),
            topic_prefix: section.topic_prefix.clone(),
            ..Default::default()
        }
    }
}
