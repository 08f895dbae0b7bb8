//! Runtime configuration
//!
//! Every field has a default, so an empty JSON object (or no file at all) is
//! a valid configuration. Durations are written as human-readable strings
//! such as `"50ms"` or `"2s"`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use cybird_core::{CybirdError, CybirdResult};
use cybird_store::ReadPacing;
use serde::{Deserialize, Serialize};

use crate::Extent;

/// Playback timing and prefetch tuning
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Time each frame stays on screen
    #[serde(with = "duration_str")]
    pub frame_interval: Duration,
    /// Period of the playback timer that drives `tick`
    #[serde(with = "duration_str")]
    pub timer_period: Duration,
    /// Minimum time left before the boundary for a prefetch to start
    #[serde(with = "duration_str")]
    pub min_preload_window: Duration,
    /// Consecutive prefetch failures that disable prefetching
    pub max_preload_failures: u8,
    /// Area the frame is drawn into
    pub target_extent: Extent,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        PlaybackConfig {
            frame_interval: Duration::from_millis(50),
            timer_period: Duration::from_millis(10),
            min_preload_window: Duration::from_millis(20),
            max_preload_failures: 3,
            target_extent: Extent::new(240, 240),
        }
    }
}

/// Chunked read tuning
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    pub chunk_size: usize,
    pub yield_every_bytes: usize,
    #[serde(with = "duration_str")]
    pub max_busy: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        let pacing = ReadPacing::default();
        PacingConfig {
            chunk_size: pacing.chunk_size,
            yield_every_bytes: pacing.yield_every_bytes,
            max_busy: pacing.max_busy,
        }
    }
}

impl From<&PacingConfig> for ReadPacing {
    fn from(config: &PacingConfig) -> Self {
        ReadPacing {
            chunk_size: config.chunk_size,
            yield_every_bytes: config.yield_every_bytes,
            max_busy: config.max_busy,
        }
    }
}

/// Render/worker scheduling and queue sizing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Render context period
    #[serde(with = "duration_str")]
    pub render_period: Duration,
    /// Worker context period
    #[serde(with = "duration_str")]
    pub worker_period: Duration,
    /// Bound on shared-state acquisition outside the render loop
    #[serde(with = "duration_str")]
    pub lock_timeout: Duration,
    /// Bound on shared-state acquisition inside the render loop
    #[serde(with = "duration_str")]
    pub render_lock_timeout: Duration,
    pub ui_queue_capacity: usize,
    pub system_queue_capacity: usize,
    /// Longest a sender waits on a full queue
    #[serde(with = "duration_str")]
    pub send_backoff: Duration,
    /// Gesture source poll interval
    #[serde(with = "duration_str")]
    pub sensor_poll_interval: Duration,
    /// Whether gestures start a random subject
    pub gesture_trigger_enabled: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            render_period: Duration::from_millis(5),
            worker_period: Duration::from_millis(10),
            lock_timeout: Duration::from_millis(100),
            render_lock_timeout: Duration::from_millis(10),
            ui_queue_capacity: 10,
            system_queue_capacity: 20,
            send_backoff: Duration::from_millis(100),
            sensor_poll_interval: Duration::from_millis(200),
            gesture_trigger_enabled: true,
        }
    }
}

/// Card layout
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding one sub-directory of frames per subject
    pub subjects_root: PathBuf,
    /// Subject registry CSV
    pub registry: PathBuf,
    /// Sighting statistics JSON
    pub stats: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            subjects_root: PathBuf::from("/birds"),
            registry: PathBuf::from("/configs/bird_config.csv"),
            stats: PathBuf::from("/data/bird_stats.json"),
        }
    }
}

/// Complete runtime configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub playback: PlaybackConfig,
    pub read_pacing: PacingConfig,
    pub coordinator: CoordinatorConfig,
    pub paths: PathsConfig,
}

impl RuntimeConfig {
    /// Parse from JSON text and validate
    pub fn from_json(text: &str) -> CybirdResult<Self> {
        let config: RuntimeConfig =
            serde_json::from_str(text).map_err(|e| CybirdError::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> CybirdResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> CybirdResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CybirdError::Serialization(e.to_string()))
    }

    /// Reject values the runtime cannot operate with
    pub fn validate(&self) -> CybirdResult<()> {
        let invalid = |msg: &str| Err(CybirdError::InvalidConfig(msg.to_string()));

        if self.playback.frame_interval.is_zero() {
            return invalid("playback.frame_interval must be non-zero");
        }
        if self.playback.timer_period.is_zero() {
            return invalid("playback.timer_period must be non-zero");
        }
        if self.playback.max_preload_failures == 0 {
            return invalid("playback.max_preload_failures must be at least 1");
        }
        if self.read_pacing.chunk_size == 0 {
            return invalid("read_pacing.chunk_size must be non-zero");
        }
        if self.coordinator.render_period.is_zero() || self.coordinator.worker_period.is_zero() {
            return invalid("coordinator periods must be non-zero");
        }
        if self.coordinator.ui_queue_capacity == 0 || self.coordinator.system_queue_capacity == 0 {
            return invalid("coordinator queue capacities must be non-zero");
        }
        Ok(())
    }
}

/// Serde adapter for `Duration` as a humantime string
mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.playback.frame_interval, Duration::from_millis(50));
        assert_eq!(config.playback.max_preload_failures, 3);
        assert_eq!(config.read_pacing.chunk_size, 16 * 1024);
        assert_eq!(config.coordinator.ui_queue_capacity, 10);
        assert_eq!(config.coordinator.system_queue_capacity, 20);
        assert_eq!(config.coordinator.lock_timeout, Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = RuntimeConfig::from_json(
            r#"{
                "playback": { "frame_interval": "40ms" },
                "coordinator": { "gesture_trigger_enabled": false },
                "paths": { "subjects_root": "/sd/birds" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.playback.frame_interval, Duration::from_millis(40));
        assert_eq!(config.playback.timer_period, Duration::from_millis(10));
        assert!(!config.coordinator.gesture_trigger_enabled);
        assert_eq!(config.paths.subjects_root, PathBuf::from("/sd/birds"));
        assert_eq!(config.paths.registry, PathBuf::from("/configs/bird_config.csv"));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = RuntimeConfig::default();
        let text = config.to_json().unwrap();
        assert!(text.contains("\"50ms\""));
        assert_eq!(RuntimeConfig::from_json(&text).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = RuntimeConfig::from_json(r#"{ "playback": { "frame_interval": "0s" } }"#)
            .unwrap_err();
        assert!(err.is_configuration());

        let err = RuntimeConfig::from_json(r#"{ "coordinator": { "ui_queue_capacity": 0 } }"#)
            .unwrap_err();
        assert!(err.is_configuration());

        let err = RuntimeConfig::from_json(r#"{ "playback": { "frame_interval": "soon" } }"#)
            .unwrap_err();
        assert!(matches!(err, CybirdError::Serialization(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runtime.json");
        std::fs::write(&path, r#"{ "read_pacing": { "chunk_size": 4096 } }"#).unwrap();

        let config = RuntimeConfig::load(&path).unwrap();
        assert_eq!(ReadPacing::from(&config.read_pacing).chunk_size, 4096);
    }
}
