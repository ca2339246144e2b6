//! Configuration types for the proctored session controller.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration for a proctored session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProctorConfig {
    /// Session-start / session-end HTTP collaborator.
    pub backend: BackendConfig,
    /// Session channel (socket) behaviour.
    pub channel: ChannelConfig,
    /// Integrity policy thresholds.
    pub integrity: IntegrityConfig,
    /// Session duration and timeouts.
    pub session: SessionConfig,
    /// Speech recognition and synthesis settings.
    pub speech: SpeechConfig,
    /// Face-presence sampling settings.
    pub face: FaceConfig,
}

/// HTTP collaborator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the interview service (`http://` or `https://`).
    ///
    /// The channel URL is derived from this by switching the scheme to
    /// `ws://` / `wss://`.
    pub base_url: String,
    /// Path prefix for all API routes.
    pub api_prefix: String,
    /// Per-request timeout for start/end calls.
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_owned(),
            api_prefix: "/api".to_owned(),
            request_timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Session channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Period of the `ping` heartbeat while connected.
    pub heartbeat_interval_ms: u64,
    /// Fixed delay before a reconnection attempt after an abnormal close.
    pub reconnect_delay_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: 30_000,
            reconnect_delay_ms: 3_000,
        }
    }
}

impl ChannelConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Integrity policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrityConfig {
    /// Secure-mode exit attempt that terminates the session.
    pub max_secure_mode_exits: u32,
    /// Minimum spacing between two `no_face` warnings.
    pub face_warning_interval_ms: u64,
    /// A flag is dropped if one of the same kind was recorded within this window.
    pub flag_dedup_window_ms: u64,
    /// Delay between the terminate directive and ending the session.
    pub termination_grace_ms: u64,
    /// Delay before secure mode is re-requested after a tolerated exit.
    pub secure_mode_reenter_delay_ms: u64,
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            max_secure_mode_exits: 3,
            face_warning_interval_ms: 5_000,
            flag_dedup_window_ms: 5_000,
            termination_grace_ms: 2_000,
            secure_mode_reenter_delay_ms: 100,
        }
    }
}

impl IntegrityConfig {
    pub fn face_warning_interval(&self) -> Duration {
        Duration::from_millis(self.face_warning_interval_ms)
    }

    pub fn flag_dedup_window(&self) -> Duration {
        Duration::from_millis(self.flag_dedup_window_ms)
    }

    pub fn termination_grace(&self) -> Duration {
        Duration::from_millis(self.termination_grace_ms)
    }

    pub fn secure_mode_reenter_delay(&self) -> Duration {
        Duration::from_millis(self.secure_mode_reenter_delay_ms)
    }
}

/// Session duration and timeout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Hard limit on the live session length (25 minutes by default).
    pub duration_limit_secs: u64,
    /// How long to wait for an agent reply before surfacing a timeout notice.
    pub response_timeout_secs: u64,
    /// Wait after `end_interview` so the remote side can acknowledge.
    pub end_ack_grace_ms: u64,
    /// Delay before navigating to the results view after a clean end.
    pub results_navigation_delay_ms: u64,
    /// Delay before navigating to the results view when the end call failed.
    pub failed_end_navigation_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_limit_secs: 25 * 60,
            response_timeout_secs: 45,
            end_ack_grace_ms: 2_000,
            results_navigation_delay_ms: 1_500,
            failed_end_navigation_delay_ms: 2_000,
        }
    }
}

impl SessionConfig {
    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    pub fn end_ack_grace(&self) -> Duration {
        Duration::from_millis(self.end_ack_grace_ms)
    }

    pub fn results_navigation_delay(&self) -> Duration {
        Duration::from_millis(self.results_navigation_delay_ms)
    }

    pub fn failed_end_navigation_delay(&self) -> Duration {
        Duration::from_millis(self.failed_end_navigation_delay_ms)
    }
}

/// Speech recognition / synthesis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// BCP-47 language tag for recognition.
    pub language: String,
    /// Playback rate for synthesized agent utterances (1.0 = normal).
    pub speech_rate: f32,
    /// Whether interim (non-final) recognition results are surfaced to the UI.
    pub interim_results: bool,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_owned(),
            speech_rate: 0.9,
            interim_results: true,
        }
    }
}

/// Face-presence sampling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceConfig {
    /// Interval between analysed video frames.
    pub sample_interval_ms: u64,
    /// Requested capture width in pixels.
    pub frame_width: u32,
    /// Requested capture height in pixels.
    pub frame_height: u32,
    /// Detector confidence below which a detection is discarded.
    pub min_detection_confidence: f32,
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 100,
            frame_width: 640,
            frame_height: 480,
            min_detection_confidence: 0.5,
        }
    }
}

impl FaceConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(1))
    }
}

impl ProctorConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::ProctorError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ProctorError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/proctor/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp/proctor-config"))
            .join("proctor")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn defaults_match_session_policy() {
        let config = ProctorConfig::default();
        assert_eq!(config.channel.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(config.channel.reconnect_delay(), Duration::from_secs(3));
        assert_eq!(config.integrity.max_secure_mode_exits, 3);
        assert_eq!(config.integrity.face_warning_interval(), Duration::from_secs(5));
        assert_eq!(config.integrity.flag_dedup_window(), Duration::from_secs(5));
        assert_eq!(config.integrity.termination_grace(), Duration::from_secs(2));
        assert_eq!(config.session.duration_limit_secs, 1500);
        assert_eq!(config.session.response_timeout(), Duration::from_secs(45));
        assert!((config.speech.speech_rate - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ProctorConfig::default();
        config.backend.base_url = "https://interviews.example.com".to_owned();
        config.session.duration_limit_secs = 600;
        config.integrity.max_secure_mode_exits = 5;

        assert!(config.save_to_file(&path).is_ok());
        assert!(path.exists());

        let loaded = match ProctorConfig::from_file(&path) {
            Ok(c) => c,
            Err(e) => unreachable!("load should succeed: {e}"),
        };
        assert_eq!(loaded.backend.base_url, "https://interviews.example.com");
        assert_eq!(loaded.session.duration_limit_secs, 600);
        assert_eq!(loaded.integrity.max_secure_mode_exits, 5);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[channel]\nreconnect_delay_ms = 500\n").expect("write config");

        let loaded = ProctorConfig::from_file(&path).expect("load partial config");
        assert_eq!(loaded.channel.reconnect_delay_ms, 500);
        assert_eq!(loaded.channel.heartbeat_interval_ms, 30_000);
        assert_eq!(loaded.session.response_timeout_secs, 45);
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = ProctorConfig::from_file(std::path::Path::new("/nonexistent/proctor.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn from_file_invalid_toml_returns_config_error() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[session\nduration_limit_secs = ").expect("write config");

        match ProctorConfig::from_file(&path) {
            Err(crate::error::ProctorError::Config(_)) => {}
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn default_path_ends_with_proctor_config() {
        let path = ProctorConfig::default_config_path();
        assert!(path.ends_with("proctor/config.toml"));
    }
}
