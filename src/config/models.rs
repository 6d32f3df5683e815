use crate::backend::{BackendKind, LocalVoiceSettings, VoiceProfile};
use crate::controller::PlaybackSettings;
use crate::highlight::HighlightSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration, flattened from the sectioned TOML file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default = "crate::config::defaults::default_speed")]
    pub speed: f32,
    #[serde(default = "crate::config::defaults::default_min_speed")]
    pub min_speed: f32,
    #[serde(default = "crate::config::defaults::default_max_speed")]
    pub max_speed: f32,
    #[serde(default = "crate::config::defaults::default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "crate::config::defaults::default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub remote_voice_id: Option<String>,
    #[serde(default)]
    pub remote_endpoint: Option<String>,
    #[serde(default = "crate::config::defaults::default_language_tag")]
    pub language_tag: String,
    #[serde(default = "crate::config::defaults::default_pitch")]
    pub pitch: f32,
    #[serde(default = "crate::config::defaults::default_volume")]
    pub volume: f32,
    #[serde(default = "crate::config::defaults::default_piper_model_path")]
    pub piper_model_path: String,
    #[serde(default = "crate::config::defaults::default_piper_espeak_path")]
    pub piper_espeak_path: String,
    #[serde(default = "crate::config::defaults::default_min_fragment_chars")]
    pub min_fragment_chars: usize,
    #[serde(default = "crate::config::defaults::default_auto_scroll")]
    pub auto_scroll: bool,
    #[serde(default = "crate::config::defaults::default_center_spoken_sentence")]
    pub center_spoken_sentence: bool,
    #[serde(default = "crate::config::defaults::default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "crate::config::defaults::default_store_dir")]
    pub store_dir: String,
    #[serde(default)]
    pub log_level: LogLevel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        use crate::config::defaults;
        Self {
            speed: defaults::default_speed(),
            min_speed: defaults::default_min_speed(),
            max_speed: defaults::default_max_speed(),
            max_retries: defaults::default_max_retries(),
            retry_backoff_ms: defaults::default_retry_backoff_ms(),
            backend: BackendKind::default(),
            remote_voice_id: None,
            remote_endpoint: None,
            language_tag: defaults::default_language_tag(),
            pitch: defaults::default_pitch(),
            volume: defaults::default_volume(),
            piper_model_path: defaults::default_piper_model_path(),
            piper_espeak_path: defaults::default_piper_espeak_path(),
            min_fragment_chars: defaults::default_min_fragment_chars(),
            auto_scroll: defaults::default_auto_scroll(),
            center_spoken_sentence: defaults::default_center_spoken_sentence(),
            debounce_ms: defaults::default_debounce_ms(),
            store_dir: defaults::default_store_dir(),
            log_level: LogLevel::default(),
        }
    }
}

impl EngineConfig {
    pub fn playback_settings(&self) -> PlaybackSettings {
        PlaybackSettings {
            speed: self.speed,
            min_speed: self.min_speed,
            max_speed: self.max_speed,
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn highlight_settings(&self) -> HighlightSettings {
        HighlightSettings {
            min_fragment_chars: self.min_fragment_chars,
            auto_scroll: self.auto_scroll,
            center_spoken_sentence: self.center_spoken_sentence,
        }
    }

    pub fn local_voice(&self) -> LocalVoiceSettings {
        LocalVoiceSettings {
            language_tag: self.language_tag.clone(),
            pitch: self.pitch,
            volume: self.volume,
        }
    }

    pub fn voice_profile(&self) -> VoiceProfile {
        VoiceProfile {
            backend_kind: self.backend,
            remote_voice_id: self.remote_voice_id.clone(),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn store_path(&self) -> PathBuf {
        PathBuf::from(&self.store_dir)
    }

    /// Repair values that would make the engine misbehave.
    pub fn sanitized(mut self) -> Self {
        let defaults = EngineConfig::default();
        let valid_speed = |value: f32| value.is_finite() && value > 0.0;
        if !valid_speed(self.min_speed)
            || !valid_speed(self.max_speed)
            || self.min_speed > self.max_speed
        {
            self.min_speed = defaults.min_speed;
            self.max_speed = defaults.max_speed;
        }
        self.speed = if self.speed.is_finite() {
            self.speed.clamp(self.min_speed, self.max_speed)
        } else {
            defaults.speed
        };
        self.volume = if self.volume.is_finite() {
            self.volume.clamp(0.0, 1.0)
        } else {
            defaults.volume
        };
        self.pitch = if self.pitch.is_finite() {
            self.pitch.clamp(0.0, 2.0)
        } else {
            defaults.pitch
        };
        self.remote_voice_id = self.remote_voice_id.filter(|id| !id.trim().is_empty());
        self.remote_endpoint = self.remote_endpoint.filter(|url| !url.trim().is_empty());
        self
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    #[default]
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
