use super::defaults;
use super::models::{EngineConfig, LogLevel};
use crate::backend::BackendKind;
use serde::{Deserialize, Serialize};

/// On-disk layout: one TOML table per concern.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    playback: PlaybackConfig,
    #[serde(default)]
    voice: VoiceConfig,
    #[serde(default)]
    highlight: HighlightConfig,
    #[serde(default)]
    progress: ProgressConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

impl From<ConfigTables> for EngineConfig {
    fn from(tables: ConfigTables) -> Self {
        EngineConfig {
            speed: tables.playback.speed,
            min_speed: tables.playback.min_speed,
            max_speed: tables.playback.max_speed,
            max_retries: tables.playback.max_retries,
            retry_backoff_ms: tables.playback.retry_backoff_ms,
            backend: tables.voice.backend,
            remote_voice_id: tables.voice.remote_voice_id,
            remote_endpoint: tables.voice.remote_endpoint,
            language_tag: tables.voice.language_tag,
            pitch: tables.voice.pitch,
            volume: tables.voice.volume,
            piper_model_path: tables.voice.piper_model_path,
            piper_espeak_path: tables.voice.piper_espeak_path,
            min_fragment_chars: tables.highlight.min_fragment_chars,
            auto_scroll: tables.highlight.auto_scroll,
            center_spoken_sentence: tables.highlight.center_spoken_sentence,
            debounce_ms: tables.progress.debounce_ms,
            store_dir: tables.progress.store_dir,
            log_level: tables.logging.log_level,
        }
    }
}

impl From<&EngineConfig> for ConfigTables {
    fn from(config: &EngineConfig) -> Self {
        ConfigTables {
            playback: PlaybackConfig {
                speed: config.speed,
                min_speed: config.min_speed,
                max_speed: config.max_speed,
                max_retries: config.max_retries,
                retry_backoff_ms: config.retry_backoff_ms,
            },
            voice: VoiceConfig {
                backend: config.backend,
                remote_voice_id: config.remote_voice_id.clone(),
                remote_endpoint: config.remote_endpoint.clone(),
                language_tag: config.language_tag.clone(),
                pitch: config.pitch,
                volume: config.volume,
                piper_model_path: config.piper_model_path.clone(),
                piper_espeak_path: config.piper_espeak_path.clone(),
            },
            highlight: HighlightConfig {
                min_fragment_chars: config.min_fragment_chars,
                auto_scroll: config.auto_scroll,
                center_spoken_sentence: config.center_spoken_sentence,
            },
            progress: ProgressConfig {
                debounce_ms: config.debounce_ms,
                store_dir: config.store_dir.clone(),
            },
            logging: LoggingConfig {
                log_level: config.log_level,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct PlaybackConfig {
    #[serde(default = "defaults::default_speed")]
    speed: f32,
    #[serde(default = "defaults::default_min_speed")]
    min_speed: f32,
    #[serde(default = "defaults::default_max_speed")]
    max_speed: f32,
    #[serde(default = "defaults::default_max_retries")]
    max_retries: u32,
    #[serde(default = "defaults::default_retry_backoff_ms")]
    retry_backoff_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        PlaybackConfig {
            speed: defaults::default_speed(),
            min_speed: defaults::default_min_speed(),
            max_speed: defaults::default_max_speed(),
            max_retries: defaults::default_max_retries(),
            retry_backoff_ms: defaults::default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct VoiceConfig {
    #[serde(default)]
    backend: BackendKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    remote_voice_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    remote_endpoint: Option<String>,
    #[serde(default = "defaults::default_language_tag")]
    language_tag: String,
    #[serde(default = "defaults::default_pitch")]
    pitch: f32,
    #[serde(default = "defaults::default_volume")]
    volume: f32,
    #[serde(default = "defaults::default_piper_model_path")]
    piper_model_path: String,
    #[serde(default = "defaults::default_piper_espeak_path")]
    piper_espeak_path: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        VoiceConfig {
            backend: BackendKind::default(),
            remote_voice_id: None,
            remote_endpoint: None,
            language_tag: defaults::default_language_tag(),
            pitch: defaults::default_pitch(),
            volume: defaults::default_volume(),
            piper_model_path: defaults::default_piper_model_path(),
            piper_espeak_path: defaults::default_piper_espeak_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct HighlightConfig {
    #[serde(default = "defaults::default_min_fragment_chars")]
    min_fragment_chars: usize,
    #[serde(default = "defaults::default_auto_scroll")]
    auto_scroll: bool,
    #[serde(default = "defaults::default_center_spoken_sentence")]
    center_spoken_sentence: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        HighlightConfig {
            min_fragment_chars: defaults::default_min_fragment_chars(),
            auto_scroll: defaults::default_auto_scroll(),
            center_spoken_sentence: defaults::default_center_spoken_sentence(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ProgressConfig {
    #[serde(default = "defaults::default_debounce_ms")]
    debounce_ms: u64,
    #[serde(default = "defaults::default_store_dir")]
    store_dir: String,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        ProgressConfig {
            debounce_ms: defaults::default_debounce_ms(),
            store_dir: defaults::default_store_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct LoggingConfig {
    #[serde(default)]
    log_level: LogLevel,
}
