use crate::controller::{MAX_SPEED, MIN_SPEED};

pub(crate) fn default_speed() -> f32 {
    1.0
}

pub(crate) fn default_min_speed() -> f32 {
    MIN_SPEED
}

pub(crate) fn default_max_speed() -> f32 {
    MAX_SPEED
}

pub(crate) fn default_max_retries() -> u32 {
    3
}

pub(crate) fn default_retry_backoff_ms() -> u64 {
    250
}

pub(crate) fn default_language_tag() -> String {
    "en-US".to_string()
}

pub(crate) fn default_pitch() -> f32 {
    1.0
}

pub(crate) fn default_volume() -> f32 {
    1.0
}

pub(crate) fn default_piper_model_path() -> String {
    "/usr/share/piper-voices/en/en_US/ryan/high/en_US-ryan-high.onnx".to_string()
}

pub(crate) fn default_piper_espeak_path() -> String {
    "/usr/share".to_string()
}

pub(crate) fn default_min_fragment_chars() -> usize {
    10
}

pub(crate) fn default_auto_scroll() -> bool {
    true
}

pub(crate) fn default_center_spoken_sentence() -> bool {
    true
}

pub(crate) fn default_debounce_ms() -> u64 {
    1000
}

pub(crate) fn default_store_dir() -> String {
    crate::progress::DEFAULT_STORE_DIR.to_string()
}
