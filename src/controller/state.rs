use crate::backend::BackendKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use ts_rs::TS;

pub const MIN_SPEED: f32 = 0.5;
pub const MAX_SPEED: f32 = 2.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
}

/// Tunables the controller reads once at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSettings {
    pub speed: f32,
    pub min_speed: f32,
    pub max_speed: f32,
    /// Transient interruptions retried in place before the sentence is skipped.
    pub max_retries: u32,
    /// Linear backoff step: the n-th retry waits `n * retry_backoff`.
    pub retry_backoff: Duration,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            speed: 1.0,
            min_speed: MIN_SPEED,
            max_speed: MAX_SPEED,
            max_retries: 3,
            retry_backoff: Duration::from_millis(250),
        }
    }
}

impl PlaybackSettings {
    pub fn clamp_speed(&self, speed: f32) -> f32 {
        let (low, high) = if self.min_speed <= self.max_speed {
            (self.min_speed, self.max_speed)
        } else {
            (MIN_SPEED, MAX_SPEED)
        };
        if speed.is_finite() {
            speed.clamp(low, high)
        } else {
            1.0_f32.clamp(low, high)
        }
    }
}

/// Everything a host UI needs to render transport controls.
#[derive(Debug, Clone, Serialize, PartialEq, TS)]
#[ts(export)]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    /// `-1` when no sentence is active.
    pub current_index: i32,
    pub sentence_count: usize,
    pub speed: f32,
    /// Remote audio requested but not yet audible.
    pub synthesizing: bool,
    #[ts(type = "number")]
    pub generation: u64,
    pub listen_percent: u8,
    pub content_empty: bool,
    pub backend: BackendKind,
    pub can_seek_prev: bool,
    pub can_seek_next: bool,
}

pub fn index_sentinel(index: Option<usize>) -> i32 {
    index
        .and_then(|idx| i32::try_from(idx).ok())
        .unwrap_or(-1)
}

/// `round(index / len * 100)`; zero when nothing is active.
pub fn listen_percent(index: Option<usize>, len: usize) -> u8 {
    match index {
        Some(idx) if len > 0 => {
            let percent = (idx as f64 / len as f64 * 100.0).round();
            percent.clamp(0.0, 100.0) as u8
        }
        _ => 0,
    }
}
