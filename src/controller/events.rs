use super::state::PlaybackSnapshot;
use serde::Serialize;
use ts_rs::TS;

/// What the controller just did.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PlaybackAction {
    Seek,
    Resume,
    Pause,
    Stop,
    Repeat,
    SentenceStarted,
    Advance,
    Finish,
    Retry,
    SkipFailed,
    SpeedChange,
    Restart,
    ContentChange,
    ContentEmpty,
    Restore,
}

impl PlaybackAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Seek => "seek",
            Self::Resume => "resume",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::Repeat => "repeat",
            Self::SentenceStarted => "sentence_started",
            Self::Advance => "advance",
            Self::Finish => "finish",
            Self::Retry => "retry",
            Self::SkipFailed => "skip_failed",
            Self::SpeedChange => "speed_change",
            Self::Restart => "restart",
            Self::ContentChange => "content_change",
            Self::ContentEmpty => "content_empty",
            Self::Restore => "restore",
        }
    }
}

/// Why the current index moved.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum IndexChangeCause {
    /// Audible output moved on by itself.
    Playback,
    /// Transport controls: seek, next, previous.
    Navigation,
    /// The user clicked or selected text that is already on screen.
    Click,
    /// Seeded from a stored progress record.
    Restore,
    /// Stop, end of list or a content change cleared the position.
    Reset,
}

impl IndexChangeCause {
    /// Scroll only when the reader may not be looking at the sentence.
    pub fn wants_scroll(self) -> bool {
        matches!(self, Self::Playback | Self::Navigation | Self::Restore)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, TS)]
#[ts(export)]
pub struct PlaybackEvent {
    pub action: PlaybackAction,
    /// Set when the current index changed.
    pub cause: Option<IndexChangeCause>,
    pub snapshot: PlaybackSnapshot,
}

impl PlaybackEvent {
    pub fn index_changed(&self) -> bool {
        self.cause.is_some()
    }
}
