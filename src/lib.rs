//! Sentence-synchronized read-aloud engine.
//!
//! Content is split into sentences, spoken one at a time through a local or
//! remote voice backend, mirrored as a single highlighted sentence on the
//! rendered surface, and remembered as a per-document reading position.

pub mod audio;
pub mod backend;
pub mod cancellation;
pub mod config;
pub mod controller;
pub mod highlight;
pub mod logging;
pub mod progress;
pub mod segmenter;
pub mod session;
pub mod text_utils;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{BackendKind, VoiceBackend, build_backend};
pub use config::{EngineConfig, LogLevel, load_config};
pub use controller::{PlaybackController, PlaybackSnapshot, PlaybackState};
pub use segmenter::{SentenceList, segment};
pub use session::{ReadingSession, SessionCommand, SessionEvent};
