//! One reading session: the sentence list of a document, the controller that
//! speaks it, the highlight that follows it and the tracker that remembers it.
//!
//! Hosts drive a session with [`SessionCommand`]s and call [`ReadingSession::tick`]
//! regularly so backend reports and the progress debounce get processed.

use crate::backend::{VoiceBackend, build_backend};
use crate::config::EngineConfig;
use crate::controller::{
    IndexChangeCause, PlaybackAction, PlaybackController, PlaybackEvent, PlaybackSnapshot,
};
use crate::highlight::{ClickTarget, HighlightSync, RenderInstruction, Viewport};
use crate::progress::{FileProgressStore, ProgressStore, ProgressTracker};
use crate::segmenter::SegmentCache;
use anyhow::Result;
use serde::Serialize;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub enum SessionCommand {
    Play,
    Pause,
    TogglePlayPause,
    Stop,
    Seek { index: usize },
    Next,
    Prev,
    Repeat,
    SetSpeed { speed: f32 },
    Click { target: ClickTarget },
    VisibilityChanged { visible: bool },
    ContentChanged { content: String },
    RenderedTextChanged { text: String },
}

impl SessionCommand {
    pub fn action(&self) -> &'static str {
        match self {
            Self::Play => "readalong_play",
            Self::Pause => "readalong_pause",
            Self::TogglePlayPause => "readalong_toggle_play_pause",
            Self::Stop => "readalong_stop",
            Self::Seek { .. } => "readalong_seek",
            Self::Next => "readalong_next",
            Self::Prev => "readalong_prev",
            Self::Repeat => "readalong_repeat",
            Self::SetSpeed { .. } => "readalong_set_speed",
            Self::Click { .. } => "readalong_click",
            Self::VisibilityChanged { .. } => "readalong_visibility_changed",
            Self::ContentChanged { .. } => "readalong_content_changed",
            Self::RenderedTextChanged { .. } => "readalong_rendered_text_changed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionEvent {
    pub action: &'static str,
    pub snapshot: PlaybackSnapshot,
    pub render: Vec<RenderInstruction>,
}

pub struct ReadingSession {
    document_id: String,
    controller: PlaybackController,
    updates: Receiver<PlaybackEvent>,
    highlight: HighlightSync,
    progress: ProgressTracker,
    segments: SegmentCache,
    /// Stored progress has been applied to a non-empty sentence list.
    seeded: bool,
}

impl ReadingSession {
    pub fn new(
        config: &EngineConfig,
        document_id: impl Into<String>,
        backend: Box<dyn VoiceBackend>,
        store: Box<dyn ProgressStore>,
    ) -> Self {
        let document_id = document_id.into();
        let mut controller = PlaybackController::new(backend, config.playback_settings());
        let updates = controller.subscribe();
        info!(
            document = %document_id,
            backend = %controller.backend_kind(),
            "Opened reading session"
        );
        Self {
            progress: ProgressTracker::new(document_id.clone(), store, config.debounce()),
            document_id,
            controller,
            updates,
            highlight: HighlightSync::new(config.highlight_settings()),
            segments: SegmentCache::default(),
            seeded: false,
        }
    }

    /// Session with the configured backend and the file progress store.
    pub fn open(config: &EngineConfig, document_id: impl Into<String>) -> Result<Self> {
        let backend = build_backend(config, None)?;
        let store = FileProgressStore::new(config.store_path());
        Ok(Self::new(config, document_id, backend, Box::new(store)))
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.controller.snapshot()
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.highlight.set_viewport(viewport);
    }

    pub fn apply_command(&mut self, command: SessionCommand) -> SessionEvent {
        let action = command.action();
        debug!(action, "Applying session command");
        let mut render = Vec::new();
        match command {
            SessionCommand::Play => self.controller.play(),
            SessionCommand::Pause => self.controller.pause(),
            SessionCommand::TogglePlayPause => self.controller.toggle_play_pause(),
            SessionCommand::Stop => self.controller.stop(),
            SessionCommand::Seek { index } => self.controller.seek(index),
            SessionCommand::Next => self.controller.next(),
            SessionCommand::Prev => self.controller.prev(),
            SessionCommand::Repeat => self.controller.repeat(),
            SessionCommand::SetSpeed { speed } => self.controller.set_speed(speed),
            SessionCommand::Click { target } => self.click(&target),
            SessionCommand::VisibilityChanged { visible } => {
                self.controller.set_visibility(visible)
            }
            SessionCommand::ContentChanged { content } => render = self.load_content(&content),
            SessionCommand::RenderedTextChanged { text } => {
                render = self.highlight.set_rendered_text(text);
                render.extend(
                    self.highlight
                        .refresh(self.controller.sentences(), self.controller.current_index()),
                );
            }
        }
        render.extend(self.drain_updates(Instant::now()));
        SessionEvent {
            action,
            snapshot: self.controller.snapshot(),
            render,
        }
    }

    /// Segment new content and hand it to the controller. Stored progress
    /// seeds the position only on the first non-empty load; later edits keep
    /// whatever the reader has navigated to since.
    pub fn load_content(&mut self, content: &str) -> Vec<RenderInstruction> {
        let sentences = self.segments.get_or_segment(content);
        let count = sentences.len();
        let mut render = self.highlight.clear();
        self.controller.set_sentences(sentences);
        if !self.seeded && count > 0 {
            self.seeded = true;
            if let Some(index) = self.progress.initial_index(count) {
                self.controller.restore_position(index);
            }
        }
        render.extend(self.drain_updates(Instant::now()));
        render
    }

    /// Apply backend reports and write progress once the debounce has elapsed.
    pub fn tick(&mut self, now: Instant) -> Vec<RenderInstruction> {
        self.controller.process_pending_events();
        let render = self.drain_updates(now);
        self.progress.poll(now);
        render
    }

    /// Like [`tick`](Self::tick), but blocks up to `timeout` for a backend
    /// report first.
    pub fn wait(&mut self, timeout: Duration) -> Vec<RenderInstruction> {
        self.controller.wait_for_event(timeout);
        self.tick(Instant::now())
    }

    /// Flush pending progress and silence the backend. Dropping the session
    /// does the same without the log line.
    pub fn close(mut self) {
        self.progress.flush();
        info!(document = %self.document_id, "Closed reading session");
    }

    fn click(&mut self, target: &ClickTarget) {
        if self.controller.sentences().is_empty() {
            debug!("Click ignored; no sentences loaded");
            return;
        }
        let index = self.highlight.sentence_at(self.controller.sentences(), target);
        info!(index, "Sentence clicked");
        self.controller.seek_to(index, IndexChangeCause::Click);
    }

    fn drain_updates(&mut self, now: Instant) -> Vec<RenderInstruction> {
        let events: Vec<PlaybackEvent> = self.updates.try_iter().collect();
        let mut render = Vec::new();
        for event in events {
            let index = usize::try_from(event.snapshot.current_index).ok();
            if let Some(cause) = event.cause {
                render.extend(
                    self.highlight
                        .on_index_change(self.controller.sentences(), index, cause),
                );
            }
            let record = match event.cause {
                Some(IndexChangeCause::Restore) => false,
                Some(_) => true,
                None => event.action == PlaybackAction::SpeedChange,
            };
            if record {
                self.progress.note(
                    index,
                    event.snapshot.sentence_count,
                    event.snapshot.speed,
                    now,
                );
            }
        }
        render
    }
}
