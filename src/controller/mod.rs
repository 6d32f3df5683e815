//! The playback state machine.
//!
//! One controller per reading session owns the sentence list, the current
//! index, the speed and the only handle to the voice backend. Every unit it
//! hands to the backend is stamped with a fresh [`Generation`]; backend reports
//! are applied only when both the generation and the sentence index match the
//! live unit, so a report from a cancelled unit can never move state.

mod events;
mod state;

pub use events::{IndexChangeCause, PlaybackAction, PlaybackEvent};
pub use state::{
    MAX_SPEED, MIN_SPEED, PlaybackSettings, PlaybackSnapshot, PlaybackState, index_sentinel,
    listen_percent,
};

use crate::backend::{
    BackendEvent, BackendEventKind, BackendKind, EventSink, Generation, SpeakError, Utterance,
    VoiceBackend,
};
use crate::segmenter::SentenceList;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct PlaybackController {
    backend: Box<dyn VoiceBackend>,
    settings: PlaybackSettings,
    sentences: SentenceList,
    state: PlaybackState,
    /// Sentence audibly active, or last active.
    current: Option<usize>,
    /// Sentence of the live backend unit.
    requested: Option<usize>,
    generation: Generation,
    speed: f32,
    synthesizing: bool,
    retries: u32,
    restart_on_resume: bool,
    hidden: bool,
    content_empty: bool,
    events_tx: Sender<BackendEvent>,
    events_rx: Receiver<BackendEvent>,
    subscribers: Vec<Sender<PlaybackEvent>>,
}

impl PlaybackController {
    pub fn new(backend: Box<dyn VoiceBackend>, settings: PlaybackSettings) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        let speed = settings.clamp_speed(settings.speed);
        info!(backend = %backend.kind(), speed, "Created playback controller");
        Self {
            backend,
            settings,
            sentences: SentenceList::default(),
            state: PlaybackState::Idle,
            current: None,
            requested: None,
            generation: Generation::default(),
            speed,
            synthesizing: false,
            retries: 0,
            restart_on_resume: false,
            hidden: false,
            content_empty: true,
            events_tx,
            events_rx,
            subscribers: Vec::new(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Remote audio is being fetched for the live unit. Only meaningful
    /// while playing.
    pub fn is_synthesizing(&self) -> bool {
        self.synthesizing && self.state == PlaybackState::Playing
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn sentences(&self) -> &SentenceList {
        &self.sentences
    }

    pub fn listen_percent(&self) -> u8 {
        listen_percent(self.current, self.sentences.len())
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let position = self.position();
        let len = self.sentences.len();
        PlaybackSnapshot {
            state: self.state,
            current_index: index_sentinel(self.current),
            sentence_count: len,
            speed: self.speed,
            synthesizing: self.is_synthesizing(),
            generation: self.generation.value(),
            listen_percent: self.listen_percent(),
            content_empty: self.content_empty,
            backend: self.backend.kind(),
            can_seek_prev: position.is_some_and(|idx| idx > 0),
            can_seek_next: match position {
                Some(idx) => idx + 1 < len,
                None => len > 0,
            },
        }
    }

    /// Receive a [`PlaybackEvent`] for every transition from now on.
    pub fn subscribe(&mut self) -> Receiver<PlaybackEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Replace the sentence list. Playback stops, the position is clamped to
    /// the new list and an empty list is reported as such.
    pub fn set_sentences(&mut self, sentences: SentenceList) {
        if self.sentences.shares_storage(&sentences) {
            debug!("Sentence list unchanged; keeping playback");
            return;
        }
        self.silence();
        self.state = PlaybackState::Idle;
        self.requested = None;
        self.content_empty = sentences.is_empty();
        let previous = self.current;
        self.current = match sentences.last_index() {
            Some(last) => self.current.map(|idx| idx.min(last)),
            None => None,
        };
        info!(
            sentence_count = sentences.len(),
            content_hash = %sentences.content_hash(),
            "Loaded sentence list"
        );
        self.sentences = sentences;
        let cause = (previous != self.current).then_some(IndexChangeCause::Reset);
        let action = if self.content_empty {
            PlaybackAction::ContentEmpty
        } else {
            PlaybackAction::ContentChange
        };
        self.notify(action, cause);
    }

    /// Seed the position from stored progress. Only applies while idle with
    /// no position chosen yet, and only for an in-bounds index.
    pub fn restore_position(&mut self, index: usize) -> bool {
        if self.state != PlaybackState::Idle || self.current.is_some() {
            debug!(index, "Position already chosen; ignoring stored progress");
            return false;
        }
        if index >= self.sentences.len() {
            debug!(
                index,
                sentence_count = self.sentences.len(),
                "Stored position out of bounds"
            );
            return false;
        }
        info!(index, "Restored reading position");
        self.current = Some(index);
        self.notify(PlaybackAction::Restore, Some(IndexChangeCause::Restore));
        true
    }

    /// Start or resume. From idle this starts at the current position (or the
    /// first sentence); from paused it continues the live unit where the
    /// backend can, and restarts the sentence where it cannot.
    pub fn play(&mut self) {
        if self.sentences.is_empty() {
            warn!("No sentences to read");
            self.content_empty = true;
            self.notify(PlaybackAction::ContentEmpty, None);
            return;
        }
        match self.state {
            PlaybackState::Playing => debug!("Already playing"),
            PlaybackState::Paused => self.resume(),
            PlaybackState::Idle => {
                let start = self.current.unwrap_or(0);
                self.seek_to(start, IndexChangeCause::Navigation);
            }
        }
    }

    pub fn play_from(&mut self, index: usize) {
        self.seek_to(index, IndexChangeCause::Navigation);
    }

    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            debug!(state = ?self.state, "Pause ignored");
            return;
        }
        info!(index = ?self.current, "Pausing playback");
        self.backend.pause();
        self.state = PlaybackState::Paused;
        self.notify(PlaybackAction::Pause, None);
    }

    pub fn toggle_play_pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn stop(&mut self) {
        info!("Stopping playback");
        self.silence();
        let had_position = self.current.is_some();
        self.state = PlaybackState::Idle;
        self.current = None;
        self.requested = None;
        self.notify(
            PlaybackAction::Stop,
            had_position.then_some(IndexChangeCause::Reset),
        );
    }

    pub fn seek(&mut self, index: usize) {
        self.seek_to(index, IndexChangeCause::Navigation);
    }

    /// Jump to `index` and start speaking it. Seeking to the sentence that is
    /// already playing does nothing.
    pub fn seek_to(&mut self, index: usize, cause: IndexChangeCause) {
        let Some(last) = self.sentences.last_index() else {
            warn!(index, "Seek ignored; no sentences loaded");
            return;
        };
        let target = index.min(last);
        if target != index {
            debug!(index, clamped = target, "Clamped seek target");
        }
        if self.state == PlaybackState::Playing && self.requested == Some(target) {
            debug!(index = target, "Already playing requested sentence");
            return;
        }

        info!(index = target, ?cause, "Seeking");
        self.retries = 0;
        self.state = PlaybackState::Playing;
        let moved = self.current != Some(target);
        self.current = Some(target);
        self.speak(target, Duration::ZERO);
        self.notify(PlaybackAction::Seek, moved.then_some(cause));
    }

    pub fn next(&mut self) {
        let target = match self.position() {
            None => 0,
            Some(idx) => idx + 1,
        };
        if target >= self.sentences.len() {
            debug!("Already at last sentence");
            return;
        }
        self.seek_to(target, IndexChangeCause::Navigation);
    }

    pub fn prev(&mut self) {
        match self.position() {
            Some(idx) if idx > 0 => self.seek_to(idx - 1, IndexChangeCause::Navigation),
            _ => debug!("Already at first sentence"),
        }
    }

    /// Speak the current sentence again from its start.
    pub fn repeat(&mut self) {
        let Some(index) = self.position() else {
            debug!("Nothing to repeat");
            return;
        };
        info!(index, "Repeating sentence");
        self.retries = 0;
        self.state = PlaybackState::Playing;
        self.speak(index, Duration::ZERO);
        self.notify(PlaybackAction::Repeat, None);
    }

    /// Speed cannot change mid-utterance, so a playing sentence restarts at
    /// the new speed. While paused the change applies on the next unit.
    pub fn set_speed(&mut self, speed: f32) {
        let clamped = self.settings.clamp_speed(speed);
        if (clamped - self.speed).abs() <= f32::EPSILON {
            return;
        }
        info!(speed = clamped, requested = speed, "Adjusted playback speed");
        self.speed = clamped;
        match self.state {
            PlaybackState::Playing => {
                if let Some(index) = self.position() {
                    self.retries = 0;
                    self.speak(index, Duration::ZERO);
                }
            }
            PlaybackState::Paused if self.backend.kind() == BackendKind::Local => {
                self.restart_on_resume = true;
            }
            _ => {}
        }
        self.notify(PlaybackAction::SpeedChange, None);
    }

    /// Host visibility changed. Local output is presumed lost while the host
    /// is backgrounded, so a playing sentence restarts on return.
    pub fn set_visibility(&mut self, visible: bool) {
        if visible == !self.hidden {
            return;
        }
        self.hidden = !visible;
        if !visible {
            debug!(state = ?self.state, "Host backgrounded");
            if self.state == PlaybackState::Paused && self.backend.kind() == BackendKind::Local {
                self.restart_on_resume = true;
            }
            return;
        }
        if self.state == PlaybackState::Playing {
            if let Some(index) = self.position() {
                info!(index, "Host foregrounded; restarting sentence");
                self.retries = 0;
                self.speak(index, Duration::ZERO);
                self.notify(PlaybackAction::Restart, None);
            }
        }
    }

    /// Apply every backend report waiting in the queue.
    pub fn process_pending_events(&mut self) -> usize {
        let mut handled = 0;
        loop {
            match self.events_rx.try_recv() {
                Ok(event) => {
                    self.handle_backend_event(event);
                    handled += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        handled
    }

    /// Block up to `timeout` for one backend report, then drain the rest.
    pub fn wait_for_event(&mut self, timeout: Duration) -> bool {
        match self.events_rx.recv_timeout(timeout) {
            Ok(event) => {
                self.handle_backend_event(event);
                self.process_pending_events();
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    pub fn handle_backend_event(&mut self, event: BackendEvent) {
        if event.generation != self.generation || Some(event.index) != self.requested {
            debug!(
                generation = event.generation.value(),
                current = self.generation.value(),
                index = event.index,
                kind = ?event.kind,
                "Ignoring stale backend event"
            );
            return;
        }

        match event.kind {
            BackendEventKind::Started => self.on_started(event.index),
            BackendEventKind::Ended => {
                debug!(index = event.index, "Sentence finished");
                self.retries = 0;
                self.advance(event.index, PlaybackAction::Advance);
            }
            BackendEventKind::Failed(SpeakError::Canceled) => {
                debug!(index = event.index, "Backend reported cancellation");
            }
            BackendEventKind::Failed(SpeakError::Interrupted)
                if self.retries < self.settings.max_retries =>
            {
                self.retries += 1;
                let delay = self.settings.retry_backoff * self.retries;
                warn!(
                    index = event.index,
                    attempt = self.retries,
                    delay_ms = delay.as_millis(),
                    "Speech interrupted; retrying sentence"
                );
                if self.state == PlaybackState::Paused {
                    self.restart_on_resume = true;
                } else {
                    self.speak(event.index, delay);
                }
                self.notify(PlaybackAction::Retry, None);
            }
            BackendEventKind::Failed(err) => {
                warn!(index = event.index, "Skipping sentence after failure: {err}");
                self.retries = 0;
                self.advance(event.index, PlaybackAction::SkipFailed);
            }
        }
    }

    fn on_started(&mut self, index: usize) {
        self.synthesizing = false;
        let moved = self.current != Some(index);
        self.current = Some(index);
        debug!(index, "Sentence audible");
        self.notify(
            PlaybackAction::SentenceStarted,
            moved.then_some(IndexChangeCause::Playback),
        );
    }

    fn advance(&mut self, finished: usize, action: PlaybackAction) {
        let next = finished + 1;
        if next >= self.sentences.len() {
            info!(index = finished, "Reached end of sentence list");
            self.silence();
            self.state = PlaybackState::Idle;
            self.current = None;
            self.requested = None;
            self.notify(PlaybackAction::Finish, Some(IndexChangeCause::Reset));
            return;
        }

        if self.state == PlaybackState::Paused {
            // Finished just as the pause landed; start the next one on resume.
            self.silence();
            self.requested = None;
            self.restart_on_resume = true;
            let moved = self.current != Some(next);
            self.current = Some(next);
            self.notify(action, moved.then_some(IndexChangeCause::Playback));
            return;
        }

        self.speak(next, Duration::ZERO);
        self.notify(action, None);
    }

    fn resume(&mut self) {
        let index = self.position().unwrap_or(0);
        self.state = PlaybackState::Playing;
        if !self.restart_on_resume && self.requested.is_some() && self.backend.resume() {
            info!(index, "Resuming playback");
            self.notify(PlaybackAction::Resume, None);
            return;
        }
        info!(index, "Restarting sentence on resume");
        // A retry pending from before the pause keeps its budget.
        if self.requested != Some(index) {
            self.retries = 0;
        }
        self.current = Some(index);
        self.speak(index, Duration::ZERO);
        self.notify(PlaybackAction::Resume, None);
    }

    /// Sentence of the live unit, falling back to the current index.
    fn position(&self) -> Option<usize> {
        self.requested.or(self.current)
    }

    /// Cancel whatever is live and invalidate its reports.
    fn silence(&mut self) {
        self.backend.cancel_all();
        self.generation.bump();
        self.synthesizing = false;
        self.restart_on_resume = false;
        self.retries = 0;
    }

    fn speak(&mut self, index: usize, delay: Duration) {
        let Some(text) = self.sentences.text(index).map(str::to_string) else {
            warn!(index, "Sentence index out of range; not speaking");
            return;
        };
        self.backend.cancel_all();
        let generation = self.generation.bump();
        self.requested = Some(index);
        self.restart_on_resume = false;
        self.synthesizing = self.backend.kind() == BackendKind::Remote;
        debug!(
            index,
            generation = generation.value(),
            speed = self.speed,
            "Speaking sentence"
        );
        let events = EventSink::new(self.events_tx.clone(), generation, index);
        self.backend.speak(
            Utterance {
                generation,
                index,
                text,
                speed: self.speed,
                delay,
            },
            events,
        );
    }

    fn notify(&mut self, action: PlaybackAction, cause: Option<IndexChangeCause>) {
        if self.subscribers.is_empty() {
            return;
        }
        let event = PlaybackEvent {
            action,
            cause,
            snapshot: self.snapshot(),
        };
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.backend.cancel_all();
    }
}
