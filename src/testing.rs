//! Test doubles shared by the unit tests.

use crate::backend::{BackendKind, EventSink, Generation, Utterance, VoiceBackend};
use crate::progress::{ProgressRecord, ProgressStore};
use anyhow::Result;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Speak {
        generation: Generation,
        index: usize,
        speed: f32,
        delay: Duration,
    },
    Pause,
    Resume,
    CancelAll,
}

/// Test-side view of a [`RecordingBackend`]: every call it received plus the
/// sinks of the utterances it was asked to speak.
#[derive(Clone, Default)]
pub(crate) struct BackendProbe {
    calls: Rc<RefCell<Vec<Call>>>,
    sinks: Rc<RefCell<Vec<EventSink>>>,
    resume_ok: Rc<Cell<bool>>,
}

impl BackendProbe {
    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub(crate) fn clear(&self) {
        self.calls.borrow_mut().clear();
        self.sinks.borrow_mut().clear();
    }

    pub(crate) fn speaks(&self) -> Vec<(usize, f32)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::Speak { index, speed, .. } => Some((*index, *speed)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn spoken_indices(&self) -> Vec<usize> {
        self.speaks().into_iter().map(|(index, _)| index).collect()
    }

    pub(crate) fn speak_count(&self) -> usize {
        self.sinks.borrow().len()
    }

    pub(crate) fn try_last_sink(&self) -> Option<EventSink> {
        self.sinks.borrow().last().cloned()
    }

    pub(crate) fn last_sink(&self) -> EventSink {
        self.try_last_sink().expect("backend was never asked to speak")
    }

    pub(crate) fn set_resume_ok(&self, ok: bool) {
        self.resume_ok.set(ok);
    }
}

pub(crate) struct RecordingBackend {
    kind: BackendKind,
    probe: BackendProbe,
}

impl VoiceBackend for RecordingBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn speak(&mut self, utterance: Utterance, events: EventSink) {
        self.probe.calls.borrow_mut().push(Call::Speak {
            generation: utterance.generation,
            index: utterance.index,
            speed: utterance.speed,
            delay: utterance.delay,
        });
        self.probe.sinks.borrow_mut().push(events);
    }

    fn pause(&mut self) {
        self.probe.calls.borrow_mut().push(Call::Pause);
    }

    fn resume(&mut self) -> bool {
        self.probe.calls.borrow_mut().push(Call::Resume);
        self.probe.resume_ok.get()
    }

    fn cancel_all(&mut self) {
        self.probe.calls.borrow_mut().push(Call::CancelAll);
    }
}

pub(crate) fn recording_backend(kind: BackendKind) -> (Box<dyn VoiceBackend>, BackendProbe) {
    let probe = BackendProbe::default();
    probe.set_resume_ok(true);
    let backend = RecordingBackend {
        kind,
        probe: probe.clone(),
    };
    (Box::new(backend), probe)
}

/// In-memory progress store; clones share the same records.
#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    records: Rc<RefCell<HashMap<String, ProgressRecord>>>,
    writes: Rc<RefCell<Vec<ProgressRecord>>>,
    failing: Rc<Cell<bool>>,
}

impl MemoryStore {
    pub(crate) fn insert(&self, record: ProgressRecord) {
        self.records
            .borrow_mut()
            .insert(record.document_id.clone(), record);
    }

    pub(crate) fn writes(&self) -> Vec<ProgressRecord> {
        self.writes.borrow().clone()
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }
}

impl ProgressStore for MemoryStore {
    fn get_progress(&self, document_id: &str) -> Result<Option<ProgressRecord>> {
        if self.failing.get() {
            anyhow::bail!("store unavailable");
        }
        Ok(self.records.borrow().get(document_id).cloned())
    }

    fn update_progress(&self, document_id: &str, record: &ProgressRecord) -> Result<()> {
        if self.failing.get() {
            anyhow::bail!("store unavailable");
        }
        self.records
            .borrow_mut()
            .insert(document_id.to_string(), record.clone());
        self.writes.borrow_mut().push(record.clone());
        Ok(())
    }
}
