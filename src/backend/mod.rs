//! Voice backends: anything that can turn one sentence into audible output and
//! report back when it starts, ends or fails.
//!
//! Backends never own playback state. The controller hands them an
//! [`Utterance`] stamped with its generation and sentence index, and every
//! report travels back through the [`EventSink`] carrying the same stamp so
//! the controller can drop reports that belong to a cancelled unit.

mod local;
#[cfg(feature = "piper")]
mod piper;
mod remote;

pub use local::{LocalSynthesis, LocalVoiceSettings, PlatformUtterance, SpeechPlatform};
#[cfg(feature = "piper")]
pub use piper::PiperPlatform;
pub use remote::{
    HttpSynthesisClient, RemoteSynthesis, SynthesisClient, SynthesisRequest, SynthesisResponse,
};

use crate::cancellation::UtteranceControl;
use crate::config::EngineConfig;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::time::Duration;
use tracing::{debug, warn};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum BackendKind {
    #[default]
    Local,
    Remote,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            BackendKind::Local => "local",
            BackendKind::Remote => "remote",
        };
        write!(f, "{}", label)
    }
}

/// Voice selection for one reading session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct VoiceProfile {
    pub backend_kind: BackendKind,
    pub remote_voice_id: Option<String>,
}

/// Monotonic counter bumped on every cancel-causing transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Generation(u64);

impl Generation {
    pub fn value(self) -> u64 {
        self.0
    }

    pub(crate) fn bump(&mut self) -> Generation {
        self.0 = self.0.wrapping_add(1);
        *self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpeakError {
    /// Output was cut off by the platform; worth retrying in place.
    #[error("speech output interrupted")]
    Interrupted,
    /// Result of an intentional cancel; never reported as a failure.
    #[error("speech output cancelled")]
    Canceled,
    #[error("speech output failed: {0}")]
    Failed(String),
}

/// One sentence to speak.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub generation: Generation,
    pub index: usize,
    pub text: String,
    pub speed: f32,
    /// Wait this long before starting (retry backoff).
    pub delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEventKind {
    Started,
    Ended,
    Failed(SpeakError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendEvent {
    pub generation: Generation,
    pub index: usize,
    pub kind: BackendEventKind,
}

/// Report channel bound to one utterance.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<BackendEvent>,
    generation: Generation,
    index: usize,
}

impl EventSink {
    pub(crate) fn new(tx: Sender<BackendEvent>, generation: Generation, index: usize) -> Self {
        Self {
            tx,
            generation,
            index,
        }
    }

    pub fn started(&self) {
        self.send(BackendEventKind::Started);
    }

    pub fn ended(&self) {
        self.send(BackendEventKind::Ended);
    }

    pub fn failed(&self, error: SpeakError) {
        self.send(BackendEventKind::Failed(error));
    }

    fn send(&self, kind: BackendEventKind) {
        let event = BackendEvent {
            generation: self.generation,
            index: self.index,
            kind,
        };
        if self.tx.send(event).is_err() {
            debug!(
                generation = self.generation.value(),
                index = self.index,
                "Controller gone; dropping backend report"
            );
        }
    }
}

/// The speak/cancel contract every voice backend implements.
pub trait VoiceBackend {
    fn kind(&self) -> BackendKind;

    /// Begin speaking. Any previous unit must already be silenced; backends
    /// also silence it themselves so a repeated command is always safe.
    fn speak(&mut self, utterance: Utterance, events: EventSink);

    fn pause(&mut self);

    /// Continue the paused unit. Returns false when there is nothing left to
    /// continue and the caller must start over.
    fn resume(&mut self) -> bool;

    /// Silence everything. Idempotent; never waits for confirmation.
    fn cancel_all(&mut self);
}

/// Build the backend the config asks for. A local backend uses `platform`
/// when given, otherwise the Piper voice when that feature is enabled.
pub fn build_backend(
    config: &EngineConfig,
    platform: Option<Arc<dyn SpeechPlatform>>,
) -> Result<Box<dyn VoiceBackend>> {
    let profile = config.voice_profile();
    debug!(
        backend = %profile.backend_kind,
        voice = ?profile.remote_voice_id,
        "Building voice backend"
    );
    match profile.backend_kind {
        BackendKind::Remote => {
            let Some(endpoint) = config.remote_endpoint.as_deref() else {
                anyhow::bail!("Remote backend selected but no remote_endpoint is configured");
            };
            let client = HttpSynthesisClient::new(endpoint)?;
            Ok(Box::new(RemoteSynthesis::new(
                Arc::new(client),
                profile.remote_voice_id,
                config.volume,
            )))
        }
        BackendKind::Local => {
            let platform = match platform {
                Some(platform) => platform,
                None => default_platform(config)?,
            };
            Ok(Box::new(LocalSynthesis::new(platform, config.local_voice())))
        }
    }
}

#[cfg(feature = "piper")]
fn default_platform(config: &EngineConfig) -> Result<Arc<dyn SpeechPlatform>> {
    let platform = PiperPlatform::new(
        config.piper_model_path.clone().into(),
        config.piper_espeak_path.clone().into(),
    )?;
    Ok(Arc::new(platform))
}

#[cfg(not(feature = "piper"))]
fn default_platform(_config: &EngineConfig) -> Result<Arc<dyn SpeechPlatform>> {
    anyhow::bail!("No local speech platform available; enable the `piper` feature or supply one")
}

/// The single live unit of a threaded backend.
#[derive(Debug, Default)]
pub(crate) struct UtteranceSlot {
    active: Option<UtteranceControl>,
}

impl UtteranceSlot {
    /// Cancel whatever is live and install a fresh control for the next unit.
    pub(crate) fn replace(&mut self) -> UtteranceControl {
        self.cancel();
        let control = UtteranceControl::new();
        self.active = Some(control.clone());
        control
    }

    pub(crate) fn cancel(&mut self) {
        if let Some(control) = self.active.take() {
            control.cancel();
        }
    }

    pub(crate) fn pause(&self) {
        if let Some(control) = &self.active {
            control.set_paused(true);
        }
    }

    pub(crate) fn resume(&self) -> bool {
        match &self.active {
            Some(control) if control.is_live() => {
                control.set_paused(false);
                true
            }
            _ => false,
        }
    }
}

/// Run one utterance on its own thread: honour the backoff delay, do the work,
/// then report the outcome unless the unit was cancelled along the way.
pub(crate) fn spawn_utterance_worker<F>(
    label: &str,
    utterance: &Utterance,
    control: UtteranceControl,
    events: EventSink,
    work: F,
) where
    F: FnOnce(&UtteranceControl, &EventSink) -> Result<(), SpeakError> + Send + 'static,
{
    let delay = utterance.delay;
    let thread_name = format!("{label}-g{}-s{}", utterance.generation.value(), utterance.index);
    let failure_sink = events.clone();
    let spawned = std::thread::Builder::new()
        .name(thread_name)
        .spawn(move || {
            let outcome = control.sleep(delay).and_then(|()| work(&control, &events));
            control.mark_finished();
            if control.is_cancelled() {
                return;
            }
            match outcome {
                Ok(()) => events.ended(),
                Err(SpeakError::Canceled) => {}
                Err(err) => events.failed(err),
            }
        });
    if let Err(err) = spawned {
        warn!("Failed to spawn utterance worker: {err}");
        failure_sink.failed(SpeakError::Failed(format!("worker spawn failed: {err}")));
    }
}
