use super::{
    BackendKind, EventSink, SpeakError, Utterance, UtteranceSlot, VoiceBackend,
    spawn_utterance_worker,
};
use crate::cancellation::UtteranceControl;
use std::sync::Arc;
use tracing::{debug, info};

/// What the on-device synthesizer receives for one sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformUtterance {
    pub text: String,
    pub language_tag: String,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

/// An on-device speech synthesizer.
///
/// `speak` blocks until output has finished, calling `on_start` once sound is
/// actually audible. Implementations poll `control` to stop promptly on
/// cancel (returning [`SpeakError::Canceled`]) and to hold output while paused.
pub trait SpeechPlatform: Send + Sync {
    fn speak(
        &self,
        utterance: &PlatformUtterance,
        control: &UtteranceControl,
        on_start: &mut dyn FnMut(),
    ) -> Result<(), SpeakError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalVoiceSettings {
    pub language_tag: String,
    pub pitch: f32,
    pub volume: f32,
}

impl Default for LocalVoiceSettings {
    fn default() -> Self {
        Self {
            language_tag: "en-US".to_string(),
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

/// Local synthesis backend: one platform utterance per sentence, rate fixed at
/// call time from the requested speed.
pub struct LocalSynthesis {
    platform: Arc<dyn SpeechPlatform>,
    settings: LocalVoiceSettings,
    slot: UtteranceSlot,
}

impl LocalSynthesis {
    pub fn new(platform: Arc<dyn SpeechPlatform>, settings: LocalVoiceSettings) -> Self {
        info!(
            language = %settings.language_tag,
            pitch = settings.pitch,
            volume = settings.volume,
            "Initializing local synthesis backend"
        );
        Self {
            platform,
            settings,
            slot: UtteranceSlot::default(),
        }
    }
}

impl VoiceBackend for LocalSynthesis {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn speak(&mut self, utterance: Utterance, events: EventSink) {
        let control = self.slot.replace();
        let request = PlatformUtterance {
            text: utterance.text.clone(),
            language_tag: self.settings.language_tag.clone(),
            rate: utterance.speed,
            pitch: self.settings.pitch,
            volume: self.settings.volume,
        };
        debug!(
            index = utterance.index,
            generation = utterance.generation.value(),
            rate = request.rate,
            delay_ms = utterance.delay.as_millis(),
            "Queueing local utterance"
        );
        let platform = Arc::clone(&self.platform);
        spawn_utterance_worker(
            "local-tts",
            &utterance,
            control,
            events,
            move |control, events| {
                let mut started = false;
                let mut on_start = || {
                    if !started {
                        started = true;
                        events.started();
                    }
                };
                platform.speak(&request, control, &mut on_start)
            },
        );
    }

    fn pause(&mut self) {
        self.slot.pause();
    }

    fn resume(&mut self) -> bool {
        self.slot.resume()
    }

    fn cancel_all(&mut self) {
        self.slot.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendEventKind, Generation};
    use std::sync::Mutex;
    use std::sync::mpsc;
    use std::time::Duration;

    /// Speaks until cancelled or until `outcome` is set, recording requests.
    #[derive(Default)]
    struct ScriptedPlatform {
        requests: Mutex<Vec<PlatformUtterance>>,
        outcome: Mutex<Option<Result<(), SpeakError>>>,
    }

    impl ScriptedPlatform {
        fn finishing_with(outcome: Result<(), SpeakError>) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                outcome: Mutex::new(Some(outcome)),
            }
        }
    }

    impl SpeechPlatform for ScriptedPlatform {
        fn speak(
            &self,
            utterance: &PlatformUtterance,
            control: &UtteranceControl,
            on_start: &mut dyn FnMut(),
        ) -> Result<(), SpeakError> {
            self.requests.lock().unwrap().push(utterance.clone());
            on_start();
            loop {
                control.check_cancelled()?;
                if let Some(outcome) = self.outcome.lock().unwrap().clone() {
                    return outcome;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
        }
    }

    fn utterance(generation: Generation, index: usize, speed: f32) -> Utterance {
        Utterance {
            generation,
            index,
            text: format!("Sentence {index}."),
            speed,
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn reports_start_then_end_with_rate_from_speed() {
        let platform = Arc::new(ScriptedPlatform::finishing_with(Ok(())));
        let mut backend = LocalSynthesis::new(platform.clone(), LocalVoiceSettings::default());
        let (tx, rx) = mpsc::channel();
        let generation = Generation::default();

        backend.speak(utterance(generation, 2, 1.5), EventSink::new(tx, generation, 2));

        let kinds: Vec<_> = (0..2)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap().kind)
            .collect();
        assert_eq!(kinds, vec![BackendEventKind::Started, BackendEventKind::Ended]);
        let requests = platform.requests.lock().unwrap();
        assert_eq!(requests[0].rate, 1.5);
        assert_eq!(requests[0].language_tag, "en-US");
    }

    #[test]
    fn forwards_interruptions() {
        let platform = Arc::new(ScriptedPlatform::finishing_with(Err(SpeakError::Interrupted)));
        let mut backend = LocalSynthesis::new(platform, LocalVoiceSettings::default());
        let (tx, rx) = mpsc::channel();
        let generation = Generation::default();

        backend.speak(utterance(generation, 0, 1.0), EventSink::new(tx, generation, 0));

        let _started = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        let failed = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(failed.kind, BackendEventKind::Failed(SpeakError::Interrupted));
    }

    #[test]
    fn cancel_all_silences_the_live_unit() {
        let platform = Arc::new(ScriptedPlatform::default());
        let mut backend = LocalSynthesis::new(platform, LocalVoiceSettings::default());
        let (tx, rx) = mpsc::channel();
        let generation = Generation::default();

        backend.speak(utterance(generation, 0, 1.0), EventSink::new(tx, generation, 0));
        let started = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(started.kind, BackendEventKind::Started);

        backend.cancel_all();
        backend.cancel_all();
        assert!(!backend.resume());
        assert!(matches!(
            rx.recv_timeout(Duration::from_millis(300)),
            Err(mpsc::RecvTimeoutError::Disconnected) | Err(mpsc::RecvTimeoutError::Timeout)
        ));
    }
}
