//! Remote synthesis: fetch pre-rendered audio for a sentence, then play it with
//! the playback rate set from the requested speed.

use super::{
    BackendKind, EventSink, SpeakError, Utterance, UtteranceSlot, VoiceBackend,
    spawn_utterance_worker,
};
use crate::audio::{ClipSettings, decode_clip, play_clip};
use crate::cancellation::UtteranceControl;
use anyhow::{Context, Result};
use base64::Engine;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisResponse {
    pub success: bool,
    /// Base64-encoded audio file.
    #[serde(default)]
    pub audio_data: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// The external pre-rendered audio service.
pub trait SynthesisClient: Send + Sync {
    fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisResponse>;
}

pub struct HttpSynthesisClient {
    endpoint: String,
    http: Client,
}

impl HttpSynthesisClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Building synthesis HTTP client")?;
        Ok(Self {
            endpoint: endpoint.into(),
            http,
        })
    }
}

impl SynthesisClient for HttpSynthesisClient {
    fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisResponse> {
        let body = serde_json::to_vec(request).context("Encoding synthesis request")?;
        let response = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .with_context(|| format!("Requesting synthesis from {}", self.endpoint))?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Synthesis service returned status {status}");
        }
        let bytes = response.bytes().context("Reading synthesis response")?;
        serde_json::from_slice(&bytes).context("Parsing synthesis response")
    }
}

pub struct RemoteSynthesis {
    client: Arc<dyn SynthesisClient>,
    voice_id: Option<String>,
    volume: f32,
    slot: UtteranceSlot,
}

impl RemoteSynthesis {
    pub fn new(client: Arc<dyn SynthesisClient>, voice_id: Option<String>, volume: f32) -> Self {
        info!(
            voice = voice_id.as_deref().unwrap_or("default"),
            "Initializing remote synthesis backend"
        );
        Self {
            client,
            voice_id,
            volume,
            slot: UtteranceSlot::default(),
        }
    }
}

impl VoiceBackend for RemoteSynthesis {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn speak(&mut self, utterance: Utterance, events: EventSink) {
        let control = self.slot.replace();
        let request = SynthesisRequest {
            text: utterance.text.clone(),
            voice_id: self.voice_id.clone(),
        };
        let settings = ClipSettings {
            speed: utterance.speed,
            volume: self.volume,
        };
        debug!(
            index = utterance.index,
            generation = utterance.generation.value(),
            speed = utterance.speed,
            "Requesting remote synthesis"
        );
        let client = Arc::clone(&self.client);
        spawn_utterance_worker(
            "remote-tts",
            &utterance,
            control,
            events,
            move |control, events| {
                let clip = fetch_audio(client.as_ref(), &request, control)?;
                let clip = decode_clip(clip)
                    .map_err(|err| SpeakError::Failed(format!("{err:#}")))?;
                play_clip(clip, settings, control, || events.started())
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

/// Synthesize and base64-decode one clip.
fn fetch_audio(
    client: &dyn SynthesisClient,
    request: &SynthesisRequest,
    control: &UtteranceControl,
) -> Result<Vec<u8>, SpeakError> {
    let response = client.synthesize(request).map_err(|err| {
        warn!("Remote synthesis failed: {err:#}");
        SpeakError::Failed(format!("{err:#}"))
    })?;
    control.check_cancelled()?;

    if !response.success {
        let reason = response
            .error
            .unwrap_or_else(|| "synthesis service reported failure".to_string());
        return Err(SpeakError::Failed(reason));
    }
    let encoded = response
        .audio_data
        .ok_or_else(|| SpeakError::Failed("synthesis response carried no audio".to_string()))?;
    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|err| SpeakError::Failed(format!("invalid audio payload: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendEventKind, Generation};
    use std::sync::Mutex;
    use std::sync::mpsc;

    struct CannedClient {
        response: SynthesisResponse,
        seen: Mutex<Vec<SynthesisRequest>>,
    }

    impl CannedClient {
        fn new(response: SynthesisResponse) -> Self {
            Self {
                response,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl SynthesisClient for CannedClient {
        fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisResponse> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.response.clone())
        }
    }

    struct FailingClient;

    impl SynthesisClient for FailingClient {
        fn synthesize(&self, _request: &SynthesisRequest) -> Result<SynthesisResponse> {
            anyhow::bail!("connection refused")
        }
    }

    fn utterance(index: usize) -> Utterance {
        Utterance {
            generation: Generation::default(),
            index,
            text: "Remote sentence.".to_string(),
            speed: 1.25,
            delay: Duration::ZERO,
        }
    }

    fn speak_once(client: Arc<dyn SynthesisClient>) -> BackendEventKind {
        let mut backend = RemoteSynthesis::new(client, Some("narrator".to_string()), 1.0);
        let (tx, rx) = mpsc::channel();
        backend.speak(utterance(1), EventSink::new(tx, Generation::default(), 1));
        rx.recv_timeout(Duration::from_secs(5)).unwrap().kind
    }

    #[test]
    fn request_serializes_with_camel_case_voice_id() {
        let request = SynthesisRequest {
            text: "Hi.".to_string(),
            voice_id: Some("v1".to_string()),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"text":"Hi.","voiceId":"v1"}"#);
    }

    #[test]
    fn response_parses_audio_data() {
        let response: SynthesisResponse =
            serde_json::from_str(r#"{"success":true,"audioData":"AAAA"}"#).unwrap();
        assert!(response.success);
        assert_eq!(response.audio_data.as_deref(), Some("AAAA"));
        assert_eq!(response.error, None);
    }

    #[test]
    fn unsuccessful_synthesis_is_terminal() {
        let client = Arc::new(CannedClient::new(SynthesisResponse {
            success: false,
            audio_data: None,
            error: Some("quota exceeded".to_string()),
        }));
        let kind = speak_once(client.clone());
        assert_eq!(
            kind,
            BackendEventKind::Failed(SpeakError::Failed("quota exceeded".to_string()))
        );
        let seen = client.seen.lock().unwrap();
        assert_eq!(seen[0].voice_id.as_deref(), Some("narrator"));
        assert_eq!(seen[0].text, "Remote sentence.");
    }

    #[test]
    fn transport_errors_and_bad_payloads_fail_without_starting() {
        assert!(matches!(
            speak_once(Arc::new(FailingClient)),
            BackendEventKind::Failed(SpeakError::Failed(_))
        ));

        let garbage = base64::engine::general_purpose::STANDARD.encode(b"not audio at all");
        let client = Arc::new(CannedClient::new(SynthesisResponse {
            success: true,
            audio_data: Some(garbage),
            error: None,
        }));
        assert!(matches!(
            speak_once(client),
            BackendEventKind::Failed(SpeakError::Failed(_))
        ));
    }

    #[test]
    fn cancelled_fetch_reports_nothing() {
        let control = UtteranceControl::new();
        control.cancel();
        let client = CannedClient::new(SynthesisResponse {
            success: true,
            audio_data: Some("AAAA".to_string()),
            error: None,
        });
        let request = SynthesisRequest {
            text: "x".to_string(),
            voice_id: None,
        };
        assert_eq!(
            fetch_audio(&client, &request, &control),
            Err(SpeakError::Canceled)
        );
    }
}
