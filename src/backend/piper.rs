//! On-device speech through `piper-rs`, rendered in memory and played with
//! `rodio`.

use super::{PlatformUtterance, SpeakError, SpeechPlatform};
use crate::audio::{ClipSettings, play_clip, samples_clip};
use crate::cancellation::UtteranceControl;
use anyhow::{Context, Result};
use piper_rs::from_config_path;
use piper_rs::synth::{AudioOutputConfig, PiperSpeechSynthesizer};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct PiperPlatform {
    piper: PiperSpeechSynthesizer,
    model_path: PathBuf,
}

impl PiperPlatform {
    pub fn new(model_path: PathBuf, espeak_path: PathBuf) -> Result<Self> {
        let espeak_path = sanitize_espeak_root(espeak_path);
        if env::var_os("PIPER_ESPEAKNG_DATA_DIRECTORY").is_none() {
            // Set once at startup, before any synthesis thread exists.
            unsafe {
                env::set_var("PIPER_ESPEAKNG_DATA_DIRECTORY", &espeak_path);
            }
        }

        let config_path = resolve_piper_config(&model_path);
        if !config_path.exists() {
            anyhow::bail!(
                "Piper config not found at {} (expected from {})",
                config_path.display(),
                model_path.display()
            );
        }
        let model = from_config_path(&config_path).context("Loading Piper model")?;
        let piper = PiperSpeechSynthesizer::new(model).context("Preparing Piper synthesizer")?;
        info!(
            model = %model_path.display(),
            espeak_root = %espeak_path.display(),
            "Initialized Piper speech platform"
        );
        Ok(Self { piper, model_path })
    }

    fn render(
        &self,
        utterance: &PlatformUtterance,
        control: &UtteranceControl,
    ) -> Result<(u16, u32, Vec<f32>), SpeakError> {
        let output_config = output_config(utterance);

        let mut samples: Vec<f32> = Vec::new();
        let mut sample_rate: Option<u32> = None;
        let mut channels: Option<u16> = None;
        let chunks = self
            .piper
            .synthesize_lazy(utterance.text.clone(), output_config)
            .map_err(|err| SpeakError::Failed(format!("synthesizing sentence: {err}")))?;
        for chunk in chunks {
            control.check_cancelled()?;
            let chunk =
                chunk.map_err(|err| SpeakError::Failed(format!("synthesizing chunk: {err}")))?;
            if sample_rate.is_none() {
                sample_rate = Some(chunk.info.sample_rate as u32);
                channels = Some(chunk.info.num_channels as u16);
            }
            samples.extend_from_slice(chunk.samples.as_slice());
        }

        if samples.is_empty() {
            return Err(SpeakError::Failed("no speech data produced".to_string()));
        }
        Ok((channels.unwrap_or(1), sample_rate.unwrap_or(22_050), samples))
    }
}

impl SpeechPlatform for PiperPlatform {
    fn speak(
        &self,
        utterance: &PlatformUtterance,
        control: &UtteranceControl,
        on_start: &mut dyn FnMut(),
    ) -> Result<(), SpeakError> {
        debug!(
            model = %self.model_path.display(),
            language = %utterance.language_tag,
            rate = utterance.rate,
            chars = utterance.text.len(),
            "Synthesizing sentence with Piper"
        );
        let (channels, sample_rate, samples) = self.render(utterance, control)?;
        control.check_cancelled()?;

        let settings = ClipSettings {
            speed: 1.0,
            volume: utterance.volume,
        };
        play_clip(
            samples_clip(channels, sample_rate, samples),
            settings,
            control,
            || on_start(),
        )
    }
}

fn output_config(utterance: &PlatformUtterance) -> Option<AudioOutputConfig> {
    let rate_default = (utterance.rate - 1.0).abs() <= f32::EPSILON;
    let pitch_default = (utterance.pitch - 1.0).abs() <= f32::EPSILON;
    if rate_default && pitch_default {
        return None;
    }
    Some(AudioOutputConfig {
        rate: (!rate_default).then(|| speed_to_rate_percent(utterance.rate)),
        volume: None,
        pitch: (!pitch_default).then(|| pitch_to_percent(utterance.pitch)),
        appended_silence_ms: None,
    })
}

/// Piper expects the parent directory that contains `espeak-ng-data/phonindex`.
/// Users often point directly at `.../espeak-ng-data`; trim that suffix.
fn sanitize_espeak_root(path: PathBuf) -> PathBuf {
    if path
        .file_name()
        .is_some_and(|name| name == "espeak-ng-data")
    {
        if let Some(parent) = path.parent() {
            debug!(
                original = %path.display(),
                sanitized = %parent.display(),
                "Trimming espeak-ng-data suffix"
            );
            return parent.to_path_buf();
        }
    }
    path
}

fn resolve_piper_config(model_path: &Path) -> PathBuf {
    if model_path.extension().is_some_and(|ext| ext == "onnx") {
        return model_path.with_extension("onnx.json");
    }
    model_path.to_path_buf()
}

fn speed_to_rate_percent(speed: f32) -> u8 {
    let clamped = speed.clamp(0.5, 5.5);
    let percent = ((clamped - 0.5) / 5.0) * 100.0;
    percent.round().clamp(0.0, 100.0) as u8
}

/// 1.0 is neutral (50%); the usable range is 0.0..=2.0.
fn pitch_to_percent(pitch: f32) -> u8 {
    (pitch.clamp(0.0, 2.0) * 50.0).round() as u8
}
