//! Clip playback through `rodio`, shared by the backends that render audio
//! themselves. Playback blocks the calling worker thread until the clip drains,
//! is cancelled, or fails.

use crate::backend::SpeakError;
use crate::cancellation::UtteranceControl;
use anyhow::{Context, Result};
use rodio::buffer::SamplesBuffer;
use rodio::{Decoder, OutputStream, Sink, Source};
use std::io::Cursor;
use tracing::debug;

pub type Clip = Box<dyn Source<Item = f32> + Send>;

#[derive(Debug, Clone, Copy)]
pub struct ClipSettings {
    /// Playback-rate multiplier.
    pub speed: f32,
    pub volume: f32,
}

/// Decode an encoded audio file (wav/ogg/flac/mp3 as rodio supports).
pub fn decode_clip(bytes: Vec<u8>) -> Result<Clip> {
    let decoder = Decoder::new(Cursor::new(bytes)).context("Decoding audio clip")?;
    Ok(Box::new(decoder.convert_samples::<f32>()))
}

pub fn samples_clip(channels: u16, sample_rate: u32, samples: Vec<f32>) -> Clip {
    Box::new(SamplesBuffer::new(channels, sample_rate, samples))
}

/// Play `clip` to completion. `on_start` fires once audio is actually queued
/// on an unpaused sink.
pub fn play_clip(
    clip: Clip,
    settings: ClipSettings,
    control: &UtteranceControl,
    on_start: impl FnOnce(),
) -> Result<(), SpeakError> {
    let (_stream, handle) = OutputStream::try_default()
        .map_err(|err| SpeakError::Failed(format!("opening audio output: {err}")))?;
    let sink = Sink::try_new(&handle)
        .map_err(|err| SpeakError::Failed(format!("creating audio sink: {err}")))?;

    while control.is_paused() {
        control.sleep(UtteranceControl::poll_interval())?;
    }
    control.check_cancelled()?;

    sink.set_volume(settings.volume.max(0.0));
    sink.set_speed(settings.speed.max(0.1));
    sink.append(clip);
    sink.play();
    debug!(speed = settings.speed, "Started clip playback");
    on_start();

    loop {
        if control.is_cancelled() {
            sink.stop();
            return Err(SpeakError::Canceled);
        }
        if control.is_paused() {
            if !sink.is_paused() {
                debug!("Pausing clip playback");
                sink.pause();
            }
        } else if sink.is_paused() {
            debug!("Resuming clip playback");
            sink.play();
        }
        if sink.empty() {
            return Ok(());
        }
        std::thread::sleep(UtteranceControl::poll_interval());
    }
}
