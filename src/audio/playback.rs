//! Speaker playback backend
//!
//! `probe` opens and prepares a file without starting playback, which is
//! what the pre-upload validator uses. `play` decodes the whole file and
//! renders it on the default output device, resolving when the last
//! sample has been consumed.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;

use super::Player;
use crate::error::PlaybackError;

/// Plays WAV files on the default output device
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalPlayer;

impl CpalPlayer {
    /// Create a player
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Player for CpalPlayer {
    fn probe(&self, path: &Path) -> Result<(), PlaybackError> {
        let reader = hound::WavReader::open(path)
            .map_err(|e| PlaybackError::PrepareFailed(e.to_string()))?;

        if reader.len() == 0 {
            return Err(PlaybackError::PrepareFailed(
                "file contains no samples".to_string(),
            ));
        }

        // Reader drops here; the probe holds no resource past this point.
        Ok(())
    }

    async fn play(&self, path: &Path) -> Result<(), PlaybackError> {
        let path = path.to_owned();
        tokio::task::spawn_blocking(move || play_file_blocking(&path))
            .await
            .map_err(|e| PlaybackError::Device(e.to_string()))?
    }
}

/// Decode a WAV file into f32 samples plus its sample rate
fn decode_wav(path: &Path) -> Result<(Vec<f32>, u32), PlaybackError> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| PlaybackError::PrepareFailed(e.to_string()))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max = f32::from(i16::MAX);
            reader
                .samples::<i16>()
                .map(|s| s.map(|v| f32::from(v) / max))
                .collect::<Result<_, _>>()
                .map_err(|e| PlaybackError::PrepareFailed(e.to_string()))?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| PlaybackError::PrepareFailed(e.to_string()))?,
    };

    if samples.is_empty() {
        return Err(PlaybackError::PrepareFailed(
            "file contains no samples".to_string(),
        ));
    }

    // Fold multi-channel audio down to mono for the single render path.
    let samples = if spec.channels > 1 {
        let channels = usize::from(spec.channels);
        #[allow(clippy::cast_precision_loss)]
        let mono: Vec<f32> = samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();
        mono
    } else {
        samples
    };

    Ok((samples, spec.sample_rate))
}

/// Render samples on the default output device, blocking until done
fn play_file_blocking(path: &Path) -> Result<(), PlaybackError> {
    let (samples, sample_rate) = decode_wav(path)?;

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| PlaybackError::Device("no output device".to_string()))?;

    let rate = SampleRate(sample_rate);
    let supported = device
        .supported_output_configs()
        .map_err(|e| PlaybackError::Device(e.to_string()))?
        .find(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
        .ok_or_else(|| PlaybackError::Device("no suitable output config".to_string()))?;

    let config = supported.with_sample_rate(rate).config();
    let channels = usize::from(config.channels);

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate,
        samples = samples.len(),
        "playback starting"
    );

    let position = Arc::new(Mutex::new(0usize));
    let finished = Arc::new(Mutex::new(false));

    let total = samples.len();
    let samples = Arc::new(samples);
    let samples_cb = Arc::clone(&samples);
    let position_cb = Arc::clone(&position);
    let finished_cb = Arc::clone(&finished);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let Ok(mut pos) = position_cb.lock() else {
                    return;
                };
                for frame in data.chunks_mut(channels) {
                    let sample = if *pos < samples_cb.len() {
                        let s = samples_cb[*pos];
                        *pos += 1;
                        s
                    } else {
                        if let Ok(mut done) = finished_cb.lock() {
                            *done = true;
                        }
                        0.0
                    };
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| PlaybackError::Device(e.to_string()))?;

    stream
        .play()
        .map_err(|e| PlaybackError::Device(e.to_string()))?;

    // Poll for the end-of-buffer flag, bounded by the clip duration plus
    // slack so a stalled device cannot wedge the pipeline.
    let duration_ms = (total as u64 * 1000) / u64::from(sample_rate);
    let deadline = std::time::Instant::now()
        + std::time::Duration::from_millis(duration_ms + 500);

    loop {
        if finished.lock().map(|done| *done).unwrap_or(true) {
            break;
        }
        if std::time::Instant::now() > deadline {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(50));
    }

    drop(stream);
    tracing::debug!(samples = total, "playback complete");

    Ok(())
}
