//! Audio backends
//!
//! The pipeline treats the platform's capture and playback machinery as
//! opaque capabilities behind the `Recorder` and `Player` traits: "record
//! to a file", "probe/play a file". The bundled implementations use cpal
//! for device I/O and hound for the WAV container.

mod capture;
mod playback;

use std::path::Path;

use async_trait::async_trait;

pub use capture::CpalRecorder;
pub use playback::CpalPlayer;

use crate::config::CaptureConfig;
use crate::error::{CaptureError, PlaybackError};
use crate::pipeline::AudioArtifact;

/// Capability: capture microphone audio to a file
///
/// Implementations own the recording resource between `start` and `stop`
/// and must release it on every `stop` exit path, success or failure.
pub trait Recorder: Send {
    /// Acquire the capture device and begin recording to
    /// `config.output_path`
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be acquired, the output path is
    /// unwritable, or a recording is already in progress.
    fn start(&mut self, config: &CaptureConfig) -> Result<(), CaptureError>;

    /// Stop recording and return the artifact written to disk
    ///
    /// # Errors
    ///
    /// Returns error if no recording is in progress, the backend failed,
    /// or the resulting file is empty or missing. The recording resource
    /// is released in all cases.
    fn stop(&mut self) -> Result<AudioArtifact, CaptureError>;
}

/// Capability: decode and render audio files on the output device
#[async_trait]
pub trait Player: Send + Sync {
    /// Open the file and prepare it for playback without starting it,
    /// releasing the decoder before returning
    ///
    /// # Errors
    ///
    /// Returns error if the file does not constitute playable audio.
    fn probe(&self, path: &Path) -> Result<(), PlaybackError>;

    /// Play the file to completion; resolves once playback has finished
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be prepared or the device fails.
    async fn play(&self, path: &Path) -> Result<(), PlaybackError>;
}
