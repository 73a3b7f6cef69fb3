//! The capture → validate → upload → decode → playback pipeline
//!
//! `PipelineController` owns the whole cycle and is the only component
//! with sequencing and failure-handling concerns; everything else is a
//! single-purpose stage with a typed error.

mod capture;
mod controller;
mod decode;
mod playback;
mod upload;
mod validate;

use std::path::PathBuf;

pub use capture::CaptureSession;
pub use controller::{AlwaysGranted, PermissionGate, PipelineController, StartRejected};
pub use decode::{ResponseDecoder, ServerResponse, Utterance};
pub use playback::PlaybackSession;
pub use upload::{normalize_endpoint, UploadClient};
pub use validate::{ArtifactValidator, MIN_ARTIFACT_BYTES};

/// A recorded audio file: produced by capture, read once by upload,
/// retained on disk for a possible retry from `Idle`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    /// Location on disk
    pub path: PathBuf,

    /// File length in bytes
    pub len: u64,
}

impl AudioArtifact {
    /// Describe a recorded file
    #[must_use]
    pub const fn new(path: PathBuf, len: u64) -> Self {
        Self { path, len }
    }

    /// Whether the file is still present on disk
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }
}

/// Where the pipeline is in its cycle
///
/// The machine is cyclic: both `Failed` (via acknowledge) and the
/// terminal leg of `Playing` return to `Idle`, so a new utterance can
/// always be started after any outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    /// Nothing in flight; `user_start` is accepted
    Idle,
    /// Microphone is live
    Recording,
    /// Gating the artifact before spending network effort
    Validating,
    /// Multipart request in flight
    Uploading,
    /// Response body received, decoding the envelope
    AwaitingResponse,
    /// Rendering the response audio
    Playing,
    /// A stage failed; carries a human-readable reason
    Failed(String),
}

impl PipelineState {
    /// Short label for UI display
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Validating => "validating",
            Self::Uploading => "uploading",
            Self::AwaitingResponse => "awaiting response",
            Self::Playing => "playing",
            Self::Failed(_) => "failed",
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            other => f.write_str(other.label()),
        }
    }
}

/// State-change notification for the UI collaborator
///
/// The event entering `Playing` carries the transcript and is emitted
/// before playback starts, so the text display never races the audio.
#[derive(Debug, Clone)]
pub struct PipelineEvent {
    /// The state just entered
    pub state: PipelineState,

    /// Transcript of the server reply, present on `Playing` entry
    pub transcript: Option<String>,
}

impl PipelineEvent {
    fn entered(state: PipelineState) -> Self {
        Self {
            state,
            transcript: None,
        }
    }

    fn playing(transcript: String) -> Self {
        Self {
            state: PipelineState::Playing,
            transcript: Some(transcript),
        }
    }
}
