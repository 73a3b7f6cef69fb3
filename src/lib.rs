//! Talkback - push-to-talk voice client
//!
//! Records a short utterance from the microphone, uploads it to a remote
//! processing endpoint, and plays back the synthesized reply next to its
//! transcript.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  PipelineController                  │
//! │  Idle → Recording → Validating → Uploading →         │
//! │  AwaitingResponse → Playing → Idle   (Failed → Idle) │
//! └───────┬───────────────┬───────────────┬──────────────┘
//!         │               │               │
//!   CaptureSession   UploadClient   PlaybackSession
//!   (cpal + hound)   (reqwest)      (tempfile + cpal)
//! ```
//!
//! Capture and playback devices sit behind the `audio::Recorder` and
//! `audio::Player` traits, so the pipeline runs unmodified against fakes
//! in tests and against cpal in the binary.

pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;

pub use config::{CaptureConfig, Config};
pub use error::{
    CaptureError, DecodeError, Error, PlaybackError, Result, UploadError, ValidationError,
};
pub use pipeline::{
    AlwaysGranted, ArtifactValidator, AudioArtifact, CaptureSession, PermissionGate,
    PipelineController, PipelineEvent, PipelineState, PlaybackSession, ResponseDecoder,
    ServerResponse, UploadClient, Utterance,
};
