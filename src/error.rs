//! Error types for the talkback pipeline
//!
//! Each pipeline stage has its own error enum so the operator can tell a
//! capture problem from a network problem from a server problem. All of
//! them are recoverable by starting a new cycle from `Idle`.

use thiserror::Error;

/// Result type alias for talkback setup and audio backend operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors outside the per-stage taxonomy (configuration, device setup)
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while acquiring or stopping the recording resource
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The capture device could not be acquired (busy, missing, permission
    /// revoked mid-session)
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The configured output path cannot be written
    #[error("output path not writable: {0}")]
    OutputUnwritable(String),

    /// A capture session is already active; rejected before acquiring
    #[error("a recording is already in progress")]
    SessionActive,

    /// No capture session is active
    #[error("no recording in progress")]
    NotRecording,

    /// The recorded file is missing or has zero length
    #[error("recorded file is empty or missing")]
    EmptyArtifact,

    /// The recorder backend failed
    #[error("recorder failed: {0}")]
    Backend(String),
}

/// Errors from the pre-upload artifact gate
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The artifact is at or below the minimum size threshold
    #[error("recorded file too small: {len} bytes")]
    TooSmall {
        /// Artifact length in bytes
        len: u64,
    },

    /// A probe-decode with the playback capability failed
    #[error("recorded file is not decodable: {0}")]
    Undecodable(String),
}

/// Errors from the HTTP exchange with the processing endpoint
#[derive(Debug, Error)]
pub enum UploadError {
    /// Connect, read, or write exceeded the 120 second bound
    #[error("network timeout")]
    Timeout,

    /// The server answered with a non-2xx status; the body is not parsed
    #[error("server error: status {0}")]
    ServerStatus(u16),

    /// The server answered 2xx with an empty body
    #[error("empty response from server")]
    EmptyBody,

    /// Transport failure (DNS, connection reset, invalid URL, ...)
    #[error("network error: {0}")]
    Transport(String),
}

/// Errors while decoding the response envelope
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The body is not valid JSON
    #[error("malformed response: {0}")]
    MalformedJson(String),

    /// A mandatory string field is absent
    #[error("response missing field `{0}`")]
    MissingField(&'static str),

    /// The `audio` field is not valid standard base64
    #[error("response audio is not valid base64: {0}")]
    BadEncoding(String),
}

/// Errors while playing the decoded response audio
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The bytes do not constitute playable audio
    #[error("audio not playable: {0}")]
    PrepareFailed(String),

    /// The output device failed
    #[error("playback device error: {0}")]
    Device(String),

    /// Writing the transient playback file failed
    #[error("playback io error: {0}")]
    Io(#[from] std::io::Error),
}
