//! Response playback: transient file lifecycle
//!
//! The decoded reply is written to a fresh transient file, played, and
//! the file is removed no matter how playback ends. No transient file
//! outlives its playback.

use std::io::Write;
use std::sync::Arc;

use crate::audio::Player;
use crate::error::PlaybackError;

/// Plays decoded response audio through the playback capability
pub struct PlaybackSession<P: Player> {
    player: Arc<P>,
}

impl<P: Player> PlaybackSession<P> {
    /// Build a session around a playback backend
    pub const fn new(player: Arc<P>) -> Self {
        Self { player }
    }

    /// Write the bytes to a transient file and play it to completion
    ///
    /// The transient file is distinct per call and deleted
    /// unconditionally once playback resolves, on success and on failure.
    ///
    /// # Errors
    ///
    /// `PrepareFailed` when the bytes are not playable audio, `Io` when
    /// the transient file cannot be written, or the device error from
    /// the backend.
    pub async fn play(&self, audio: &[u8]) -> Result<(), PlaybackError> {
        let mut file = tempfile::Builder::new()
            .prefix("response")
            .suffix(".wav")
            .tempfile()?;
        file.write_all(audio)?;
        file.flush()?;

        tracing::debug!(
            path = %file.path().display(),
            bytes = audio.len(),
            "playing response"
        );

        let result = self.player.play(file.path()).await;

        // close() surfaces deletion errors that a plain drop would swallow.
        if let Err(e) = file.close() {
            tracing::warn!(error = %e, "failed to remove transient playback file");
        }

        if result.is_ok() {
            tracing::info!("playback completed");
        }
        result
    }
}
