//! Pre-upload artifact gate
//!
//! A recording that is trivially small or not decodable should fail here,
//! before any network effort is spent. The validator never mutates or
//! deletes the artifact.

use std::sync::Arc;

use crate::audio::Player;
use crate::error::ValidationError;

use super::AudioArtifact;

/// Minimum artifact size in bytes; anything at or below is rejected
pub const MIN_ARTIFACT_BYTES: u64 = 1024;

/// Gates artifacts before upload
pub struct ArtifactValidator<P: Player> {
    player: Arc<P>,
}

impl<P: Player> ArtifactValidator<P> {
    /// Build a validator around the playback capability used for the
    /// probe-decode
    pub const fn new(player: Arc<P>) -> Self {
        Self { player }
    }

    /// Check the artifact is non-trivial and decodable
    ///
    /// The probe opens and prepares the file without starting playback
    /// and releases its decoder before returning.
    ///
    /// # Errors
    ///
    /// Returns `TooSmall` for artifacts of `MIN_ARTIFACT_BYTES` or
    /// fewer bytes, `Undecodable` when the probe-decode fails.
    pub fn validate(&self, artifact: &AudioArtifact) -> Result<(), ValidationError> {
        if artifact.len <= MIN_ARTIFACT_BYTES {
            return Err(ValidationError::TooSmall { len: artifact.len });
        }

        self.player
            .probe(&artifact.path)
            .map_err(|e| ValidationError::Undecodable(e.to_string()))?;

        tracing::debug!(bytes = artifact.len, "artifact validated");
        Ok(())
    }
}
